//! Time Watcher: the periodic task that drives cooldown expiry, stalled-entry
//! retries, and hold-time-based position exit without waiting on a bus
//! message (SPEC_FULL §4.7). Ticks the same [`Trader`] state machine the
//! event loop drives, just on a timer instead of a message.

use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::core::domain::Status;
use crate::core::trader::Trader;

use std::sync::Arc;

const IN_POSITION_TICK: Duration = Duration::from_millis(100);
const IDLE_TICK: Duration = Duration::from_secs(1);

pub struct TimeWatcher {
    trader: Arc<Trader>,
}

impl TimeWatcher {
    #[must_use]
    pub fn new(trader: Arc<Trader>) -> Self {
        Self { trader }
    }

    /// Runs until cancelled. Cancellation is terminal — it does not attempt
    /// to close an open position (§4.7).
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            let tick = {
                let state = self.trader.state();
                let state = state.lock().unwrap();
                if state.status == Status::InPosition { IN_POSITION_TICK } else { IDLE_TICK }
            };

            tokio::select! {
                () = cancel.cancelled() => return,
                () = sleep(tick) => {}
            }

            self.trader.time_watcher_tick();
        }
    }
}
