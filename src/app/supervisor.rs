//! Supervisor: the only component that knows about process signals and exit
//! codes (SPEC_FULL §5, §6a). Builds the event bus, the three connectors, the
//! Trader and the Time Watcher by explicit constructor injection, spawns them
//! as plain tokio tasks, and tears them all down from one root
//! [`CancellationToken`].

use std::sync::{Arc, Mutex};

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::codec::signer;
use crate::core::domain::{Clock, State, SystemClock};
use crate::core::exchange::{private_connector, public_connector};
use crate::core::ports::OrderSink;
use crate::core::time_watcher::TimeWatcher;
use crate::core::trader::Trader;

/// Owns the root cancellation token and the set of spawned tasks.
pub struct Supervisor {
    config: Config,
    cancel: CancellationToken,
}

impl Supervisor {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config, cancel: CancellationToken::new() }
    }

    /// A clone of the root token, so `main` can cancel it from a signal
    /// handler without holding the Supervisor itself.
    #[must_use]
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wires every component together and runs until `cancel_handle()` is
    /// cancelled. Returns `true` if shutdown was triggered by a fatal
    /// in-process invariant violation (`Trader::exit_with_error`) rather
    /// than an external signal — `main` uses this to pick the exit code.
    pub async fn run(self) -> anyhow::Result<bool> {
        let signing_key = signer::load_private_key(&self.config.private_key_base64)
            .context("loading PRIVATE_KEY_BASE64")?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let state = Arc::new(Mutex::new(State::new()));
        let (bus_tx, bus_rx) = mpsc::unbounded_channel();

        let public = public_connector(self.config.public_ws_url(), self.config.symbol.clone());
        let (private, order_sink) = private_connector(
            self.config.clone(),
            signing_key,
            clock.clone(),
            self.cancel.clone(),
        );

        let trader = Arc::new(Trader::new(
            self.config.clone(),
            clock,
            Arc::new(order_sink) as Arc<dyn OrderSink>,
            state,
        ));
        let watcher = TimeWatcher::new(trader.clone());

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();
        tasks.push(tokio::spawn(public.run(bus_tx.clone(), self.cancel.clone())));
        tasks.push(tokio::spawn(private.run(bus_tx, self.cancel.clone())));
        tasks.push(tokio::spawn(trader.clone().run(bus_rx, self.cancel.clone())));
        tasks.push(tokio::spawn(watcher.run(self.cancel.clone())));

        info!(symbol = %self.config.symbol, "supervisor: all tasks spawned");

        self.cancel.cancelled().await;
        info!("supervisor: cancellation received, waiting for tasks to unwind");

        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "supervisor: task panicked during shutdown");
            }
        }

        Ok(trader.is_fatal())
    }
}
