//! The composite in-memory model owned exclusively by the Trader.

use super::balance::Balances;
use super::position::Position;
use super::status::Status;
use super::symbol::SymbolMetadata;

#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub tp_trades: u64,
    pub sl_trades: u64,
    pub total_pnl: f64,
}

/// Authoritative runtime state: symbol metadata, balances, last price,
/// position, status, counters. Mutated only by the Trader (and the Time
/// Watcher's own status/position writes, per the concurrency contract in
/// SPEC_FULL §5).
#[derive(Debug, Clone)]
pub struct State {
    pub status: Status,

    pub stream_ready: bool,
    pub balance_ready: bool,
    pub symbols_ready: bool,

    pub symbol: Option<SymbolMetadata>,
    pub balances: Balances,

    pub last_price: f64,
    pub position: Option<Position>,
    pub sleeping_at: i64,

    pub counters: Counters,
}

impl Default for State {
    fn default() -> Self {
        Self {
            status: Status::Initial,
            stream_ready: false,
            balance_ready: false,
            symbols_ready: false,
            symbol: None,
            balances: Balances::new(),
            last_price: 0.0,
            position: None,
            sleeping_at: 0,
            counters: Counters::default(),
        }
    }
}

impl State {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invariant 1: a position exists iff status is one of the three
    /// position-holding states.
    #[must_use]
    pub fn position_invariant_holds(&self) -> bool {
        self.position.is_some() == self.status.holds_position()
    }

    /// Invariant 3: READY requires every readiness flag plus a positive price.
    #[must_use]
    pub fn ready_preconditions_met(&self) -> bool {
        self.stream_ready && self.balance_ready && self.symbols_ready && self.last_price > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_satisfies_position_invariant() {
        let state = State::new();
        assert!(state.position_invariant_holds());
    }

    #[test]
    fn ready_preconditions_require_all_flags_and_price() {
        let mut state = State::new();
        assert!(!state.ready_preconditions_met());
        state.stream_ready = true;
        state.balance_ready = true;
        state.symbols_ready = true;
        assert!(!state.ready_preconditions_met());
        state.last_price = 66_000.0;
        assert!(state.ready_preconditions_met());
    }
}
