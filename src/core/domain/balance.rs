//! Per-asset balances, kept in an explicit asset→balance mapping.
//!
//! The original source exposed balances through dynamic attribute access
//! (`state.balances.<ASSET>`); this is deliberately an explicit map instead (see
//! SPEC_FULL.md §9 / DESIGN.md).

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Balance {
    pub free: f64,
    pub locked: f64,
}

/// Asset symbol (e.g. "BTC", "USDT") to balance.
#[derive(Debug, Clone, Default)]
pub struct Balances(HashMap<String, Balance>);

impl Balances {
    #[must_use]
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    #[must_use]
    pub fn get(&self, asset: &str) -> Option<Balance> {
        self.0.get(asset).copied()
    }

    #[must_use]
    pub fn free(&self, asset: &str) -> f64 {
        self.get(asset).map_or(0.0, |b| b.free)
    }

    /// Replaces the entire map. Used for the full account-status snapshot.
    pub fn replace_all<I: IntoIterator<Item = (String, Balance)>>(&mut self, entries: I) {
        self.0 = entries.into_iter().collect();
    }

    /// Upserts only the given entries, leaving the rest untouched. Used for
    /// incremental `outboundAccountPosition` deltas. Idempotent: applying the
    /// same delta twice yields the same map, because each entry is a
    /// last-write-wins overwrite rather than an accumulation.
    pub fn apply_delta<I: IntoIterator<Item = (String, Balance)>>(&mut self, entries: I) {
        for (asset, balance) in entries {
            self.0.insert(asset, balance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_idempotent() {
        let mut balances = Balances::new();
        let delta = vec![("BTC".to_string(), Balance { free: 1.0, locked: 0.0 })];
        balances.apply_delta(delta.clone());
        balances.apply_delta(delta);
        assert_eq!(balances.free("BTC"), 1.0);
    }

    #[test]
    fn delta_leaves_other_assets_untouched() {
        let mut balances = Balances::new();
        balances.replace_all(vec![
            ("BTC".to_string(), Balance { free: 1.0, locked: 0.0 }),
            ("USDT".to_string(), Balance { free: 10_000.0, locked: 0.0 }),
        ]);
        balances.apply_delta(vec![("BTC".to_string(), Balance { free: 0.999, locked: 0.0 })]);
        assert_eq!(balances.free("BTC"), 0.999);
        assert_eq!(balances.free("USDT"), 10_000.0);
    }

    #[test]
    fn unknown_asset_is_zero() {
        let balances = Balances::new();
        assert_eq!(balances.free("BTC"), 0.0);
    }
}
