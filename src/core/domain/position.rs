//! The single open position this agent may hold at a time.

use super::order::OrderReport;

/// Created at entry-intent, finalized by [`Position::from_fill`] on a FILLED
/// BUY, destroyed on a FILLED SELL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub price: f64,
    pub position_time: i64,
    pub amount: f64,
    pub sl_price: f64,
    pub tp_price: f64,
}

impl Position {
    /// A position sized but not yet priced, created the moment
    /// `create_new_position` emits the entry BUY (§4.6). `price`/`position_time`
    /// are finalized later by [`Position::from_fill`].
    #[must_use]
    pub const fn pending(amount: f64) -> Self {
        Self {
            price: 0.0,
            position_time: 0,
            amount,
            sl_price: 0.0,
            tp_price: 0.0,
        }
    }

    /// Finalizes a pending position from the FILLED entry report.
    ///
    /// Both `sl_price` and `tp_price` derive from the *same* `sl_percent`
    /// configured value — `POSITION_TP_PERCENT` is accepted in `Config` but
    /// not consulted here. This mirrors the reference implementation exactly
    /// (see SPEC_FULL §4.6, §9 "TP vs SL percentages"); it is preserved
    /// rather than silently corrected because which of the two is the bug —
    /// a vestigial config field, or a brokenly-computed `tp_price` — is an
    /// open question the design explicitly declines to guess at.
    #[must_use]
    pub fn from_fill(amount: f64, last_executed_price: f64, transaction_time: i64, sl_percent: f64) -> Self {
        let offset = last_executed_price * (sl_percent / 100.0);
        Self {
            price: last_executed_price,
            position_time: transaction_time,
            amount,
            sl_price: last_executed_price - offset,
            tp_price: last_executed_price + offset,
        }
    }

    #[must_use]
    pub fn hold_time_expired(&self, now_ms: i64, hold_time_secs: u64) -> bool {
        now_ms >= self.position_time + (hold_time_secs as i64) * 1000
    }

    #[must_use]
    pub fn take_profit_hit(&self, last_price: f64) -> bool {
        last_price >= self.tp_price
    }

    #[must_use]
    pub fn stop_loss_hit(&self, last_price: f64) -> bool {
        last_price <= self.sl_price
    }
}

/// `last_executed_price * quantity_requested - position.price * position.amount
/// - commission_value`, rounded to 6 decimals.
///
/// `commission_value` is `commission_amount * last_executed_price` when the
/// commission was charged in the base asset (it needs converting to quote
/// terms to net against the quote-denominated proceeds), otherwise
/// `commission_amount` as-is (assumed already quote-denominated). A
/// commission charged in a third asset is out of scope (SPEC_FULL §9) and
/// silently mistreated the same way the reference implementation does.
#[must_use]
pub fn calculate_pnl(position: &Position, close_report: &OrderReport, base_asset: &str) -> f64 {
    let commission_value = match close_report.commission_asset.as_deref() {
        Some(asset) if asset == base_asset => {
            close_report.commission_amount * close_report.last_executed_price
        }
        _ => close_report.commission_amount,
    };

    let pnl = close_report.last_executed_price * close_report.quantity
        - position.price * position.amount
        - commission_value;

    (pnl * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::order::{OrderSide, OrderStatus};

    fn close_report(last_executed_price: f64, quantity: f64, commission_amount: f64, commission_asset: &str) -> OrderReport {
        OrderReport {
            event_type: "executionReport".into(),
            event_time: 0,
            symbol: "BTCUSDT".into(),
            side: OrderSide::Sell,
            order_type: "MARKET".into(),
            quantity,
            price: 0.0,
            status: OrderStatus::Filled,
            last_executed_quantity: quantity,
            last_executed_price,
            commission_amount,
            commission_asset: Some(commission_asset.to_string()),
            transaction_time: 2_000_000,
        }
    }

    #[test]
    fn from_fill_derives_both_brackets_from_sl_percent() {
        let position = Position::from_fill(0.001, 66_000.0, 1_000_000, 0.25);
        assert_eq!(position.price, 66_000.0);
        assert_eq!(position.position_time, 1_000_000);
        assert!((position.tp_price - 66_165.0).abs() < 1e-6);
        assert!((position.sl_price - 65_835.0).abs() < 1e-6);
    }

    #[test]
    fn take_profit_boundary_is_inclusive() {
        let position = Position::from_fill(0.001, 66_000.0, 0, 0.25);
        assert!(position.take_profit_hit(position.tp_price));
        assert!(!position.take_profit_hit(position.tp_price - 0.01));
    }

    #[test]
    fn stop_loss_boundary_is_inclusive() {
        let position = Position::from_fill(0.001, 66_000.0, 0, 0.25);
        assert!(position.stop_loss_hit(position.sl_price));
        assert!(!position.stop_loss_hit(position.sl_price + 0.01));
    }

    #[test]
    fn hold_time_expiry_at_boundary() {
        let position = Position::from_fill(0.001, 66_000.0, 1_000_000, 0.25);
        assert!(!position.hold_time_expired(1_000_000 + 59_999, 60));
        assert!(position.hold_time_expired(1_000_000 + 60_000, 60));
    }

    #[test]
    fn pnl_with_quote_denominated_commission() {
        let position = Position::from_fill(0.001, 66_000.0, 1_000_000, 0.25);
        let close = close_report(66_200.0, 0.001, 0.066, "USDT");
        let pnl = calculate_pnl(&position, &close, "BTC");
        assert!((pnl - (66_200.0 * 0.001 - 66_000.0 * 0.001 - 0.066)).abs() < 1e-9);
    }

    #[test]
    fn pnl_converts_base_denominated_commission_to_quote() {
        let position = Position::from_fill(0.001, 66_000.0, 1_000_000, 0.25);
        let close = close_report(66_200.0, 0.001, 0.0000001, "BTC");
        let pnl = calculate_pnl(&position, &close, "BTC");
        let expected = 66_200.0 * 0.001 - 66_000.0 * 0.001 - 0.0000001 * 66_200.0;
        assert!((pnl - (expected * 1_000_000.0).round() / 1_000_000.0).abs() < 1e-9);
    }
}
