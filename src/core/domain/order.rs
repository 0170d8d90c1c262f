//! Order execution reports, in both wire shapes that resolve to [`OrderReport`].

use serde::{Deserialize, Deserializer};

fn string_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum OrderSide {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl OrderSide {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "NEW")]
    New,
    #[serde(rename = "PARTIALLY_FILLED")]
    PartiallyFilled,
    #[serde(rename = "FILLED")]
    Filled,
    #[serde(rename = "CANCELED")]
    Canceled,
    #[serde(rename = "REJECTED")]
    Rejected,
    #[serde(rename = "EXPIRED")]
    Expired,
}

impl OrderStatus {
    #[must_use]
    pub const fn is_filled(self) -> bool {
        matches!(self, Self::Filled)
    }
}

/// An execution report, decoded either from the `executionReport` stream
/// frame or collapsed from an `order.place` RPC response (see
/// [`OrderReport::from_rpc_result`]).
#[derive(Debug, Clone)]
pub struct OrderReport {
    pub event_type: String,
    pub event_time: i64,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: String,
    pub quantity: f64,
    pub price: f64,
    pub status: OrderStatus,
    pub last_executed_quantity: f64,
    pub last_executed_price: f64,
    pub commission_amount: f64,
    pub commission_asset: Option<String>,
    pub transaction_time: i64,
}

/// The flat `executionReport` stream-frame shape, short exchange keys.
///
/// `q` (requested quantity) and `p` (requested price) are declared optional:
/// a terminal `FILLED` report is fully describable by its `l`/`L` execution
/// fields alone, and this crate's own §8 fixtures omit both on a close fill.
/// [`From<ExecutionReportFrame> for OrderReport`] falls back to the executed
/// quantity and a zero price when they're absent.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionReportFrame {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "S")]
    pub side: OrderSide,
    #[serde(rename = "o")]
    pub order_type: String,
    #[serde(rename = "q", default, deserialize_with = "opt_string_to_f64")]
    pub quantity: Option<f64>,
    #[serde(rename = "p", default, deserialize_with = "opt_string_to_f64")]
    pub price: Option<f64>,
    #[serde(rename = "X")]
    pub status: OrderStatus,
    #[serde(rename = "l", deserialize_with = "string_to_f64")]
    pub last_executed_quantity: f64,
    #[serde(rename = "L", deserialize_with = "string_to_f64")]
    pub last_executed_price: f64,
    #[serde(rename = "n", deserialize_with = "string_to_f64")]
    pub commission_amount: f64,
    #[serde(rename = "N")]
    pub commission_asset: Option<String>,
    #[serde(rename = "T")]
    pub transaction_time: i64,
}

impl From<ExecutionReportFrame> for OrderReport {
    fn from(frame: ExecutionReportFrame) -> Self {
        Self {
            event_type: frame.event_type,
            event_time: frame.event_time,
            symbol: frame.symbol,
            side: frame.side,
            order_type: frame.order_type,
            quantity: frame.quantity.unwrap_or(frame.last_executed_quantity),
            price: frame.price.unwrap_or(0.0),
            status: frame.status,
            last_executed_quantity: frame.last_executed_quantity,
            last_executed_price: frame.last_executed_price,
            commission_amount: frame.commission_amount,
            commission_asset: frame.commission_asset,
            transaction_time: frame.transaction_time,
        }
    }
}

/// One fill leg inside an `order.place` RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderFill {
    #[serde(deserialize_with = "string_to_f64")]
    pub price: f64,
    #[serde(deserialize_with = "string_to_f64")]
    pub qty: f64,
    #[serde(deserialize_with = "string_to_f64")]
    pub commission: f64,
    #[serde(rename = "commissionAsset")]
    pub commission_asset: String,
}

/// The `result` object of an `order.place` RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderPlaceResult {
    pub symbol: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: String,
    pub status: OrderStatus,
    #[serde(rename = "origQty", deserialize_with = "string_to_f64")]
    pub orig_qty: f64,
    #[serde(default, deserialize_with = "opt_string_to_f64")]
    pub price: Option<f64>,
    #[serde(default)]
    pub fills: Vec<OrderFill>,
    #[serde(rename = "transactTime")]
    pub transact_time: i64,
}

fn opt_string_to_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|s| s.parse().map_err(serde::de::Error::custom))
        .transpose()
}

impl OrderReport {
    /// Collapses `result.fills[]` into one report: summed quantity, a
    /// quantity-weighted average price, and the *last* fill's commission
    /// fields as the representative commission. If there are no fills (the
    /// order never executed), `last_executed_quantity`/`last_executed_price`
    /// stay zero.
    #[must_use]
    pub fn from_rpc_result(result: &OrderPlaceResult) -> Self {
        let total_qty: f64 = result.fills.iter().map(|f| f.qty).sum();
        let avg_price = if total_qty > 0.0 {
            result.fills.iter().map(|f| f.price * f.qty).sum::<f64>() / total_qty
        } else {
            0.0
        };
        let last_fill = result.fills.last();

        Self {
            event_type: "executionReport".to_string(),
            event_time: result.transact_time,
            symbol: result.symbol.clone(),
            side: result.side,
            order_type: result.order_type.clone(),
            quantity: result.orig_qty,
            price: result.price.unwrap_or(0.0),
            status: result.status,
            last_executed_quantity: total_qty,
            last_executed_price: avg_price,
            commission_amount: last_fill.map_or(0.0, |f| f.commission),
            commission_asset: last_fill.map(|f| f.commission_asset.clone()),
            transaction_time: result.transact_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_execution_report_frame() {
        let raw = r#"{"e":"executionReport","E":1713797483678,"s":"BTCUSDT","S":"BUY","o":"MARKET",
            "q":"0.00100000","p":"0.00000000","X":"FILLED","l":"0.00100000","L":"66250.98000000",
            "n":"0.00000000","N":"BTC","T":1713797483678}"#;
        let frame: ExecutionReportFrame = serde_json::from_str(raw).unwrap();
        let report: OrderReport = frame.into();
        assert_eq!(report.side, OrderSide::Buy);
        assert!(report.status.is_filled());
        assert_eq!(report.last_executed_price, 66250.98);
        assert_eq!(report.commission_asset.as_deref(), Some("BTC"));
    }

    /// The §8 S6 fixture: a close fill reporting neither requested quantity
    /// nor requested price, only what actually executed.
    #[test]
    fn decodes_a_close_fill_missing_quantity_and_price() {
        let raw = r#"{"e":"executionReport","E":2000000,"s":"BTCUSDT","S":"SELL","o":"MARKET","X":"FILLED",
            "L":"66200","l":"0.001","T":2000000,"N":"USDT","n":"0.066"}"#;
        let frame: ExecutionReportFrame = serde_json::from_str(raw).unwrap();
        let report: OrderReport = frame.into();
        assert_eq!(report.quantity, 0.001, "falls back to last_executed_quantity");
        assert_eq!(report.price, 0.0);
        assert_eq!(report.last_executed_price, 66_200.0);
    }

    #[test]
    fn collapses_multiple_fills_with_weighted_average() {
        let result = OrderPlaceResult {
            symbol: "BTCUSDT".into(),
            side: OrderSide::Sell,
            order_type: "MARKET".into(),
            status: OrderStatus::Filled,
            orig_qty: 0.002,
            price: Some(0.0),
            fills: vec![
                OrderFill {
                    price: 100.0,
                    qty: 0.001,
                    commission: 0.0,
                    commission_asset: "USDT".into(),
                },
                OrderFill {
                    price: 200.0,
                    qty: 0.001,
                    commission: 0.05,
                    commission_asset: "USDT".into(),
                },
            ],
            transact_time: 1_000_000,
        };
        let report = OrderReport::from_rpc_result(&result);
        assert_eq!(report.last_executed_quantity, 0.002);
        assert_eq!(report.last_executed_price, 150.0);
        assert_eq!(report.commission_amount, 0.05);
        assert_eq!(report.commission_asset.as_deref(), Some("USDT"));
    }

    #[test]
    fn no_fills_leaves_last_executed_at_zero() {
        let result = OrderPlaceResult {
            symbol: "BTCUSDT".into(),
            side: OrderSide::Buy,
            order_type: "MARKET".into(),
            status: OrderStatus::Expired,
            orig_qty: 0.002,
            price: None,
            fills: vec![],
            transact_time: 1_000_000,
        };
        let report = OrderReport::from_rpc_result(&result);
        assert_eq!(report.last_executed_quantity, 0.0);
        assert_eq!(report.last_executed_price, 0.0);
        assert!(report.commission_asset.is_none());
    }
}
