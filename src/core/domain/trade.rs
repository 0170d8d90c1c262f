//! Market trade ticks (`e:"trade"` stream frames).

use serde::Deserialize;

/// A single public trade event for the configured symbol.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeTick {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "T")]
    pub trade_time: i64,
}

impl TradeTick {
    /// Parses the wire string price into a finite positive `f64`.
    ///
    /// Returns `None` for a non-numeric, non-finite, or non-positive price —
    /// callers treat that as "ignore this tick" rather than a decode failure.
    #[must_use]
    pub fn price(&self) -> Option<f64> {
        let price: f64 = self.price.parse().ok()?;
        (price.is_finite() && price > 0.0).then_some(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_short_key_fields() {
        let raw = r#"{"e":"trade","E":1713797829314,"s":"BTCUSDT","t":1415300,"p":"66197.57000000","q":"0.00100000","T":1713797829314}"#;
        let trade: TradeTick = serde_json::from_str(raw).unwrap();
        assert_eq!(trade.event_type, "trade");
        assert_eq!(trade.symbol, "BTCUSDT");
        assert_eq!(trade.price(), Some(66197.57));
    }

    #[test]
    fn rejects_non_positive_price() {
        let trade = TradeTick {
            event_type: "trade".into(),
            event_time: 0,
            symbol: "BTCUSDT".into(),
            price: "0".into(),
            trade_time: 0,
        };
        assert_eq!(trade.price(), None);
    }
}
