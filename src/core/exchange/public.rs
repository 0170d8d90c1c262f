//! Public market-data connector: one `<symbol>@trade` subscription.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use super::connector::{Connector, ConnectorHandle, ConnectorHooks};

#[derive(Serialize)]
struct SubscribeRequest {
    method: &'static str,
    params: Vec<String>,
    id: u32,
}

struct PublicHooks {
    symbol: String,
}

#[async_trait]
impl ConnectorHooks for PublicHooks {
    fn channel(&self) -> &'static str {
        "public_market"
    }

    async fn after_connect(&self, handle: &ConnectorHandle, _bus: &mpsc::UnboundedSender<Value>) {
        let stream = format!("{}@trade", self.symbol.to_lowercase());
        handle.send_json(&SubscribeRequest {
            method: "SUBSCRIBE",
            params: vec![stream],
            id: 1,
        });
    }
}

/// Builds the public-market connector for `symbol`, subscribing to its trade
/// stream immediately on every (re)connect.
#[must_use]
pub fn public_connector(url: String, symbol: String) -> Connector<PublicHooks> {
    Connector::new(url, PublicHooks { symbol })
}
