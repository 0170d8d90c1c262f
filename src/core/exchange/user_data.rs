//! User-data connector: no handshake, publishes a synthetic `connected`
//! frame on every (re)connect so the Trader can flip `stream_ready` (§4.5,
//! §4.6) the same way it reacts to any other bus message.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::connector::{Connector, ConnectorHandle, ConnectorHooks};

struct UserDataHooks;

#[async_trait]
impl ConnectorHooks for UserDataHooks {
    fn channel(&self) -> &'static str {
        "user_data"
    }

    async fn after_connect(&self, _handle: &ConnectorHandle, bus: &mpsc::UnboundedSender<Value>) {
        let _ = bus.send(json!({ "channel": "user_stream", "event": "connected" }));
    }
}

/// Builds the user-data connector against `<base>/<listen_key>`.
#[must_use]
pub fn user_data_connector(url: String) -> Connector<UserDataHooks> {
    Connector::new(url, UserDataHooks)
}
