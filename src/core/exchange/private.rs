//! Private Session Manager (SPEC_FULL §4.3): the authenticated RPC
//! connector, its bootstrap handshake, and `place_order`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::Config;
use crate::core::codec::signer;
use crate::core::domain::{Clock, OrderSide};
use crate::core::ports::OrderSink;

use super::connector::{Connector, ConnectorHandle, ConnectorHooks};
use super::user_data::user_data_connector;

const PING_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Formats an order quantity with 9 fractional digits, strips trailing
/// zeros, then restores exactly one. Deliberately preserved as specified
/// (§9): this produces `"10"` for a quantity of `1.0`, not `"1.0"`.
fn format_quantity(quantity: f64) -> String {
    let formatted = format!("{quantity:.9}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}0")
}

struct PrivateHooks {
    config: Config,
    signing_key: ed25519_dalek::SigningKey,
    clock: Arc<dyn Clock>,
    authenticated: Arc<AtomicBool>,
    socket: Arc<Mutex<Option<ConnectorHandle>>>,
    listen_key: Arc<Mutex<Option<String>>>,
    child_cancel: Arc<Mutex<Option<CancellationToken>>>,
    parent_cancel: CancellationToken,
}

impl PrivateHooks {
    fn signed_params(&self) -> (i64, String) {
        let timestamp = self.clock.now_ms();
        let ts = timestamp.to_string();
        let params = [("apiKey", self.config.api_key.as_str()), ("timestamp", ts.as_str())];
        let signature = signer::sign(&self.signing_key, &params);
        (timestamp, signature)
    }

    fn request_id(&self, method: &str) -> String {
        signer::request_id(method, self.clock.now_ms())
    }
}

#[async_trait]
impl ConnectorHooks for PrivateHooks {
    fn channel(&self) -> &'static str {
        "private"
    }

    async fn after_connect(&self, handle: &ConnectorHandle, bus: &mpsc::UnboundedSender<Value>) {
        *self.socket.lock().unwrap() = Some(handle.clone());
        self.authenticated.store(false, Ordering::SeqCst);

        let (timestamp, signature) = self.signed_params();
        handle.send_json(&json!({
            "id": self.request_id("session.logon"),
            "method": "session.logon",
            "params": {
                "apiKey": self.config.api_key,
                "timestamp": timestamp,
                "signature": signature,
            },
        }));
        // `authenticated` flips to true only once the response lands in
        // `on_frame` below — never on send (§4.3, §7 auth-failure contract).

        handle.send_json(&json!({
            "id": self.request_id("trades.recent"),
            "method": "trades.recent",
            "params": { "symbol": self.config.symbol, "limit": 1 },
        }));

        handle.send_json(&json!({
            "id": self.request_id("exchangeInfo"),
            "method": "exchangeInfo",
            "params": { "symbols": [self.config.symbol] },
        }));

        let (timestamp, signature) = self.signed_params();
        handle.send_json(&json!({
            "id": self.request_id("account.status"),
            "method": "account.status",
            "params": {
                "apiKey": self.config.api_key,
                "timestamp": timestamp,
                "signature": signature,
            },
        }));

        handle.send_json(&json!({
            "id": self.request_id("userDataStream.start"),
            "method": "userDataStream.start",
            "params": { "apiKey": self.config.api_key },
        }));

        self.spawn_session_children(bus.clone());
    }

    async fn after_cancel(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
        *self.socket.lock().unwrap() = None;
        if let Some(token) = self.child_cancel.lock().unwrap().take() {
            token.cancel();
        }
    }

    fn retag(&self, value: Value) -> Value {
        let Some(id) = value.get("id").and_then(Value::as_str) else {
            return value;
        };
        let Some((method_prefix, _)) = id.split_once('_') else {
            return value;
        };

        let tag = match method_prefix.to_lowercase().as_str() {
            "exchangeinfo" => Some("private_exchangeinfo"),
            "account" => Some("private_account_status"),
            "trades" => Some("private_trades_recent"),
            "order" => Some("private_order"),
            _ => None,
        };

        let Some(tag) = tag else { return value };
        let mut value = value;
        if let Value::Object(map) = &mut value {
            map.insert("channel".to_string(), Value::String(tag.to_string()));
        }
        value
    }

    /// Observes two RPC responses that never reach the Trader's dispatch
    /// table (§4.5 lists no case for either): `session.logon`, whose success
    /// is what actually flips `authenticated` (§4.3, §7 — never the send,
    /// only the response), and `userDataStream.start`, which carries the
    /// listen key the manager owns end to end.
    fn on_frame(&self, value: &Value) {
        let Some(id) = value.get("id").and_then(Value::as_str) else {
            return;
        };
        let Some((method_prefix, _)) = id.split_once('_') else {
            return;
        };

        match method_prefix.to_lowercase().as_str() {
            "session" => {
                let success = is_rpc_success(value);
                self.authenticated.store(success, Ordering::SeqCst);
                if !success {
                    warn!("session.logon rejected by the exchange; orders refused until a new logon succeeds");
                }
            }
            "userdatastream" => {
                if let Some(listen_key) = value.get("result").and_then(|r| r.get("listenKey")).and_then(Value::as_str) {
                    *self.listen_key.lock().unwrap() = Some(listen_key.to_string());
                }
            }
            _ => {}
        }
    }
}

/// True if an RPC response carries no `error` object and, when present, a
/// 2xx `status`. `session.logon`'s success response is how `authenticated`
/// is observed (§4.3, §7) — there is no separate ack field to key off.
fn is_rpc_success(value: &Value) -> bool {
    if value.get("error").is_some() {
        return false;
    }
    match value.get("status").and_then(Value::as_i64) {
        Some(status) => (200..300).contains(&status),
        None => true,
    }
}

impl PrivateHooks {
    /// Spawns the two session children described in §4.3: a user-data
    /// connector that waits for the listen key and then runs until
    /// cancelled, and a ping worker that re-announces it every 30 minutes.
    /// Both are tied to a child cancellation token so a full Trader/Supervisor
    /// shutdown or a private-socket teardown cancels them together.
    fn spawn_session_children(&self, bus: mpsc::UnboundedSender<Value>) {
        let token = self.parent_cancel.child_token();
        *self.child_cancel.lock().unwrap() = Some(token.clone());

        let private_ws_host = self.config.private_ws_host.clone();
        let listen_key = self.listen_key.clone();
        let user_data_token = token.clone();
        tokio::spawn(async move {
            let key = loop {
                if let Some(key) = listen_key.lock().unwrap().clone() {
                    break key;
                }
                tokio::select! {
                    () = user_data_token.cancelled() => return,
                    () = sleep(Duration::from_millis(250)) => {}
                }
            };
            let url = format!("wss://{private_ws_host}/ws/{key}");
            user_data_connector(url).run(bus, user_data_token).await;
        });

        let socket = self.socket.clone();
        let listen_key = self.listen_key.clone();
        let api_key = self.config.api_key.clone();
        let clock = self.clock.clone();
        let ping_token = token;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = ping_token.cancelled() => return,
                    () = sleep(PING_INTERVAL) => {}
                }
                let (Some(handle), Some(key)) =
                    (socket.lock().unwrap().clone(), listen_key.lock().unwrap().clone())
                else {
                    continue;
                };
                handle.send_json(&json!({
                    "id": signer::request_id("userDataStream.ping", clock.now_ms()),
                    "method": "userDataStream.ping",
                    "params": { "apiKey": api_key, "listenKey": key },
                }));
            }
        });
    }
}

/// Cloneable handle the Trader uses to place orders and learn the listen key.
#[derive(Clone)]
pub struct PrivateSessionHandle {
    socket: Arc<Mutex<Option<ConnectorHandle>>>,
    authenticated: Arc<AtomicBool>,
    listen_key: Arc<Mutex<Option<String>>>,
    symbol: String,
    clock: Arc<dyn Clock>,
}

impl OrderSink for PrivateSessionHandle {
    /// Places a MARKET order. Missing preconditions (no open socket, or
    /// logon not yet completed) are logged at `warn` and swallowed — §4.3
    /// says this must never raise.
    fn place_order(&self, side: OrderSide, quantity: f64) {
        let Some(handle) = self.socket.lock().unwrap().clone() else {
            warn!("place_order called with no open private socket");
            return;
        };
        if !handle.is_open() {
            warn!("place_order called while private socket is not open");
            return;
        }
        if !self.authenticated.load(Ordering::SeqCst) {
            warn!("place_order called before session.logon completed");
            return;
        }

        let timestamp = self.clock.now_ms();
        let id = signer::request_id("order.place", timestamp);
        handle.send_json(&json!({
            "id": id,
            "method": "order.place",
            "params": {
                "symbol": self.symbol,
                "side": side.as_str(),
                "type": "MARKET",
                "quantity": format_quantity(quantity),
                "timestamp": timestamp,
            },
        }));
    }
}

impl PrivateSessionHandle {
    #[must_use]
    pub fn listen_key(&self) -> Option<String> {
        self.listen_key.lock().unwrap().clone()
    }
}

/// Builds the private connector plus the [`PrivateSessionHandle`] the Trader
/// will hold to issue orders, sharing the same underlying socket/auth state.
#[must_use]
pub fn private_connector(
    config: Config,
    signing_key: ed25519_dalek::SigningKey,
    clock: Arc<dyn Clock>,
    parent_cancel: CancellationToken,
) -> (Connector<PrivateHooks>, PrivateSessionHandle) {
    let authenticated = Arc::new(AtomicBool::new(false));
    let socket = Arc::new(Mutex::new(None));
    let listen_key = Arc::new(Mutex::new(None));

    let handle = PrivateSessionHandle {
        socket: socket.clone(),
        authenticated: authenticated.clone(),
        listen_key: listen_key.clone(),
        symbol: config.symbol.clone(),
        clock: clock.clone(),
    };

    let url = config.private_ws_url();
    let hooks = PrivateHooks {
        config,
        signing_key,
        clock,
        authenticated,
        socket,
        listen_key,
        child_cancel: Arc::new(Mutex::new(None)),
        parent_cancel,
    };

    (Connector::new(url, hooks), handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::FakeClock;
    use serde_json::json;

    #[test]
    fn format_quantity_strips_trailing_zeros_and_restores_one() {
        assert_eq!(format_quantity(0.001), "0.0010");
    }

    #[test]
    fn format_quantity_bug_collapses_whole_numbers() {
        assert_eq!(format_quantity(1.0), "10");
    }

    fn test_hooks() -> PrivateHooks {
        let config = Config {
            version: "test".into(),
            environment: "test".into(),
            log_level: "INFO".into(),
            json_log: false,
            colored_logs: false,
            symbol: "BTCUSDT".into(),
            position_quantity: 0.001,
            position_tp_percent: 0.25,
            position_sl_percent: 0.25,
            position_hold_time_secs: 60,
            position_sleep_time_secs: 30,
            api_key: "test".into(),
            private_key_base64: String::new(),
            public_ws_host: "example.invalid".into(),
            private_ws_host: "example.invalid".into(),
        };
        PrivateHooks {
            config,
            signing_key: ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]),
            clock: Arc::new(FakeClock::new(1_713_797_000_000)),
            authenticated: Arc::new(AtomicBool::new(false)),
            socket: Arc::new(Mutex::new(None)),
            listen_key: Arc::new(Mutex::new(None)),
            child_cancel: Arc::new(Mutex::new(None)),
            parent_cancel: CancellationToken::new(),
        }
    }

    #[test]
    fn retag_tags_known_rpc_responses_but_leaves_session_logon_untagged() {
        let hooks = test_hooks();
        let tagged = hooks.retag(json!({"id": "exchangeinfo_1", "result": {}}));
        assert_eq!(tagged["channel"], "private_exchangeinfo");

        let untagged = hooks.retag(json!({"id": "session_logon_1", "status": 200, "result": {}}));
        assert!(untagged.get("channel").is_none());
    }

    #[test]
    fn on_frame_does_not_authenticate_until_a_success_response_arrives() {
        let hooks = test_hooks();
        assert!(!hooks.authenticated.load(Ordering::SeqCst));

        hooks.on_frame(&json!({"id": "session_logon_1", "status": 200, "result": {}}));
        assert!(hooks.authenticated.load(Ordering::SeqCst));
    }

    #[test]
    fn on_frame_leaves_authenticated_false_on_a_rejected_logon() {
        let hooks = test_hooks();
        hooks.on_frame(&json!({"id": "session_logon_1", "status": 401, "error": {"code": -2015, "msg": "invalid key"}}));
        assert!(!hooks.authenticated.load(Ordering::SeqCst));
    }

    #[test]
    fn on_frame_captures_listen_key_from_user_data_stream_start_response() {
        let hooks = test_hooks();
        hooks.on_frame(&json!({
            "id": "userdatastream_start_1",
            "status": 200,
            "result": {"listenKey": "abc123"}
        }));
        assert_eq!(*hooks.listen_key.lock().unwrap(), Some("abc123".to_string()));
    }
}
