//! Environment-driven process configuration.
//!
//! Loaded once at process start by [`Config::load`] and handed by clone to
//! every component that needs it. `.env` is read via `dotenvy` if present but
//! never required.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value for {key}={raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match std::env::var(key) {
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(anyhow::anyhow!("invalid boolean for {key}={other:?}")),
        },
        Err(_) => Ok(default),
    }
}

/// Immutable process configuration, assembled once at startup.
///
/// `api_key` and `private_key_base64` are credentials: read straight from the
/// environment, never defaulted, and deliberately excluded from `Debug` so
/// they never land in a log line.
#[derive(Clone)]
pub struct Config {
    pub version: String,
    pub environment: String,
    pub log_level: String,
    pub json_log: bool,
    pub colored_logs: bool,

    pub symbol: String,
    pub position_quantity: f64,
    pub position_tp_percent: f64,
    pub position_sl_percent: f64,
    pub position_hold_time_secs: u64,
    pub position_sleep_time_secs: u64,

    pub api_key: String,
    pub private_key_base64: String,

    pub public_ws_host: String,
    pub private_ws_host: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("version", &self.version)
            .field("environment", &self.environment)
            .field("log_level", &self.log_level)
            .field("json_log", &self.json_log)
            .field("colored_logs", &self.colored_logs)
            .field("symbol", &self.symbol)
            .field("position_quantity", &self.position_quantity)
            .field("position_tp_percent", &self.position_tp_percent)
            .field("position_sl_percent", &self.position_sl_percent)
            .field("position_hold_time_secs", &self.position_hold_time_secs)
            .field("position_sleep_time_secs", &self.position_sleep_time_secs)
            .field("api_key", &"<redacted>")
            .field("private_key_base64", &"<redacted>")
            .field("public_ws_host", &self.public_ws_host)
            .field("private_ws_host", &self.private_ws_host)
            .finish()
    }
}

impl Config {
    /// Loads configuration from the process environment, optionally seeded by
    /// a `.env` file in the working directory. `API_KEY` and
    /// `PRIVATE_KEY_BASE64` have no default; their absence is startup-fatal.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            version: env_or("VERSION", "0.0.1"),
            environment: env_or("ENVIRONMENT", "development"),
            log_level: env_or("LOGLEVEL", "INFO"),
            json_log: env_bool("JSON_LOG", false)?,
            colored_logs: env_bool("COLORED_LOGS", true)?,

            symbol: env_or("SYMBOL", "BTCUSDT"),
            position_quantity: env_parse("POSITION_QUANTITY", 0.001)?,
            position_tp_percent: env_parse("POSITION_TP_PERCENT", 0.25)?,
            position_sl_percent: env_parse("POSITION_SL_PERCENT", 0.25)?,
            position_hold_time_secs: env_parse("POSITION_HOLD_TIME", 60)?,
            position_sleep_time_secs: env_parse("POSITION_SLEEP_TIME", 30)?,

            api_key: std::env::var("API_KEY").context("API_KEY must be set")?,
            private_key_base64: std::env::var("PRIVATE_KEY_BASE64")
                .context("PRIVATE_KEY_BASE64 must be set")?,

            public_ws_host: env_or("PUBLIC_WS_HOST", "testnet.binance.vision"),
            private_ws_host: env_or("PRIVATE_WS_HOST", "testnet.binance.vision"),
        })
    }

    /// Installs the global `tracing` subscriber per `json_log`/`colored_logs`.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.log_level));

        if self.json_log {
            fmt().json().with_env_filter(filter).init();
        } else {
            fmt()
                .with_ansi(self.colored_logs)
                .with_env_filter(filter)
                .init();
        }
    }

    pub fn public_ws_url(&self) -> String {
        format!("wss://{}/ws", self.public_ws_host)
    }

    pub fn private_ws_url(&self) -> String {
        format!("wss://{}/ws-api/v3", self.private_ws_host)
    }

    pub fn user_data_ws_url(&self, listen_key: &str) -> String {
        format!("wss://{}/ws/{}", self.private_ws_host, listen_key)
    }
}
