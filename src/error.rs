//! Layered error types, one per component boundary.
//!
//! [`CodecError`] and [`SigningError`] cover decode/sign failures close to the
//! wire; [`Error`] is the top-level alias used anywhere else fallible, and
//! wraps both via `#[from]`. Fatal business-rule violations (§4.6 of the
//! design) are deliberately not represented here — they are a one-way trip
//! through `Trader::exit_with_error`, not a `Result::Err`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("unknown discriminator in frame")]
    UnknownDiscriminator,
}

#[derive(Error, Debug)]
pub enum SigningError {
    #[error("invalid base64 for private key: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("invalid PKCS#8 PEM private key: {0}")]
    InvalidKey(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("signing error: {0}")]
    Signing(#[from] SigningError),
}

pub type Result<T> = std::result::Result<T, Error>;
