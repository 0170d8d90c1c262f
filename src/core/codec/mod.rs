//! JSON encode/decode of exchange messages and Ed25519 request signing.

pub mod message;
pub mod signer;

pub use message::{decode, encode, has_discriminator, parse};
pub use signer::{load_private_key, request_id, sign};
