//! Bi-directional translation between wire JSON and typed records.
//!
//! `decode` validates that a frame carries a recognizable discriminator (`e`
//! or `channel`) and hands back the parsed [`serde_json::Value`] —
//! classification into a concrete `Trade`/`Order`/snapshot record is the
//! Trader's job (SPEC_FULL §4.5), since the set of known discriminators is a
//! trading-policy concern, not a codec one.
//!
//! Private-RPC responses arrive tagged only by an echoed `id` (no `e`, no
//! `channel`) until the private session's `retag` hook adds a `channel`
//! field after the fact. `parse` and `has_discriminator` are split out of
//! `decode` so the generic connector (`exchange::connector`) can parse
//! first, let a hook retag, and only then apply the discriminator gate —
//! running the gate before retag would drop every private-RPC response as
//! malformed.

use serde::Serialize;
use serde_json::Value;

use crate::error::CodecError;

/// Serializes an outbound message to UTF-8 JSON bytes. Field order in the
/// output matches the struct's declared field order, which for every
/// outbound message type in this crate is also its insertion order.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(message).map_err(|e| CodecError::MalformedFrame(e.to_string()))
}

/// Parses a raw text frame to JSON without judging its shape.
pub fn parse(raw: &str) -> Result<Value, CodecError> {
    serde_json::from_str(raw).map_err(|e| CodecError::MalformedFrame(e.to_string()))
}

/// True if `value` carries a discriminator the Trader can classify on: an
/// event-type field `e`, or a `channel` tag.
#[must_use]
pub fn has_discriminator(value: &Value) -> bool {
    let has_event_type = value.get("e").and_then(Value::as_str).is_some();
    let has_channel = value.get("channel").and_then(Value::as_str).is_some();
    has_event_type || has_channel
}

/// Parses a raw text frame and checks it carries a discriminator the Trader
/// can classify on. For private-RPC traffic this must NOT be called directly
/// on the raw wire frame — see the module docs — use `parse` followed by a
/// hook's `retag` and then `has_discriminator` instead.
pub fn decode(raw: &str) -> Result<Value, CodecError> {
    let value = parse(raw)?;

    if !has_discriminator(&value) {
        return Err(CodecError::MalformedFrame(
            "frame carries neither an `e` event-type nor a `channel` discriminator".to_string(),
        ));
    }

    Ok(value)
}
