//! Ed25519 request signing over a canonical URL-encoded parameter form.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::{Signer as _, SigningKey};
use url::form_urlencoded;

use crate::error::SigningError;

/// Loads a base64-wrapped, PEM-encoded, password-less PKCS#8 Ed25519 private
/// key, as handed to the agent via `PRIVATE_KEY_BASE64`.
pub fn load_private_key(base64_pem: &str) -> Result<SigningKey, SigningError> {
    let pem_bytes = BASE64.decode(base64_pem.trim())?;
    let pem = std::str::from_utf8(&pem_bytes)
        .map_err(|e| SigningError::InvalidKey(format!("private key PEM is not valid UTF-8: {e}")))?;
    SigningKey::from_pkcs8_pem(pem).map_err(|e| SigningError::InvalidKey(e.to_string()))
}

/// Signs `params` (in insertion order) as Ed25519 over their URL-encoded
/// `key=value&...` form, base64-encoding the resulting signature.
#[must_use]
pub fn sign(key: &SigningKey, params: &[(&str, &str)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (k, v) in params {
        serializer.append_pair(k, v);
    }
    let encoded = serializer.finish();
    let signature = key.sign(encoded.as_bytes());
    BASE64.encode(signature.to_bytes())
}

/// Builds the `<method>_<timestamp_ms>` request fingerprint shared by every
/// outbound RPC envelope: lowercased, with `.` replaced by `_`.
#[must_use]
pub fn request_id(method: &str, now_ms: i64) -> String {
    format!("{}_{now_ms}", method.to_lowercase().replace('.', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::pkcs8::EncodePrivateKey;
    use ed25519_dalek::{Verifier, VerifyingKey};

    fn generate_base64_pem() -> (SigningKey, String) {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let pem = key
            .to_pkcs8_pem(Default::default())
            .expect("encode pkcs8 pem")
            .to_string();
        (key, BASE64.encode(pem.as_bytes()))
    }

    #[test]
    fn loads_a_generated_key_round_trip() {
        let (original, base64_pem) = generate_base64_pem();
        let loaded = load_private_key(&base64_pem).unwrap();
        assert_eq!(loaded.to_bytes(), original.to_bytes());
    }

    #[test]
    fn rejects_invalid_base64() {
        let err = load_private_key("not-valid-base64!!").unwrap_err();
        assert!(matches!(err, SigningError::InvalidBase64(_)));
    }

    #[test]
    fn signature_verifies_against_stored_public_key() {
        let (key, base64_pem) = generate_base64_pem();
        let loaded = load_private_key(&base64_pem).unwrap();
        let params = [("apiKey", "test_key"), ("timestamp", "1713804421000")];
        let signature_b64 = sign(&loaded, &params);

        let encoded: String = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        let signature_bytes = BASE64.decode(signature_b64).unwrap();
        let signature = ed25519_dalek::Signature::try_from(signature_bytes.as_slice()).unwrap();
        let verifying_key: VerifyingKey = key.verifying_key();
        assert!(verifying_key.verify(encoded.as_bytes(), &signature).is_ok());
    }

    #[test]
    fn request_id_lowercases_and_replaces_dots() {
        assert_eq!(
            request_id("session.logon", 1_713_804_421_000),
            "session_logon_1713804421000"
        );
        assert_eq!(
            request_id("exchangeInfo", 1_713_804_421_000),
            "exchangeinfo_1713804421000"
        );
    }

    #[test]
    fn request_id_matches_invariant_pattern() {
        let id = request_id("userDataStream.ping", 1_713_804_421_000);
        let re = regex_lite(&id);
        assert!(re);
    }

    fn regex_lite(id: &str) -> bool {
        let Some((prefix, ts)) = id.rsplit_once('_') else {
            return false;
        };
        prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
            && ts.len() == 13
            && ts.chars().all(|c| c.is_ascii_digit())
    }
}
