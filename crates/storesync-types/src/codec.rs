use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::envelope::{Envelope, RawEnvelope};
use crate::error::{Result, TypeError};

/// JSON codec for envelopes and payload values.
///
/// Empty input decodes to `None` rather than an error, as does a JSON `null`.
/// Malformed input is an error; callers on the fail-open path turn it into a
/// drop.
pub struct JsonCodec;

impl JsonCodec {
    /// Decode `text` into `T`.
    pub fn decode<T: DeserializeOwned>(text: &str) -> Result<Option<T>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str::<Option<T>>(text).map_err(|e| TypeError::Decode(e.to_string()))
    }

    /// Decode raw bytes into `T`.
    pub fn decode_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<Option<T>> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice::<Option<T>>(bytes).map_err(|e| TypeError::Decode(e.to_string()))
    }

    /// First-pass envelope decode: routing fields only, payload left opaque.
    pub fn decode_envelope(text: &str) -> Result<Option<RawEnvelope>> {
        Self::decode::<RawEnvelope>(text)
    }

    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(|e| TypeError::Encode(e.to_string()))
    }

    /// Encode an envelope to its wire form.
    pub fn encode_envelope<V: Serialize>(envelope: &Envelope<V>) -> Result<String> {
        Self::encode(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    struct User {
        #[serde(rename = "userId")]
        user_id: String,
        name: String,
    }

    #[test]
    fn blank_and_null_decode_to_none() {
        assert_eq!(JsonCodec::decode::<User>("").unwrap(), None);
        assert_eq!(JsonCodec::decode::<User>("  \n").unwrap(), None);
        assert_eq!(JsonCodec::decode::<User>("null").unwrap(), None);
        assert_eq!(JsonCodec::decode_bytes::<User>(b"").unwrap(), None);
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(matches!(
            JsonCodec::decode::<User>("invalid json"),
            Err(TypeError::Decode(_))
        ));
        assert!(JsonCodec::decode_bytes::<User>(b"{\"userId\":").is_err());
        assert!(JsonCodec::decode_envelope("[1, 2").is_err());
    }

    #[test]
    fn decode_typed_value() {
        let user = JsonCodec::decode::<User>(r#"{"userId":"u1","name":"Ann"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.name, "Ann");
    }

    #[test]
    fn envelope_encodes_then_decodes_opaquely() {
        let env = Envelope::new("user", EventKind::Create, r#"{"userId":"u1"}"#.to_string());
        let wire = JsonCodec::encode_envelope(&env).unwrap();
        let raw = JsonCodec::decode_envelope(&wire).unwrap().unwrap();
        assert_eq!(raw.into_actionable().unwrap(), env);
    }
}
