use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::event::EventKind;

/// A change event: which stream it belongs to, what happened, and the body.
///
/// The wire shape is a JSON object with three top-level fields, `dataSource`,
/// `eventType` and `data`. Those names are part of the compatibility surface
/// and must not change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<V> {
    /// Logical stream (data source) the event belongs to.
    #[serde(rename = "dataSource")]
    pub stream: String,
    /// The mutation being described.
    #[serde(rename = "eventType")]
    pub kind: EventKind,
    /// Event body.
    #[serde(rename = "data")]
    pub payload: V,
}

impl<V> Envelope<V> {
    pub fn new(stream: impl Into<String>, kind: EventKind, payload: V) -> Self {
        Self {
            stream: stream.into(),
            kind,
            payload,
        }
    }

    pub fn create(stream: impl Into<String>, payload: V) -> Self {
        Self::new(stream, EventKind::Create, payload)
    }

    pub fn update(stream: impl Into<String>, payload: V) -> Self {
        Self::new(stream, EventKind::Update, payload)
    }

    pub fn delete(stream: impl Into<String>, payload: V) -> Self {
        Self::new(stream, EventKind::Delete, payload)
    }

    /// Convert the payload while keeping stream and kind.
    pub fn map_payload<U>(self, f: impl FnOnce(V) -> U) -> Envelope<U> {
        Envelope {
            stream: self.stream,
            kind: self.kind,
            payload: f(self.payload),
        }
    }
}

impl<V: AsRef<str>> Envelope<V> {
    /// Returns `true` if both the stream and the payload text are non-blank.
    pub fn is_actionable(&self) -> bool {
        !self.stream.trim().is_empty() && !self.payload.as_ref().trim().is_empty()
    }
}

/// Why a decoded envelope cannot be routed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnvelopeDefect {
    /// `dataSource` is absent or blank.
    MissingStream,
    /// `eventType` is absent.
    MissingKind,
    /// `eventType` is present but names no known kind.
    UnknownKind(String),
    /// `data` is absent, `null`, or blank.
    MissingPayload,
}

impl fmt::Display for EnvelopeDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStream => write!(f, "missing dataSource"),
            Self::MissingKind => write!(f, "missing eventType"),
            Self::UnknownKind(kind) => write!(f, "unknown eventType {kind:?}"),
            Self::MissingPayload => write!(f, "missing data"),
        }
    }
}

/// Envelope as seen by the first decode pass.
///
/// Only the routing fields are interpreted. The payload is kept as an opaque
/// slice of JSON so that decoding it into a concrete value shape can be
/// deferred until a subscribing store is known.
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "dataSource", default)]
    pub stream: Option<String>,
    #[serde(rename = "eventType", default)]
    pub kind: Option<String>,
    #[serde(rename = "data", default)]
    pub payload: Option<Box<RawValue>>,
}

impl RawEnvelope {
    /// The payload text, if any.
    ///
    /// A JSON string payload yields its unescaped content, since producers
    /// commonly ship the body pre-serialized. Any other JSON value yields its
    /// raw text unchanged.
    pub fn payload_text(&self) -> Option<Cow<'_, str>> {
        let raw = self.payload.as_ref()?.get().trim();
        if raw.starts_with('"') {
            serde_json::from_str::<String>(raw).ok().map(Cow::Owned)
        } else {
            Some(Cow::Borrowed(raw))
        }
    }

    /// Validate the routing fields and produce a routable envelope whose
    /// payload is still undecoded text.
    pub fn into_actionable(self) -> Result<Envelope<String>, EnvelopeDefect> {
        let stream = match &self.stream {
            Some(s) if !s.trim().is_empty() => s.clone(),
            _ => return Err(EnvelopeDefect::MissingStream),
        };
        let kind = match self.kind.as_deref() {
            Some(k) => k
                .parse::<EventKind>()
                .map_err(|_| EnvelopeDefect::UnknownKind(k.to_string()))?,
            None => return Err(EnvelopeDefect::MissingKind),
        };
        let payload = match self.payload_text() {
            Some(text) if !text.trim().is_empty() => text.into_owned(),
            _ => return Err(EnvelopeDefect::MissingPayload),
        };
        Ok(Envelope {
            stream,
            kind,
            payload,
        })
    }
}
