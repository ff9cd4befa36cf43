//! Wire types for storesync.
//!
//! A change event travels as an [`Envelope`]: the stream it belongs to, an
//! [`EventKind`], and a payload. Consumers decode envelopes in two passes:
//! [`JsonCodec::decode_envelope`] reads the routing fields into a
//! [`RawEnvelope`] and leaves the payload opaque, and the payload is decoded
//! into a concrete value only once a subscribing store has been found.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod event;

pub use codec::JsonCodec;
pub use envelope::{Envelope, EnvelopeDefect, RawEnvelope};
pub use error::{Result, TypeError};
pub use event::EventKind;
