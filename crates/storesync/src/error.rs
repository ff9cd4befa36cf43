//! Error types for the synchronization core.

use thiserror::Error;

use storesync_types::TypeError;

/// Failures raised by a store while applying a change.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The payload did not match the store's value shape.
    #[error("payload decode failed: {0}")]
    Decode(String),

    /// The value carried no usable key.
    #[error("value has no key field {field:?}")]
    MissingKey { field: String },

    /// The store refused the mutation.
    #[error("store rejected change: {0}")]
    Rejected(String),

    /// A lock guarding store state was poisoned.
    #[error("lock poisoned: {0}")]
    Lock(String),

    /// A mutation hook panicked.
    #[error("store hook panicked: {0}")]
    Panicked(String),

    /// Backend-specific failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Convenience alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures raised by an outbound sink.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The sink refused the envelope.
    #[error("sink rejected envelope: {0}")]
    Rejected(String),

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The envelope could not be encoded for the transport.
    #[error("encode error: {0}")]
    Encode(#[from] TypeError),

    /// The sink panicked while publishing.
    #[error("sink panicked: {0}")]
    Panicked(String),
}

/// Convenience alias for sink operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// Top-level errors surfaced to callers of the hub and config loaders.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("codec error: {0}")]
    Type(#[from] TypeError),

    /// A sink failed and the hub is configured to stop on the first failure.
    #[error("publisher {sink:?} failed: {source}")]
    Publish {
        sink: String,
        #[source]
        source: PublishError,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type SyncResult<T> = Result<T, SyncError>;

/// Render a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_error_names_sink() {
        let err = SyncError::Publish {
            sink: "kafka".into(),
            source: PublishError::Transport("broker down".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("kafka"));
        assert!(msg.contains("broker down"));
    }

    #[test]
    fn panic_message_handles_both_string_types() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
