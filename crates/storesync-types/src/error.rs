use thiserror::Error;

/// Errors produced while encoding or decoding wire types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("unknown event kind: {0}")]
    UnknownKind(String),
}

/// Convenience alias used throughout the types crate.
pub type Result<T> = std::result::Result<T, TypeError>;
