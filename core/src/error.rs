use thiserror::Error;

/// Structural errors raised while constructing or decoding core data-model
/// types. These are independent of any particular chain state — they fire
/// on malformed bytes or out-of-range fields, before a value ever reaches a
/// validator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("expected {expected} bytes, got {actual}")]
    InvalidSize { expected: usize, actual: usize },

    #[error("field '{field}' out of range: {reason}")]
    InvalidFieldRange { field: &'static str, reason: String },

    #[error("unsupported version {0}")]
    UnsupportedVersion(u8),

    #[error("signature has invalid length {0}, expected 0 or 64")]
    InvalidSignatureLength(usize),

    #[error("malformed public key")]
    InvalidPublicKey,

    #[error("malformed signature")]
    InvalidSignature,
}
