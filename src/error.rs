// Error types for the wire codec and proof verification

use crate::core::Hash256;
use std::io;
use thiserror::Error;

/// Result type used across the crate
pub type Result<T> = std::result::Result<T, WireError>;

/// Everything that can go wrong while decoding, encoding or verifying
/// data received from a peer.
///
/// No variant is recovered from internally: the caller decides whether to
/// drop the message, disconnect, or reconnect.
#[derive(Debug, Error)]
pub enum WireError {
    /// The stream ended before a frame's magic could be read
    #[error("connection reset: stream closed before a frame was read")]
    ConnectionClosed,

    /// Frame carries the magic of a different network
    #[error("network magic mismatch: expected {expected}, got {got}")]
    ProtocolMismatch { expected: String, got: String },

    /// Frame or base58 checksum does not match the data it covers
    #[error("checksum mismatch in {context}: expected {expected}, got {got}")]
    Checksum {
        context: &'static str,
        expected: String,
        got: String,
    },

    /// A fixed-width field was short, or a bit field is not byte aligned
    #[error("length error in {field}: expected {expected} bytes, got {actual}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Partial merkle tree flags/hashes were not consumed exactly
    #[error("malformed merkle proof: {0}")]
    ProofMalformed(String),

    /// Reconstructed merkle root differs from the one in the header
    #[error("invalid merkle proof: computed root {computed}, header commits to {advertised}")]
    ProofInvalid {
        computed: Hash256,
        advertised: Hash256,
    },

    /// Data present where the protocol forbids it
    #[error("unexpected data in {context}: {detail}")]
    UnexpectedData { context: &'static str, detail: String },

    /// Value cannot be represented in the requested encoding
    #[error("cannot encode {field}: {detail}")]
    Encode { field: &'static str, detail: String },

    /// Field decoded but holds a value outside its domain
    #[error("invalid {field}: {detail}")]
    InvalidData { field: &'static str, detail: String },

    /// Advertised payload exceeds the protocol maximum
    #[error("payload of {length} bytes exceeds maximum of {max}")]
    PayloadTooLarge { length: usize, max: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl WireError {
    pub(crate) fn invalid(field: &'static str, detail: impl Into<String>) -> Self {
        WireError::InvalidData {
            field,
            detail: detail.into(),
        }
    }

    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        WireError::ProofMalformed(detail.into())
    }
}
