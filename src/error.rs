//! Unified error types for EIP-712 operations
//!
//! Every failure surfaces as an [`Eip712Error`] carrying a human-readable
//! reason; [`Eip712Error::kind`] maps it to a coarse [`ErrorKind`] for
//! machine inspection.

use serde::{Deserialize, Serialize};

/// Coarse error categories for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Private key length, hex validity, or curve-membership failure
    InvalidPrivateKey,
    /// Keystore JSON malformed or decryption failed
    InvalidKeystore,
    /// Unknown type, malformed spelling, or cyclic schema
    InvalidSchema,
    /// Message value does not match its declared schema
    ValueMismatch,
    /// Signature bytes, length, or recovery id invalid
    InvalidSignature,
    /// Signing primitive failed for reasons unrelated to inputs
    CryptoFailure,
}

/// Errors that can occur during EIP-712 hashing, signing, and recovery
#[derive(Debug, Clone, thiserror::Error)]
pub enum Eip712Error {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid keystore: {0}")]
    InvalidKeystore(String),

    #[error("unknown type: {0}")]
    UnknownType(String),

    #[error("invalid type: {0}")]
    InvalidType(String),

    #[error("cyclic reference detected in type: {0}")]
    CyclicType(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("unexpected field: {0}")]
    UnexpectedField(String),

    #[error("array length mismatch for {type_name}: expected {expected}, got {actual}")]
    ArrayLengthMismatch {
        type_name: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid value for type {type_name}: {reason}")]
    InvalidValue { type_name: String, reason: String },

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),
}

impl Eip712Error {
    /// Convenience constructor for value/type mismatches
    pub fn invalid_value(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// The coarse category this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPrivateKey(_) => ErrorKind::InvalidPrivateKey,
            Self::InvalidKeystore(_) => ErrorKind::InvalidKeystore,
            Self::UnknownType(_) | Self::InvalidType(_) | Self::CyclicType(_) => {
                ErrorKind::InvalidSchema
            }
            Self::MissingField(_)
            | Self::UnexpectedField(_)
            | Self::ArrayLengthMismatch { .. }
            | Self::InvalidValue { .. } => ErrorKind::ValueMismatch,
            Self::InvalidSignature(_) => ErrorKind::InvalidSignature,
            Self::SigningFailed(_) => ErrorKind::CryptoFailure,
        }
    }
}

/// Result type alias for EIP-712 operations
pub type Result<T> = std::result::Result<T, Eip712Error>;
