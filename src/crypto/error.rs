//! Error types for the content encryption layer.

use thiserror::Error;

/// Errors from envelope and record transforms.
///
/// Integrity failures indicate tampering or a wrong master secret and must
/// never be retried or ignored. Unsupported-parameter errors indicate a
/// client/server format version mismatch.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Envelope names a cipher other than `"aes"`.
    #[error("unsupported cipher: expected \"aes\", got {0:?}")]
    UnsupportedCipher(String),

    /// Envelope names a cipher mode other than `"ccm"`.
    #[error("unsupported cipher mode: expected \"ccm\", got {0:?}")]
    UnsupportedMode(String),

    /// Envelope key size is not 128, 192 or 256 bits.
    #[error("unsupported key size: {0} bits")]
    UnsupportedKeySize(u32),

    /// Envelope tag size is not 64, 96 or 128 bits.
    #[error("unsupported tag size: {0} bits")]
    UnsupportedTagSize(u32),

    /// The derived nonce length fell outside what AES-CCM accepts here.
    #[error("invalid nonce length: {0} bytes")]
    InvalidNonceLength(usize),

    /// AEAD tag verification failed during decryption.
    #[error("integrity check failed: AEAD tag mismatch")]
    IntegrityCheckFailed,

    /// AEAD encryption failed (payload too large for the mode).
    #[error("AES-CCM encryption failed")]
    EncryptFailed,

    /// The ciphertext is shorter than the declared tag.
    #[error("ciphertext too short: {actual} bytes with a {tag} byte tag")]
    CiphertextTooShort {
        /// Total ciphertext length, including the tag.
        actual: usize,
        /// Declared tag length.
        tag: usize,
    },

    /// A required envelope field is absent.
    #[error("missing envelope field: {0}")]
    MissingField(&'static str),

    /// An envelope field has the wrong type or an invalid value.
    #[error("invalid envelope field {field}: {reason}")]
    InvalidField {
        /// Field name as it appears on the wire.
        field: &'static str,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// A story record does not have the expected shape.
    #[error("invalid story record: {0}")]
    InvalidRecord(&'static str),

    /// Base64 decoding failed.
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Decrypted bytes were not valid UTF-8.
    #[error("utf8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Result alias for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
