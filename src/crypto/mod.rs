//! Content encryption for server-held story records.
//!
//! Story fields live server-side as self-describing envelopes in the sjcl
//! wire format: AES-CCM ciphertext plus the PBKDF2 parameters needed to
//! derive the field key from the account master secret. Everything here is
//! a stateless value transform; no I/O happens in this module.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};

mod error;
pub mod envelope;
pub mod kdf;
pub mod record;

pub use error::{CryptoError, Result};

/// A heap-allocated byte buffer that is **zeroized on drop**.
///
/// Prefer this type for key material that should not remain in memory
/// after it goes out of scope.
pub type SecretVec = zeroize::Zeroizing<Vec<u8>>;

/// Decode a base64 string to bytes.
pub fn decode_b64(input: &str) -> Result<Vec<u8>> {
    Ok(BASE64.decode(input)?)
}

/// Encode bytes to a standard (RFC 4648 §4) base64 string.
pub fn encode_b64(input: &[u8]) -> String {
    BASE64.encode(input)
}
