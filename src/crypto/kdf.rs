//! Key derivation for the account master secret and per-envelope keys.

use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use sha2::Sha256;

use super::{CryptoError, Result, SecretVec};

/// Raw length of the account key before hex encoding.
const ACCOUNT_KEY_RAW_BYTES: usize = 16;

/// Derive the account master secret from the password and the server's
/// key salt.
///
/// A single PBKDF2-HMAC-SHA1 iteration produces 16 raw bytes; the master
/// secret is the lowercase hex encoding of those bytes, not the bytes
/// themselves. The production web client derives its key this way, so the
/// hex ASCII form is what every envelope key is derived from.
pub fn derive_account_key(password: &str, key_salt: &[u8]) -> SecretVec {
    let mut raw = [0u8; ACCOUNT_KEY_RAW_BYTES];
    pbkdf2_hmac::<Sha1>(password.as_bytes(), key_salt, 1, &mut raw);
    SecretVec::new(hex::encode(raw).into_bytes())
}

/// Derive an envelope key from the account master secret.
///
/// PBKDF2-HMAC-SHA256 with the envelope's own salt and iteration count,
/// producing `ks_bits / 8` bytes.
pub fn derive_envelope_key(
    account_key: &[u8],
    salt: &[u8],
    ks_bits: u32,
    iterations: u32,
) -> Result<SecretVec> {
    if !matches!(ks_bits, 128 | 192 | 256) {
        return Err(CryptoError::UnsupportedKeySize(ks_bits));
    }
    if iterations == 0 {
        return Err(CryptoError::InvalidField {
            field: "iter",
            reason: "iteration count must be at least 1",
        });
    }

    let mut key = SecretVec::new(vec![0u8; (ks_bits / 8) as usize]);
    pbkdf2_hmac::<Sha256>(account_key, salt, iterations, &mut key);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_key_is_hex_ascii() {
        let key = derive_account_key("password", b"somesalt");
        assert_eq!(key.len(), ACCOUNT_KEY_RAW_BYTES * 2);
        assert!(
            key.iter()
                .all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
        );
    }

    #[test]
    fn account_key_is_deterministic() {
        assert_eq!(
            *derive_account_key("password", b"salt"),
            *derive_account_key("password", b"salt")
        );
        assert_ne!(
            *derive_account_key("password", b"salt"),
            *derive_account_key("password", b"pepper")
        );
    }

    #[test]
    fn envelope_key_length_follows_ks() {
        let key = derive_envelope_key(b"master", b"salt", 128, 1000).unwrap();
        assert_eq!(key.len(), 16);
        let key = derive_envelope_key(b"master", b"salt", 256, 1000).unwrap();
        assert_eq!(key.len(), 32);
    }

    #[test]
    fn envelope_key_rejects_bad_params() {
        assert!(matches!(
            derive_envelope_key(b"master", b"salt", 512, 1000),
            Err(CryptoError::UnsupportedKeySize(512))
        ));
        assert!(matches!(
            derive_envelope_key(b"master", b"salt", 128, 0),
            Err(CryptoError::InvalidField { field: "iter", .. })
        ));
    }
}
