//! Self-describing AES-CCM envelopes (sjcl wire format).
//!
//! An envelope is a JSON object carrying its own key-derivation and cipher
//! parameters next to the ciphertext:
//!
//! ```json
//! {"cipher":"aes","mode":"ccm","ks":128,"iter":1000,
//!  "salt":"…","iv":"…","ct":"…","ts":64}
//! ```
//!
//! Decryption needs nothing beyond the account master secret. The nonce is
//! not stored directly: sjcl truncates the `iv` field to a length that
//! depends on the payload length, and that construction is reproduced here
//! bit-exactly for interoperability (see [`derive_nonce`]).
//!
//! Envelopes are transformed in place, as [`serde_json::Map`]s, so that
//! keys this client does not know about survive a decrypt/encrypt round
//! trip. A client-side `decrypted` flag marks the cleartext state; both
//! transforms are no-ops when the envelope is already in the target state.

use aes::cipher::{BlockCipher, BlockEncrypt};
use aes::{Aes128, Aes192, Aes256};
use ccm::aead::generic_array::{ArrayLength, GenericArray};
use ccm::aead::{Aead, KeyInit};
use ccm::consts::{U8, U11, U12, U13, U16};
use ccm::{Ccm, NonceSize, TagSize};
use serde_json::{Map, Value};

use super::{CryptoError, Result, decode_b64, encode_b64, kdf};

/// Longest nonce the construction produces, in bytes.
const NONCE_MAX: usize = 13;

/// Compute the CCM nonce for a payload of `payload_len` bytes.
///
/// sjcl picks a nonce of `13 - clamp(0, bitlen(payload_len)/8 - 2, 2)`
/// bytes — 13 bytes for payloads under 8 MiB, shrinking to 11 as the
/// length header needs more room — and truncates the stored `iv` to that
/// length. The computed size is further clamped to the available IV bytes.
///
/// Pure: equal `(iv, payload_len)` inputs always yield equal nonces.
pub fn derive_nonce(iv: &[u8], payload_len: usize) -> Vec<u8> {
    let bit_length = (usize::BITS - payload_len.leading_zeros()) as usize;
    let shrink = (bit_length / 8).saturating_sub(2).min(2);
    let size = (NONCE_MAX - shrink).min(iv.len());
    iv[..size].to_vec()
}

/// Whether the envelope currently holds cleartext.
pub fn is_decrypted(envelope: &Map<String, Value>) -> bool {
    envelope
        .get("decrypted")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Decrypt an envelope in place using the account master secret.
///
/// Splits the trailing `ts/8` tag bytes off the ciphertext, derives the
/// field key and nonce, and verifies-and-decrypts. On success `ct` holds
/// the cleartext — parsed JSON if `parse_cleartext` is set, the raw string
/// otherwise — and the `decrypted` flag is set.
///
/// No-op if the envelope is already decrypted. Tag verification failure is
/// [`CryptoError::IntegrityCheckFailed`] and must not be retried.
pub fn decrypt_in_place(
    envelope: &mut Map<String, Value>,
    account_key: &[u8],
    parse_cleartext: bool,
) -> Result<()> {
    if is_decrypted(envelope) {
        return Ok(());
    }
    check_scheme(envelope)?;

    let ks = u32_field(envelope, "ks")?;
    let iterations = u32_field(envelope, "iter")?;
    let tag_bits = u32_field(envelope, "ts")?;
    let salt = b64_field(envelope, "salt")?;
    let iv = b64_field(envelope, "iv")?;
    let data = b64_field(envelope, "ct")?;

    let tag_len = (tag_bits / 8) as usize;
    if data.len() < tag_len {
        return Err(CryptoError::CiphertextTooShort {
            actual: data.len(),
            tag: tag_len,
        });
    }
    let ciphertext_len = data.len() - tag_len;

    let key = kdf::derive_envelope_key(account_key, &salt, ks, iterations)?;
    let nonce = derive_nonce(&iv, ciphertext_len);
    let cleartext = ccm_open(&key, &nonce, tag_bits, &data)?;
    let text = String::from_utf8(cleartext)?;

    let value = if parse_cleartext {
        serde_json::from_str(&text)?
    } else {
        Value::String(text)
    };
    envelope.insert("ct".to_owned(), value);
    envelope.insert("decrypted".to_owned(), Value::Bool(true));
    Ok(())
}

/// Encrypt a decrypted envelope in place, regenerating ciphertext and tag.
///
/// The inverse of [`decrypt_in_place`]: structured cleartext is
/// re-serialized with compact JSON encoding, the nonce is derived from the
/// new plaintext length, and the `decrypted` flag is removed. No-op if the
/// envelope is not currently decrypted.
pub fn encrypt_in_place(envelope: &mut Map<String, Value>, account_key: &[u8]) -> Result<()> {
    if !is_decrypted(envelope) {
        return Ok(());
    }
    check_scheme(envelope)?;

    let ks = u32_field(envelope, "ks")?;
    let iterations = u32_field(envelope, "iter")?;
    let tag_bits = u32_field(envelope, "ts")?;
    let salt = b64_field(envelope, "salt")?;
    let iv = b64_field(envelope, "iv")?;

    let cleartext = match envelope.get("ct") {
        Some(Value::String(text)) => text.clone(),
        Some(structured) => serde_json::to_string(structured)?,
        None => return Err(CryptoError::MissingField("ct")),
    };
    let plaintext = cleartext.into_bytes();

    let key = kdf::derive_envelope_key(account_key, &salt, ks, iterations)?;
    let nonce = derive_nonce(&iv, plaintext.len());
    let sealed = ccm_seal(&key, &nonce, tag_bits, &plaintext)?;

    envelope.insert("ct".to_owned(), Value::String(encode_b64(&sealed)));
    envelope.remove("decrypted");
    Ok(())
}

/// Reject anything other than AES-CCM.
fn check_scheme(envelope: &Map<String, Value>) -> Result<()> {
    let cipher = str_field(envelope, "cipher")?;
    if cipher != "aes" {
        return Err(CryptoError::UnsupportedCipher(cipher.to_owned()));
    }
    let mode = str_field(envelope, "mode")?;
    if mode != "ccm" {
        return Err(CryptoError::UnsupportedMode(mode.to_owned()));
    }
    Ok(())
}

fn str_field<'a>(envelope: &'a Map<String, Value>, field: &'static str) -> Result<&'a str> {
    envelope
        .get(field)
        .ok_or(CryptoError::MissingField(field))?
        .as_str()
        .ok_or(CryptoError::InvalidField {
            field,
            reason: "expected a string",
        })
}

fn u32_field(envelope: &Map<String, Value>, field: &'static str) -> Result<u32> {
    envelope
        .get(field)
        .ok_or(CryptoError::MissingField(field))?
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or(CryptoError::InvalidField {
            field,
            reason: "expected an unsigned integer",
        })
}

fn b64_field(envelope: &Map<String, Value>, field: &'static str) -> Result<Vec<u8>> {
    decode_b64(str_field(envelope, field)?)
}

/// Dispatch an AES-CCM call over the envelope's tag size and the derived
/// nonce length. sjcl permits 64/96/128-bit tags and this construction
/// yields 11–13 byte nonces; everything else is a format error.
macro_rules! ccm_call {
    ($func:ident::<$cipher:ty>($key:expr, $nonce:expr, $tag_bits:expr, $data:expr)) => {
        match ($tag_bits, $nonce.len()) {
            (64, 11) => $func::<$cipher, U8, U11>($key, $nonce, $data),
            (64, 12) => $func::<$cipher, U8, U12>($key, $nonce, $data),
            (64, 13) => $func::<$cipher, U8, U13>($key, $nonce, $data),
            (96, 11) => $func::<$cipher, U12, U11>($key, $nonce, $data),
            (96, 12) => $func::<$cipher, U12, U12>($key, $nonce, $data),
            (96, 13) => $func::<$cipher, U12, U13>($key, $nonce, $data),
            (128, 11) => $func::<$cipher, U16, U11>($key, $nonce, $data),
            (128, 12) => $func::<$cipher, U16, U12>($key, $nonce, $data),
            (128, 13) => $func::<$cipher, U16, U13>($key, $nonce, $data),
            (bits, len) if matches!(bits, 64 | 96 | 128) => {
                Err(CryptoError::InvalidNonceLength(len))
            }
            (bits, _) => Err(CryptoError::UnsupportedTagSize(bits)),
        }
    };
}

fn ccm_seal(key: &[u8], nonce: &[u8], tag_bits: u32, plaintext: &[u8]) -> Result<Vec<u8>> {
    match key.len() {
        16 => ccm_call!(seal_with::<Aes128>(key, nonce, tag_bits, plaintext)),
        24 => ccm_call!(seal_with::<Aes192>(key, nonce, tag_bits, plaintext)),
        32 => ccm_call!(seal_with::<Aes256>(key, nonce, tag_bits, plaintext)),
        len => Err(CryptoError::UnsupportedKeySize((len * 8) as u32)),
    }
}

fn ccm_open(key: &[u8], nonce: &[u8], tag_bits: u32, data: &[u8]) -> Result<Vec<u8>> {
    match key.len() {
        16 => ccm_call!(open_with::<Aes128>(key, nonce, tag_bits, data)),
        24 => ccm_call!(open_with::<Aes192>(key, nonce, tag_bits, data)),
        32 => ccm_call!(open_with::<Aes256>(key, nonce, tag_bits, data)),
        len => Err(CryptoError::UnsupportedKeySize((len * 8) as u32)),
    }
}

fn seal_with<C, M, N>(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>
where
    C: BlockCipher<BlockSize = U16> + BlockEncrypt + KeyInit,
    M: TagSize + ArrayLength<u8>,
    N: NonceSize + ArrayLength<u8>,
{
    let cipher = Ccm::<C, M, N>::new_from_slice(key)
        .map_err(|_| CryptoError::UnsupportedKeySize((key.len() * 8) as u32))?;
    cipher
        .encrypt(GenericArray::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::EncryptFailed)
}

fn open_with<C, M, N>(key: &[u8], nonce: &[u8], data: &[u8]) -> Result<Vec<u8>>
where
    C: BlockCipher<BlockSize = U16> + BlockEncrypt + KeyInit,
    M: TagSize + ArrayLength<u8>,
    N: NonceSize + ArrayLength<u8>,
{
    let cipher = Ccm::<C, M, N>::new_from_slice(key)
        .map_err(|_| CryptoError::UnsupportedKeySize((key.len() * 8) as u32))?;
    cipher
        .decrypt(GenericArray::from_slice(nonce), data)
        .map_err(|_| CryptoError::IntegrityCheckFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ACCOUNT_KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn sample_envelope(ct: Value) -> Map<String, Value> {
        let mut envelope = Map::new();
        envelope.insert("cipher".to_owned(), "aes".into());
        envelope.insert("mode".to_owned(), "ccm".into());
        envelope.insert("ks".to_owned(), 128.into());
        envelope.insert("iter".to_owned(), 1000.into());
        envelope.insert("ts".to_owned(), 64.into());
        envelope.insert("salt".to_owned(), encode_b64(b"salty!!!").into());
        envelope.insert("iv".to_owned(), encode_b64(&[7u8; 16]).into());
        envelope.insert("ct".to_owned(), ct);
        envelope.insert("decrypted".to_owned(), true.into());
        envelope
    }

    #[test]
    fn nonce_length_follows_payload_length() {
        let iv = [1u8; 16];
        assert_eq!(derive_nonce(&iv, 0).len(), 13);
        assert_eq!(derive_nonce(&iv, 100).len(), 13);
        assert_eq!(derive_nonce(&iv, 0xFFFF).len(), 13);
        assert_eq!(derive_nonce(&iv, 1 << 23).len(), 12);
        assert_eq!(derive_nonce(&iv, 1 << 31).len(), 11);
    }

    #[test]
    fn nonce_never_exceeds_iv() {
        let iv = [1u8; 12];
        assert_eq!(derive_nonce(&iv, 100).len(), 12);
        assert_eq!(derive_nonce(&iv, 100), &iv[..12]);
    }

    #[test]
    fn nonce_is_prefix_of_iv() {
        let iv: Vec<u8> = (0..16).collect();
        assert_eq!(derive_nonce(&iv, 42), &iv[..13]);
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let mut envelope = sample_envelope("The quick brown fox".into());
        let original = envelope.clone();

        encrypt_in_place(&mut envelope, ACCOUNT_KEY).unwrap();
        assert!(!is_decrypted(&envelope));
        assert_ne!(envelope["ct"], original["ct"]);

        decrypt_in_place(&mut envelope, ACCOUNT_KEY, false).unwrap();
        assert_eq!(envelope, original);
    }

    #[test]
    fn structured_cleartext_roundtrip() {
        let ct = json!({"content": "Once upon a time", "depressedWords": []});
        let mut envelope = sample_envelope(ct.clone());

        encrypt_in_place(&mut envelope, ACCOUNT_KEY).unwrap();
        decrypt_in_place(&mut envelope, ACCOUNT_KEY, true).unwrap();

        assert_eq!(envelope["ct"], ct);
    }

    #[test]
    fn transforms_are_idempotent() {
        let mut envelope = sample_envelope("text".into());
        let decrypted = envelope.clone();

        // Already decrypted: decrypting again changes nothing.
        decrypt_in_place(&mut envelope, ACCOUNT_KEY, false).unwrap();
        assert_eq!(envelope, decrypted);

        encrypt_in_place(&mut envelope, ACCOUNT_KEY).unwrap();
        let encrypted = envelope.clone();
        encrypt_in_place(&mut envelope, ACCOUNT_KEY).unwrap();
        assert_eq!(envelope, encrypted);
    }

    #[test]
    fn tampered_ciphertext_fails_integrity_check() {
        let mut envelope = sample_envelope("do not touch".into());
        encrypt_in_place(&mut envelope, ACCOUNT_KEY).unwrap();

        let mut data = decode_b64(envelope["ct"].as_str().unwrap()).unwrap();
        data[0] ^= 0x01;
        envelope.insert("ct".to_owned(), encode_b64(&data).into());

        assert!(matches!(
            decrypt_in_place(&mut envelope, ACCOUNT_KEY, false),
            Err(CryptoError::IntegrityCheckFailed)
        ));
    }

    #[test]
    fn wrong_key_fails_integrity_check() {
        let mut envelope = sample_envelope("secret".into());
        encrypt_in_place(&mut envelope, ACCOUNT_KEY).unwrap();

        assert!(matches!(
            decrypt_in_place(&mut envelope, b"ffffffffffffffffffffffffffffffff", false),
            Err(CryptoError::IntegrityCheckFailed)
        ));
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let mut envelope = sample_envelope("text".into());
        envelope.insert("cipher".to_owned(), "des".into());
        assert!(matches!(
            encrypt_in_place(&mut envelope, ACCOUNT_KEY),
            Err(CryptoError::UnsupportedCipher(_))
        ));

        let mut envelope = sample_envelope("text".into());
        envelope.insert("mode".to_owned(), "gcm".into());
        assert!(matches!(
            encrypt_in_place(&mut envelope, ACCOUNT_KEY),
            Err(CryptoError::UnsupportedMode(_))
        ));
    }

    #[test]
    fn unknown_envelope_keys_survive_roundtrip() {
        let mut envelope = sample_envelope("text".into());
        envelope.insert("v".to_owned(), 1.into());
        envelope.insert("adata".to_owned(), "".into());

        encrypt_in_place(&mut envelope, ACCOUNT_KEY).unwrap();
        decrypt_in_place(&mut envelope, ACCOUNT_KEY, false).unwrap();

        assert_eq!(envelope["v"], 1);
        assert_eq!(envelope["adata"], "");
    }

    #[test]
    fn larger_key_sizes_roundtrip() {
        for ks in [192, 256] {
            let mut envelope = sample_envelope("text".into());
            envelope.insert("ks".to_owned(), ks.into());
            let original = envelope.clone();

            encrypt_in_place(&mut envelope, ACCOUNT_KEY).unwrap();
            decrypt_in_place(&mut envelope, ACCOUNT_KEY, false).unwrap();
            assert_eq!(envelope, original);
        }
    }
}
