//! Story record transforms.
//!
//! A story record arrives as a JSON object whose textual fields (`title`,
//! `preview`, `content`, `description`) each hold an envelope wrapped in
//! JSON string encoding — the storage layer encodes the envelope object to
//! a JSON string and then encodes that string once more, so a field reads
//! as a string containing a quoted string containing an object. Decryption
//! tolerates one or two layers; encryption always writes the canonical two.
//!
//! Records are mutated in place so that every field this client does not
//! understand passes through untouched.

use serde_json::{Map, Value};

use super::{CryptoError, Result, envelope};

/// The record fields that carry encrypted envelopes.
pub const ENCRYPTED_FIELDS: [&str; 4] = ["title", "preview", "content", "description"];

/// Decrypt every encrypted field of a story record in place.
///
/// For each field present: empty strings canonicalize to `null`, string
/// values are unwrapped (one or two JSON layers) to an envelope object and
/// decrypted, and fields already holding an object are left alone, which
/// makes the transform idempotent. The `content` cleartext is parsed as
/// structured data; the other fields stay strings. `genSettings.logitBias`
/// is JSON-decoded as well — it carries no encryption layer.
pub fn decrypt_story(story: &mut Value, account_key: &[u8]) -> Result<()> {
    if let Some(bias) = story.pointer_mut("/genSettings/logitBias") {
        if let Value::String(raw) = bias {
            *bias = serde_json::from_str(raw)?;
        }
    }

    let record = as_record(story)?;
    for field in ENCRYPTED_FIELDS {
        let Some(value) = record.get_mut(field) else {
            continue;
        };
        match value {
            Value::Null => {}
            Value::String(raw) if raw.is_empty() => *value = Value::Null,
            Value::String(raw) => {
                let mut unwrapped: Value = serde_json::from_str(raw)?;
                if let Value::String(inner) = &unwrapped {
                    unwrapped = serde_json::from_str(inner)?;
                }
                let Value::Object(mut env) = unwrapped else {
                    return Err(CryptoError::InvalidRecord(
                        "encrypted field does not decode to an envelope object",
                    ));
                };
                envelope::decrypt_in_place(&mut env, account_key, field == "content")?;
                *value = Value::Object(env);
            }
            // Already an envelope object: this record was decrypted before.
            _ => {}
        }
    }
    Ok(())
}

/// Encrypt every decrypted field of a story record in place.
///
/// The exact inverse of [`decrypt_story`]: `null` fields canonicalize back
/// to empty strings, envelope objects are re-encrypted and wrapped in the
/// canonical two JSON string layers, fields already holding strings are
/// left alone, and `genSettings.logitBias` is re-encoded compactly.
pub fn encrypt_story(story: &mut Value, account_key: &[u8]) -> Result<()> {
    if let Some(bias) = story.pointer_mut("/genSettings/logitBias") {
        if !bias.is_string() {
            *bias = Value::String(serde_json::to_string(bias)?);
        }
    }

    let record = as_record(story)?;
    for field in ENCRYPTED_FIELDS {
        let Some(value) = record.get_mut(field) else {
            continue;
        };
        match value {
            Value::Null => *value = Value::String(String::new()),
            // Already in wire form (or canonically empty).
            Value::String(_) => {}
            Value::Object(env) => {
                envelope::encrypt_in_place(env, account_key)?;
                let once = serde_json::to_string(value)?;
                *value = Value::String(serde_json::to_string(&once)?);
            }
            _ => {
                return Err(CryptoError::InvalidRecord(
                    "field is neither a string nor an envelope object",
                ));
            }
        }
    }
    Ok(())
}

/// The seed text for a story's root fragment, from a decrypted record.
pub fn story_prompt(story: &Value) -> Result<&str> {
    story
        .pointer("/content/ct/content")
        .and_then(Value::as_str)
        .ok_or(CryptoError::InvalidRecord(
            "no decrypted content to seed a story from",
        ))
}

fn as_record(story: &mut Value) -> Result<&mut Map<String, Value>> {
    story
        .as_object_mut()
        .ok_or(CryptoError::InvalidRecord("story is not a JSON object"))
}
