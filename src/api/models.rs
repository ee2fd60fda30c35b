//! Request and response bodies for the backend API.

use serde::{Deserialize, Serialize};

/// Generation model identifiers.
///
/// Identifiers are wire names, not marketing names; the backend only
/// accepts the exact strings [`Model::as_str`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    /// The 6B-parameter general-purpose model.
    Holo6B,
}

impl Model {
    /// The wire name the backend expects.
    pub fn as_str(self) -> &'static str {
        match self {
            Model::Holo6B => "model-2-7",
        }
    }
}

/// Body for the credential registration endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCredentialsRequest {
    /// Account email address.
    pub email_address: String,
    /// Verifier salt, as a decimal integer string.
    pub salt: String,
    /// Password verifier, as a decimal integer string.
    pub verifier: String,
}

/// Body requesting a login challenge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    /// Account email address.
    pub email_address: String,
}

/// The challenge material inside a challenge response.
#[derive(Debug, Clone, Deserialize)]
pub struct SrpChallenge {
    /// Verifier salt, as a decimal integer string.
    pub salt: String,
    /// Server public value `B`, as a decimal integer string.
    pub challenge: String,
}

/// Response to a challenge request.
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeResponse {
    /// The challenge material.
    pub srp: SrpChallenge,
}

/// Body proving knowledge of the password against a challenge.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyChallengeRequest {
    /// Account email address.
    #[serde(rename = "emailAddress")]
    pub email_address: String,
    /// Client public value `A`, as a decimal integer string.
    #[serde(rename = "A")]
    pub a: String,
    /// Client evidence `M1`, as a decimal integer string.
    #[serde(rename = "M1")]
    pub m1: String,
}

/// Response to a successful challenge verification.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyChallengeResponse {
    /// Salt for deriving the account master secret.
    #[serde(rename = "encryptionKeySalt")]
    pub encryption_key_salt: String,
}

/// Body for the completion endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// Header tokens sent ahead of the story context.
    #[serde(rename = "prefixTokens")]
    pub prefix_tokens: Vec<u32>,
    /// Tokenized story context.
    #[serde(rename = "promptTokens")]
    pub prompt_tokens: Vec<u32>,
    /// Wire name of the model to generate with.
    ///
    /// Snake case on the wire, unlike the token fields; the backend is
    /// inconsistent here and the names must match it exactly.
    pub model_name: String,
    /// Optional fine-tuned module id; serialized as `null` when absent.
    pub module_id: Option<String>,
}

/// Response from the completion endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    /// Generated continuations, best first.
    pub completions: Vec<String>,
}
