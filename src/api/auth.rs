//! The registration and login flows, driving the SRP math over the API.

use num_bigint::BigUint;

use crate::auth::{create_verifier_and_salt, process_challenge};
use crate::crypto::{SecretVec, kdf};

use super::models::{ChallengeRequest, RegisterCredentialsRequest, VerifyChallengeRequest};
use super::{ApiClient, ApiError, Transport};

/// Registration and login on top of an [`ApiClient`].
#[derive(Debug)]
pub struct AuthClient<'a, T> {
    api: &'a ApiClient<T>,
}

impl<'a, T: Transport> AuthClient<'a, T> {
    /// Borrow an API client for authentication calls.
    pub fn new(api: &'a ApiClient<T>) -> Self {
        AuthClient { api }
    }

    /// Register SRP credentials for a new account.
    ///
    /// Generates a fresh salt/verifier pair from the password and uploads
    /// it; the password itself never leaves the process.
    pub async fn register(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let (salt, verifier) = create_verifier_and_salt(password)?;
        log::debug!("registering credentials for {email}");

        self.api
            .register_credentials(&RegisterCredentialsRequest {
                email_address: email.to_owned(),
                salt: salt.to_string(),
                verifier: verifier.to_string(),
            })
            .await?;
        Ok(())
    }

    /// Log in and derive the account master secret.
    ///
    /// Runs the full exchange: fetch the challenge, answer it with the
    /// client public value and evidence, then derive the master secret
    /// from the password and the encryption key salt the server releases
    /// on success. The SRP session is dropped as soon as the challenge is
    /// answered.
    pub async fn login(&self, email: &str, password: &str) -> Result<SecretVec, ApiError> {
        let challenge = self
            .api
            .get_srp_challenge(&ChallengeRequest {
                email_address: email.to_owned(),
            })
            .await?;

        let salt = parse_decimal(&challenge.srp.salt, "srp.salt")?;
        let b_pub = parse_decimal(&challenge.srp.challenge, "srp.challenge")?;
        let session = process_challenge(password, &salt, &b_pub)?;
        log::debug!("answering SRP challenge for {email}");

        let verified = self
            .api
            .verify_srp_challenge(&VerifyChallengeRequest {
                email_address: email.to_owned(),
                a: session.a_pub.to_string(),
                m1: session.evidence.to_string(),
            })
            .await?;

        Ok(kdf::derive_account_key(
            password,
            verified.encryption_key_salt.as_bytes(),
        ))
    }
}

/// Parse a decimal integer string off the wire.
fn parse_decimal(value: &str, field: &str) -> Result<BigUint, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::MalformedResponse(format!("{field} is not a decimal integer")))
}
