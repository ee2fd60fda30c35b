//! Password authentication.
//!
//! The service authenticates with SRP-6a: the client proves knowledge of the
//! password without transmitting it, and registration only ever uploads a
//! salt/verifier pair from which the password cannot be recovered.
//!
//! This module holds the protocol math; the request/response flow that
//! drives it lives in [`crate::api::AuthClient`].

pub mod srp;

pub use srp::{SrpSession, create_verifier_and_salt, process_challenge};

use thiserror::Error;

/// Errors from the SRP client.
///
/// All of these are fatal for the login attempt in progress; none should be
/// retried with the same session values.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The server's public value satisfied `B ≡ 0 (mod N)`.
    ///
    /// A compliant server never sends this; accepting it would let the
    /// server force a trivial session key. Treat as an authentication
    /// failure, not a transient error.
    #[error("malformed SRP challenge: server public value is a multiple of the group prime")]
    InvalidServerPublic,

    /// The system randomness source failed.
    #[error("failed to gather randomness: {0}")]
    Random(String),
}

/// Result alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
