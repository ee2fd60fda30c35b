//! Client-side core for the HoloAI writing service.
//!
//! This crate implements the pieces of the client that carry actual logic,
//! leaving I/O to pluggable capabilities:
//!
//! - [`auth`] — the SRP-6a password authentication client. Registration
//!   derives a salt/verifier pair; login processes the server challenge and
//!   produces the client evidence without ever transmitting the password.
//! - [`crypto`] — the content encryption layer. Story records are held
//!   server-side as self-describing AES-CCM envelopes (sjcl wire format);
//!   this module derives keys from the account master secret and transforms
//!   records between their encrypted and cleartext states.
//! - [`story`] — the branching, versioned document model. Generated and
//!   edited text accumulates in an append-only fragment forest with an
//!   undo/redo cursor, and a bounded token context is built from the tail
//!   of the flattened document for each generation call.
//! - [`api`] — the boundary: capability traits for the HTTP transport, the
//!   tokenizer and the completion endpoint, typed wire models, and the
//!   register/login flows that compose the pieces above.
//!
//! The crate performs no network or file I/O itself. Implement
//! [`api::Transport`] over your HTTP client of choice and hand it to
//! [`api::ApiClient`].

pub mod api;
pub mod auth;
pub mod crypto;
pub mod story;

pub use api::{ApiClient, ApiError, AuthClient, CompletionClient, Model, Tokenizer, Transport};
pub use auth::AuthError;
pub use crypto::{CryptoError, SecretVec};
pub use story::{Fragment, FragmentOrigin, StoryTree, TreeError};
