//! Backend API surface: boundary traits, the endpoint client, and the
//! authentication flows built on top of it.
//!
//! The crate does not ship an HTTP stack or a tokenizer. Applications
//! supply a [`Transport`] (how bytes reach the backend) and a
//! [`Tokenizer`] (how text becomes model tokens); everything else —
//! endpoint routing, status checking, SRP login, record crypto — runs on
//! top of those two seams, which also makes every flow testable against
//! in-memory fakes.

mod auth;
mod client;
pub mod models;

pub use auth::AuthClient;
pub use client::ApiClient;
pub use models::{CompletionResponse, Model};

use serde_json::Value;
use thiserror::Error;

use crate::auth::AuthError;
use crate::crypto::CryptoError;

/// Boxed error type accepted from transport implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A failure below the API layer: DNS, TCP, TLS, timeouts.
#[derive(Debug, Error)]
#[error("transport failure: {0}")]
pub struct TransportError(#[source] pub BoxError);

impl TransportError {
    /// Wrap any error from a transport implementation.
    pub fn new(source: impl Into<BoxError>) -> Self {
        TransportError(source.into())
    }
}

/// HTTP method of an API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET request.
    Get,
    /// POST request.
    Post,
    /// DELETE request.
    Delete,
}

impl Method {
    /// Lowercase method name, for logging.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Delete => "delete",
        }
    }
}

/// How requests reach the backend.
///
/// Implementations own the base URL, connection reuse, and auth headers;
/// they return the response status and its parsed JSON body regardless of
/// status. Protocol-level failures are [`TransportError`]s; anything the
/// server actually said comes back as `(status, body)` for the API layer
/// to interpret.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Send one request and return the response status and JSON body.
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<(u16, Value), TransportError>;
}

/// Conversion between text and model token ids.
///
/// Tokenization is pure and infallible: the same `(model, text)` pair
/// always yields the same tokens, and `decode` is the left inverse of
/// `encode`.
pub trait Tokenizer {
    /// Tokenize `text` for `model`.
    fn encode(&self, model: Model, text: &str) -> Vec<u32>;

    /// Reassemble text from `tokens` for `model`.
    fn decode(&self, model: Model, tokens: &[u32]) -> String;
}

/// The generation capability, abstracted from the full client so story
/// trees can be driven by fakes in tests.
#[allow(async_fn_in_trait)]
pub trait CompletionClient {
    /// Request completions for `prefix` header tokens followed by `input`
    /// context tokens.
    async fn draw_completions(
        &self,
        prefix: &[u32],
        input: &[u32],
        model: Model,
        module: Option<&str>,
    ) -> Result<CompletionResponse, ApiError>;
}

/// Anything that can go wrong talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a server response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server reported an application error.
    #[error("api error (status {status}): {message}")]
    Api {
        /// HTTP status of the response.
        status: u16,
        /// The server's error message.
        message: String,
    },

    /// The server answered with a status the endpoint does not produce on
    /// success, without an error body.
    #[error("unexpected status {status} from {endpoint}")]
    UnexpectedStatus {
        /// HTTP status of the response.
        status: u16,
        /// The endpoint that was called.
        endpoint: String,
    },

    /// A response was well-formed JSON but not the shape the endpoint
    /// promises.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A body failed to serialize or a response failed to deserialize.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The SRP exchange failed on the client side.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Key derivation or record decryption failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
