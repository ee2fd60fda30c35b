//! Endpoint routing and response checking over a [`Transport`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::models::{
    ChallengeRequest, ChallengeResponse, CompletionRequest, CompletionResponse, Model,
    RegisterCredentialsRequest, VerifyChallengeRequest, VerifyChallengeResponse,
};
use super::{ApiError, CompletionClient, Method, Transport};

/// The typed client for every backend endpoint.
///
/// Each endpoint has one expected success status; any response carrying a
/// non-null `error` key is surfaced as [`ApiError::Api`] with the server's
/// message, and any other status is [`ApiError::UnexpectedStatus`].
#[derive(Debug)]
pub struct ApiClient<T> {
    transport: T,
}

impl<T: Transport> ApiClient<T> {
    /// Wrap a transport.
    pub fn new(transport: T) -> Self {
        ApiClient { transport }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Register SRP credentials for a new account.
    ///
    /// Returns the raw response body; its shape varies with server
    /// configuration (confirmation requirements and the like) and nothing
    /// in the login flow depends on it.
    pub async fn register_credentials(
        &self,
        request: &RegisterCredentialsRequest,
    ) -> Result<Value, ApiError> {
        self.post("/api/register_credentials", request, 201).await
    }

    /// Request a login challenge for an email address.
    pub async fn get_srp_challenge(
        &self,
        request: &ChallengeRequest,
    ) -> Result<ChallengeResponse, ApiError> {
        self.post("/api/srp_init", request, 200).await
    }

    /// Answer a login challenge with the client's public value and
    /// evidence.
    pub async fn verify_srp_challenge(
        &self,
        request: &VerifyChallengeRequest,
    ) -> Result<VerifyChallengeResponse, ApiError> {
        self.post("/api/srp_verify", request, 200).await
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B, expected: u16) -> Result<R, ApiError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        log::debug!("{} {endpoint}", Method::Post.as_str());

        let (status, response) = self
            .transport
            .send(Method::Post, endpoint, Some(&body))
            .await?;
        let response = check_response(status, response, expected, endpoint)?;
        Ok(serde_json::from_value(response)?)
    }
}

impl<T: Transport> CompletionClient for ApiClient<T> {
    async fn draw_completions(
        &self,
        prefix: &[u32],
        input: &[u32],
        model: Model,
        module: Option<&str>,
    ) -> Result<CompletionResponse, ApiError> {
        let request = CompletionRequest {
            prefix_tokens: prefix.to_vec(),
            prompt_tokens: input.to_vec(),
            model_name: model.as_str().to_owned(),
            module_id: module.map(str::to_owned),
        };
        self.post("/api/draw_completions", &request, 200).await
    }
}

/// Turn a `(status, body)` pair into the body or an error.
///
/// The `error` key takes priority over the status check: a response that
/// names its failure is reported with that message even when the status
/// happens to match.
fn check_response(
    status: u16,
    response: Value,
    expected: u16,
    endpoint: &str,
) -> Result<Value, ApiError> {
    match response.get("error") {
        None | Some(Value::Null) => {}
        Some(Value::String(message)) => {
            return Err(ApiError::Api {
                status,
                message: message.clone(),
            });
        }
        Some(other) => {
            return Err(ApiError::Api {
                status,
                message: other.to_string(),
            });
        }
    }
    if status != expected {
        return Err(ApiError::UnexpectedStatus {
            status,
            endpoint: endpoint.to_owned(),
        });
    }
    Ok(response)
}
