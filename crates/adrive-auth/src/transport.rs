//! Remote-service transport boundary
//!
//! The refresh coordinator and profile fetchers treat the transport as an
//! opaque collaborator: a status code plus a loosely-typed JSON envelope.
//! `Transport` is dyn-compatible (`Pin<Box<dyn Future>>` returns) so the
//! coordinator can hold `Arc<dyn Transport>` and tests can substitute a
//! scripted implementation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::CredentialStore;

/// Status code plus response envelope from one remote call.
///
/// Any HTTP response, success or failure, produces an `ApiResponse`; only
/// transport-level failures (connect, timeout) surface as `Err`.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub code: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    /// Remote body error code, when the envelope carries one.
    ///
    /// The service emits string codes (`"InvalidParameter.RefreshToken"`)
    /// but numeric ones have been observed on the open-API endpoint, so
    /// both are normalised to a string.
    pub fn body_code(&self) -> Option<String> {
        match self.body.get("code") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Remote body message, when the envelope carries one.
    pub fn body_message(&self) -> Option<&str> {
        self.body.get("message").and_then(|m| m.as_str())
    }
}

/// Whether a transport status code counts as success.
pub fn is_success(code: u16) -> bool {
    (200..300).contains(&code)
}

/// Remote-service transport.
///
/// `user_id` selects the account whose primary access token authenticates
/// the call; an empty `user_id` means an unauthenticated call (the token
/// endpoints authenticate by refresh token in the body instead).
pub trait Transport: Send + Sync {
    fn post<'a>(
        &'a self,
        url: &'a str,
        body: serde_json::Value,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>>;

    fn get<'a>(
        &'a self,
        url: &'a str,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>>;
}

/// reqwest-backed transport.
///
/// Resolves the bearer token from the credential store at call time, so a
/// refresh that just landed is picked up by the next call with no extra
/// plumbing.
pub struct HttpTransport {
    client: reqwest::Client,
    store: Arc<CredentialStore>,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, store: Arc<CredentialStore>) -> Self {
        Self { client, store }
    }

    async fn bearer_for(&self, user_id: &str) -> Option<String> {
        if user_id.is_empty() {
            return None;
        }
        let record = self.store.account(user_id).await?;
        if record.access_token.is_empty() {
            return None;
        }
        Some(format!("Bearer {}", record.access_token))
    }

    async fn decode(response: reqwest::Response) -> Result<ApiResponse> {
        let code = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("reading response body: {e}")))?;
        let body = if text.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
        };
        Ok(ApiResponse { code, body })
    }
}

impl Transport for HttpTransport {
    fn post<'a>(
        &'a self,
        url: &'a str,
        body: serde_json::Value,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>> {
        Box::pin(async move {
            let mut request = self.client.post(url).json(&body);
            if let Some(bearer) = self.bearer_for(user_id).await {
                request = request.header(reqwest::header::AUTHORIZATION, bearer);
            }
            let response = request
                .send()
                .await
                .map_err(|e| Error::Http(format!("POST {url} failed: {e}")))?;
            Self::decode(response).await
        })
    }

    fn get<'a>(
        &'a self,
        url: &'a str,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>> {
        Box::pin(async move {
            let mut request = self.client.get(url);
            if let Some(bearer) = self.bearer_for(user_id).await {
                request = request.header(reqwest::header::AUTHORIZATION, bearer);
            }
            let response = request
                .send()
                .await
                .map_err(|e| Error::Http(format!("GET {url} failed: {e}")))?;
            Self::decode(response).await
        })
    }
}
