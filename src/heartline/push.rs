//! Push delivery client.
//!
//! [`PushSender`] is the seam between the pipeline and the external delivery
//! service: one logical request per token, with a structured per-token
//! outcome. [`HttpPushClient`] is the production implementation; tests swap
//! in a scripted double.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::heartline::PushConfig;
use crate::heartline::error::HeartlineError;

/// Error code the delivery service returns for a token that can never
/// receive messages again.
pub(crate) const NOT_REGISTERED_CODE: &str = "registration-token-not-registered";

const PUSH_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Data-only notification payload as consumed by the client service worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub url: String,
}

/// Per-token delivery failure.
///
/// Only `NotRegistered` marks the token as permanently invalid; everything
/// else is transient from the pipeline's point of view and is not retried
/// here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery token is no longer registered")]
    NotRegistered,
    #[error("push service error: {0}")]
    Service(String),
    #[error("push transport error: {0}")]
    Transport(String),
}

/// One delivery request for one token.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, token: &str, payload: &PushPayload) -> Result<(), DeliveryError>;
}

#[derive(Serialize)]
struct SendRequest<'a> {
    token: &'a str,
    data: &'a PushPayload,
}

#[derive(Deserialize)]
struct SendErrorBody {
    error: String,
}

/// HTTP implementation of [`PushSender`] against the delivery service's send
/// endpoint.
#[derive(Debug, Clone)]
pub struct HttpPushClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpPushClient {
    pub fn new(config: PushConfig) -> Result<Self, HeartlineError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(PUSH_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                HeartlineError::Configuration(format!("Failed to build push HTTP client: {e}"))
            })?;

        Ok(Self {
            http,
            endpoint: config.endpoint,
            api_key: config.api_key,
        })
    }
}

#[async_trait]
impl PushSender for HttpPushClient {
    async fn send(&self, token: &str, payload: &PushPayload) -> Result<(), DeliveryError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&SendRequest { token, data: payload });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<SendErrorBody>(&body) {
            Ok(error_body) if error_body.error == NOT_REGISTERED_CODE => {
                Err(DeliveryError::NotRegistered)
            }
            Ok(error_body) => Err(DeliveryError::Service(error_body.error)),
            Err(_) => Err(DeliveryError::Service(format!("{status}: {body}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_payload() -> PushPayload {
        PushPayload {
            title: "서연님".to_string(),
            body: "안녕하세요".to_string(),
            icon: "/icon-192.png".to_string(),
            badge: "/badge-72.png".to_string(),
            url: "/chat/uid-a".to_string(),
        }
    }

    fn client_for(server: &mockito::ServerGuard, api_key: Option<&str>) -> HttpPushClient {
        HttpPushClient::new(PushConfig {
            endpoint: format!("{}/send", server.url()),
            api_key: api_key.map(str::to_string),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/send")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let result = client.send("token-1", &test_payload()).await;

        assert!(result.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_attaches_bearer_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/send")
            .match_header("authorization", "Bearer secret-key")
            .with_status(200)
            .create_async()
            .await;

        let client = client_for(&server, Some("secret-key"));
        client.send("token-1", &test_payload()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_registered_code_maps_to_permanent_invalidity() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/send")
            .with_status(404)
            .with_body(r#"{"error":"registration-token-not-registered"}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let result = client.send("token-1", &test_payload()).await;

        assert_eq!(result, Err(DeliveryError::NotRegistered));
    }

    #[tokio::test]
    async fn test_other_service_errors_are_not_permanent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/send")
            .with_status(429)
            .with_body(r#"{"error":"quota-exceeded"}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let result = client.send("token-1", &test_payload()).await;

        assert_eq!(
            result,
            Err(DeliveryError::Service("quota-exceeded".to_string()))
        );
    }

    #[tokio::test]
    async fn test_unparseable_error_body_is_a_service_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/send")
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let client = client_for(&server, None);
        let result = client.send("token-1", &test_payload()).await;

        assert!(matches!(result, Err(DeliveryError::Service(_))));
    }
}
