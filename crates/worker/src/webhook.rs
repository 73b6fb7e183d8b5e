//! Outbound webhook delivery.
//!
//! Providers are a closed set, picked by the endpoint's host component.
//! Endpoint shape is validated when a user configures it; at send time an
//! endpoint that matches no provider still gets a POST with an empty JSON
//! object rather than failing the dispatch.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, Uri};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use tokio::time::{Duration, timeout};

use crate::error::WebhookError;

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

const TEST_MESSAGE: &str =
    "Hello! If you're seeing this, the notification webhook is set up correctly.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookProvider {
    Discord,
    Slack,
}

impl WebhookProvider {
    /// Provider by host component alone; used on the send path.
    pub fn detect(endpoint: &str) -> Option<Self> {
        let uri: Uri = endpoint.parse().ok()?;
        match uri.host()? {
            "discord.com" => Some(WebhookProvider::Discord),
            "hooks.slack.com" => Some(WebhookProvider::Slack),
            _ => None,
        }
    }

    /// Strict endpoint validation for configuration time: https, a known
    /// provider host, and the provider's webhook path shape.
    pub fn from_endpoint(endpoint: &str) -> Result<Self, WebhookError> {
        let invalid = || WebhookError::InvalidEndpoint(endpoint.to_string());
        let uri: Uri = endpoint.parse().map_err(|_| invalid())?;
        if uri.scheme_str() != Some("https") {
            return Err(invalid());
        }
        let provider = Self::detect(endpoint).ok_or_else(invalid)?;
        let path_ok = match provider {
            WebhookProvider::Discord => uri.path().starts_with("/api/webhooks/"),
            WebhookProvider::Slack => uri.path().starts_with("/services/"),
        };
        if !path_ok {
            return Err(invalid());
        }
        Ok(provider)
    }
}

#[derive(Serialize)]
struct DiscordPayload<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
}

#[derive(Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
}

/// JSON body for the given endpoint.
pub fn payload_for(
    endpoint: &str,
    message: &str,
    avatar_url: Option<&str>,
) -> Result<Bytes, WebhookError> {
    let bytes = match WebhookProvider::detect(endpoint) {
        Some(WebhookProvider::Discord) => serde_json::to_vec(&DiscordPayload {
            content: message,
            avatar_url,
        }),
        Some(WebhookProvider::Slack) => serde_json::to_vec(&SlackPayload { text: message }),
        None => Ok(b"{}".to_vec()),
    }
    .map_err(|e| WebhookError::Request(e.to_string()))?;
    Ok(Bytes::from(bytes))
}

/// Shared HTTP client for webhook POSTs with a bounded per-request timeout.
#[derive(Clone)]
pub struct WebhookClient {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    timeout: Duration,
    avatar_url: Option<String>,
}

impl WebhookClient {
    pub fn new(send_timeout: Duration, avatar_url: Option<String>) -> Self {
        // https_or_http so tests can point endpoints at a local server.
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(https);
        Self {
            client,
            timeout: send_timeout,
            avatar_url,
        }
    }

    /// POST `message` to `endpoint`. Success is any 2xx status.
    pub async fn send(&self, endpoint: &str, message: &str) -> Result<(), WebhookError> {
        let body = payload_for(endpoint, message, self.avatar_url.as_deref())?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(body))
            .map_err(|e| WebhookError::Request(e.to_string()))?;

        let response = timeout(self.timeout, self.client.request(req))
            .await
            .map_err(|_| WebhookError::Timeout(self.timeout))?
            .map_err(|e| WebhookError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WebhookError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    /// One-off message to verify a freshly configured endpoint.
    pub async fn send_test_notification(&self, endpoint: &str) -> Result<(), WebhookError> {
        WebhookProvider::from_endpoint(endpoint)?;
        self.send(endpoint, TEST_MESSAGE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_by_host_component() {
        assert_eq!(
            WebhookProvider::detect("https://discord.com/api/webhooks/123456789012345678/token"),
            Some(WebhookProvider::Discord)
        );
        assert_eq!(
            WebhookProvider::detect("https://hooks.slack.com/services/T000/B000/XXXX"),
            Some(WebhookProvider::Slack)
        );
        assert_eq!(WebhookProvider::detect("https://example.com/hook"), None);
        assert_eq!(WebhookProvider::detect("not a url"), None);
    }

    #[test]
    fn strict_validation_checks_scheme_and_path() {
        assert!(
            WebhookProvider::from_endpoint(
                "https://discord.com/api/webhooks/123456789012345678/token"
            )
            .is_ok()
        );
        assert!(
            WebhookProvider::from_endpoint("https://hooks.slack.com/services/T000/B000/XXXX")
                .is_ok()
        );
        // http is rejected even for known hosts
        assert!(
            WebhookProvider::from_endpoint("http://discord.com/api/webhooks/1/t").is_err()
        );
        // wrong path shape
        assert!(WebhookProvider::from_endpoint("https://discord.com/other").is_err());
        assert!(WebhookProvider::from_endpoint("https://hooks.slack.com/hook").is_err());
        assert!(WebhookProvider::from_endpoint("https://example.com/hook").is_err());
    }

    #[test]
    fn discord_payload_shape() {
        let body = payload_for(
            "https://discord.com/api/webhooks/1/t",
            "cert expiring",
            Some("https://cdn.example.com/avatar.png"),
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["content"], "cert expiring");
        assert_eq!(json["avatar_url"], "https://cdn.example.com/avatar.png");
    }

    #[test]
    fn discord_payload_omits_missing_avatar() {
        let body = payload_for("https://discord.com/api/webhooks/1/t", "msg", None).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["content"], "msg");
        assert!(json.get("avatar_url").is_none());
    }

    #[test]
    fn slack_payload_shape() {
        let body = payload_for(
            "https://hooks.slack.com/services/T/B/X",
            "cert expiring",
            Some("ignored for slack"),
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["text"], "cert expiring");
        assert!(json.get("avatar_url").is_none());
    }

    #[test]
    fn unknown_provider_payload_is_empty_object() {
        let body = payload_for("http://127.0.0.1:9999/hook", "msg", None).unwrap();
        assert_eq!(&body[..], b"{}");
    }

    #[tokio::test]
    async fn test_notification_refuses_invalid_endpoints_without_sending() {
        let _ = rustls::crypto::CryptoProvider::install_default(
            rustls::crypto::ring::default_provider(),
        );
        let client = WebhookClient::new(Duration::from_secs(1), None);
        // No listener anywhere; an invalid endpoint must fail validation
        // before any request is attempted.
        let err = client
            .send_test_notification("http://127.0.0.1:1/hook")
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::InvalidEndpoint(_)));

        let err = client
            .send_test_notification("https://example.com/hook")
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::InvalidEndpoint(_)));
    }
}
