//! Public IP detection.

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;

const DEFAULT_LOOKUP_URL: &str = "https://api.ipify.org?format=json";

/// Source of the network's current public IP.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Look up the public IP. Never cached; every call hits the service.
    async fn resolve_public_ip(&self) -> Result<IpAddr>;
}

/// Resolver backed by a JSON lookup service answering `{"ip": "..."}`.
pub struct IpDetector {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    ip: String,
}

impl IpDetector {
    /// Create a detector using ipify.
    pub fn new() -> Self {
        Self::with_url(DEFAULT_LOOKUP_URL.to_string())
    }

    /// Create a detector with a custom lookup URL.
    pub fn with_url(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

impl Default for IpDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IpResolver for IpDetector {
    async fn resolve_public_ip(&self) -> Result<IpAddr> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(SyncError::Network(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body: LookupResponse = response.json().await?;
        let ip_str = body.ip.trim();

        let ip = ip_str
            .parse()
            .map_err(|_| SyncError::Network(format!("Invalid IP response: {}", ip_str)))?;

        tracing::debug!(%ip, service = %self.url, "Resolved public IP");
        Ok(ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_resolve_public_ip() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("format", "json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ip": "5.6.7.8"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let detector = IpDetector::with_url(format!("{}/?format=json", mock_server.uri()));
        let ip = detector.resolve_public_ip().await.unwrap();

        assert_eq!(ip, "5.6.7.8".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_every_call_hits_the_service() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ip": "1.2.3.4"})),
            )
            .expect(2)
            .mount(&mock_server)
            .await;

        let detector = IpDetector::with_url(mock_server.uri());
        tokio_test::assert_ok!(detector.resolve_public_ip().await);
        tokio_test::assert_ok!(detector.resolve_public_ip().await);
    }

    #[tokio::test]
    async fn test_http_error_is_network_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let detector = IpDetector::with_url(mock_server.uri());
        let result = detector.resolve_public_ip().await;

        assert!(matches!(result, Err(SyncError::Network(_))));
    }

    #[tokio::test]
    async fn test_invalid_ip_is_network_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ip": "not-an-ip"})),
            )
            .mount(&mock_server)
            .await;

        let detector = IpDetector::with_url(mock_server.uri());
        let result = detector.resolve_public_ip().await;

        assert!(matches!(result, Err(SyncError::Network(_))));
    }
}
