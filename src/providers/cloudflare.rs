//! Cloudflare v4 API client.

use super::{DnsProvider, DnsRecord};
use crate::config::{ManagedZone, Settings};
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4/zones";

/// Cloudflare's "automatic" TTL.
const AUTOMATIC_TTL: u32 = 1;

/// Cloudflare DNS provider authenticated with a global API key.
pub struct CloudflareProvider {
    client: reqwest::Client,
    api_key: String,
    email: String,
    base_url: String,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_key", &"<REDACTED>")
            .field("email", &self.email)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct CloudflareResponse<T> {
    success: bool,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<CloudflareError>,
}

#[derive(Debug, Deserialize)]
struct CloudflareError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RecordEntry {
    id: String,
    name: String,
    #[serde(default)]
    proxied: bool,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    #[serde(rename = "type")]
    record_type: &'static str,
    name: &'a str,
    content: String,
    ttl: u32,
    proxied: bool,
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider.
    pub fn new(api_key: String, email: String) -> Self {
        Self::with_base_url(api_key, email, DEFAULT_BASE_URL.to_string())
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(api_key: String, email: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            email,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build from settings whose credentials were resolved by `Settings::load_from`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_base_url(
            settings.credentials.key.clone(),
            settings.credentials.email.clone(),
            settings.api_base_url.clone(),
        )
    }

    /// Attach auth and content negotiation headers, send, and unwrap the envelope.
    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<Option<T>> {
        let response = request
            .header("X-Auth-Key", &self.api_key)
            .header("X-Auth-Email", &self.email)
            .header(CONTENT_TYPE, "application/json; charset=UTF-8")
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SyncError::Api(e.to_string()))?;

        let status = response.status();
        let envelope: CloudflareResponse<T> = response
            .json()
            .await
            .map_err(|e| SyncError::Api(format!("HTTP {}: unreadable response: {}", status, e)))?;

        if !envelope.success {
            let msg = envelope
                .errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| format!("HTTP {}: unknown error", status));
            return Err(SyncError::Api(msg));
        }

        Ok(envelope.result)
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    fn name(&self) -> &'static str {
        "cloudflare"
    }

    async fn list_address_records(&self, zone: &ManagedZone) -> Result<Vec<DnsRecord>> {
        let url = format!("{}/{}/dns_records", self.base_url, zone.zone_id);

        let request = self.client.get(&url).query(&[
            ("type", "A"),
            ("match", "any"),
            ("order", "type"),
            ("direction", "desc"),
        ]);

        let entries: Vec<RecordEntry> = self.send(request).await?.unwrap_or_default();

        let records: Vec<DnsRecord> = entries
            .into_iter()
            .map(|entry| DnsRecord {
                record_id: entry.id,
                name: entry.name,
                proxied: entry.proxied,
                zone_id: zone.zone_id.clone(),
            })
            .collect();

        for record in records
            .iter()
            .filter(|r| !r.name.eq_ignore_ascii_case(&zone.domain))
        {
            tracing::warn!(
                domain = %zone.domain,
                name = %record.name,
                "Zone returned a record for a different name"
            );
        }

        tracing::debug!(zone = %zone.zone_id, count = records.len(), "Listed A records");
        Ok(records)
    }

    /// PATCH `{base}/{zone_id}/dns_records/{record_id}`.
    ///
    /// The record lives under its zone; there is no `{base}/dns_records/...`
    /// prefix in the v4 API.
    async fn update_address_record(&self, record: &DnsRecord, ip: IpAddr) -> Result<()> {
        let url = format!(
            "{}/{}/dns_records/{}",
            self.base_url, record.zone_id, record.record_id
        );

        let request = UpdateRequest {
            record_type: "A",
            name: &record.name,
            content: ip.to_string(),
            ttl: AUTOMATIC_TTL,
            proxied: record.proxied,
        };

        let body = serde_json::to_vec(&request)?;
        let _: Option<serde_json::Value> = self.send(self.client.patch(&url).body(body)).await?;

        tracing::debug!(name = %record.name, %ip, "Patched A record");
        Ok(())
    }
}
