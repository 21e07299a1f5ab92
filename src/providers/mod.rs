//! DNS provider client.

mod cloudflare;

pub use cloudflare::CloudflareProvider;

use crate::config::ManagedZone;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A provider-side A record, discovered by listing a zone.
///
/// Fetched fresh on every run and dropped once the run is over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Provider record ID, needed to target the update.
    pub record_id: String,
    /// Fully qualified record name.
    pub name: String,
    /// Whether traffic is routed through the provider's edge.
    pub proxied: bool,
    /// Zone the record belongs to.
    pub zone_id: String,
}

/// Lists and patches address records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &'static str;

    /// All A records in the zone, from a single request.
    async fn list_address_records(&self, zone: &ManagedZone) -> Result<Vec<DnsRecord>>;

    /// Point one record at `ip`, keeping its proxied flag.
    async fn update_address_record(&self, record: &DnsRecord, ip: IpAddr) -> Result<()>;
}
