//! Reconciliation chain.
//!
//! One run walks these states in order, each gating the next:
//!
//! 1. Bootstrap: make sure the observation journal exists
//! 2. Observe: resolve the public IP and load the last observed one
//! 3. Decide: stop silently when they match
//! 4. Discover: list the A records of every managed zone
//! 5. Commit: patch every record to the new IP
//! 6. Reset & Verify: reapply local network config and probe hosts
//! 7. Persist: append the new IP to the journal
//!
//! Any failure ends the run without touching the journal, so the next run sees
//! the same change and starts over from Discover.

use crate::config::{ManagedZone, Settings};
use crate::detector::{IpDetector, IpResolver};
use crate::error::{Result, SyncError};
use crate::history::StateStore;
use crate::network::{NetworkReset, SystemNetwork};
use crate::providers::{CloudflareProvider, DnsProvider, DnsRecord};
use chrono::{DateTime, Local};
use std::fmt;
use std::net::IpAddr;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
struct LogEntry {
    at: DateTime<Local>,
    message: String,
}

/// Step outcomes of one run, flushed as a single block.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    entries: Vec<LogEntry>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.entries.push(LogEntry {
            at: Local::now(),
            message: message.into(),
        });
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.message.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for RunLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, entry) in self.entries.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{} {}", entry.at.format("%Y-%m-%d %H:%M:%S"), entry.message)?;
        }
        Ok(())
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum Outcome {
    /// Public IP matches the journal; nothing was done.
    Unchanged { ip: IpAddr },
    /// DNS updated, network verified, journal advanced.
    Synced { previous: IpAddr, current: IpAddr },
    /// The chain stopped early; the journal is untouched.
    Failed(SyncError),
}

/// Result of one run.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: Outcome,
    pub log: RunLog,
}

impl RunReport {
    /// No-op runs produce no output.
    pub fn is_silent(&self) -> bool {
        matches!(self.outcome, Outcome::Unchanged { .. })
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, Outcome::Failed(_))
    }

    /// The error that stopped the chain, if any.
    pub fn failure(&self) -> Option<&SyncError> {
        match &self.outcome {
            Outcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Sequences resolver, provider, network and journal for one run.
pub struct SyncChain {
    zones: Vec<ManagedZone>,
    store: StateStore,
    resolver: Box<dyn IpResolver>,
    provider: Box<dyn DnsProvider>,
    network: Box<dyn NetworkReset>,
}

impl SyncChain {
    pub fn new(
        zones: Vec<ManagedZone>,
        store: StateStore,
        resolver: Box<dyn IpResolver>,
        provider: Box<dyn DnsProvider>,
        network: Box<dyn NetworkReset>,
    ) -> Self {
        Self {
            zones,
            store,
            resolver,
            provider,
            network,
        }
    }

    /// Wire the production components from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.managed_zones.clone(),
            StateStore::new(&settings.state_store_path),
            Box::new(IpDetector::with_url(settings.ip_lookup_url.clone())),
            Box::new(CloudflareProvider::from_settings(settings)),
            Box::new(SystemNetwork::from_settings(settings)),
        )
    }

    /// Execute one reconciliation run. Failures end up in the report.
    pub async fn run(&self) -> RunReport {
        let mut log = RunLog::new();

        let outcome = match self.reconcile(&mut log).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Sync chain failed");
                log.push(format!("Chain error: {}", e));
                Outcome::Failed(e)
            }
        };

        RunReport { outcome, log }
    }

    async fn reconcile(&self, log: &mut RunLog) -> Result<Outcome> {
        if self.store.ensure_initialized()? {
            debug!(path = %self.store.path().display(), "Initialized journal with sentinel");
        }

        let current = self.resolver.resolve_public_ip().await?;
        let previous = self.store.load_last_observed_ip()?;

        if current == previous {
            debug!(ip = %current, "Public IP unchanged");
            return Ok(Outcome::Unchanged { ip: current });
        }

        info!(%previous, %current, "Public IP changed");
        log.push(format!("External IP changed: {} -> {}", previous, current));

        let records = self.discover().await?;
        log.push(format!("Got {} DNS records", records.len()));

        let failed = self.commit(&records, current, log).await;
        if failed > 0 {
            return Err(SyncError::Api(format!(
                "{} of {} DNS record updates failed; network reset skipped",
                failed,
                records.len()
            )));
        }

        let verified = self.network.apply_and_verify().await?;
        log.push(format!("Reset LAN: {}", verified));
        if !verified {
            return Err(SyncError::Verification(
                "network did not come back after reset".to_string(),
            ));
        }

        self.store.append_observation(current)?;
        log.push(format!("Update local DNS history: {}", current));

        Ok(Outcome::Synced { previous, current })
    }

    /// List records across all zones; the first failing zone aborts discovery.
    async fn discover(&self) -> Result<Vec<DnsRecord>> {
        let mut records = Vec::new();

        for zone in &self.zones {
            let zone_records = self.provider.list_address_records(zone).await?;
            records.extend(zone_records);
        }

        if records.is_empty() {
            warn!("No A records found in any managed zone");
        }

        Ok(records)
    }

    /// Patch every record, even after a failure. Returns the failure count.
    async fn commit(&self, records: &[DnsRecord], ip: IpAddr, log: &mut RunLog) -> usize {
        let mut failed = 0;

        for record in records {
            match self.provider.update_address_record(record, ip).await {
                Ok(()) => log.push(format!("Updated {} to IP {}", record.name, ip)),
                Err(e) => {
                    warn!(name = %record.name, error = %e, "DNS update failed");
                    log.push(format!("Failed to update {}: {}", record.name, e));
                    failed += 1;
                }
            }
        }

        failed
    }
}
