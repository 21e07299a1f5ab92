//! Local observation journal.
//!
//! The file is a JSON array of `{ "ip": ..., "date": ... }` entries. Its last
//! entry is what DNS is believed to say right now, so it only advances after a
//! change has been pushed and the local network verified.

use crate::error::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

/// IP recorded when the journal is first created.
pub const SENTINEL_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// One observed IP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub ip: IpAddr,
    #[serde(rename = "date")]
    pub observed_at: ObservedAt,
}

/// When an observation was made.
///
/// New entries are RFC 3339. Journals written by older tooling carry locale
/// strings such as `"11/13/2024, 10:00 AM"`; those are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservedAt {
    Timestamp(DateTime<Utc>),
    Legacy(String),
}

impl ObservedAt {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            ObservedAt::Timestamp(at) => Some(*at),
            ObservedAt::Legacy(_) => None,
        }
    }
}

impl fmt::Display for ObservedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservedAt::Timestamp(at) => write!(f, "{}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            ObservedAt::Legacy(raw) => f.write_str(raw),
        }
    }
}

impl Observation {
    fn now(ip: IpAddr) -> Self {
        Self {
            ip,
            observed_at: ObservedAt::Timestamp(Utc::now()),
        }
    }
}

/// File-backed journal of observations.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the journal with a single sentinel observation if it is missing.
    ///
    /// Returns `true` when the file was created. An existing file is left
    /// untouched.
    pub fn ensure_initialized(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        self.write(&[Observation::now(SENTINEL_IP)])?;
        tracing::info!(path = %self.path.display(), "Created observation journal");
        Ok(true)
    }

    /// IP of the last observation.
    pub fn load_last_observed_ip(&self) -> Result<IpAddr> {
        self.observations()?
            .last()
            .map(|observation| observation.ip)
            .ok_or_else(|| {
                SyncError::CorruptState(format!("{} has no observations", self.path.display()))
            })
    }

    /// Every observation, oldest first.
    pub fn observations(&self) -> Result<Vec<Observation>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            SyncError::CorruptState(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            SyncError::CorruptState(format!("Failed to parse {}: {}", self.path.display(), e))
        })
    }

    /// Append `ip` with the current time and rewrite the journal.
    pub fn append_observation(&self, ip: IpAddr) -> Result<()> {
        let mut observations = self.observations()?;
        observations.push(Observation::now(ip));
        self.write(&observations)
    }

    /// Write to a sibling temp file, then rename over the journal.
    fn write(&self, observations: &[Observation]) -> Result<()> {
        let content = serde_json::to_string_pretty(observations)?;

        let mut tmp_name = self.path.clone().into_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
