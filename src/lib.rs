//! # cloudflare-sync-dns
//!
//! Keeps Cloudflare A records pointed at a dynamic public IP, meant to run
//! from cron.
//!
//! ## Features
//!
//! - Cheap change detection against a local observation journal
//! - Updates every A record in every managed zone when the IP moves
//! - Resets the local firewall and verifies reachability before recording
//!   the new IP, so a failed run is simply retried by the next one
//! - Silent when nothing changed
//!
//! ## Usage
//!
//! ```bash
//! # One reconciliation run (what cron calls)
//! cloudflare-sync-dns --config /etc/cloudflare-sync-dns/config.toml
//!
//! # Compare the public IP with the journal
//! cloudflare-sync-dns status
//!
//! # Show the journal
//! cloudflare-sync-dns history
//!
//! # Check settings and list managed records
//! cloudflare-sync-dns validate
//! ```

pub mod chain;
pub mod config;
pub mod detector;
pub mod error;
pub mod history;
pub mod network;
pub mod providers;

pub use chain::{Outcome, RunLog, RunReport, SyncChain};
pub use config::Settings;
pub use detector::IpDetector;
pub use error::{Result, SyncError};
pub use history::StateStore;
