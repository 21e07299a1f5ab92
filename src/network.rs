//! Local network reset and reachability checks.

use crate::config::Settings;
use crate::error::Result;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Reapplies local network configuration for a new address.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkReset: Send + Sync {
    /// Run the reset, then confirm external and internal reachability.
    ///
    /// `Ok(false)` means the network did not come back as expected.
    async fn apply_and_verify(&self) -> Result<bool>;
}

/// Runs a shell command and pings hosts with the system tools.
#[derive(Debug, Clone)]
pub struct SystemNetwork {
    reset_command: String,
    external_host: String,
    targets: Vec<String>,
    probe_program: String,
    probe_args: Vec<String>,
}

impl SystemNetwork {
    pub fn new(reset_command: String, external_host: String, targets: Vec<String>) -> Self {
        Self {
            reset_command,
            external_host,
            targets,
            probe_program: "ping".to_string(),
            probe_args: vec!["-c".into(), "1".into(), "-W".into(), "2".into()],
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.network_reset_command.clone(),
            settings.external_probe_host.clone(),
            settings.verification_targets.clone(),
        )
    }

    /// Replace the probe program; the host is appended after `args`.
    pub fn with_probe(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.probe_program = program.into();
        self.probe_args = args;
        self
    }

    async fn run_reset(&self) -> Result<bool> {
        debug!(command = %self.reset_command, "Running network reset");

        // Output is discarded so a daemon left holding the pipes cannot stall the run.
        let status = Command::new("sh")
            .arg("-c")
            .arg(&self.reset_command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            warn!(
                command = %self.reset_command,
                %status,
                "Network reset command failed"
            );
        }

        Ok(status.success())
    }

    async fn probe(&self, host: &str) -> bool {
        let status = Command::new(&self.probe_program)
            .args(&self.probe_args)
            .arg(host)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {
                debug!(host, "Host reachable");
                true
            }
            Ok(status) => {
                warn!(host, %status, "Host unreachable");
                false
            }
            Err(e) => {
                warn!(host, error = %e, "Could not run probe");
                false
            }
        }
    }
}

#[async_trait]
impl NetworkReset for SystemNetwork {
    async fn apply_and_verify(&self) -> Result<bool> {
        if !self.run_reset().await? {
            return Ok(false);
        }

        if !self.probe(&self.external_host).await {
            return Ok(false);
        }

        for target in &self.targets {
            if !self.probe(target).await {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(reset: &str, targets: &[&str]) -> SystemNetwork {
        SystemNetwork::new(
            reset.to_string(),
            "external.test".to_string(),
            targets.iter().map(|t| t.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn test_verified_when_reset_and_probes_succeed() {
        let network = network("exit 0", &["router.lan", "nas.lan"]).with_probe("true", vec![]);

        assert!(network.apply_and_verify().await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_reset_skips_probes() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("probed");
        let network = network("exit 3", &[]).with_probe(
            "sh",
            vec![
                "-c".to_string(),
                format!("touch {}", marker.display()),
            ],
        );

        assert!(!network.apply_and_verify().await.unwrap());
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_reset_leaving_background_child_does_not_block() {
        let network = network("sleep 30 & exit 0", &[]);

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            network.apply_and_verify(),
        )
        .await
        .expect("reset should not wait on its background child");

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_target_fails_verification() {
        let network = network("true", &["nas.lan"]).with_probe(
            "sh",
            vec![
                "-c".to_string(),
                r#"[ "$0" != nas.lan ]"#.to_string(),
            ],
        );

        assert!(!network.apply_and_verify().await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_probe_program_fails_verification() {
        let network = network("true", &[]).with_probe("/nonexistent/probe", vec![]);

        assert!(!network.apply_and_verify().await.unwrap());
    }
}
