//! Settings for a sync run.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for one reconciliation run.
///
/// Loaded once before the chain starts and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Cloudflare account credentials.
    pub credentials: Credentials,

    /// Zones whose A records follow the public IP.
    #[serde(alias = "managedZones")]
    pub managed_zones: Vec<ManagedZone>,

    /// Shell command that reapplies firewall/routing rules for the new address.
    #[serde(alias = "networkResetCommand")]
    pub network_reset_command: String,

    /// Internal hosts that must answer a ping after the reset.
    #[serde(alias = "verificationTargets")]
    pub verification_targets: Vec<String>,

    /// Path of the observation journal.
    #[serde(alias = "stateStorePath")]
    pub state_store_path: PathBuf,

    /// Refuse to run unless the local hostname matches.
    #[serde(default, alias = "requiredHost", skip_serializing_if = "Option::is_none")]
    pub required_host: Option<String>,

    /// Cloudflare zones endpoint.
    #[serde(default = "default_api_base_url", alias = "apiBaseUrl")]
    pub api_base_url: String,

    /// Public IP lookup endpoint, must answer `{"ip": "..."}`.
    #[serde(default = "default_ip_lookup_url", alias = "ipLookupUrl")]
    pub ip_lookup_url: String,

    /// Well-known host pinged to confirm outbound reachability.
    #[serde(default = "default_external_probe_host", alias = "externalProbeHost")]
    pub external_probe_host: String,
}

/// Cloudflare global API key credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// API key (or environment variable name if prefixed with $).
    pub key: String,
    /// Account email.
    pub email: String,
}

/// One DNS zone to reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedZone {
    /// Apex domain of the zone (e.g., "example.com").
    pub domain: String,
    /// Cloudflare zone ID.
    #[serde(alias = "zoneId")]
    pub zone_id: String,
}

impl Credentials {
    /// Copy with `$VAR` references replaced by their environment values.
    pub fn resolve(&self) -> Result<Self> {
        Ok(Self {
            key: resolve_env(&self.key)?,
            email: resolve_env(&self.email)?,
        })
    }
}

/// Resolve environment variable references (values starting with $).
fn resolve_env(value: &str) -> Result<String> {
    let Some(var_name) = value.strip_prefix('$') else {
        return Ok(value.to_string());
    };

    match std::env::var(var_name) {
        Ok(resolved) if !resolved.trim().is_empty() => Ok(resolved),
        Ok(_) => Err(SyncError::Config(format!(
            "environment variable {} is empty",
            var_name
        ))),
        Err(_) => Err(SyncError::Config(format!(
            "environment variable {} not set",
            var_name
        ))),
    }
}

fn default_api_base_url() -> String {
    "https://api.cloudflare.com/client/v4/zones".to_string()
}

fn default_ip_lookup_url() -> String {
    "https://api.ipify.org?format=json".to_string()
}

fn default_external_probe_host() -> String {
    "google.com".to_string()
}

impl Settings {
    /// Load and validate settings from a file.
    ///
    /// `.json` files are parsed as JSON, everything else as TOML. `$VAR`
    /// credentials are replaced by the variable's value.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!("Could not read {}: {}", path.display(), e))
        })?;

        let mut settings = if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json(&content)?
        } else {
            Self::from_toml(&content)?
        };

        settings.validate()?;
        settings.credentials = settings.credentials.resolve()?;
        Ok(settings)
    }

    /// Parse TOML settings without validating them.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parse JSON settings without validating them.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Check that every required value is present and non-blank.
    pub fn validate(&self) -> Result<()> {
        if self.credentials.key.trim().is_empty() || self.credentials.email.trim().is_empty() {
            return Err(SyncError::Config(
                "credentials.key and credentials.email are required".to_string(),
            ));
        }
        self.credentials.resolve()?;

        if self.managed_zones.is_empty() {
            return Err(SyncError::Config(
                "at least one managed zone is required".to_string(),
            ));
        }

        for (index, zone) in self.managed_zones.iter().enumerate() {
            if zone.domain.trim().is_empty() || zone.zone_id.trim().is_empty() {
                return Err(SyncError::Config(format!(
                    "managed zone #{} needs both domain and zone_id",
                    index + 1
                )));
            }
        }

        if self.network_reset_command.trim().is_empty() {
            return Err(SyncError::Config(
                "network_reset_command is required".to_string(),
            ));
        }

        if self.state_store_path.as_os_str().is_empty() {
            return Err(SyncError::Config("state_store_path is required".to_string()));
        }

        Ok(())
    }

    /// Fail unless this process runs on `required_host` (when one is set).
    pub fn check_host(&self) -> Result<()> {
        let Some(required) = &self.required_host else {
            return Ok(());
        };

        let local = hostname::get()?.to_string_lossy().into_owned();
        ensure_host(required, &local)
    }

    /// Generate example settings.
    pub fn example() -> Self {
        Self {
            credentials: Credentials {
                key: "$CF_API_KEY".to_string(),
                email: "admin@example.com".to_string(),
            },
            managed_zones: vec![ManagedZone {
                domain: "example.com".to_string(),
                zone_id: "your-zone-id".to_string(),
            }],
            network_reset_command: "/etc/init.d/firewall restart".to_string(),
            verification_targets: vec!["192.168.1.1".to_string()],
            state_store_path: PathBuf::from("/var/lib/cloudflare-sync-dns/history.json"),
            required_host: Some("router".to_string()),
            api_base_url: default_api_base_url(),
            ip_lookup_url: default_ip_lookup_url(),
            external_probe_host: default_external_probe_host(),
        }
    }
}

fn ensure_host(required: &str, local: &str) -> Result<()> {
    if required.eq_ignore_ascii_case(local) {
        Ok(())
    } else {
        Err(SyncError::Config(format!(
            "This tool is only intended to run on {}, not {}",
            required, local
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
        network_reset_command = "/etc/init.d/firewall restart"
        verification_targets = ["192.168.1.1", "nas.lan"]
        state_store_path = "/tmp/history.json"

        [credentials]
        key = "abc"
        email = "me@example.com"

        [[managed_zones]]
        domain = "example.com"
        zone_id = "zone-1"
    "#;

    #[test]
    fn test_toml_settings_with_defaults() {
        let settings = Settings::from_toml(MINIMAL_TOML).unwrap();
        settings.validate().unwrap();

        assert_eq!(settings.managed_zones.len(), 1);
        assert_eq!(settings.managed_zones[0].zone_id, "zone-1");
        assert_eq!(settings.verification_targets, vec!["192.168.1.1", "nas.lan"]);
        assert_eq!(settings.api_base_url, "https://api.cloudflare.com/client/v4/zones");
        assert_eq!(settings.external_probe_host, "google.com");
        assert!(settings.required_host.is_none());
    }

    #[test]
    fn test_json_settings_accept_camel_case() {
        let json = r#"{
            "credentials": { "key": "abc", "email": "me@example.com" },
            "managedZones": [ { "domain": "example.com", "zoneId": "zone-1" } ],
            "networkResetCommand": "true",
            "verificationTargets": [],
            "stateStorePath": "/tmp/history.json",
            "requiredHost": "router"
        }"#;

        let settings = Settings::from_json(json).unwrap();
        settings.validate().unwrap();

        assert_eq!(settings.managed_zones[0].domain, "example.com");
        assert_eq!(settings.required_host.as_deref(), Some("router"));
    }

    #[test]
    fn test_missing_field_is_config_error() {
        let result = Settings::from_toml(
            r#"
            network_reset_command = "true"
            verification_targets = []
            [credentials]
            key = "abc"
            email = "me@example.com"
            "#,
        );

        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn test_empty_zone_list_rejected() {
        let mut settings = Settings::from_toml(MINIMAL_TOML).unwrap();
        settings.managed_zones.clear();

        assert!(matches!(settings.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_blank_credentials_rejected() {
        let mut settings = Settings::from_toml(MINIMAL_TOML).unwrap();
        settings.credentials.email = "  ".to_string();

        assert!(matches!(settings.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Settings::load_from(&dir.path().join("nope.toml"));

        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn test_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut example = Settings::example();
        example.credentials.key = "plain-key".to_string();
        std::fs::write(&path, serde_json::to_string(&example).unwrap()).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.managed_zones, Settings::example().managed_zones);
    }

    #[test]
    fn test_unset_credential_variable_rejected() {
        let mut settings = Settings::example();
        settings.credentials.key = "$CF_SYNC_DNS_UNSET_KEY_VAR".to_string();

        match settings.validate() {
            Err(SyncError::Config(message)) => {
                assert!(message.contains("CF_SYNC_DNS_UNSET_KEY_VAR"))
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_from_resolves_credential_variables() {
        std::env::set_var("CF_SYNC_DNS_TEST_KEY", "resolved-key");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            MINIMAL_TOML.replace(r#"key = "abc""#, r#"key = "$CF_SYNC_DNS_TEST_KEY""#),
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        std::env::remove_var("CF_SYNC_DNS_TEST_KEY");

        assert_eq!(settings.credentials.key, "resolved-key");
        assert_eq!(settings.credentials.email, "me@example.com");
    }

    #[test]
    fn test_resolve_env_with_value() {
        assert_eq!(resolve_env("plain_value").unwrap(), "plain_value");
    }

    #[test]
    fn test_resolve_env_with_existing_var() {
        std::env::set_var("TEST_CF_SYNC_DNS_VAR", "resolved_value");
        assert_eq!(resolve_env("$TEST_CF_SYNC_DNS_VAR").unwrap(), "resolved_value");
        std::env::remove_var("TEST_CF_SYNC_DNS_VAR");
    }

    #[test]
    fn test_resolve_env_with_missing_var() {
        assert!(matches!(
            resolve_env("$NONEXISTENT_VAR_12345"),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_host_guard() {
        assert!(ensure_host("router", "router").is_ok());
        assert!(ensure_host("Router", "router").is_ok());
        assert!(matches!(
            ensure_host("router", "laptop"),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_no_host_guard_when_unset() {
        let settings = Settings::from_toml(MINIMAL_TOML).unwrap();
        assert!(settings.check_host().is_ok());
    }
}
