//! cloudflare-sync-dns - keep Cloudflare A records on the current public IP.

use anyhow::Context;
use clap::{Parser, Subcommand};
use cloudflare_sync_dns::config::Settings;
use cloudflare_sync_dns::detector::{IpDetector, IpResolver};
use cloudflare_sync_dns::history::StateStore;
use cloudflare_sync_dns::providers::{CloudflareProvider, DnsProvider};
use cloudflare_sync_dns::SyncChain;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cloudflare-sync-dns")]
#[command(about = "Keep Cloudflare A records in sync with a dynamic public IP")]
#[command(version)]
struct Cli {
    /// Path to settings file (.toml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation (default)
    Sync,

    /// Compare the public IP with the last observed one
    Status,

    /// Print the observation journal
    History,

    /// Validate settings and list managed records
    Validate,
}

fn get_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }

    // Default locations
    let candidates = [
        dirs::config_dir().map(|p| p.join("cloudflare-sync-dns/config.toml")),
        Some(PathBuf::from("/etc/cloudflare-sync-dns/config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for candidate in candidates.into_iter().flatten() {
        if candidate.exists() {
            return candidate;
        }
    }

    // Return default even if it doesn't exist
    dirs::config_dir()
        .map(|p| p.join("cloudflare-sync-dns/config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = get_config_path(cli.config);
    let settings = Settings::load_from(&config_path)
        .with_context(|| format!("Could not load settings from {}", config_path.display()))?;

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => cmd_sync(settings).await?,
        Commands::Status => cmd_status(settings).await?,
        Commands::History => cmd_history(settings)?,
        Commands::Validate => cmd_validate(settings).await?,
    }

    Ok(())
}

async fn cmd_sync(settings: Settings) -> anyhow::Result<()> {
    settings.check_host()?;

    let chain = SyncChain::from_settings(&settings);
    let report = chain.run().await;

    // Cron mails any output, so a no-op run prints nothing.
    if report.is_silent() {
        return Ok(());
    }

    println!("{}", report.log);

    if let Some(e) = report.failure() {
        anyhow::bail!("Sync run failed: {}", e);
    }

    Ok(())
}

async fn cmd_status(settings: Settings) -> anyhow::Result<()> {
    let detector = IpDetector::with_url(settings.ip_lookup_url.clone());
    let store = StateStore::new(&settings.state_store_path);

    println!("cloudflare-sync-dns Status");
    println!("==========================\n");

    let current = match detector.resolve_public_ip().await {
        Ok(ip) => {
            println!("Current Public IP:  {}", ip);
            Some(ip)
        }
        Err(e) => {
            println!("Failed to detect IP: {}", e);
            None
        }
    };

    let last = match store.load_last_observed_ip() {
        Ok(ip) => {
            println!("Last Observed IP:   {}", ip);
            Some(ip)
        }
        Err(e) => {
            println!("Journal unavailable: {}", e);
            None
        }
    };

    if let (Some(current), Some(last)) = (current, last) {
        if current == last {
            println!("\nIn sync.");
        } else {
            println!("\nOut of sync; the next run will update DNS.");
        }
    }

    Ok(())
}

fn cmd_history(settings: Settings) -> anyhow::Result<()> {
    let store = StateStore::new(&settings.state_store_path);
    let observations = store
        .observations()
        .with_context(|| format!("Could not read {}", store.path().display()))?;

    for observation in observations {
        println!("{}  {}", observation.observed_at, observation.ip);
    }

    Ok(())
}

async fn cmd_validate(settings: Settings) -> anyhow::Result<()> {
    println!("Validating configuration...\n");

    let mut all_valid = true;

    if let Err(e) = settings.check_host() {
        println!("  host: FAILED - {}", e);
        all_valid = false;
    }

    let provider = CloudflareProvider::from_settings(&settings);

    for zone in &settings.managed_zones {
        print!("  {} {} ({}): ", provider.name(), zone.domain, zone.zone_id);

        match provider.list_address_records(zone).await {
            Ok(records) => {
                println!("OK, {} A records", records.len());
                for record in records {
                    let proxied = if record.proxied { " [proxied]" } else { "" };
                    println!("    {}{}", record.name, proxied);
                }
            }
            Err(e) => {
                println!("FAILED - {}", e);
                all_valid = false;
            }
        }
    }

    println!();

    if all_valid {
        println!("Configuration is valid.");
    } else {
        anyhow::bail!("Some checks failed.");
    }

    Ok(())
}
