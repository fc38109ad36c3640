//! Rover certificate daemon - Main entry point
//!
//! Checks or refreshes the rover's TLS certificate and publishes its
//! external address record.

use std::net::IpAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use rover_certd::acme::dns::{create_provider, AddressPublisher, DnsReconciler, ReconcileOutcome};
use rover_certd::acme::{AcmeClient, CertificateLifecycleController};
use rover_config::Config;

/// Version string combining Cargo semver and git commit
const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("ROVER_COMMIT"),
    ")"
);

/// Rover certificate daemon - ACME DNS-01 certificates and Cloud DNS records
#[derive(Parser, Debug)]
#[command(name = "rover-certd")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long = "config", env = "ROVER_CONFIG", global = true)]
    config: Option<String>,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the certificate and issue a new one if needed (default)
    Refresh,
    /// Point the primary domain's A/AAAA record at an address
    UpdateAddress {
        /// External IPv4 or IPv6 address
        ip: IpAddr,
    },
    /// Validate configuration file and exit
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli
        .config
        .as_deref()
        .context("No configuration file given (use --config or ROVER_CONFIG)")?;

    match cli.command.unwrap_or(Commands::Refresh) {
        Commands::Test => test_config(config_path),
        Commands::Refresh => {
            let config = load_config(config_path)?;
            let cancel = cancel_on_ctrl_c();
            refresh_certificate(&config, &cancel).await
        }
        Commands::UpdateAddress { ip } => {
            let config = load_config(config_path)?;
            let cancel = cancel_on_ctrl_c();
            update_address(&config, &cancel, ip).await
        }
    }
}

fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();
}

fn load_config(path: &str) -> Result<Config> {
    info!("Loading configuration from: {}", path);
    let config = Config::from_file(path).context("Failed to load configuration file")?;
    config.validate()?;
    Ok(config)
}

/// Test configuration file and exit
fn test_config(path: &str) -> Result<()> {
    let config = load_config(path)?;

    info!("Configuration test successful:");
    info!("  - {} domain(s)", config.acme.domains.len());
    info!("  - ACME directory: {}", config.acme.directory_url());
    info!("  - DNS zone: {}/{}", config.dns.project, config.dns.zone);

    println!("rover-certd: configuration file {} test is successful", path);
    Ok(())
}

/// Cancel in-flight work on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            token.cancel();
        }
    });
    cancel
}

fn reconciler(config: &Config) -> Result<DnsReconciler> {
    let provider = create_provider(&config.dns).context("Failed to set up DNS provider")?;
    Ok(DnsReconciler::new(provider).with_poll_interval(config.dns.poll_interval()))
}

async fn refresh_certificate(config: &Config, cancel: &CancellationToken) -> Result<()> {
    let ca = AcmeClient::new(config.acme.directory_url());
    let controller =
        CertificateLifecycleController::new(&config.acme, Arc::new(ca), reconciler(config)?);

    match controller.check_or_refresh(cancel, &config.acme.domains).await {
        Ok(paths) => {
            println!("certificate: {}", paths.certificate.display());
            println!("private-key: {}", paths.private_key.display());
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            warn!("Certificate refresh cancelled");
            Err(e.into())
        }
        Err(e) => {
            error!(error = %e, "Certificate refresh failed");
            Err(e).context("Certificate refresh failed")
        }
    }
}

async fn update_address(config: &Config, cancel: &CancellationToken, ip: IpAddr) -> Result<()> {
    let domain = config
        .acme
        .primary_domain()
        .context("No domains configured")?;
    let publisher = AddressPublisher::new(reconciler(config)?, domain);

    match publisher.update_address_record(cancel, ip).await {
        Ok(ReconcileOutcome::Unchanged) => {
            info!(domain = %domain, ip = %ip, "Address record already current");
            Ok(())
        }
        Ok(ReconcileOutcome::Applied { change_id, .. }) => {
            info!(domain = %domain, ip = %ip, change_id = %change_id, "Address record updated");
            Ok(())
        }
        Err(e) => {
            error!(domain = %domain, error = %e, "Address record update failed");
            Err(e).context("Address record update failed")
        }
    }
}
