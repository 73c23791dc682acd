use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use esfwatch_core::{
    load_config, validate_config, Config, GoogleSheetsStore, Helpdesk, Notifier, RunController,
    SanitizedConfig, TableStore, TelegramNotifier, UseDeskClient,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Reconcile the ESF status sheet into the ledger and follow up on new entries.
#[derive(Debug, Parser)]
#[command(name = "esfwatch", version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, env = "ESFWATCH_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Reconcile the ledger and process pending entries (default).
    Run,
    /// Log every ledger row with its position.
    Dump,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let command = cli.command.unwrap_or(Command::Run);
    let config_path = cli.config;

    info!("esfwatch v{}", VERSION);

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(sanitized.as_bytes()));
    info!(config_hash = &config_hash[..16], "Configuration loaded");
    info!("Configuration: {}", sanitized);

    let controller = build_controller(config)?;

    match command {
        Command::Dump => {
            controller.dump_ledger().await.context("Failed to read ledger")?;
        }
        Command::Run => match controller.config().run.interval_secs {
            None => {
                let summary = controller.run().await.context("Run failed")?;
                info!(
                    "Summary: {}",
                    serde_json::to_string(&summary).unwrap_or_default()
                );
            }
            Some(secs) => run_scheduled(&controller, Duration::from_secs(secs)).await,
        },
    }

    info!("Done");
    Ok(())
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let json = std::env::var("ESFWATCH_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_controller(config: Config) -> Result<RunController> {
    let store: Arc<dyn TableStore> = Arc::new(
        GoogleSheetsStore::new(&config.sheets).context("Failed to create sheets client")?,
    );
    info!("Using table store: {}", store.name());

    let helpdesk: Arc<dyn Helpdesk> = Arc::new(
        UseDeskClient::new(&config.helpdesk).context("Failed to create helpdesk client")?,
    );
    info!("Using helpdesk: {}", helpdesk.name());

    // Without a bot token entries stop after the ticket is linked.
    let notifier: Option<Arc<dyn Notifier>> = if config.chat.bot_token.is_empty() {
        warn!("No chat bot token configured, notifications are disabled");
        None
    } else {
        let notifier =
            TelegramNotifier::new(&config.chat).context("Failed to create chat notifier")?;
        info!("Using notifier: {}", notifier.name());
        Some(Arc::new(notifier))
    };

    RunController::new(config, store, helpdesk, notifier).context("Failed to create run controller")
}

/// Run every `interval` until a shutdown signal arrives. A failed run is
/// logged and the next one is attempted on schedule.
async fn run_scheduled(controller: &RunController, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "Scheduled mode");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        if let Ok(summary) = controller.run().await {
            info!(
                "Summary: {}",
                serde_json::to_string(&summary).unwrap_or_default()
            );
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping");
                break;
            }
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_is_default_command() {
        let cli = Cli::try_parse_from(["esfwatch", "--config", "a.toml"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.command.unwrap_or(Command::Run), Command::Run);
        assert_eq!(cli.config, PathBuf::from("a.toml"));
    }

    #[test]
    fn test_subcommands_parse() {
        let cli = Cli::try_parse_from(["esfwatch", "--config", "a.toml", "dump"]).unwrap();
        assert_eq!(cli.command, Some(Command::Dump));

        let cli = Cli::try_parse_from(["esfwatch", "--config", "a.toml", "run"]).unwrap();
        assert_eq!(cli.command, Some(Command::Run));
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["esfwatch", "reconcile"]).is_err());
    }
}
