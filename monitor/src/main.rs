//! Hookwatch - reports newly created files to a webhook.
//!
//! # Commands
//!
//! - `hookwatch run`: Watch the configured directory until interrupted
//! - `hookwatch test`: Send a sample message to verify the webhook
//! - `hookwatch save`: Store settings in the settings file
//!
//! # Environment Variables
//!
//! See `hookwatch_monitor::config` for available configuration options.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hookwatch_monitor::config::{config_dir_from_env, Config};
use hookwatch_monitor::dispatcher::DeliveryResult;
use hookwatch_monitor::log_sink::{LogEntry, LogSink};
use hookwatch_monitor::pipeline::{send_test_message, NotificationPipeline, PipelineOptions};
use hookwatch_monitor::settings::SettingsStore;

/// Hookwatch - reports newly created files to a webhook.
///
/// Watches a directory tree and posts a templated message for every new
/// file to a Discord-style webhook.
#[derive(Parser, Debug)]
#[command(name = "hookwatch")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    HOOKWATCH_CONFIG_DIR       Settings directory (default: ~/.hookwatch)
    HOOKWATCH_WEBHOOK_URL      Webhook URL override
    HOOKWATCH_WATCH_DIR        Watch directory override
    HOOKWATCH_TEMPLATE         Message template override
    HOOKWATCH_TIMEOUT_SECS     Webhook timeout (default: 10)
    HOOKWATCH_SETTLE_MS        Delay before reading a new file (default: 100)

TEMPLATE VARIABLES:
    {filename} {dir} {dirdate} {filesize} {filetype} {filepath} {time}
    {date} {timestamp} {foldername} {filecount} {filehash} {alert} {rtnfile}

EXAMPLES:
    # Store settings
    hookwatch save --webhook-url https://discord.com/api/webhooks/... \\
        --watch-dir ~/Downloads --template 'New: {filename} ({filesize})'

    # Verify the webhook
    hookwatch test

    # Start watching
    hookwatch run
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the configured directory until Ctrl+C.
    Run,

    /// Send a sample message to the configured webhook.
    Test,

    /// Merge the given values into the settings file.
    Save {
        /// Webhook URL.
        #[arg(long)]
        webhook_url: Option<String>,

        /// Directory to watch.
        #[arg(long)]
        watch_dir: Option<PathBuf>,

        /// Message template.
        #[arg(long)]
        template: Option<String>,
    },
}

/// Prints status lines as they arrive.
struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn append(&self, entry: LogEntry) {
        println!("{entry}");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging();

    match cli.command {
        Command::Run => run_monitor(),
        Command::Test => run_test(),
        Command::Save {
            webhook_url,
            watch_dir,
            template,
        } => run_save(webhook_url, watch_dir, template),
    }
}

/// Runs the watch until a shutdown signal arrives.
fn run_monitor() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    info!(
        webhook_configured = !config.settings.webhook_url.is_empty(),
        watch_dir = %config.settings.watch_dir.display(),
        "Configuration loaded"
    );

    let pipeline = NotificationPipeline::new(PipelineOptions {
        timeout: config.timeout,
        settle_delay: config.settle_delay,
    });

    pipeline
        .start(config.settings, Arc::new(ConsoleSink))
        .context("Failed to start monitoring")?;

    let runtime = build_runtime()?;
    runtime.block_on(wait_for_shutdown());

    info!("Shutdown signal received");
    pipeline.stop();

    Ok(())
}

/// Sends the verify-webhook message.
fn run_test() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let runtime = build_runtime()?;

    let result = runtime
        .block_on(send_test_message(&config.settings, config.timeout))
        .context("Failed to send test message")?;

    match result {
        DeliveryResult::Delivered => {
            println!("✓ Test sent!");
            Ok(())
        }
        DeliveryResult::Rejected(status) => bail!("✗ Failed: {status}"),
        DeliveryResult::TransportError(description) => bail!("✗ Error: {description}"),
    }
}

/// Updates the settings file with the given values.
fn run_save(
    webhook_url: Option<String>,
    watch_dir: Option<PathBuf>,
    template: Option<String>,
) -> Result<()> {
    let path = merge_settings(webhook_url, watch_dir, template)
        .context("Failed to save settings")?;
    println!("✓ Saved to {}", path.display());

    Ok(())
}

/// Loads the stored settings, applies the given values and writes them back.
fn merge_settings(
    webhook_url: Option<String>,
    watch_dir: Option<PathBuf>,
    template: Option<String>,
) -> hookwatch_monitor::Result<PathBuf> {
    let store = SettingsStore::new(config_dir_from_env()?);
    let mut settings = store.load()?;

    if let Some(url) = webhook_url {
        settings.webhook_url = url;
    }
    if let Some(dir) = watch_dir {
        settings.watch_dir = dir;
    }
    if let Some(template) = template {
        settings.message_template = template;
    }

    store.save(&settings)?;
    Ok(store.path())
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")
}

/// Initializes the logging subsystem.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
