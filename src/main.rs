//! llm-relay: resilient HTTP relay for OpenAI-compatible chat APIs
//!
//! Sits between clients and an OpenAI-compatible provider and provides:
//! - Retrying dispatch for transient upstream failures
//! - Automatic model fallback when a model is rate-limited
//! - Usage telemetry with operator notifications

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

use llm_relay::{
    clock::SystemClock,
    config::AppConfig,
    notify::{Notifier, TelegramSink},
    proxy::{run_server, RelayState},
    routing::ModelTracker,
    telemetry::UsageTelemetry,
    upstream::{Dispatcher, RetryPolicy, UpstreamClient},
};

#[derive(Parser)]
#[command(name = "llm-relay")]
#[command(version = "0.1.0")]
#[command(about = "Resilient HTTP relay for OpenAI-compatible chat APIs")]
#[command(long_about = "
llm-relay forwards chat completions to an OpenAI-compatible provider and
shields callers from its transient failures:
  - Retries timeouts, network failures and 5xx responses with backoff
  - Falls back to progressively less-preferred models on rate limits
  - Tracks per-route usage and notifies operators of volume spikes

Example usage:
  llm-relay run --config config.yaml
  llm-relay check-config
  llm-relay test-upstream
")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Run {
        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override upstream base URL (e.g., "https://api.openai.com/v1")
        #[arg(long)]
        upstream_url: Option<String>,
    },

    /// Validate configuration file
    CheckConfig,

    /// Test connection to the upstream provider
    TestUpstream,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level_filter = if let Some(level) = cli.log_level {
        level.to_string()
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            .to_string()
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&level_filter))
        .init();

    match cli.command {
        Commands::Run { port, upstream_url } => {
            run_relay(cli.config, port, upstream_url).await?;
        }
        Commands::CheckConfig => {
            check_config(cli.config)?;
        }
        Commands::TestUpstream => {
            test_upstream(cli.config).await?;
        }
    }

    Ok(())
}

/// Wire up every component and run the server
async fn run_relay(
    config_path: PathBuf,
    port_override: Option<u16>,
    upstream_url_override: Option<String>,
) -> anyhow::Result<()> {
    let mut config = load_config_or_exit(&config_path);

    if let Some(port) = port_override {
        config.server.port = port;
    }
    if let Some(url) = upstream_url_override {
        config.upstream.url = url;
    }

    tracing::info!("Loading configuration from {:?}", config_path);
    config.validate()?;

    let clock = Arc::new(SystemClock);

    let upstream = Arc::new(
        UpstreamClient::from_config(&config.upstream).map_err(|e| anyhow::anyhow!(e))?,
    );
    let dispatcher = Arc::new(Dispatcher::new(RetryPolicy::from_config(&config.retry)));

    let tracker = Arc::new(
        ModelTracker::from_config(&config.models, clock.clone())
            .map_err(|e| anyhow::anyhow!(e))?,
    );
    let _sweeper =
        tracker.spawn_sweeper(Duration::from_secs(config.models.sweep_interval_minutes * 60));

    let notifier = if config.notifier.telegram.enabled {
        let sink =
            TelegramSink::from_config(&config.notifier.telegram).map_err(|e| anyhow::anyhow!(e))?;
        tracing::info!("Telegram notifier enabled");
        Notifier::spawn(Arc::new(sink))
    } else {
        tracing::warn!("No notification sink configured; notifications will be logged only");
        Notifier::disabled()
    };

    let telemetry = Arc::new(UsageTelemetry::new(
        &config.telemetry,
        notifier.clone(),
        clock,
    ));
    let _rollup = telemetry.spawn_hourly_rollup();

    tracing::info!(
        models = ?config.models.chain,
        thresholds = ?config.telemetry.thresholds,
        "Relay configured"
    );

    notifier.send(format!(
        "llm-relay started on {}:{}",
        config.server.host, config.server.port
    ));

    let state = RelayState {
        config: Arc::new(config),
        upstream,
        dispatcher,
        tracker,
        telemetry,
    };

    run_server(state).await.map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}

/// Validate configuration file
fn check_config(config_path: PathBuf) -> anyhow::Result<()> {
    match AppConfig::from_file(&config_path).and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => {
            println!("✓ Configuration file is valid\n");
            println!("Server:");
            println!("  Listen: {}:{}", config.server.host, config.server.port);
            println!("\nUpstream:");
            println!("  URL: {}", config.upstream.base_url());
            println!("  API key: {}", if config.upstream.api_key.is_some() { "set" } else { "not set" });
            println!("  Timeout: {}s", config.upstream.timeout_seconds);
            println!("\nRetry:");
            println!("  Max attempts: {}", config.retry.max_attempts);
            println!("  Base delay: {}ms", config.retry.base_delay_ms);
            println!("\nModels:");
            println!("  Chain: {}", config.models.chain.join(" -> "));
            println!("  Default: {}", config.models.default_model);
            println!("  Cooldown: {}h", config.models.cooldown_hours);
            println!("\nTelemetry:");
            println!("  Enabled: {}", config.telemetry.enabled);
            println!("  Thresholds: {:?}", config.telemetry.thresholds);
            println!("  Alert on: {:?}", config.telemetry.alert_on);
            println!("\nNotifier:");
            println!("  Telegram: {}", config.notifier.telegram.enabled);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Test connection to the upstream provider
async fn test_upstream(config_path: PathBuf) -> anyhow::Result<()> {
    let config = load_config_or_exit(&config_path);
    let upstream =
        UpstreamClient::from_config(&config.upstream).map_err(|e| anyhow::anyhow!(e))?;

    println!(
        "Testing connection to upstream: {}/models",
        config.upstream.base_url()
    );

    match upstream.list_models().await {
        Ok(models) => {
            println!("✓ Upstream is reachable");
            println!("  Available models: {}", models.len());
            for model in models.iter().take(5) {
                println!("    - {}", model);
            }

            let known: Vec<&String> = config
                .models
                .chain
                .iter()
                .filter(|m| models.contains(m))
                .collect();
            println!(
                "  Chain models available upstream: {}/{}",
                known.len(),
                config.models.chain.len()
            );
        }
        Err(e) => {
            println!("✗ Failed to reach upstream: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Load configuration or exit with error
fn load_config_or_exit(config_path: &PathBuf) -> AppConfig {
    match AppConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            eprintln!("\nMake sure you have a config.yaml file.");
            eprintln!("You can copy config.yaml.default and modify it:");
            eprintln!("  cp config.yaml.default config.yaml");
            std::process::exit(1);
        }
    }
}
