//! OpenClaw Dashboard - Rust Implementation
//!
//! Backend and terminal front-end for the OpenClaw status dashboard: a caching
//! proxy over the `openclaw` CLI, a webhook/key-value API for edge
//! deployments, and a polling client.

mod analytics;
mod cache;
mod cli;
mod config;
mod error;
mod ingest;
mod kv;
mod mock;
mod models;
mod poller;
mod proxy;
mod tui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{CommandRunner, OpenClawCli};
use crate::config::Config;
use crate::kv::{KvStore, MemoryKv, SqliteKv};
use crate::models::Resource;
use crate::poller::{DashboardPoller, HttpSource};

// Terminal colors
const ACCENT_RED: &str = "\x1b[38;5;203m";
const ACCENT_BLUE: &str = "\x1b[38;5;117m";
const OK_CYAN: &str = "\x1b[38;5;51m";
const WARN_AMBER: &str = "\x1b[38;5;214m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

/// How often edge mode deletes expired history entries.
const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Parser)]
#[command(name = "openclaw-dashboard")]
#[command(about = "Status dashboard for OpenClaw sessions, cron jobs and gateway health")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the CLI-backed API and the built front-end
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory holding the built front-end
        #[arg(long)]
        dist: Option<PathBuf>,
    },

    /// Serve the webhook and status API over a key-value store
    Edge {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// SQLite database file
        #[arg(long, conflicts_with = "memory")]
        db: Option<PathBuf>,

        /// Keep data in memory only
        #[arg(long)]
        memory: bool,
    },

    /// Interactive live dashboard
    Watch {
        /// API base URL to poll
        #[arg(long)]
        api: Option<String>,

        /// Show embedded sample data instead of polling
        #[arg(long)]
        mock: bool,

        /// Seconds between polls
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Poll once and print the result
    Snapshot {
        /// API base URL to poll
        #[arg(long)]
        api: Option<String>,

        /// Show embedded sample data instead of polling
        #[arg(long)]
        mock: bool,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Collect data through the CLI and send it to a webhook
    Push {
        /// Webhook URL
        #[arg(long)]
        url: Option<String>,

        /// Bearer token for the webhook
        #[arg(long)]
        secret: Option<String>,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Initialize default configuration file
        #[arg(short, long)]
        init: bool,
    },

    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The terminal dashboard owns stdout
    if !matches!(cli.command, Commands::Watch { .. }) {
        let level = if cli.debug {
            "debug"
        } else if cli.verbose {
            "info"
        } else {
            "warn"
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }

    let config_path = cli.config;
    match cli.command {
        Commands::Serve { host, port, dist } => {
            let mut config = Config::resolve(config_path.as_deref())?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(dist) = dist {
                config.dist_dir = dist;
            }
            run_serve(config).await?;
        }
        Commands::Edge {
            host,
            port,
            db,
            memory,
        } => {
            let mut config = Config::resolve(config_path.as_deref())?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(db) = db {
                config.kv_db_path = db;
            }
            run_edge(config, memory).await?;
        }
        Commands::Watch {
            api,
            mock,
            interval,
        } => {
            let mut config = Config::resolve(config_path.as_deref())?;
            if let Some(api) = api {
                config.api_base = api;
            }
            if let Some(interval) = interval {
                config.poll_interval_secs = interval;
            }
            config.use_mock |= mock;
            run_watch(config).await?;
        }
        Commands::Snapshot { api, mock, json } => {
            let mut config = Config::resolve(config_path.as_deref())?;
            if let Some(api) = api {
                config.api_base = api;
            }
            config.use_mock |= mock;
            run_snapshot(config, json).await?;
        }
        Commands::Push { url, secret } => {
            let mut config = Config::resolve(config_path.as_deref())?;
            if let Some(url) = url {
                config.webhook_url = Some(url);
            }
            if let Some(secret) = secret {
                config.webhook_secret = Some(secret).filter(|s| !s.is_empty());
            }
            run_push(config).await?;
        }
        Commands::Config { show, init } => {
            manage_config(config_path, show, init)?;
        }
        Commands::Version => {
            print_version();
        }
    }

    Ok(())
}

fn print_version() {
    println!(
        "  {}🦞{} {}OpenClaw Dashboard{} {}v{}{}",
        ACCENT_RED, RESET, BOLD, RESET, ACCENT_BLUE, env!("CARGO_PKG_VERSION"), RESET
    );
}

fn print_banner(title: &str, lines: &[(&str, String)]) {
    println!();
    println!("  {}🦞{} {}{}{}", ACCENT_RED, RESET, BOLD, title, RESET);
    for (label, value) in lines {
        println!("     {}{:<8}{} {}", DIM, label, RESET, value);
    }
    println!();
    println!("  {}Press Ctrl+C to stop{}", DIM, RESET);
    println!();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    println!("  {}✦ Shutting down...{}", ACCENT_BLUE, RESET);
}

async fn run_serve(config: Config) -> Result<()> {
    let cli = OpenClawCli::new(config.cli_binary.clone());
    let binary = cli.binary().to_string();
    let runner: Arc<dyn CommandRunner> = Arc::new(cli);
    let state = proxy::ProxyState::new(runner, config.dist_dir.clone());
    let app = proxy::router(state.clone());

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("binding {}:{}", config.host, config.port))?;
    let base = format!("http://{}:{}", config.host, config.port);

    if !state.dist_dir().join("index.html").exists() {
        warn!(
            "No index.html in {:?}; only the API will be useful",
            state.dist_dir()
        );
    }
    print_banner(
        "OpenClaw Dashboard Server",
        &[
            ("Local:", base.clone()),
            ("API:", format!("{}/api/sessions", base)),
            ("CLI:", binary),
        ],
    );
    info!("Proxy listening on {}", base);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.dispose().await;
    Ok(())
}

async fn run_edge(config: Config, memory: bool) -> Result<()> {
    let sqlite = if memory {
        None
    } else {
        Some(SqliteKv::open(&config.kv_db_path).await?)
    };
    let store: Arc<dyn KvStore> = match &sqlite {
        Some(kv) => Arc::new(kv.clone()),
        None => Arc::new(MemoryKv::new()),
    };

    let history = store.list_keys(ingest::HISTORY_PREFIX).await?.len();
    info!("{} history snapshots retained", history);

    if config.webhook_secret.is_none() {
        warn!("WEBHOOK_SECRET is not set; /api/webhook accepts unauthenticated writes");
    }

    let purge_task = kv::spawn_purge_task(store.clone(), PURGE_INTERVAL);

    let state = ingest::IngestState::new(Some(store), config.webhook_secret.clone());
    let app = ingest::router(state);

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("binding {}:{}", config.host, config.port))?;
    let base = format!("http://{}:{}", config.host, config.port);
    let storage = match &sqlite {
        Some(_) => format!("{:?}", config.kv_db_path),
        None => "in memory".to_string(),
    };
    let auth = if config.webhook_secret.is_some() {
        format!("{}bearer token{}", OK_CYAN, RESET)
    } else {
        format!("{}open (no WEBHOOK_SECRET){}", WARN_AMBER, RESET)
    };
    print_banner(
        "OpenClaw Dashboard Edge API",
        &[
            ("Status:", format!("{}/api/status", base)),
            ("Webhook:", format!("{}/api/webhook", base)),
            ("Store:", storage),
            ("Auth:", auth),
        ],
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purge_task.abort();
    if let Some(kv) = sqlite {
        kv.close().await;
    }
    Ok(())
}

fn build_poller(config: &Config) -> Result<DashboardPoller> {
    let source = HttpSource::new(config.api_base.clone())?;
    Ok(DashboardPoller::new(
        Arc::new(source),
        Duration::from_secs(config.poll_interval_secs.max(1)),
        config.use_mock,
    ))
}

async fn run_watch(config: Config) -> Result<()> {
    let handle = build_poller(&config)?.spawn();
    tui::run_tui(handle, config.use_mock).await
}

async fn run_snapshot(config: Config, json_output: bool) -> Result<()> {
    let mut poller = build_poller(&config)?;
    let snapshot = poller.refresh().await.clone();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let Some(data) = &snapshot.data else {
        bail!("no dashboard data available");
    };
    let sessions = &data.sessions.sessions;
    let totals = analytics::token_totals(sessions);
    let cron = analytics::cron_summary(&data.cron.jobs);

    println!(
        "{}╭──────────────── 🦞 OpenClaw Dashboard ────────────────╮{}",
        ACCENT_BLUE, RESET
    );
    println!("{}│{}  state:     {:?}", ACCENT_BLUE, RESET, snapshot.state);
    if let Some(error) = &snapshot.error {
        println!("{}│{}  error:     {}{}{}", ACCENT_BLUE, RESET, ACCENT_RED, error, RESET);
    }
    println!(
        "{}│{}  sessions:  {} total, {} active",
        ACCENT_BLUE,
        RESET,
        data.sessions.count,
        analytics::active_count(sessions)
    );
    println!(
        "{}│{}  tokens:    {} (in {} / out {}), est. ${:.2}",
        ACCENT_BLUE,
        RESET,
        analytics::format_tokens(totals.total),
        analytics::format_tokens(totals.input),
        analytics::format_tokens(totals.output),
        analytics::estimated_cost(sessions)
    );
    println!(
        "{}│{}  cron:      {}/{} enabled, {} failing",
        ACCENT_BLUE, RESET, cron.enabled, cron.total, cron.erroring
    );
    for item in analytics::status_items(&data.status) {
        println!(
            "{}│{}  {:<10} {} {}({}){}",
            ACCENT_BLUE,
            RESET,
            format!("{}:", item.label.to_lowercase()),
            item.value,
            DIM,
            item.detail,
            RESET
        );
    }
    println!(
        "{}╰───────────────────────────────────────────────────────╯{}",
        ACCENT_BLUE, RESET
    );

    let now = Utc::now().timestamp_millis();
    for job in analytics::jobs_by_next_run(&data.cron.jobs) {
        let marker = if job.has_errors() {
            format!("{}✗{}", ACCENT_RED, RESET)
        } else {
            format!("{}●{}", OK_CYAN, RESET)
        };
        let next = job
            .state
            .next_run_at_ms
            .map(|at| analytics::format_relative(at.saturating_sub(now)))
            .unwrap_or_else(|| "---".to_string());
        let payload: String = job.payload.summary().chars().take(40).collect();
        println!(
            "  {} {:<36} {:<12} {:<8} {}{}{}",
            marker,
            job.name,
            analytics::describe_schedule(&job.schedule),
            next,
            DIM,
            payload,
            RESET
        );
    }

    Ok(())
}

async fn run_push(config: Config) -> Result<()> {
    let Some(url) = config.webhook_url.clone() else {
        bail!("no webhook URL; pass --url or set DASHBOARD_WEBHOOK_URL");
    };

    let runner = OpenClawCli::new(config.cli_binary.clone());
    let mut payload = serde_json::Map::new();
    for resource in Resource::ALL {
        let value = runner
            .run(resource.cli_args())
            .await
            .with_context(|| format!("collecting {}", resource))?;
        payload.insert(resource.cache_key().to_string(), value);
    }
    payload.insert(
        "exportedAt".to_string(),
        json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );

    let client = reqwest::Client::builder()
        .timeout(poller::REQUEST_TIMEOUT)
        .build()?;
    let mut request = client.post(&url).json(&payload);
    if let Some(secret) = &config.webhook_secret {
        request = request.bearer_auth(secret);
    }

    let response = request.send().await.with_context(|| format!("posting to {}", url))?;
    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);
    if !status.is_success() {
        bail!("webhook rejected push ({}): {}", status, body);
    }

    println!(
        "  {}● Pushed{} sessions, cron and status to {} {}({}){}",
        OK_CYAN,
        RESET,
        url,
        DIM,
        body["timestamp"].as_str().unwrap_or("no timestamp"),
        RESET
    );
    Ok(())
}

fn manage_config(path: Option<PathBuf>, show: bool, init: bool) -> Result<()> {
    let config_path = path.unwrap_or_else(Config::default_path);

    if init {
        if config_path.exists() {
            bail!("{} already exists", config_path.display());
        }
        Config::default().save(&config_path)?;
        println!(
            "{}✦ Configuration created at {}{}",
            OK_CYAN,
            config_path.display(),
            RESET
        );
        if !show {
            return Ok(());
        }
    }

    if !config_path.exists() {
        println!("{}✦ No config file found, showing defaults{}", DIM, RESET);
    }
    let config = Config::resolve(config_path.exists().then_some(config_path.as_path()))?;
    println!("{}", serde_json::to_string_pretty(&config.redacted())?);

    Ok(())
}
