//! live-logs - replay service and infra log files through the live log pipeline
//!
//! Each file is a JSON-lines feed. Both feeds are published concurrently, the
//! session merges them exactly as a live view would, and the final view is
//! printed once both feeds are exhausted.

mod feed;
mod render;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use live_logs::{
    project_rows, ChannelKind, LiveLogsConfig, LogSession, MemoryTransport, PodColorAssigner,
    PodFilter, SessionDriver, SessionWindow, SubscriptionKey, TimeMode,
};
use tokio::task::JoinSet;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feed::FileFeed;
use render::{render_row, RenderOptions};

#[derive(Parser)]
#[command(name = "live-logs")]
#[command(about = "Replay service and infra log files through the live log pipeline")]
#[command(version)]
struct Cli {
    /// JSON-lines file of service records
    #[arg(long)]
    service_logs: Option<PathBuf>,

    /// JSON-lines file of infra records
    #[arg(long)]
    infra_logs: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, env = "LIVE_LOGS_CONFIG")]
    config: Option<PathBuf>,

    /// Organization identifier
    #[arg(long, default_value = "local")]
    organization: String,

    /// Cluster identifier
    #[arg(long, default_value = "local")]
    cluster: String,

    /// Project identifier
    #[arg(long, default_value = "local")]
    project: String,

    /// Environment identifier
    #[arg(long, default_value = "local")]
    environment: String,

    /// Service identifier
    #[arg(long, default_value = "service")]
    service: String,

    /// Component type, e.g. ingress
    #[arg(long)]
    component: Option<String>,

    /// Session open time in epoch milliseconds (default: now)
    #[arg(long)]
    opened_at: Option<i64>,

    /// Include records older than the session open time
    #[arg(long)]
    show_previous: bool,

    /// Hide infra records
    #[arg(long)]
    hide_infra: bool,

    /// Do not subscribe to infra records at all
    #[arg(long)]
    no_infra: bool,

    /// Render times in UTC
    #[arg(long)]
    utc: bool,

    /// Only show rows of this pod
    #[arg(long)]
    pod: Option<String>,

    /// Highlight this term in messages
    #[arg(long)]
    search: Option<String>,

    /// Milliseconds between replayed lines
    #[arg(long, default_value = "0")]
    delay_ms: u64,

    /// Print rows as JSON lines
    #[arg(long)]
    json: bool,

    /// Print rows in clipboard format
    #[arg(long)]
    copy: bool,

    /// Disable ANSI colors
    #[arg(long)]
    no_color: bool,
}

impl Cli {
    fn subscription_key(&self) -> SubscriptionKey {
        let key = SubscriptionKey::new(
            self.organization.clone(),
            self.cluster.clone(),
            self.project.clone(),
            self.environment.clone(),
            self.service.clone(),
        );
        match &self.component {
            Some(component) => key.with_component(component.clone()),
            None => key,
        }
    }

    async fn load_config(&self) -> Result<LiveLogsConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading config {}", path.display()))?;
                LiveLogsConfig::from_json(&json)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => LiveLogsConfig::default(),
        };

        if self.show_previous {
            config.show_previous = true;
        }
        if self.hide_infra {
            config.show_infra = false;
        }
        if self.no_infra {
            config.infra_logs_enabled = false;
        }
        if self.utc {
            config.time_mode = TimeMode::Utc;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the rendered rows
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("live_logs=info"))?)
        .init();

    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    let time_mode = config.time_mode;
    let transport = MemoryTransport::shared();
    let key = cli.subscription_key();
    let window = cli
        .opened_at
        .map_or_else(SessionWindow::now, SessionWindow::new);

    let session = LogSession::open(config, transport.clone(), Some(key.clone()), window)?;
    let (handle, driver) = SessionDriver::spawn(session);
    let view = handle.subscribe();

    let delay = Duration::from_millis(cli.delay_ms);
    let mut feeds = JoinSet::new();
    for (kind, path) in [
        (ChannelKind::Service, cli.service_logs.clone()),
        (ChannelKind::Infra, cli.infra_logs.clone()),
    ] {
        if let Some(path) = path {
            let feed = FileFeed { kind, path, delay };
            feeds.spawn(feed::replay(feed, Arc::clone(&transport), key.clone()));
        }
    }

    let mut published = 0;
    while let Some(result) = feeds.join_next().await {
        published += result??;
    }
    info!(published, "replay finished");

    // Flush is queued ahead of the channel close, so the driver applies it
    // before it stops.
    handle.flush().await?;
    drop(handle);
    driver.await?;

    let live = view.borrow().clone();
    let rows = project_rows(&live.view, &mut PodColorAssigner::new(), time_mode);
    let filter = cli.pod.clone().map_or_else(PodFilter::any, PodFilter::pod);
    let options = RenderOptions {
        color: !cli.no_color && !cli.json && !cli.copy,
        search: cli.search.clone(),
        show_container: live.view.has_multiple_containers(),
    };

    if live.view.is_placeholder_only() {
        info!("no pods found for this service");
    }

    let mut out = io::stdout().lock();
    for row in filter.apply(&rows) {
        if cli.json {
            writeln!(out, "{}", serde_json::to_string(row)?)?;
        } else if cli.copy {
            writeln!(out, "{}", row.copy_text())?;
        } else {
            writeln!(out, "{}", render_row(row, &options))?;
        }
    }
    out.flush()?;
    Ok(())
}
