use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser};
use docket_server::config::ServerConfig;
use docket_server::{AppState, router};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "docket-server", version, about = "HTTP API for docket task lists")]
struct ServerCli {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the configured bind address.
    #[arg(long)]
    bind: Option<String>,

    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    quiet: u8,
}

fn init_tracing(verbose: u8, quiet: u8) {
    let default_level = match (verbose, quiet) {
        (_, q) if q > 0 => "warn",
        (0, _) => "info,docket_server=debug",
        (1, _) => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_line_number(true))
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = ServerCli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let mut cfg = ServerConfig::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        cfg.bind = bind;
    }

    let state = Arc::new(AppState::new(&cfg)?);
    let app = router(state);

    let listener = TcpListener::bind(&cfg.bind)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind))?;
    info!(bind = %cfg.bind, data_dir = %cfg.data_dir.display(), "docket server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("docket server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
