use anyhow::{Context, Result};
use clap::Parser;
use kubently_common::shutdown::shutdown_signal;
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use crate::app::App;

mod agent_meta;
mod app;
mod args;
mod auth;
mod clusters;
mod error;
mod push;
mod queue;
mod server;
mod session;
mod validation;

#[tokio::main]
pub async fn main() -> Result<()> {
    kubently_common::init();
    let cli = args::Cli::parse();
    match cli.command {
        args::Commands::Server(args) => run_server(args).await,
    }
}

async fn run_server(args: args::ServerArgs) -> Result<()> {
    kubently_common::metrics::maybe_spawn_metrics_server();
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel_clone.cancel();
    });

    let pool = kubently_common::redis::init_redis(&args.redis).await;
    let host = args.host.clone();
    let port = args.port;
    let app_state = App::new(pool, args);

    let cleanup_cancel = cancel.clone();
    let cleanup_pool = app_state.pool.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = cleanup_cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = session::cleanup_expired(&cleanup_pool).await {
                        kubently_common::response::print_warning(anyhow::anyhow!("session cleanup sweep failed: {e}"));
                    }
                }
            }
        }
    });

    server::run_server(cancel, &host, port, app_state)
        .await
        .context("coordinator server task failed")?;
    println!("{}", "🛑 kubently-coordinator shut down gracefully.".red());
    Ok(())
}
