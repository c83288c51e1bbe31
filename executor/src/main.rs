use anyhow::Result;
use clap::Parser;
use kubently_common::shutdown::shutdown_signal;
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use crate::app::App;

mod app;
mod args;
mod exec;
mod result_client;
mod status;
mod stream;
mod validate;
mod whitelist;

#[tokio::main]
pub async fn main() -> Result<()> {
    kubently_common::init();
    let args = args::ExecutorArgs::parse();

    let initial = match whitelist::load_from_path(&args.whitelist_config_path) {
        Ok(whitelist) => whitelist,
        Err(e) => {
            kubently_common::response::print_warning(anyhow::anyhow!(
                "failed to load whitelist from {}: {e}; starting in readOnly mode",
                args.whitelist_config_path.display()
            ));
            whitelist::Whitelist::default_read_only()
        }
    };
    println!(
        "{}",
        format!(
            "🚀 kubently-executor starting: cluster_id={} coordinator={} mode={}",
            args.cluster_id, args.coordinator_url, initial.mode
        )
        .cyan()
    );

    let app = App::new(args.clone(), initial);
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel_clone.cancel();
    });

    spawn_whitelist_reloader(&app, &args, cancel.clone());

    let stream_app = app.clone();
    let stream_cancel = cancel.clone();
    let stream_task = tokio::spawn(async move {
        stream::run(stream_app, stream_cancel).await;
    });

    status::run(app.clone(), args.status_port, cancel).await?;
    stream_task.abort();
    println!("{}", "🛑 kubently-executor shut down gracefully.".red());
    Ok(())
}

fn spawn_whitelist_reloader(app: &App, args: &args::ExecutorArgs, cancel: CancellationToken) {
    let app = app.clone();
    let path = args.whitelist_config_path.clone();
    let interval = args.whitelist_reload_interval_seconds.max(1);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval));
        ticker.tick().await; // the first snapshot was already loaded at startup
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match whitelist::load_from_path(&path) {
                        Ok(fresh) => {
                            app.whitelist.replace(fresh);
                        }
                        Err(e) => {
                            kubently_common::response::print_warning(anyhow::anyhow!(
                                "whitelist reload failed, keeping previous snapshot: {e}"
                            ));
                        }
                    }
                }
            }
        }
    });
}
