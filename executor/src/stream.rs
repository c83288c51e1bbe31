//! Stream receiver loop (§4.4): SSE primary path, long-poll fallback, bounded
//! worker dispatch, reconnect with exponential backoff + jitter.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use kubently_common::types::{Command, CommandResult};
use owo_colors::OwoColorize;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::app::{App, REQUEST_TIMEOUT};
use crate::{exec, result_client, validate};

const MIN_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

pub async fn run(app: App, cancel: CancellationToken) {
    let mut backoff = MIN_BACKOFF;
    while !cancel.is_cancelled() {
        match cycle(&app, &cancel).await {
            Ok(()) => backoff = MIN_BACKOFF,
            Err(e) => {
                kubently_common::response::print_warning(anyhow::anyhow!("stream cycle failed: {e}"));
            }
        }
        if cancel.is_cancelled() {
            return;
        }
        let jitter = Duration::from_millis((rand::random::<f64>() * backoff.as_millis() as f64 * 0.2) as u64);
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(backoff + jitter) => {}
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

async fn cycle(app: &App, cancel: &CancellationToken) -> anyhow::Result<()> {
    let is_active = fetch_status(app).await.unwrap_or(false);
    match open_sse_stream(app, cancel).await {
        Ok(()) => Ok(()),
        Err(e) => {
            kubently_common::response::print_warning(anyhow::anyhow!(
                "SSE stream unavailable ({e}), falling back to long-poll"
            ));
            long_poll_once(app, cancel, is_active).await
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    is_active: bool,
}

async fn fetch_status(app: &App) -> anyhow::Result<bool> {
    let url = format!("{}/agent/status", app.args.coordinator_url.trim_end_matches('/'));
    let whitelist = app.whitelist.snapshot();
    let status: StatusResponse = app
        .client
        .get(url)
        .header("X-Cluster-ID", &app.args.cluster_id)
        .bearer_auth(&app.args.executor_token)
        .timeout(REQUEST_TIMEOUT)
        .query(&[("mode", whitelist.mode.to_string()), ("version", env!("CARGO_PKG_VERSION").to_string())])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(status.is_active)
}

async fn open_sse_stream(app: &App, cancel: &CancellationToken) -> anyhow::Result<()> {
    let url = format!("{}/executor/stream", app.args.coordinator_url.trim_end_matches('/'));
    let response = app
        .client
        .get(&url)
        .header("X-Cluster-ID", &app.args.cluster_id)
        .bearer_auth(&app.args.executor_token)
        .header("Accept", "text/event-stream")
        .send()
        .await?
        .error_for_status()?;

    println!("{}", format!("📡 connected to {url}").green());

    let mut body = response.bytes_stream();
    let mut buf = String::new();
    let semaphore = Arc::new(Semaphore::new(app.args.max_concurrent_commands));

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let next = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            chunk = body.next() => chunk,
        };
        let Some(chunk) = next else {
            return Ok(());
        };
        buf.push_str(&String::from_utf8_lossy(&chunk?));
        while let Some(idx) = buf.find("\n\n") {
            let raw_event = buf[..idx].to_string();
            buf.drain(..idx + 2);
            if let Some((event, data)) = parse_sse_event(&raw_event) {
                handle_event(app, &semaphore, &event, &data);
            }
        }
    }
}

fn parse_sse_event(raw: &str) -> Option<(String, String)> {
    let mut event = String::from("message");
    let mut data_lines = Vec::new();
    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim().to_string());
        }
    }
    if data_lines.is_empty() {
        return None;
    }
    Some((event, data_lines.join("\n")))
}

fn handle_event(app: &App, semaphore: &Arc<Semaphore>, event: &str, data: &str) {
    match event {
        "command" => {
            let command: Command = match serde_json::from_str(data) {
                Ok(command) => command,
                Err(e) => {
                    kubently_common::response::print_warning(anyhow::anyhow!("malformed command payload: {e}"));
                    return;
                }
            };
            spawn_dispatch(app, semaphore, command);
        }
        "error" => {
            kubently_common::response::print_warning(anyhow::anyhow!("coordinator reported stream error: {data}"));
        }
        _ => {}
    }
}

fn spawn_dispatch(app: &App, semaphore: &Arc<Semaphore>, command: Command) {
    let app = app.clone();
    let semaphore = semaphore.clone();
    tokio::spawn(async move {
        let _permit = match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        dispatch(&app, command).await;
    });
}

async fn dispatch(app: &App, command: Command) {
    let whitelist = app.whitelist.snapshot();
    let result = match validate::validate(&whitelist, &command) {
        Ok(()) => exec::run(&command, &app.args.kubectl_path).await,
        Err(reason) => {
            println!("{}", format!("⚠ rejected {}: {reason}", command.id).yellow());
            CommandResult::validation_failure(reason)
        }
    };
    if let Err(e) = result_client::submit(app, &command.id, result).await {
        kubently_common::response::print_warning(anyhow::anyhow!(
            "failed to submit result for {}: {e}",
            command.id
        ));
    }
}

#[derive(Debug, Deserialize)]
struct CommandBatch {
    #[serde(default)]
    commands: Vec<Command>,
}

async fn long_poll_once(app: &App, cancel: &CancellationToken, is_active: bool) -> anyhow::Result<()> {
    let wait = if is_active { 1.0 } else { 20.0 };
    let url = format!("{}/agent/commands", app.args.coordinator_url.trim_end_matches('/'));
    let response = app
        .client
        .get(url)
        .header("X-Cluster-ID", &app.args.cluster_id)
        .bearer_auth(&app.args.executor_token)
        .timeout(Duration::from_secs_f64(wait) + REQUEST_TIMEOUT)
        .query(&[("wait", wait)])
        .send()
        .await?;
    if response.status() == reqwest::StatusCode::NO_CONTENT {
        return Ok(());
    }
    let batch: CommandBatch = response.error_for_status()?.json().await?;
    let semaphore = Arc::new(Semaphore::new(app.args.max_concurrent_commands));
    for command in batch.commands {
        if cancel.is_cancelled() {
            break;
        }
        spawn_dispatch(app, &semaphore, command);
    }
    Ok(())
}
