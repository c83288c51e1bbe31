//! Post a command's result back to the coordinator (§4.4 step 5): at most
//! one retry on transport errors, never on an application-level 4xx.

use kubently_common::types::CommandResult;
use serde::Serialize;

use crate::app::{App, REQUEST_TIMEOUT};

#[derive(Serialize)]
struct SubmitResultRequest<'a> {
    command_id: &'a str,
    result: &'a CommandResult,
}

pub async fn submit(app: &App, command_id: &str, result: CommandResult) -> Result<(), reqwest::Error> {
    let url = format!("{}/agent/results", app.args.coordinator_url.trim_end_matches('/'));
    let body = SubmitResultRequest { command_id, result: &result };
    match post_once(app, &url, &body).await {
        Ok(()) => Ok(()),
        Err(e) if is_transport_error(&e) => post_once(app, &url, &body).await,
        Err(e) => Err(e),
    }
}

fn is_transport_error(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout() || e.is_request()
}

async fn post_once(app: &App, url: &str, body: &SubmitResultRequest<'_>) -> Result<(), reqwest::Error> {
    app.client
        .post(url)
        .header("X-Cluster-ID", &app.args.cluster_id)
        .bearer_auth(&app.args.executor_token)
        .timeout(REQUEST_TIMEOUT)
        .json(body)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}
