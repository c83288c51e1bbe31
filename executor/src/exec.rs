//! Safe subprocess execution (§4.4 step 4). Always exec with an argv list,
//! never through a shell; timeout is enforced with `kill_on_drop` so the
//! child is reaped the instant the timeout future is dropped, with no need
//! to keep a handle around after the fact.

use std::process::Stdio;
use std::time::{Duration, Instant};

use chrono::Utc;
use kubently_common::types::{Command, CommandResult};
use tokio::process::Command as TokioCommand;

use crate::whitelist::MAX_TIMEOUT_SECONDS;

pub async fn run(command: &Command, kubectl_path: &str) -> CommandResult {
    let started = Instant::now();
    let timeout_secs = command.timeout_seconds.min(MAX_TIMEOUT_SECONDS).max(1);
    let timeout = Duration::from_secs(u64::from(timeout_secs));

    let mut cmd = TokioCommand::new(kubectl_path);
    cmd.args(&command.args);
    if let Some(namespace) = &command.namespace {
        cmd.arg("-n").arg(namespace);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return CommandResult {
                success: false,
                output: String::new(),
                error: Some(format!("failed to spawn {kubectl_path}: {e}")),
                exit_code: None,
                execution_time_ms: elapsed_ms(started),
                stored_at: Utc::now(),
            };
        }
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => build_result(output, started),
        Ok(Err(e)) => CommandResult {
            success: false,
            output: String::new(),
            error: Some(format!("failed to run {kubectl_path}: {e}")),
            exit_code: None,
            execution_time_ms: elapsed_ms(started),
            stored_at: Utc::now(),
        },
        Err(_elapsed) => CommandResult::timed_out(timeout_secs),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn build_result(output: std::process::Output, started: Instant) -> CommandResult {
    let execution_time_ms = elapsed_ms(started);
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        CommandResult {
            success: true,
            output: stdout,
            error: None,
            exit_code: output.status.code(),
            execution_time_ms,
            stored_at: Utc::now(),
        }
    } else {
        CommandResult {
            success: false,
            output: stdout,
            error: Some(String::from_utf8_lossy(&output.stderr).into_owned()),
            exit_code: output.status.code(),
            execution_time_ms,
            stored_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc as ChronoUtc;

    fn command(args: Vec<&str>, timeout_seconds: u32) -> Command {
        Command {
            id: "cmd-1".to_string(),
            cluster_id: "cluster-a".to_string(),
            args: args.into_iter().map(String::from).collect(),
            namespace: None,
            timeout_seconds,
            queued_at: ChronoUtc::now(),
            session_id: None,
            correlation_id: None,
            priority: None,
        }
    }

    #[tokio::test]
    async fn spawn_failure_yields_a_failure_result_not_a_panic() {
        let result = run(&command(vec!["does-not-exist-anywhere"], 5), "definitely-not-a-real-binary").await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("failed to spawn"));
    }

    #[tokio::test]
    async fn timeout_produces_timed_out_result() {
        let result = run(&command(vec!["3"], 1), "sleep").await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Command timed out"));
    }
}
