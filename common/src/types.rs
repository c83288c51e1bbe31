//! Wire types shared between the coordinator and the executor. Both sides
//! serialize these to identical JSON, so they live here rather than in
//! either binary crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single queued unit of work, targeted at one cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    pub cluster_id: String,
    /// First element is the verb (`get`, `describe`, `logs`, ...).
    pub args: Vec<String>,
    pub namespace: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
    pub queued_at: DateTime<Utc>,
    pub session_id: Option<String>,
    pub correlation_id: Option<String>,
    pub priority: Option<i32>,
}

pub fn default_timeout_seconds() -> u32 {
    10
}

pub const MAX_COMMAND_TIMEOUT_SECONDS: u32 = 30;

impl Command {
    pub fn verb(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Short-lived record letting a result consumer discover which cluster a
/// command id was dispatched to, keyed `command:tracking:{command_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandTracking {
    pub cluster_id: String,
    pub queued_at: DateTime<Utc>,
}

/// The outcome of executing one [`Command`]. Written once, by exactly one
/// executor, and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    #[serde(default)]
    pub output: String,
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    pub execution_time_ms: u64,
    pub stored_at: DateTime<Utc>,
}

impl CommandResult {
    pub fn validation_failure(reason: impl std::fmt::Display) -> Self {
        CommandResult {
            success: false,
            output: String::new(),
            error: Some(format!("Command validation failed: {reason}")),
            exit_code: None,
            execution_time_ms: 0,
            stored_at: Utc::now(),
        }
    }

    pub fn timed_out(timeout_seconds: u32) -> Self {
        CommandResult {
            success: false,
            output: String::new(),
            error: Some(format!("Command timed out after {timeout_seconds} seconds")),
            exit_code: None,
            execution_time_ms: u64::from(timeout_seconds) * 1000,
            stored_at: Utc::now(),
        }
    }
}

/// A time-bounded debugging context against one cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub cluster_id: String,
    pub user_id: Option<String>,
    pub service_identity: Option<String>,
    pub correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub command_count: u64,
    pub ttl_seconds: u32,
}

pub const MIN_SESSION_TTL_SECONDS: u32 = 60;
pub const MAX_SESSION_TTL_SECONDS: u32 = 3600;
pub const DEFAULT_SESSION_TTL_SECONDS: u32 = 300;

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub cluster_id: String,
    pub user_id: Option<String>,
    pub service_identity: Option<String>,
    pub correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub command_count: u64,
    pub ttl_seconds: u32,
}

impl From<Session> for SessionResponse {
    fn from(s: Session) -> Self {
        SessionResponse {
            session_id: s.session_id,
            cluster_id: s.cluster_id,
            user_id: s.user_id,
            service_identity: s.service_identity,
            correlation_id: s.correlation_id,
            created_at: s.created_at,
            last_activity: s.last_activity,
            command_count: s.command_count,
            ttl_seconds: s.ttl_seconds,
        }
    }
}

/// One of the three security modes the executor's whitelist can run under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecurityMode {
    ReadOnly,
    ExtendedReadOnly,
    FullAccess,
}

impl Default for SecurityMode {
    fn default() -> Self {
        SecurityMode::ReadOnly
    }
}

impl std::fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SecurityMode::ReadOnly => "readOnly",
            SecurityMode::ExtendedReadOnly => "extendedReadOnly",
            SecurityMode::FullAccess => "fullAccess",
        };
        f.write_str(s)
    }
}

/// Advertised by the executor's `/agent/status` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub cluster_id: String,
    pub is_active: bool,
    pub queue_depth: i64,
    pub mode: SecurityMode,
    pub version: String,
}

/// A queued/connected SSE event kind on `/executor/stream`. The coordinator
/// writes each variant as its own named SSE event (`event: command`, ...)
/// with the variant's payload as the raw `data:` JSON, rather than
/// serializing the enum itself — see `server::agent::stream`.
#[derive(Debug, Clone, Serialize)]
pub enum StreamEvent {
    Connected { heartbeat_id: u64 },
    Command(Command),
    Ping { heartbeat_id: u64 },
    Error { message: String },
}

impl StreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Connected { .. } => "connected",
            StreamEvent::Command(_) => "command",
            StreamEvent::Ping { .. } => "ping",
            StreamEvent::Error { .. } => "error",
        }
    }
}

/// Asynchronous execute-path handle, returned by `/debug/execute/async`.
#[derive(Debug, Clone, Serialize)]
pub struct OperationResponse {
    pub operation_id: String,
    pub status: OperationStatus,
    pub poll_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Success,
    Failure,
    Timeout,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationStatusResponse {
    pub operation_id: String,
    pub status: OperationStatus,
    pub result: Option<CommandResult>,
}

/// A caller's verified identity, produced by the auth layer (§4.1) and
/// threaded through request extensions by the auth middleware.
#[derive(Debug, Clone, Serialize)]
pub struct CallerIdentity {
    pub identity: String,
    pub method: AuthMethod,
    pub permissions: Permissions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Jwt,
    ApiKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permissions {
    HumanUser,
    ServiceAccount,
}

/// One structured entry in the auth audit ring buffer (`api:audit`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub method: Option<AuthMethod>,
    pub identity: Option<String>,
    pub verdict: AuditVerdict,
    pub correlation_id: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditVerdict {
    Accepted,
    Rejected,
}

impl AuditRecord {
    pub fn new(verdict: AuditVerdict) -> Self {
        AuditRecord {
            timestamp: Utc::now(),
            method: None,
            identity: None,
            verdict,
            correlation_id: None,
            detail: None,
        }
    }
}

pub fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn new_command_id() -> String {
    Uuid::new_v4().to_string()
}
