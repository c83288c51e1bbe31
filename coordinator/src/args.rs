use clap::{Parser, Subcommand};
use kubently_common::args::{ApiKeyArgs, OidcArgs, RedisArgs};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Server(ServerArgs),
}

#[derive(Debug, Clone, clap::Args)]
pub struct ServerArgs {
    #[command(flatten)]
    pub redis: RedisArgs,

    #[command(flatten)]
    pub api_keys: ApiKeyArgs,

    #[command(flatten)]
    pub oidc: OidcArgs,

    /// Bind address; client + executor roles share this host/port.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "SESSION_TTL_SECONDS", default_value_t = 300)]
    pub session_ttl_seconds: u32,

    #[arg(long, env = "COMMAND_TIMEOUT_SECONDS", default_value_t = 10)]
    pub command_timeout_seconds: u32,

    #[arg(long, env = "RESULT_TTL_SECONDS", default_value_t = 60)]
    pub result_ttl_seconds: u32,

    #[arg(long, env = "MAX_COMMANDS_PER_FETCH", default_value_t = 10)]
    pub max_commands_per_fetch: i64,

    #[arg(long, env = "LONG_POLL_TIMEOUT_SECONDS", default_value_t = 30)]
    pub long_poll_timeout_seconds: u32,

    #[arg(long, env = "PING_INTERVAL_SECONDS", default_value_t = 15)]
    pub ping_interval_seconds: u64,

    /// Advertised URL for the LLM reasoning loop / A2A transport boundary.
    /// Not served by this crate; passed through to the discovery document
    /// and status endpoints for consumers outside the command-dispatch core.
    #[arg(long, env = "A2A_EXTERNAL_URL")]
    pub a2a_external_url: Option<String>,
}
