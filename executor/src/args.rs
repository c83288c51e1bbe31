use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ExecutorArgs {
    #[arg(long, env = "COORDINATOR_URL")]
    pub coordinator_url: String,

    #[arg(long, env = "CLUSTER_ID")]
    pub cluster_id: String,

    #[arg(long, env = "EXECUTOR_TOKEN")]
    pub executor_token: String,

    #[arg(long, env = "KUBECTL_PATH", default_value = "kubectl")]
    pub kubectl_path: String,

    #[arg(long, env = "WHITELIST_CONFIG_PATH", default_value = "/etc/kubently/whitelist.yaml")]
    pub whitelist_config_path: PathBuf,

    #[arg(long, env = "WHITELIST_RELOAD_INTERVAL_SECONDS", default_value_t = 30)]
    pub whitelist_reload_interval_seconds: u64,

    /// Bounded concurrency for dispatched commands (§4.4 step 2).
    #[arg(long, env = "MAX_CONCURRENT_COMMANDS", default_value_t = 4)]
    pub max_concurrent_commands: usize,

    #[arg(long, env = "PING_INTERVAL_SECONDS", default_value_t = 15)]
    pub ping_interval_seconds: u64,

    /// Local health/status server, separate from coordinator traffic.
    #[arg(long, env = "STATUS_PORT", default_value_t = 8081)]
    pub status_port: u16,
}
