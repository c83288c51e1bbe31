use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use deadpool_redis::Pool;
use futures_util::StreamExt;
use owo_colors::OwoColorize;
use tokio::sync::{Mutex, broadcast};

type Registry = Arc<Mutex<HashMap<String, broadcast::Sender<()>>>>;

/// Coordinator-side half of the push fabric (§4.3). One background task owns
/// a single Redis pub/sub connection pattern-subscribed to
/// `executor:commands:*`; fan-out to the many per-cluster SSE streams held
/// in-process happens over in-memory broadcast channels, so opening streams
/// for N clusters never costs more than one state-store connection.
#[derive(Clone)]
pub struct PushFabric {
    #[allow(dead_code)]
    pool: Pool,
    registry: Registry,
}

impl PushFabric {
    pub fn new(pool: Pool) -> Self {
        PushFabric {
            pool,
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Starts the shared subscriber loop. Reconnects with backoff on
    /// disconnect; never gives up.
    pub fn spawn(&self, redis_url: String) {
        let registry = self.registry.clone();
        tokio::spawn(async move {
            let mut attempt = 0usize;
            loop {
                match run_subscriber(&redis_url, registry.clone()).await {
                    Ok(()) => {}
                    Err(e) => {
                        eprintln!(
                            "{}",
                            format!("⚠️  push fabric subscriber lost connection: {e:#}").yellow()
                        );
                    }
                }
                let delay = kubently_common::wait::backoff_full_jitter(
                    Duration::from_millis(200),
                    Duration::from_secs(10),
                    attempt,
                );
                attempt = attempt.saturating_add(1);
                tokio::time::sleep(delay).await;
            }
        });
    }

    /// Registers interest in `cluster_id`'s notification channel. The
    /// returned receiver fires once per push to that cluster's queue;
    /// callers are expected to still do a non-blocking drain on open and
    /// periodically, since a lagged receiver only guarantees "at least one"
    /// wake-up, not one-per-command.
    pub async fn subscribe(&self, cluster_id: &str) -> broadcast::Receiver<()> {
        let mut reg = self.registry.lock().await;
        let sender = reg
            .entry(cluster_id.to_string())
            .or_insert_with(|| broadcast::channel(64).0);
        sender.subscribe()
    }
}

async fn run_subscriber(redis_url: &str, registry: Registry) -> anyhow::Result<()> {
    let client = redis::Client::open(redis_url)?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.psubscribe("executor:commands:*").await?;
    println!(
        "{}",
        "📡 Push fabric subscriber connected (executor:commands:*)".cyan()
    );

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let channel = msg.get_channel_name();
        if let Some(cluster_id) = channel.strip_prefix("executor:commands:") {
            let reg = registry.lock().await;
            if let Some(sender) = reg.get(cluster_id) {
                let _ = sender.send(());
            }
        }
    }
    anyhow::bail!("pub/sub message stream ended")
}
