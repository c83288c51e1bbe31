use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::args::ExecutorArgs;
use crate::whitelist::{Whitelist, WhitelistStore};

/// Bound on plain request/response round-trips (status polls, result
/// submission). The SSE stream itself is long-lived and must not carry this
/// timeout, so callers attach it per-request rather than on the client.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct AppInner {
    pub client: Client,
    pub args: ExecutorArgs,
    pub whitelist: WhitelistStore,
}

#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl Deref for App {
    type Target = AppInner;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl App {
    pub fn new(args: ExecutorArgs, initial: Whitelist) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client configuration is static and always valid");
        Self {
            inner: Arc::new(AppInner {
                client,
                args,
                whitelist: WhitelistStore::new(initial),
            }),
        }
    }
}
