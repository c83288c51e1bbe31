use std::ops::Deref;
use std::sync::Arc;

use deadpool_redis::Pool;
use kubently_common::args::ApiKeyEntry;

use crate::args::ServerArgs;
use crate::auth::jwt::JwtValidator;
use crate::push::PushFabric;

pub struct AppInner {
    pub pool: Pool,
    pub redis_url: String,
    pub args: ServerArgs,
    pub api_keys: Vec<ApiKeyEntry>,
    pub jwt: Option<JwtValidator>,
    pub push: PushFabric,
    pub started_at: std::time::Instant,
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
    pub fn new(pool: Pool, args: ServerArgs) -> Self {
        let redis_url = args.redis.url();
        let api_keys = args.api_keys.parse_keys();
        let jwt = JwtValidator::from_args(&args.oidc);
        let push = PushFabric::new(pool.clone());
        push.spawn(redis_url.clone());
        Self {
            inner: Arc::new(AppInner {
                pool,
                redis_url,
                args,
                api_keys,
                jwt,
                push,
                started_at: std::time::Instant::now(),
            }),
        }
    }
}
