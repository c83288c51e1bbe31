use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct RedisArgs {
    #[arg(long, env = "REDIS_HOST", default_value = "127.0.0.1")]
    pub redis_host: String,

    #[arg(long, env = "REDIS_PORT", default_value_t = 6379)]
    pub redis_port: u16,

    #[arg(long, env = "REDIS_USERNAME")]
    pub redis_username: Option<String>,

    #[arg(long, env = "REDIS_PASSWORD")]
    pub redis_password: Option<String>,

    #[arg(long, env = "REDIS_PROTO", default_value = "redis")]
    pub redis_proto: String,
}

impl RedisArgs {
    pub fn url_redacted(&self) -> String {
        format!(
            "{}://{}:{}@{}:{}",
            if self.redis_proto.is_empty() {
                "redis"
            } else {
                &self.redis_proto
            },
            self.redis_username.as_deref().unwrap_or(""),
            self.redis_password.as_deref().map(|_| "****").unwrap_or(""),
            self.redis_host,
            self.redis_port
        )
    }

    pub fn url(&self) -> String {
        let proto = if self.redis_proto.is_empty() {
            "redis"
        } else {
            &self.redis_proto
        };
        let mut url = format!("{}://", proto);
        if let Some(ref username) = self.redis_username {
            url.push_str(username);
            if let Some(ref password) = self.redis_password {
                url.push(':');
                url.push_str(password);
            }
            url.push('@');
        } else if let Some(ref password) = self.redis_password {
            url.push(':');
            url.push_str(password);
            url.push('@');
        }
        url.push_str(&format!("{}:{}/", self.redis_host, self.redis_port));
        url
    }
}

/// Static API keys, form `identity:key` or bare `key`, comma-separated.
#[derive(Parser, Debug, Clone)]
pub struct ApiKeyArgs {
    #[arg(long, env = "API_KEYS", default_value = "")]
    pub api_keys: String,
}

/// One parsed `identity:key` (or bare `key`) entry from `API_KEYS`.
#[derive(Debug, Clone)]
pub struct ApiKeyEntry {
    pub identity: Option<String>,
    pub key: String,
}

impl ApiKeyArgs {
    pub fn parse_keys(&self) -> Vec<ApiKeyEntry> {
        self.api_keys
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|entry| match entry.split_once(':') {
                Some((identity, key)) if !identity.is_empty() => ApiKeyEntry {
                    identity: Some(identity.to_string()),
                    key: key.to_string(),
                },
                _ => ApiKeyEntry {
                    identity: None,
                    key: entry.to_string(),
                },
            })
            .collect()
    }
}

#[derive(Parser, Debug, Clone)]
pub struct OidcArgs {
    #[arg(long, env = "OIDC_ENABLED", default_value_t = false)]
    pub oidc_enabled: bool,

    #[arg(long, env = "OIDC_ISSUER")]
    pub oidc_issuer: Option<String>,

    #[arg(long, env = "OIDC_CLIENT_ID")]
    pub oidc_client_id: Option<String>,

    #[arg(long, env = "OIDC_JWKS_URI")]
    pub oidc_jwks_uri: Option<String>,

    #[arg(long, env = "OIDC_AUDIENCE")]
    pub oidc_audience: Option<String>,
}
