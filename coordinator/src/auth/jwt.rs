use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use kubently_common::args::OidcArgs;
use serde::Deserialize;
use sha2::{Digest, Sha256};

const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);
const VALIDATION_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize, Clone)]
struct Claims {
    sub: String,
    email: Option<String>,
}

struct JwksCache {
    set: JwkSet,
    fetched_at: Instant,
}

/// Validates OIDC bearer tokens against a configured issuer/audience/JWKS.
/// Never accepts a token without verifying its signature; if the JWKS
/// source is unreachable or unconfigured, validation fails closed.
pub struct JwtValidator {
    issuer: String,
    audience: String,
    jwks_uri: String,
    http: reqwest::Client,
    jwks: Mutex<Option<JwksCache>>,
    validated: Mutex<HashMap<String, (String, Instant)>>,
}

impl JwtValidator {
    /// Returns `None` when OIDC is disabled; callers then skip straight to
    /// API-key verification.
    pub fn from_args(args: &OidcArgs) -> Option<Self> {
        if !args.oidc_enabled {
            return None;
        }
        let issuer = args.oidc_issuer.clone()?;
        let audience = args.oidc_audience.clone()?;
        let jwks_uri = args.oidc_jwks_uri.clone()?;
        Some(JwtValidator {
            issuer,
            audience,
            jwks_uri,
            http: reqwest::Client::new(),
            jwks: Mutex::new(None),
            validated: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the verified subject (email if present, else `sub`) or an
    /// error describing why validation failed. Never returns Ok without
    /// having checked the signature.
    pub async fn verify(&self, token: &str) -> anyhow::Result<String> {
        let cache_key = hex::encode(Sha256::digest(token.as_bytes()));
        if let Some(identity) = self.cached(&cache_key) {
            return Ok(identity);
        }

        let header = decode_header(token)?;
        let kid = header
            .kid
            .ok_or_else(|| anyhow::anyhow!("token header missing kid"))?;

        let jwks = self.jwks_snapshot().await?;
        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid.as_str()))
            .ok_or_else(|| anyhow::anyhow!("no matching JWKS key for kid={kid}"))?;

        let decoding_key = DecodingKey::from_jwk(jwk)?;
        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);

        let data = decode::<Claims>(token, &decoding_key, &validation)?;
        let identity = data
            .claims
            .email
            .unwrap_or(data.claims.sub);

        self.validated
            .lock()
            .expect("jwt validation cache poisoned")
            .insert(cache_key, (identity.clone(), Instant::now()));
        Ok(identity)
    }

    fn cached(&self, key: &str) -> Option<String> {
        let guard = self.validated.lock().expect("jwt validation cache poisoned");
        guard.get(key).and_then(|(identity, at)| {
            if at.elapsed() < VALIDATION_CACHE_TTL {
                Some(identity.clone())
            } else {
                None
            }
        })
    }

    async fn jwks_snapshot(&self) -> anyhow::Result<JwkSet> {
        {
            let guard = self.jwks.lock().expect("jwks cache poisoned");
            if let Some(cache) = guard.as_ref()
                && cache.fetched_at.elapsed() < JWKS_CACHE_TTL
            {
                return Ok(cache.set.clone());
            }
        }
        let set: JwkSet = self
            .http
            .get(&self.jwks_uri)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        *self.jwks.lock().expect("jwks cache poisoned") = Some(JwksCache {
            set: set.clone(),
            fetched_at: Instant::now(),
        });
        Ok(set)
    }
}

