use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;

use crate::app::App;
use crate::session;

/// `GET /.well-known/kubently-auth` — unauthenticated, for CLIs to
/// auto-configure which credential type to present.
pub async fn auth_discovery(State(app): State<App>) -> impl IntoResponse {
    let mut methods = vec!["api_key"];
    let oauth = if let Some(oidc) = app.args.oidc.oidc_enabled.then_some(&app.args.oidc) {
        methods.push("oauth");
        json!({
            "enabled": true,
            "issuer": oidc.oidc_issuer,
            "client_id": oidc.oidc_client_id,
            "jwks_uri": oidc.oidc_jwks_uri,
        })
    } else {
        json!({"enabled": false})
    };
    Json(json!({
        "authentication_methods": methods,
        "api_key": {"header": "X-API-Key"},
        "oauth": oauth,
        "a2a_external_url": app.args.a2a_external_url,
    }))
}

/// `GET /health` — liveness + state-store reachability + active-session
/// count.
pub async fn health(State(app): State<App>) -> impl IntoResponse {
    let state_store_ok = app.pool.get().await.is_ok();
    let active_sessions = session::active_session_count(&app.pool).await.unwrap_or(0);
    let status = if state_store_ok { "ok" } else { "degraded" };
    let code = if state_store_ok {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(json!({
            "status": status,
            "state_store": state_store_ok,
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": app.started_at.elapsed().as_secs(),
            "active_sessions": active_sessions,
        })),
    )
}
