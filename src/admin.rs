//! Admin API - the dashboard's view of the plugin registry.
//!
//! Every route except `/health` requires `Authorization: Bearer <token>`
//! when an admin token is configured.

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::plugins::{PluginError, PluginInfo, PluginRegistry};
use crate::store::ConfigMap;

/// Shared state for admin handlers
#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<PluginRegistry>,
    pub token: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl AdminState {
    pub fn new(registry: Arc<PluginRegistry>, token: Option<String>) -> Self {
        Self {
            registry,
            token: token.filter(|t| !t.is_empty()),
            started_at: Utc::now(),
        }
    }
}

/// Errors returned by admin routes
#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Missing or invalid admin token")]
    Unauthorized,

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            AdminError::Unauthorized => (StatusCode::UNAUTHORIZED, "auth_error"),
            AdminError::Plugin(PluginError::NotRegistered(_)) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            AdminError::Plugin(PluginError::HookFailed { .. })
            | AdminError::Plugin(PluginError::HookTimeout { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "plugin_error")
            }
            AdminError::Plugin(PluginError::Persistence(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
            }
        };

        let body = serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": kind
            }
        });

        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetConfigRequest {
    pub config: ConfigMap,
}

/// Create the admin router
pub fn create_router(state: AdminState) -> Router {
    let api = Router::new()
        .route("/api/plugins", get(list_plugins))
        .route("/api/plugins/{id}", get(get_plugin))
        .route("/api/plugins/{id}/enabled", put(set_enabled))
        .route("/api/plugins/{id}/config", put(set_config))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/health", get(health_check))
        .merge(api)
        .with_state(state)
}

async fn require_token(
    State(state): State<AdminState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AdminError> {
    if let Some(expected) = &state.token {
        let provided = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if provided != Some(expected.as_str()) {
            warn!(path = %request.uri().path(), "Rejected admin request");
            return Err(AdminError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}

async fn health_check(State(state): State<AdminState>) -> impl IntoResponse {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    Json(serde_json::json!({
        "status": "ok",
        "service": "plughost",
        "version": env!("CARGO_PKG_VERSION"),
        "plugins": state.registry.ids().len(),
        "uptime_secs": uptime
    }))
}

async fn list_plugins(
    State(state): State<AdminState>,
) -> Result<Json<Vec<PluginInfo>>, AdminError> {
    Ok(Json(state.registry.list_info().await?))
}

async fn get_plugin(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<PluginInfo>, AdminError> {
    plugin_info(&state, &id).await
}

async fn set_enabled(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(body): Json<SetEnabledRequest>,
) -> Result<Json<PluginInfo>, AdminError> {
    debug!(plugin = %id, enabled = body.enabled, "Admin set enabled");
    state.registry.set_enabled(&id, body.enabled).await?;
    plugin_info(&state, &id).await
}

async fn set_config(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(body): Json<SetConfigRequest>,
) -> Result<Json<PluginInfo>, AdminError> {
    debug!(plugin = %id, keys = body.config.len(), "Admin set config");
    state.registry.set_config_and_restart(&id, body.config).await?;
    plugin_info(&state, &id).await
}

async fn plugin_info(state: &AdminState, id: &str) -> Result<Json<PluginInfo>, AdminError> {
    state
        .registry
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| PluginError::NotRegistered(id.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    fn status_of(err: AdminError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(status_of(AdminError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(PluginError::NotRegistered("x".to_string()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(
                PluginError::HookFailed {
                    id: "x".to_string(),
                    hook: crate::plugins::HookKind::Enable,
                    message: "boom".to_string(),
                }
                .into()
            ),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let io = StoreError::Io {
            path: "plugins.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(
            status_of(PluginError::Persistence(io).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_empty_token_means_open() {
        let services = crate::context::HostServices {
            store: Arc::new(crate::store::ConfigStore::new("unused.json")),
            commands: Arc::new(crate::commands::CommandRegistry::new()),
            mounts: Arc::new(crate::mounts::RouteMounter::new()),
            scheduler: Arc::new(crate::scheduler::IntervalScheduler::new()),
            client: crate::client::ChatClient::new(crate::config::ChatConfig::default()).unwrap(),
        };
        let registry = Arc::new(PluginRegistry::new(services));
        assert!(AdminState::new(registry.clone(), Some(String::new())).token.is_none());
        assert!(AdminState::new(registry, Some("t".to_string())).token.is_some());
    }
}
