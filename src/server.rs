//! Host HTTP server.
//!
//! Serves the admin API plus every router plugins mount at runtime. Plugin
//! routers are reached through the fallback: the longest mounted prefix
//! matching the request path wins and receives the request with that prefix
//! stripped.

use axum::{
    extract::Request,
    http::{uri::PathAndQuery, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;
use tower::ServiceExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

use crate::admin::{self, AdminState};
use crate::client::ChatClient;
use crate::commands::CommandRegistry;
use crate::config::AppConfig;
use crate::context::HostServices;
use crate::mounts::{MountTarget, RouteMounter};
use crate::plugins::{Plugin, PluginRegistry};
use crate::scheduler::IntervalScheduler;
use crate::store::ConfigStore;

/// Plugin routers mounted under path prefixes
#[derive(Default)]
pub struct DynamicRoutes {
    /// Sorted longest prefix first
    routes: RwLock<Vec<(String, Router)>>,
}

impl DynamicRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefixes(&self) -> Vec<String> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(prefix, _)| prefix.clone())
            .collect()
    }

    fn lookup(&self, path: &str) -> Option<(String, Router)> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(prefix, _)| prefix_matches(prefix, path))
            .cloned()
    }

    /// Forward `request` to the router owning its path
    pub async fn dispatch(&self, mut request: Request) -> Response {
        let path = request.uri().path().to_string();
        let Some((prefix, router)) = self.lookup(&path) else {
            debug!(path = %path, "No route matched");
            return not_found(&path);
        };

        let uri = match strip_prefix(request.uri(), &prefix) {
            Ok(uri) => uri,
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to rewrite request path");
                return (StatusCode::BAD_REQUEST, "Invalid request path").into_response();
            }
        };
        *request.uri_mut() = uri;

        match router.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

impl MountTarget for DynamicRoutes {
    fn mount(&self, path: &str, router: Router) {
        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        if routes.iter().any(|(prefix, _)| prefix == path) {
            warn!(path = %path, "Path already mounted, keeping existing router");
            return;
        }
        routes.push((path.to_string(), router));
        routes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn strip_prefix(uri: &Uri, prefix: &str) -> Result<Uri, axum::http::Error> {
    let rest = if prefix == "/" {
        uri.path()
    } else {
        uri.path().strip_prefix(prefix).unwrap_or_default()
    };
    let rest = if rest.is_empty() { "/" } else { rest };
    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", rest, query),
        None => rest.to_string(),
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query)?);
    Ok(Uri::from_parts(parts)?)
}

fn not_found(path: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "message": format!("No route for {}", path),
            "type": "not_found"
        }
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

/// Combine the admin API with the dynamic plugin routes
pub fn create_router(admin_state: AdminState, routes: Arc<DynamicRoutes>) -> Router {
    admin::create_router(admin_state)
        .fallback(move |request: Request| {
            let routes = routes.clone();
            async move { routes.dispatch(request).await }
        })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// The assembled runtime: shared services, plugin registry, and HTTP routes
pub struct Host {
    config: AppConfig,
    registry: Arc<PluginRegistry>,
    routes: Arc<DynamicRoutes>,
}

impl Host {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let client = ChatClient::new(config.chat.clone())?;
        let services = HostServices {
            store: Arc::new(ConfigStore::new(&config.plugins.store_path)),
            commands: Arc::new(CommandRegistry::with_publisher(Arc::new(client.clone()))),
            mounts: Arc::new(RouteMounter::new()),
            scheduler: Arc::new(IntervalScheduler::new()),
            client,
        };
        let registry = Arc::new(PluginRegistry::with_hook_timeout(
            services,
            config.plugins.hook_timeout(),
        ));

        Ok(Self {
            config,
            registry,
            routes: Arc::new(DynamicRoutes::new()),
        })
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn register(&self, plugin: Arc<dyn Plugin>) -> bool {
        self.registry.register(plugin)
    }

    /// Attach the HTTP routes to the mounter, draining queued plugin
    /// routers, and build the full router.
    pub fn router(&self) -> Router {
        let target: Arc<dyn MountTarget> = self.routes.clone();
        if let Some(drained) = self.registry.services().mounts.attach(target) {
            info!(count = drained, "Attached plugin routes");
        }
        create_router(
            AdminState::new(self.registry.clone(), self.config.admin.token.clone()),
            self.routes.clone(),
        )
    }

    /// Load plugins, serve until `shutdown_rx` flips to `true`, then unload
    /// every plugin.
    pub async fn serve(self, mut shutdown_rx: watch::Receiver<bool>) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);

        let client = self.registry.services().client.clone();
        if client.config().token.is_some() {
            if let Err(e) = client.connect().await {
                warn!(error = %e, "Chat platform connection failed, continuing without it");
            }
        } else {
            warn!("No chat token configured, slash commands will not be synced");
        }

        self.registry.load_all().await;
        let app = self.router();

        info!(address = %addr, "Starting plughost server");
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown_rx.changed().await.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping server...");
                        break;
                    }
                }
            })
            .await?;

        self.registry.shutdown().await;
        Ok(())
    }
}
