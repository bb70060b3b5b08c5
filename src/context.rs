//! Plugin Context - the capability object handed to every lifecycle hook.
//!
//! A [`PluginContext`] is built fresh for each hook call and is bound to one
//! plugin id. It never outlives the call, but what it produces does: job
//! handles and mounted routes are recorded in the plugin's shared
//! [`PluginEffects`] so the lifecycle manager can stop jobs on disable.

use axum::Router;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use crate::client::ChatClient;
use crate::commands::{CommandDefinition, CommandRegistry};
use crate::mounts::{normalize_mount_path, MountOutcome, RouteMounter};
use crate::scheduler::{Job, JobHandle, JobScheduler, ScheduleError};
use crate::store::{ConfigMap, ConfigStore, StoreError};

/// Bookkeeping record of a router a plugin mounted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MountedRoute {
    pub path: String,
    /// `true` when the router waited for the HTTP server to start
    pub queued: bool,
    pub mounted_at: DateTime<Utc>,
}

/// Side effects a plugin produced through its contexts
#[derive(Debug, Default)]
pub struct PluginEffects {
    /// Jobs created during the current enabled period
    pub jobs: Vec<JobHandle>,
    /// Every router mounted since process start
    pub routes: Vec<MountedRoute>,
}

pub type SharedEffects = Arc<Mutex<PluginEffects>>;

/// Shared host services every context is bound to.
///
/// This is the context factory: [`HostServices::context_for`] produces the
/// capability object for one plugin id.
#[derive(Clone)]
pub struct HostServices {
    pub store: Arc<ConfigStore>,
    pub commands: Arc<CommandRegistry>,
    pub mounts: Arc<RouteMounter>,
    pub scheduler: Arc<dyn JobScheduler>,
    pub client: ChatClient,
}

impl HostServices {
    pub fn context_for(&self, plugin_id: &str, effects: SharedEffects) -> PluginContext {
        PluginContext {
            plugin_id: plugin_id.to_string(),
            services: self.clone(),
            effects,
        }
    }
}

pub struct PluginContext {
    plugin_id: String,
    services: HostServices,
    effects: SharedEffects,
}

impl PluginContext {
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Add commands to the global registry. Names already taken by any
    /// plugin are dropped. Returns how many were accepted.
    pub fn register_slash_commands(&self, commands: Vec<CommandDefinition>) -> usize {
        self.services.commands.register(&self.plugin_id, commands)
    }

    /// Mount `router` under `path`, now or once the HTTP server starts.
    ///
    /// Mounts are permanent, so a path this plugin already mounted (from an
    /// earlier `on_load`) keeps its first router and is not recorded again.
    pub fn mount_router(&self, path: &str, router: Router) {
        let path = normalize_mount_path(path);
        let mut effects = self.effects.lock().unwrap_or_else(PoisonError::into_inner);
        if effects.routes.iter().any(|route| route.path == path) {
            debug!(plugin = %self.plugin_id, path = %path, "Route already mounted by this plugin");
            return;
        }

        let outcome = self.services.mounts.mount(&self.plugin_id, &path, router);
        effects.routes.push(MountedRoute {
            path,
            queued: outcome == MountOutcome::Queued,
            mounted_at: Utc::now(),
        });
    }

    /// Schedule a recurring job. The job is stopped automatically when the
    /// plugin is disabled; the returned handle can also stop it earlier.
    pub fn register_cron(&self, schedule: &str, job: Job) -> Result<JobHandle, ScheduleError> {
        let handle = self
            .services
            .scheduler
            .schedule(&self.plugin_id, schedule, job)?;
        self.effects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .jobs
            .push(handle.clone());
        debug!(plugin = %self.plugin_id, schedule = %schedule, job = %handle.id(), "Registered job");
        Ok(handle)
    }

    /// Snapshot of the persisted config. Re-fetch after a restart to see edits.
    pub async fn get_config(&self) -> Result<ConfigMap, StoreError> {
        self.services.store.get_config_data(&self.plugin_id).await
    }

    /// Shared chat platform client; may not be connected yet
    pub fn get_external_client(&self) -> ChatClient {
        self.services.client.clone()
    }
}
