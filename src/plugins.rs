//! Plugin Registry - lifecycle management for in-process feature plugins.
//!
//! Each registered plugin moves through these states:
//!
//! ```text
//! register -> Loaded --enable--> Enabled --disable--> Disabled
//!               ^                                        |
//!               +-----------------load-------------------+
//! any failed transition -> Error (recoverable via load or enable)
//! ```
//!
//! Guarantees:
//! - Transitions for one plugin id are serialized by a per-plugin async
//!   lock held for the whole transition, including hook awaits.
//! - Transitions for different ids never wait on each other; the id table
//!   lock is only held for lookups.
//! - Every hook runs under a timeout; a hung hook moves the plugin to
//!   `Error` instead of blocking its lock forever.
//! - After `disable` returns, successful or not, the plugin has no
//!   scheduled jobs left running.
//!
//! Mounted routes and registered commands belong to the loaded plugin and
//! are not rolled back on disable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::context::{HostServices, MountedRoute, PluginContext, SharedEffects};
use crate::store::{ConfigMap, StoreError};

/// Default upper bound for a single hook invocation
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Plugin contract
// ---------------------------------------------------------------------------

/// Declarative config field rendered by the dashboard. Opaque to the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigField {
    pub key: String,
    pub label: String,
    /// Input kind, e.g. `string`, `number`, `boolean`, `channel`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl ConfigField {
    pub fn new(key: impl Into<String>, label: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: kind.into(),
            description: None,
            default: None,
        }
    }

    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Immutable plugin metadata supplied by the plugin author
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Semantic version
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_schema: Vec<ConfigField>,
}

impl PluginDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: None,
            icon: None,
            config_schema: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_field(mut self, field: ConfigField) -> Self {
        self.config_schema.push(field);
        self
    }
}

/// A feature module hosted by the runtime.
///
/// Only `on_load` is required; the other hooks default to doing nothing.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn descriptor(&self) -> &PluginDescriptor;

    /// Register commands and routes. Runs on every load.
    async fn on_load(&self, ctx: &PluginContext) -> anyhow::Result<()>;

    /// Start background work. Jobs registered here are stopped on disable.
    async fn on_enable(&self, _ctx: &PluginContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_disable(&self, _ctx: &PluginContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Final cleanup on host shutdown
    async fn on_unload(&self, _ctx: &PluginContext) -> anyhow::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Runtime state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    Loaded,
    Enabled,
    Disabled,
    Error,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => write!(f, "loaded"),
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Load,
    Enable,
    Disable,
    Unload,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load => write!(f, "on_load"),
            Self::Enable => write!(f, "on_enable"),
            Self::Disable => write!(f, "on_disable"),
            Self::Unload => write!(f, "on_unload"),
        }
    }
}

/// Errors that can occur during plugin operations
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Plugin not registered: {0}")]
    NotRegistered(String),

    #[error("Plugin '{id}' {hook} failed: {message}")]
    HookFailed {
        id: String,
        hook: HookKind,
        message: String,
    },

    #[error("Plugin '{id}' {hook} timed out after {timeout:?}")]
    HookTimeout {
        id: String,
        hook: HookKind,
        timeout: Duration,
    },

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

/// Mutable bookkeeping for one registered plugin
#[derive(Debug)]
struct RuntimeRecord {
    state: PluginState,
    error: Option<String>,
    /// `on_load` has succeeded at least once
    loaded: bool,
    last_transition: Option<DateTime<Utc>>,
}

struct PluginSlot {
    plugin: Arc<dyn Plugin>,
    /// Held for the whole duration of a transition
    transition: tokio::sync::Mutex<()>,
    record: Mutex<RuntimeRecord>,
    effects: SharedEffects,
}

impl PluginSlot {
    fn id(&self) -> &str {
        &self.plugin.descriptor().id
    }

    fn record(&self) -> std::sync::MutexGuard<'_, RuntimeRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> PluginState {
        self.record().state
    }

    fn set_state(&self, state: PluginState, error: Option<String>) {
        let mut record = self.record();
        record.state = state;
        record.error = error;
        record.last_transition = Some(Utc::now());
    }

    /// Stop and forget every job handle. A failing stop does not prevent
    /// the remaining jobs from being stopped.
    fn stop_jobs(&self) -> usize {
        let jobs = std::mem::take(
            &mut self
                .effects
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .jobs,
        );
        let count = jobs.len();
        for job in jobs {
            let job_id = job.id();
            if std::panic::catch_unwind(AssertUnwindSafe(|| job.stop())).is_err() {
                error!(plugin = %self.id(), job = %job_id, "Job cleanup panicked");
            }
        }
        count
    }
}

/// Read-only projection of a plugin for the admin surface
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub state: PluginState,
    pub error: Option<String>,
    /// Persisted desired state
    pub enabled: bool,
    /// Persisted config
    pub config: ConfigMap,
    pub schema: Vec<ConfigField>,
    /// Live scheduled jobs
    pub jobs: usize,
    pub routes: Vec<MountedRoute>,
    pub last_transition: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct SlotTable {
    by_id: HashMap<String, Arc<PluginSlot>>,
    order: Vec<String>,
}

// ---------------------------------------------------------------------------
// Plugin registry
// ---------------------------------------------------------------------------

/// Authoritative owner of every plugin's runtime state
pub struct PluginRegistry {
    services: HostServices,
    slots: RwLock<SlotTable>,
    hook_timeout: Duration,
}

impl PluginRegistry {
    pub fn new(services: HostServices) -> Self {
        Self::with_hook_timeout(services, DEFAULT_HOOK_TIMEOUT)
    }

    pub fn with_hook_timeout(services: HostServices, hook_timeout: Duration) -> Self {
        Self {
            services,
            slots: RwLock::new(SlotTable::default()),
            hook_timeout,
        }
    }

    pub fn services(&self) -> &HostServices {
        &self.services
    }

    /// Add a plugin in state `Loaded` without calling any hook.
    ///
    /// Returns `false` (and logs) if the id is already registered.
    pub fn register(&self, plugin: Arc<dyn Plugin>) -> bool {
        let descriptor = plugin.descriptor().clone();
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if slots.by_id.contains_key(&descriptor.id) {
            warn!(plugin = %descriptor.id, "Plugin already registered, ignoring");
            return false;
        }

        let slot = Arc::new(PluginSlot {
            plugin,
            transition: tokio::sync::Mutex::new(()),
            record: Mutex::new(RuntimeRecord {
                state: PluginState::Loaded,
                error: None,
                loaded: false,
                last_transition: None,
            }),
            effects: SharedEffects::default(),
        });
        slots.order.push(descriptor.id.clone());
        slots.by_id.insert(descriptor.id.clone(), slot);

        info!(
            plugin = %descriptor.id,
            name = %descriptor.name,
            version = %descriptor.version,
            "Registered plugin"
        );
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .contains_key(id)
    }

    /// Registered ids in registration order
    pub fn ids(&self) -> Vec<String> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .clone()
    }

    pub fn state(&self, id: &str) -> Result<PluginState, PluginError> {
        Ok(self.slot(id)?.state())
    }

    fn slot(&self, id: &str) -> Result<Arc<PluginSlot>, PluginError> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| PluginError::NotRegistered(id.to_string()))
    }

    fn all_slots(&self) -> Vec<Arc<PluginSlot>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .order
            .iter()
            .filter_map(|id| slots.by_id.get(id).cloned())
            .collect()
    }

    // -----------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------

    /// Run `on_load`, then enable if the store says the plugin is enabled.
    ///
    /// No-op when already enabled.
    pub async fn load(&self, id: &str) -> Result<(), PluginError> {
        let slot = self.slot(id)?;
        let _transition = slot.transition.lock().await;
        self.load_locked(&slot).await
    }

    pub async fn enable(&self, id: &str) -> Result<(), PluginError> {
        let slot = self.slot(id)?;
        let _transition = slot.transition.lock().await;
        self.enable_locked(&slot).await
    }

    pub async fn disable(&self, id: &str) -> Result<(), PluginError> {
        let slot = self.slot(id)?;
        let _transition = slot.transition.lock().await;
        self.disable_locked(&slot).await
    }

    /// Load every registered plugin concurrently. A failing plugin never
    /// stops the others; failures are logged and returned.
    pub async fn load_all(&self) -> Vec<PluginError> {
        let ids = self.ids();
        let results = futures::future::join_all(ids.iter().map(|id| self.load(id))).await;

        let errors: Vec<PluginError> = results.into_iter().filter_map(Result::err).collect();
        for err in &errors {
            warn!(error = %err, "Plugin failed to start");
        }
        info!(
            total = ids.len(),
            failed = errors.len(),
            "Plugins loaded"
        );
        errors
    }

    async fn load_locked(&self, slot: &PluginSlot) -> Result<(), PluginError> {
        if slot.state() == PluginState::Enabled {
            debug!(plugin = %slot.id(), "Plugin already enabled, skipping load");
            return Ok(());
        }

        if let Err(e) = self.run_hook(slot, HookKind::Load).await {
            slot.set_state(PluginState::Error, Some(e.to_string()));
            error!(plugin = %slot.id(), error = %e, "Plugin load failed");
            return Err(e);
        }
        slot.set_state(PluginState::Loaded, None);
        slot.record().loaded = true;
        info!(plugin = %slot.id(), "Plugin loaded");

        if self.services.store.is_enabled(slot.id()).await? {
            self.enable_locked(slot).await?;
        }
        Ok(())
    }

    async fn enable_locked(&self, slot: &PluginSlot) -> Result<(), PluginError> {
        if slot.state() == PluginState::Enabled {
            debug!(plugin = %slot.id(), "Plugin already enabled");
            return Ok(());
        }

        if let Err(e) = self.run_hook(slot, HookKind::Enable).await {
            // Jobs from the failed attempt would be duplicated by a retry
            let stopped = slot.stop_jobs();
            slot.set_state(PluginState::Error, Some(e.to_string()));
            error!(plugin = %slot.id(), error = %e, stopped_jobs = stopped, "Plugin enable failed");
            return Err(e);
        }

        // Persist before reporting Enabled; a plugin the store cannot record
        // must not keep running jobs
        if let Err(e) = self.services.store.set_enabled(slot.id(), true).await {
            let stopped = slot.stop_jobs();
            slot.set_state(PluginState::Error, Some(e.to_string()));
            error!(plugin = %slot.id(), error = %e, stopped_jobs = stopped, "Failed to persist enabled flag");
            return Err(e.into());
        }
        slot.set_state(PluginState::Enabled, None);
        info!(plugin = %slot.id(), "Plugin enabled");

        // Commands may have been added by on_load/on_enable; republish all
        if let Err(e) = self.services.commands.sync_external().await {
            warn!(plugin = %slot.id(), error = %e, "Command sync after enable failed");
        }
        Ok(())
    }

    async fn disable_locked(&self, slot: &PluginSlot) -> Result<(), PluginError> {
        if slot.state() != PluginState::Enabled {
            debug!(plugin = %slot.id(), state = %slot.state(), "Plugin not enabled, skipping disable");
            return Ok(());
        }

        let result = self.run_hook(slot, HookKind::Disable).await;
        let stopped = slot.stop_jobs();

        if let Err(e) = result {
            slot.set_state(PluginState::Error, Some(e.to_string()));
            error!(plugin = %slot.id(), error = %e, stopped_jobs = stopped, "Plugin disable failed");
            return Err(e);
        }

        if let Err(e) = self.services.store.set_enabled(slot.id(), false).await {
            slot.set_state(PluginState::Error, Some(e.to_string()));
            error!(plugin = %slot.id(), error = %e, "Failed to persist disabled flag");
            return Err(e.into());
        }
        slot.set_state(PluginState::Disabled, None);
        info!(plugin = %slot.id(), stopped_jobs = stopped, "Plugin disabled");
        Ok(())
    }

    /// Invoke one hook with a fresh context, bounded by the hook timeout.
    /// Panics inside the hook are reported as hook failures.
    async fn run_hook(&self, slot: &PluginSlot, hook: HookKind) -> Result<(), PluginError> {
        let ctx = self
            .services
            .context_for(slot.id(), slot.effects.clone());
        let plugin = slot.plugin.clone();
        debug!(plugin = %slot.id(), hook = %hook, "Running plugin hook");

        let call = async {
            match hook {
                HookKind::Load => plugin.on_load(&ctx).await,
                HookKind::Enable => plugin.on_enable(&ctx).await,
                HookKind::Disable => plugin.on_disable(&ctx).await,
                HookKind::Unload => plugin.on_unload(&ctx).await,
            }
        };

        match timeout(self.hook_timeout, AssertUnwindSafe(call).catch_unwind()).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(PluginError::HookFailed {
                id: slot.id().to_string(),
                hook,
                message: format!("{:#}", e),
            }),
            Ok(Err(panic)) => Err(PluginError::HookFailed {
                id: slot.id().to_string(),
                hook,
                message: panic_message(panic.as_ref()),
            }),
            Err(_) => Err(PluginError::HookTimeout {
                id: slot.id().to_string(),
                hook,
                timeout: self.hook_timeout,
            }),
        }
    }

    // -----------------------------------------------------------------
    // Admin operations
    // -----------------------------------------------------------------

    /// Shallow-merge `partial` into the persisted config. Does not touch the
    /// running plugin; see [`set_config_and_restart`](Self::set_config_and_restart).
    pub async fn set_config(&self, id: &str, partial: ConfigMap) -> Result<ConfigMap, PluginError> {
        self.slot(id)?;
        Ok(self.services.store.set_config_data(id, partial).await?)
    }

    /// Persist `partial` and, if the plugin is enabled, disable then enable
    /// it so the new config takes effect. The whole sequence is one
    /// transition for this plugin id.
    pub async fn set_config_and_restart(
        &self,
        id: &str,
        partial: ConfigMap,
    ) -> Result<ConfigMap, PluginError> {
        let slot = self.slot(id)?;
        let _transition = slot.transition.lock().await;

        let config = self.services.store.set_config_data(id, partial).await?;
        if slot.state() == PluginState::Enabled {
            info!(plugin = %id, "Restarting plugin to apply config");
            self.disable_locked(&slot).await?;
            self.enable_locked(&slot).await?;
        }
        Ok(config)
    }

    /// Enable (loading first if `on_load` never succeeded) or disable.
    ///
    /// Disabling a plugin that is not running only records the desired
    /// state, so a plugin stuck in `Error` is not re-enabled on next start.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), PluginError> {
        let slot = self.slot(id)?;
        let _transition = slot.transition.lock().await;

        if !enabled {
            if slot.state() != PluginState::Enabled {
                self.services.store.set_enabled(id, false).await?;
                info!(plugin = %id, state = %slot.state(), "Recorded plugin as disabled");
                return Ok(());
            }
            return self.disable_locked(&slot).await;
        }
        if !slot.record().loaded {
            self.load_locked(&slot).await?;
        }
        self.enable_locked(&slot).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<PluginInfo>, PluginError> {
        let slot = match self.slot(id) {
            Ok(slot) => slot,
            Err(PluginError::NotRegistered(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(Some(self.info(&slot).await?))
    }

    pub async fn list_info(&self) -> Result<Vec<PluginInfo>, PluginError> {
        let mut infos = Vec::new();
        for slot in self.all_slots() {
            infos.push(self.info(&slot).await?);
        }
        Ok(infos)
    }

    async fn info(&self, slot: &PluginSlot) -> Result<PluginInfo, PluginError> {
        let descriptor = slot.plugin.descriptor();
        let entry = self.services.store.get(&descriptor.id).await?;
        let (state, error, last_transition) = {
            let record = slot.record();
            (record.state, record.error.clone(), record.last_transition)
        };
        let (jobs, routes) = {
            let effects = slot.effects.lock().unwrap_or_else(PoisonError::into_inner);
            (effects.jobs.len(), effects.routes.clone())
        };

        Ok(PluginInfo {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            description: descriptor.description.clone(),
            icon: descriptor.icon.clone(),
            state,
            error,
            enabled: entry.as_ref().map(|e| e.enabled).unwrap_or(true),
            config: entry.map(|e| e.config).unwrap_or_default(),
            schema: descriptor.config_schema.clone(),
            jobs,
            routes,
            last_transition,
        })
    }

    /// Host shutdown: stop every plugin's work and run `on_unload`.
    ///
    /// The persisted enabled flags are left alone so the next start replays
    /// the same desired state.
    pub async fn shutdown(&self) {
        for slot in self.all_slots() {
            let _transition = slot.transition.lock().await;

            if slot.state() == PluginState::Enabled {
                if let Err(e) = self.run_hook(&slot, HookKind::Disable).await {
                    warn!(plugin = %slot.id(), error = %e, "on_disable failed during shutdown");
                }
            }
            let stopped = slot.stop_jobs();

            if slot.record().loaded {
                if let Err(e) = self.run_hook(&slot, HookKind::Unload).await {
                    warn!(plugin = %slot.id(), error = %e, "on_unload failed during shutdown");
                }
            }
            slot.set_state(PluginState::Loaded, None);
            debug!(plugin = %slot.id(), stopped_jobs = stopped, "Plugin unloaded");
        }
        info!("All plugins unloaded");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChatClient;
    use crate::commands::{
        CommandDefinition, CommandHandler, CommandPublisher, CommandRegistry, CommandResponse,
        Interaction, SlashCommand, SyncError,
    };
    use crate::config::ChatConfig;
    use crate::mounts::RouteMounter;
    use crate::scheduler::{job, IntervalScheduler};
    use crate::store::ConfigStore;
    use axum::Router;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Configurable plugin that counts hook calls
    struct TestPlugin {
        descriptor: PluginDescriptor,
        command: Option<&'static str>,
        loads: AtomicUsize,
        enables: AtomicUsize,
        disables: AtomicUsize,
        unloads: AtomicUsize,
        fail_load: AtomicBool,
        fail_enable: AtomicBool,
        fail_disable: AtomicBool,
        hang_enable: AtomicBool,
        enable_delay: Duration,
    }

    impl TestPlugin {
        fn new(id: &str) -> Self {
            Self {
                descriptor: PluginDescriptor::new(id, format!("{} plugin", id), "1.0.0"),
                command: None,
                loads: AtomicUsize::new(0),
                enables: AtomicUsize::new(0),
                disables: AtomicUsize::new(0),
                unloads: AtomicUsize::new(0),
                fail_load: AtomicBool::new(false),
                fail_enable: AtomicBool::new(false),
                fail_disable: AtomicBool::new(false),
                hang_enable: AtomicBool::new(false),
                enable_delay: Duration::ZERO,
            }
        }

        fn with_command(mut self, name: &'static str) -> Self {
            self.command = Some(name);
            self
        }

        fn with_enable_delay(mut self, delay: Duration) -> Self {
            self.enable_delay = delay;
            self
        }
    }

    struct Reply(String);

    #[async_trait]
    impl CommandHandler for Reply {
        async fn execute(&self, _interaction: &Interaction) -> anyhow::Result<CommandResponse> {
            Ok(CommandResponse::message(self.0.clone()))
        }
    }

    #[async_trait]
    impl Plugin for TestPlugin {
        fn descriptor(&self) -> &PluginDescriptor {
            &self.descriptor
        }

        async fn on_load(&self, ctx: &PluginContext) -> anyhow::Result<()> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail_load.load(Ordering::SeqCst) {
                anyhow::bail!("database unreachable");
            }
            if let Some(name) = self.command {
                ctx.register_slash_commands(vec![CommandDefinition::new(
                    SlashCommand::new(name, "test command"),
                    Arc::new(Reply(format!("from {}", self.descriptor.id))),
                )]);
            }
            ctx.mount_router(&format!("/plugins/{}", self.descriptor.id), Router::new());
            Ok(())
        }

        async fn on_enable(&self, ctx: &PluginContext) -> anyhow::Result<()> {
            self.enables.fetch_add(1, Ordering::SeqCst);
            ctx.register_cron("5m", job(|| async {}))?;
            ctx.register_cron("1h", job(|| async {}))?;
            if !self.enable_delay.is_zero() {
                tokio::time::sleep(self.enable_delay).await;
            }
            if self.hang_enable.load(Ordering::SeqCst) {
                futures::future::pending::<()>().await;
            }
            if self.fail_enable.load(Ordering::SeqCst) {
                anyhow::bail!("api key rejected");
            }
            Ok(())
        }

        async fn on_disable(&self, _ctx: &PluginContext) -> anyhow::Result<()> {
            self.disables.fetch_add(1, Ordering::SeqCst);
            if self.fail_disable.load(Ordering::SeqCst) {
                anyhow::bail!("flush failed");
            }
            Ok(())
        }

        async fn on_unload(&self, _ctx: &PluginContext) -> anyhow::Result<()> {
            self.unloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingPublisher {
        syncs: AtomicUsize,
    }

    #[async_trait]
    impl CommandPublisher for CountingPublisher {
        async fn publish(&self, _commands: &[SlashCommand]) -> Result<(), SyncError> {
            self.syncs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        _dir: TempDir,
        registry: Arc<PluginRegistry>,
        publisher: Arc<CountingPublisher>,
    }

    fn harness_with_timeout(hook_timeout: Duration) -> Harness {
        let dir = TempDir::new().unwrap();
        let publisher = Arc::new(CountingPublisher::default());
        let services = HostServices {
            store: Arc::new(ConfigStore::new(dir.path().join("plugins.json"))),
            commands: Arc::new(CommandRegistry::with_publisher(publisher.clone())),
            mounts: Arc::new(RouteMounter::new()),
            scheduler: Arc::new(IntervalScheduler::new()),
            client: ChatClient::new(ChatConfig::default()).unwrap(),
        };
        Harness {
            _dir: dir,
            registry: Arc::new(PluginRegistry::with_hook_timeout(services, hook_timeout)),
            publisher,
        }
    }

    fn harness() -> Harness {
        harness_with_timeout(DEFAULT_HOOK_TIMEOUT)
    }

    fn live_jobs(registry: &PluginRegistry, id: &str) -> usize {
        registry.slot(id).unwrap().effects.lock().unwrap().jobs.len()
    }

    fn config(value: serde_json::Value) -> ConfigMap {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_register_starts_loaded_without_hooks() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        assert!(h.registry.register(plugin.clone()));

        assert_eq!(h.registry.state("p").unwrap(), PluginState::Loaded);
        assert_eq!(plugin.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_register_duplicate_is_ignored() {
        let h = harness();
        assert!(h.registry.register(Arc::new(TestPlugin::new("p"))));
        assert!(!h.registry.register(Arc::new(TestPlugin::new("p"))));
        assert_eq!(h.registry.ids(), vec!["p"]);
    }

    #[tokio::test]
    async fn test_unknown_plugin_errors() {
        let h = harness();
        assert!(matches!(
            h.registry.enable("ghost").await,
            Err(PluginError::NotRegistered(_))
        ));
        assert!(matches!(
            h.registry.disable("ghost").await,
            Err(PluginError::NotRegistered(_))
        ));
        assert!(matches!(
            h.registry.set_config("ghost", ConfigMap::new()).await,
            Err(PluginError::NotRegistered(_))
        ));
        assert!(h.registry.get("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_replays_default_enabled() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        h.registry.register(plugin.clone());

        h.registry.load("p").await.unwrap();

        assert_eq!(h.registry.state("p").unwrap(), PluginState::Enabled);
        assert_eq!(plugin.loads.load(Ordering::SeqCst), 1);
        assert_eq!(plugin.enables.load(Ordering::SeqCst), 1);
        assert_eq!(live_jobs(&h.registry, "p"), 2);
        assert!(h.registry.services().store.is_enabled("p").await.unwrap());
        assert_eq!(h.publisher.syncs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_respects_persisted_disabled() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        h.registry.register(plugin.clone());
        h.registry
            .services()
            .store
            .set_enabled("p", false)
            .await
            .unwrap();

        h.registry.load("p").await.unwrap();

        assert_eq!(h.registry.state("p").unwrap(), PluginState::Loaded);
        assert_eq!(plugin.enables.load(Ordering::SeqCst), 0);
        assert_eq!(live_jobs(&h.registry, "p"), 0);
    }

    #[tokio::test]
    async fn test_load_is_noop_when_enabled() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        h.registry.register(plugin.clone());
        h.registry.load("p").await.unwrap();

        h.registry.load("p").await.unwrap();
        assert_eq!(plugin.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_enable_twice_is_noop() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        h.registry.register(plugin.clone());
        h.registry.enable("p").await.unwrap();
        let jobs_before: Vec<_> = h.registry.slot("p").unwrap().effects.lock().unwrap()
            .jobs
            .iter()
            .map(|j| j.id())
            .collect();

        h.registry.enable("p").await.unwrap();

        assert_eq!(plugin.enables.load(Ordering::SeqCst), 1);
        assert_eq!(h.registry.state("p").unwrap(), PluginState::Enabled);
        let jobs_after: Vec<_> = h.registry.slot("p").unwrap().effects.lock().unwrap()
            .jobs
            .iter()
            .map(|j| j.id())
            .collect();
        assert_eq!(jobs_before, jobs_after);
    }

    #[tokio::test]
    async fn test_disable_when_not_enabled_is_noop() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        h.registry.register(plugin.clone());

        h.registry.disable("p").await.unwrap();

        assert_eq!(plugin.disables.load(Ordering::SeqCst), 0);
        assert_eq!(h.registry.state("p").unwrap(), PluginState::Loaded);
        // Nothing persisted either
        assert!(h.registry.services().store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disable_stops_all_jobs_and_persists() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        h.registry.register(plugin.clone());
        h.registry.enable("p").await.unwrap();

        let handles: Vec<_> = h.registry.slot("p").unwrap().effects.lock().unwrap().jobs.clone();
        assert_eq!(handles.len(), 2);

        h.registry.disable("p").await.unwrap();

        assert_eq!(h.registry.state("p").unwrap(), PluginState::Disabled);
        assert_eq!(live_jobs(&h.registry, "p"), 0);
        assert!(handles.iter().all(|j| j.is_stopped()));
        assert!(!h.registry.services().store.is_enabled("p").await.unwrap());
    }

    #[tokio::test]
    async fn test_disable_failure_still_stops_jobs() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        plugin.fail_disable.store(true, Ordering::SeqCst);
        h.registry.register(plugin.clone());
        h.registry.enable("p").await.unwrap();

        let err = h.registry.disable("p").await.unwrap_err();
        assert!(matches!(err, PluginError::HookFailed { hook: HookKind::Disable, .. }));

        assert_eq!(h.registry.state("p").unwrap(), PluginState::Error);
        assert_eq!(live_jobs(&h.registry, "p"), 0);
        let info = h.registry.get("p").await.unwrap().unwrap();
        assert!(info.error.unwrap().contains("flush failed"));
    }

    #[tokio::test]
    async fn test_load_failure_then_recovery() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        plugin.fail_load.store(true, Ordering::SeqCst);
        h.registry.register(plugin.clone());

        let err = h.registry.load("p").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Plugin 'p' on_load failed: database unreachable"
        );
        let info = h.registry.get("p").await.unwrap().unwrap();
        assert_eq!(info.state, PluginState::Error);
        assert_eq!(
            info.error.as_deref(),
            Some("Plugin 'p' on_load failed: database unreachable")
        );

        plugin.fail_load.store(false, Ordering::SeqCst);
        h.registry
            .services()
            .store
            .set_enabled("p", false)
            .await
            .unwrap();
        h.registry.load("p").await.unwrap();

        let info = h.registry.get("p").await.unwrap().unwrap();
        assert_eq!(info.state, PluginState::Loaded);
        assert!(info.error.is_none());
    }

    #[tokio::test]
    async fn test_enable_failure_sets_error_and_cleans_jobs() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        plugin.fail_enable.store(true, Ordering::SeqCst);
        h.registry.register(plugin.clone());

        let err = h.registry.enable("p").await.unwrap_err();
        assert!(matches!(err, PluginError::HookFailed { hook: HookKind::Enable, .. }));
        assert_eq!(h.registry.state("p").unwrap(), PluginState::Error);
        assert_eq!(live_jobs(&h.registry, "p"), 0);
        assert_eq!(h.publisher.syncs.load(Ordering::SeqCst), 0);

        // Error is recoverable through enable
        plugin.fail_enable.store(false, Ordering::SeqCst);
        h.registry.enable("p").await.unwrap();
        assert_eq!(h.registry.state("p").unwrap(), PluginState::Enabled);
        assert_eq!(live_jobs(&h.registry, "p"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_hook_times_out() {
        let h = harness_with_timeout(Duration::from_secs(2));
        let plugin = Arc::new(TestPlugin::new("p"));
        plugin.hang_enable.store(true, Ordering::SeqCst);
        h.registry.register(plugin.clone());

        let err = h.registry.enable("p").await.unwrap_err();
        assert!(matches!(
            err,
            PluginError::HookTimeout { hook: HookKind::Enable, timeout, .. }
                if timeout == Duration::from_secs(2)
        ));
        assert_eq!(h.registry.state("p").unwrap(), PluginState::Error);
        assert_eq!(live_jobs(&h.registry, "p"), 0);

        // The per-plugin lock was released
        plugin.hang_enable.store(false, Ordering::SeqCst);
        h.registry.enable("p").await.unwrap();
        assert_eq!(h.registry.state("p").unwrap(), PluginState::Enabled);
    }

    #[tokio::test]
    async fn test_panicking_hook_becomes_error() {
        struct Panics(PluginDescriptor);

        #[async_trait]
        impl Plugin for Panics {
            fn descriptor(&self) -> &PluginDescriptor {
                &self.0
            }
            async fn on_load(&self, _ctx: &PluginContext) -> anyhow::Result<()> {
                panic!("bad index");
            }
        }

        let h = harness();
        h.registry
            .register(Arc::new(Panics(PluginDescriptor::new("x", "X", "0.1.0"))));

        let err = h.registry.load("x").await.unwrap_err();
        assert!(err.to_string().contains("panicked: bad index"));
        assert_eq!(h.registry.state("x").unwrap(), PluginState::Error);
    }

    #[tokio::test]
    async fn test_set_config_merges_without_restart() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        h.registry.register(plugin.clone());
        h.registry.enable("p").await.unwrap();

        h.registry.set_config("p", config(json!({"a": 1}))).await.unwrap();
        let merged = h.registry.set_config("p", config(json!({"b": 2}))).await.unwrap();

        assert_eq!(serde_json::Value::Object(merged), json!({"a": 1, "b": 2}));
        assert_eq!(plugin.disables.load(Ordering::SeqCst), 0);
        assert_eq!(plugin.enables.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_set_config_and_restart_when_enabled() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        h.registry.register(plugin.clone());
        h.registry.enable("p").await.unwrap();

        h.registry
            .set_config_and_restart("p", config(json!({"channel": "123"})))
            .await
            .unwrap();

        assert_eq!(plugin.disables.load(Ordering::SeqCst), 1);
        assert_eq!(plugin.enables.load(Ordering::SeqCst), 2);
        assert_eq!(h.registry.state("p").unwrap(), PluginState::Enabled);
        assert_eq!(live_jobs(&h.registry, "p"), 2);
        let info = h.registry.get("p").await.unwrap().unwrap();
        assert_eq!(info.config.get("channel"), Some(&json!("123")));
        assert!(info.enabled);
    }

    #[tokio::test]
    async fn test_set_config_and_restart_when_disabled() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        h.registry.register(plugin.clone());

        h.registry
            .set_config_and_restart("p", config(json!({"channel": "123"})))
            .await
            .unwrap();

        assert_eq!(plugin.disables.load(Ordering::SeqCst), 0);
        assert_eq!(plugin.enables.load(Ordering::SeqCst), 0);
        assert_eq!(h.registry.state("p").unwrap(), PluginState::Loaded);
    }

    #[tokio::test]
    async fn test_set_enabled_loads_first_when_needed() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        h.registry.register(plugin.clone());

        h.registry.set_enabled("p", true).await.unwrap();
        assert_eq!(plugin.loads.load(Ordering::SeqCst), 1);
        assert_eq!(plugin.enables.load(Ordering::SeqCst), 1);
        assert_eq!(h.registry.state("p").unwrap(), PluginState::Enabled);

        h.registry.set_enabled("p", false).await.unwrap();
        assert_eq!(h.registry.state("p").unwrap(), PluginState::Disabled);

        // Already loaded once, so re-enabling skips on_load
        h.registry.set_enabled("p", true).await.unwrap();
        assert_eq!(plugin.loads.load(Ordering::SeqCst), 1);
        assert_eq!(plugin.enables.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_enable_disable_is_consistent() {
        for round in 0..20 {
            let h = harness();
            let plugin =
                Arc::new(TestPlugin::new("p").with_enable_delay(Duration::from_millis(2)));
            h.registry.register(plugin.clone());

            let enable = {
                let registry = h.registry.clone();
                tokio::spawn(async move { registry.enable("p").await })
            };
            let disable = {
                let registry = h.registry.clone();
                tokio::spawn(async move { registry.disable("p").await })
            };
            enable.await.unwrap().unwrap();
            disable.await.unwrap().unwrap();

            let state = h.registry.state("p").unwrap();
            let jobs = live_jobs(&h.registry, "p");
            match state {
                PluginState::Enabled => assert_eq!(jobs, 2, "round {}", round),
                PluginState::Disabled => assert_eq!(jobs, 0, "round {}", round),
                other => panic!("round {}: unexpected state {}", round, other),
            }
            assert_eq!(
                h.registry.services().store.is_enabled("p").await.unwrap(),
                state == PluginState::Enabled
            );
        }
    }

    #[tokio::test]
    async fn test_concurrent_enables_invoke_hook_once() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p").with_enable_delay(Duration::from_millis(5)));
        h.registry.register(plugin.clone());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = h.registry.clone();
                tokio::spawn(async move { registry.enable("p").await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(plugin.enables.load(Ordering::SeqCst), 1);
        assert_eq!(live_jobs(&h.registry, "p"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_plugin_does_not_block_others() {
        let h = harness_with_timeout(Duration::from_secs(60));
        let stuck = Arc::new(TestPlugin::new("stuck"));
        stuck.hang_enable.store(true, Ordering::SeqCst);
        h.registry.register(stuck.clone());
        h.registry.register(Arc::new(TestPlugin::new("fine")));

        let registry = h.registry.clone();
        let stuck_task = tokio::spawn(async move { registry.enable("stuck").await });
        tokio::task::yield_now().await;

        h.registry.enable("fine").await.unwrap();
        assert_eq!(h.registry.state("fine").unwrap(), PluginState::Enabled);

        assert!(stuck_task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_load_all_isolates_failures() {
        let h = harness();
        let bad = Arc::new(TestPlugin::new("bad"));
        bad.fail_load.store(true, Ordering::SeqCst);
        h.registry.register(bad);
        h.registry.register(Arc::new(TestPlugin::new("good")));

        let errors = h.registry.load_all().await;
        assert_eq!(errors.len(), 1);
        assert_eq!(h.registry.state("bad").unwrap(), PluginState::Error);
        assert_eq!(h.registry.state("good").unwrap(), PluginState::Enabled);
    }

    #[tokio::test]
    async fn test_duplicate_commands_across_plugins() {
        let h = harness();
        h.registry
            .register(Arc::new(TestPlugin::new("first").with_command("rank")));
        h.registry
            .register(Arc::new(TestPlugin::new("second").with_command("rank")));

        h.registry.load("first").await.unwrap();
        h.registry.load("second").await.unwrap();

        let commands = &h.registry.services().commands;
        assert_eq!(commands.len(), 1);
        let response = commands.dispatch("rank", &Interaction::new("rank")).await;
        assert_eq!(response.content, "from first");
    }

    #[tokio::test]
    async fn test_disable_keeps_routes_and_commands() {
        let h = harness();
        h.registry
            .register(Arc::new(TestPlugin::new("p").with_command("ping")));
        h.registry.load("p").await.unwrap();
        h.registry.disable("p").await.unwrap();

        let info = h.registry.get("p").await.unwrap().unwrap();
        assert_eq!(info.routes.len(), 1);
        assert_eq!(info.routes[0].path, "/plugins/p");
        assert_eq!(info.jobs, 0);
        assert_eq!(h.registry.services().commands.owner_of("ping").as_deref(), Some("p"));
    }

    #[tokio::test]
    async fn test_reload_cycles_report_route_once() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        h.registry.register(plugin.clone());

        for _ in 0..3 {
            h.registry.load("p").await.unwrap();
            h.registry.disable("p").await.unwrap();
        }

        assert_eq!(plugin.loads.load(Ordering::SeqCst), 3);
        let info = h.registry.get("p").await.unwrap().unwrap();
        assert_eq!(info.routes.len(), 1);
        assert_eq!(info.routes[0].path, "/plugins/p");
        assert_eq!(h.registry.services().mounts.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_list_info_projection() {
        let h = harness();
        let mut plugin = TestPlugin::new("p");
        plugin.descriptor = plugin
            .descriptor
            .clone()
            .with_description("Posts match results")
            .with_field(ConfigField::new("channel", "Channel", "channel"));
        h.registry.register(Arc::new(plugin));
        h.registry.register(Arc::new(TestPlugin::new("q")));
        h.registry.load("p").await.unwrap();

        let infos = h.registry.list_info().await.unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].id, "p");
        assert_eq!(infos[0].state, PluginState::Enabled);
        assert_eq!(infos[0].jobs, 2);
        assert_eq!(infos[0].schema.len(), 1);
        assert!(infos[0].last_transition.is_some());
        assert_eq!(infos[1].id, "q");
        assert_eq!(infos[1].state, PluginState::Loaded);
        assert!(infos[1].enabled);

        let value = serde_json::to_value(&infos[0]).unwrap();
        assert_eq!(value["state"], "enabled");
        assert_eq!(value["schema"][0]["type"], "channel");
    }

    #[tokio::test]
    async fn test_shutdown_keeps_persisted_state() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        h.registry.register(plugin.clone());
        h.registry.load("p").await.unwrap();

        h.registry.shutdown().await;

        assert_eq!(plugin.disables.load(Ordering::SeqCst), 1);
        assert_eq!(plugin.unloads.load(Ordering::SeqCst), 1);
        assert_eq!(live_jobs(&h.registry, "p"), 0);
        assert_eq!(h.registry.state("p").unwrap(), PluginState::Loaded);
        assert!(h.registry.services().store.is_enabled("p").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_enabled_false_records_flag_for_failed_plugin() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        plugin.fail_enable.store(true, Ordering::SeqCst);
        h.registry.register(plugin.clone());

        assert!(h.registry.load("p").await.is_err());
        assert_eq!(h.registry.state("p").unwrap(), PluginState::Error);

        h.registry.set_enabled("p", false).await.unwrap();

        let store = &h.registry.services().store;
        assert!(!store.is_enabled("p").await.unwrap());
        assert_eq!(plugin.enables.load(Ordering::SeqCst), 1);
        assert_eq!(plugin.disables.load(Ordering::SeqCst), 0);

        // Next start replays the disabled flag instead of the failing enable
        h.registry.load("p").await.unwrap();
        assert_eq!(h.registry.state("p").unwrap(), PluginState::Loaded);
        assert_eq!(plugin.enables.load(Ordering::SeqCst), 1);
    }

    fn break_store_writes(h: &Harness) {
        std::fs::create_dir(h._dir.path().join("plugins.json.tmp")).unwrap();
    }

    #[tokio::test]
    async fn test_enable_persist_failure_stops_jobs() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        h.registry.register(plugin.clone());
        break_store_writes(&h);

        let err = h.registry.enable("p").await.unwrap_err();
        assert!(matches!(err, PluginError::Persistence(_)));
        assert_eq!(h.registry.state("p").unwrap(), PluginState::Error);
        assert_eq!(live_jobs(&h.registry, "p"), 0);
        assert_eq!(h.publisher.syncs.load(Ordering::SeqCst), 0);
        assert!(!h._dir.path().join("plugins.json").exists());
    }

    #[tokio::test]
    async fn test_disable_persist_failure_keeps_stored_flag() {
        let h = harness();
        let plugin = Arc::new(TestPlugin::new("p"));
        h.registry.register(plugin.clone());
        h.registry.enable("p").await.unwrap();
        let before = std::fs::read_to_string(h._dir.path().join("plugins.json")).unwrap();
        break_store_writes(&h);

        let err = h.registry.disable("p").await.unwrap_err();
        assert!(matches!(err, PluginError::Persistence(_)));
        assert_eq!(h.registry.state("p").unwrap(), PluginState::Error);
        assert_eq!(live_jobs(&h.registry, "p"), 0);
        assert_eq!(
            std::fs::read_to_string(h._dir.path().join("plugins.json")).unwrap(),
            before
        );
        assert!(h.registry.services().store.is_enabled("p").await.unwrap());
    }

    #[test]
    fn test_plugin_error_display() {
        let err = PluginError::HookTimeout {
            id: "matches".to_string(),
            hook: HookKind::Enable,
            timeout: Duration::from_secs(30),
        };
        assert_eq!(
            format!("{}", err),
            "Plugin 'matches' on_enable timed out after 30s"
        );

        let err = PluginError::HookTimeout {
            id: "matches".to_string(),
            hook: HookKind::Load,
            timeout: Duration::from_millis(250),
        };
        assert_eq!(
            format!("{}", err),
            "Plugin 'matches' on_load timed out after 250ms"
        );

        let err = PluginError::NotRegistered("ghost".to_string());
        assert_eq!(format!("{}", err), "Plugin not registered: ghost");
    }
}
