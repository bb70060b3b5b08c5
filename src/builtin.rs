//! Plugins shipped with the host.

use async_trait::async_trait;
use axum::{routing::get, Json, Router};
use serde_json::json;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::commands::{CommandDefinition, CommandHandler, CommandResponse, Interaction, SlashCommand};
use crate::context::PluginContext;
use crate::plugins::{ConfigField, Plugin, PluginDescriptor};
use crate::scheduler::job;

const DEFAULT_GREETING: &str = "Host is up.";

/// Reports host uptime through a slash command and an HTTP endpoint
pub struct StatusPlugin {
    descriptor: PluginDescriptor,
    started: Instant,
    /// Shared with the command handler; refreshed from config on load and enable
    greeting: Arc<RwLock<String>>,
}

impl StatusPlugin {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(started: Instant) -> Self {
        let descriptor = PluginDescriptor::new("status", "Status", env!("CARGO_PKG_VERSION"))
            .with_description("Reports host uptime")
            .with_icon("activity")
            .with_field(
                ConfigField::new("greeting", "Greeting", "string")
                    .with_default(json!(DEFAULT_GREETING)),
            );
        Self {
            descriptor,
            started,
            greeting: Arc::new(RwLock::new(DEFAULT_GREETING.to_string())),
        }
    }

    async fn refresh_greeting(&self, ctx: &PluginContext) -> anyhow::Result<()> {
        let config = ctx.get_config().await?;
        let greeting = config
            .get("greeting")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_GREETING)
            .to_string();
        *self.greeting.write().unwrap_or_else(PoisonError::into_inner) = greeting;
        Ok(())
    }
}

impl Default for StatusPlugin {
    fn default() -> Self {
        Self::new()
    }
}

/// `3725s` -> `1h 2m 5s`
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

struct StatusCommand {
    greeting: Arc<RwLock<String>>,
    started: Instant,
}

#[async_trait]
impl CommandHandler for StatusCommand {
    async fn execute(&self, _interaction: &Interaction) -> anyhow::Result<CommandResponse> {
        let greeting = self
            .greeting
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(CommandResponse::message(format!(
            "{} Uptime: {}",
            greeting,
            format_uptime(self.started.elapsed())
        )))
    }
}

#[async_trait]
impl Plugin for StatusPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn on_load(&self, ctx: &PluginContext) -> anyhow::Result<()> {
        self.refresh_greeting(ctx).await?;

        ctx.register_slash_commands(vec![CommandDefinition::new(
            SlashCommand::new("status", "Show host uptime"),
            Arc::new(StatusCommand {
                greeting: self.greeting.clone(),
                started: self.started,
            }),
        )]);

        let started = self.started;
        let router = Router::new().route(
            "/",
            get(move || async move {
                let uptime = started.elapsed();
                Json(json!({
                    "status": "ok",
                    "uptime_secs": uptime.as_secs(),
                    "uptime": format_uptime(uptime)
                }))
            }),
        );
        ctx.mount_router("/plugins/status", router);
        Ok(())
    }

    async fn on_enable(&self, ctx: &PluginContext) -> anyhow::Result<()> {
        // Config edits apply through disable then enable
        self.refresh_greeting(ctx).await?;

        let started = self.started;
        ctx.register_cron(
            "5m",
            job(move || async move {
                debug!(uptime = %format_uptime(started.elapsed()), "Status heartbeat");
            }),
        )?;
        Ok(())
    }
}
