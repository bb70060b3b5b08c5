//! Configuration loader with environment variable substitution.
//!
//! Loads configuration from:
//! 1. Default values
//! 2. `.plughost/config.yaml` in project directory
//! 3. `~/.plughost/config.yaml` in home directory
//! 4. Environment variables with `PLUGHOST_` prefix
//! 5. `DISCORD_TOKEN`, `DISCORD_APPLICATION_ID`, `DISCORD_GUILD_ID`

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Host HTTP server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// Plugin runtime configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PluginsConfig {
    /// JSON file holding the persisted enabled flag and config of every plugin
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Upper bound for a single lifecycle hook invocation
    #[serde(default = "default_hook_timeout")]
    pub hook_timeout_secs: u64,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".plughost/plugins.json")
}

fn default_hook_timeout() -> u64 {
    30
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            hook_timeout_secs: default_hook_timeout(),
        }
    }
}

impl PluginsConfig {
    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs(self.hook_timeout_secs.max(1))
    }
}

/// Chat platform configuration.
///
/// Command sync targets the guild when `guild_id` is set (instant updates,
/// handy during development) and the global command list otherwise.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    #[serde(default)]
    pub application_id: Option<String>,
    #[serde(default)]
    pub guild_id: Option<String>,
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token: None,
            application_id: None,
            guild_id: None,
        }
    }
}

/// Admin API configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AdminConfig {
    /// Bearer token required on admin routes. Unset means open access.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

/// Load configuration from all sources
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // Set defaults
    builder = builder
        .set_default("server.port", 8080)?
        .set_default("server.host", default_host())?
        .set_default("plugins.store_path", ".plughost/plugins.json")?
        .set_default("plugins.hook_timeout_secs", 30)?
        .set_default("chat.api_base", default_api_base())?;

    // Load from project config file
    let project_config = PathBuf::from(".plughost/config.yaml");
    if project_config.exists() {
        builder = builder.add_source(File::from(project_config).required(false));
    }

    // Load from home directory config file
    if let Some(home) = dirs::home_dir() {
        let home_config: PathBuf = home.join(".plughost/config.yaml");
        if home_config.exists() {
            builder = builder.add_source(File::from(home_config).required(false));
        }
    }

    // e.g., PLUGHOST_SERVER__PORT=9090, PLUGHOST_PLUGINS__HOOK_TIMEOUT_SECS=10
    builder = builder.add_source(
        Environment::with_prefix("PLUGHOST")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // Chat platform credentials from their conventional env vars
    if let Ok(token) = std::env::var("DISCORD_TOKEN") {
        builder = builder.set_override("chat.token", token)?;
    }
    if let Ok(app_id) = std::env::var("DISCORD_APPLICATION_ID") {
        builder = builder.set_override("chat.application_id", app_id)?;
    }
    if let Ok(guild_id) = std::env::var("DISCORD_GUILD_ID") {
        if !guild_id.trim().is_empty() {
            builder = builder.set_override("chat.guild_id", guild_id)?;
        }
    }

    builder.build()?.try_deserialize()
}
