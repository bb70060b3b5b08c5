//! Command Registry - slash commands contributed by plugins.
//!
//! Commands are global, not plugin-scoped: the first plugin to register a
//! name owns it for the lifetime of the process, later registrations of the
//! same name are logged and dropped. Disabling a plugin does not remove its
//! commands.
//!
//! `sync_external` always publishes the full descriptor list (no diffing),
//! so it is safe to call after every enable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Reply sent for commands nobody registered
pub const UNAVAILABLE_MESSAGE: &str = "This command is not available.";

/// Reply sent when a handler fails
pub const FAILURE_MESSAGE: &str = "There was an error while executing this command.";

/// Declarative command descriptor published to the chat platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlashCommand {
    pub name: String,
    pub description: String,
    /// Platform option objects, passed through untouched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Value>,
}

impl SlashCommand {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, option: Value) -> Self {
        self.options.push(option);
        self
    }
}

/// An incoming command invocation or autocomplete request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Interaction {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub options: Map<String, Value>,
    /// Option currently being typed (autocomplete only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focused: Option<String>,
}

impl Interaction {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }
}

/// Reply to a command invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub content: String,
    #[serde(default)]
    pub ephemeral: bool,
}

impl CommandResponse {
    pub fn message(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteChoice {
    pub name: String,
    pub value: Value,
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, interaction: &Interaction) -> anyhow::Result<CommandResponse>;
}

#[async_trait]
pub trait AutocompleteHandler: Send + Sync {
    async fn complete(&self, interaction: &Interaction) -> anyhow::Result<Vec<AutocompleteChoice>>;
}

/// A command descriptor together with its handlers
#[derive(Clone)]
pub struct CommandDefinition {
    pub command: SlashCommand,
    pub handler: Arc<dyn CommandHandler>,
    pub autocomplete: Option<Arc<dyn AutocompleteHandler>>,
}

impl CommandDefinition {
    pub fn new(command: SlashCommand, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            command,
            handler,
            autocomplete: None,
        }
    }

    pub fn with_autocomplete(mut self, handler: Arc<dyn AutocompleteHandler>) -> Self {
        self.autocomplete = Some(handler);
        self
    }
}

/// Errors from publishing commands to the chat platform
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Command sync not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Command sync request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Chat platform rejected command sync ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound publication of the full command list
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    async fn publish(&self, commands: &[SlashCommand]) -> Result<(), SyncError>;
}

#[derive(Default)]
struct RegistryInner {
    commands: Vec<SlashCommand>,
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
    autocomplete: HashMap<String, Arc<dyn AutocompleteHandler>>,
    owners: HashMap<String, String>,
}

/// Process-wide command name -> handler table
pub struct CommandRegistry {
    inner: RwLock<RegistryInner>,
    publisher: Option<Arc<dyn CommandPublisher>>,
}

impl CommandRegistry {
    /// Registry without an outbound publisher; `sync_external` is a no-op
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            publisher: None,
        }
    }

    pub fn with_publisher(publisher: Arc<dyn CommandPublisher>) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            publisher: Some(publisher),
        }
    }

    /// Register commands for `plugin_id`, skipping names already taken.
    ///
    /// Returns the number of commands accepted.
    pub fn register(&self, plugin_id: &str, definitions: Vec<CommandDefinition>) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut accepted = 0;

        for def in definitions {
            let name = def.command.name.clone();
            if let Some(owner) = inner.owners.get(&name) {
                if owner == plugin_id {
                    // Re-running on_load re-registers the same commands
                    debug!(plugin = %plugin_id, command = %name, "Command already registered by this plugin");
                } else {
                    warn!(
                        plugin = %plugin_id,
                        command = %name,
                        owner = %owner,
                        "Duplicate command name, keeping first registration"
                    );
                }
                continue;
            }

            inner.handlers.insert(name.clone(), def.handler);
            if let Some(autocomplete) = def.autocomplete {
                inner.autocomplete.insert(name.clone(), autocomplete);
            }
            inner.owners.insert(name.clone(), plugin_id.to_string());
            inner.commands.push(def.command);
            accepted += 1;
            debug!(plugin = %plugin_id, command = %name, "Registered command");
        }

        accepted
    }

    /// All registered descriptors, in registration order
    pub fn commands(&self) -> Vec<SlashCommand> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .commands
            .clone()
    }

    /// Plugin that owns `name`, if registered
    pub fn owner_of(&self, name: &str) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .owners
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .commands
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Publish the full command list. Returns how many were published.
    pub async fn sync_external(&self) -> Result<usize, SyncError> {
        let Some(publisher) = &self.publisher else {
            debug!("No command publisher configured, skipping sync");
            return Ok(0);
        };

        let commands = self.commands();
        publisher.publish(&commands).await?;
        info!(count = commands.len(), "Synced commands with chat platform");
        Ok(commands.len())
    }

    /// Run the handler registered for `name`.
    ///
    /// Unknown commands and handler failures produce an ephemeral reply
    /// instead of an error.
    pub async fn dispatch(&self, name: &str, interaction: &Interaction) -> CommandResponse {
        let handler = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .get(name)
            .cloned();

        let Some(handler) = handler else {
            debug!(command = %name, "No handler for command");
            return CommandResponse::ephemeral(UNAVAILABLE_MESSAGE);
        };

        match handler.execute(interaction).await {
            Ok(response) => response,
            Err(e) => {
                error!(command = %name, error = %e, "Command handler failed");
                CommandResponse::ephemeral(FAILURE_MESSAGE)
            }
        }
    }

    /// Run the autocomplete handler for `name`, if any
    pub async fn autocomplete(&self, name: &str, interaction: &Interaction) -> Vec<AutocompleteChoice> {
        let handler = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .autocomplete
            .get(name)
            .cloned();

        let Some(handler) = handler else {
            return Vec::new();
        };

        match handler.complete(interaction).await {
            Ok(choices) => choices,
            Err(e) => {
                warn!(command = %name, error = %e, "Autocomplete handler failed");
                Vec::new()
            }
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
