//! Shared chat platform client.
//!
//! One handle is shared by the host and every plugin. It may not be
//! connected yet when a plugin first sees it; plugins should check
//! [`ChatClient::is_connected`] before relying on it.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::commands::{CommandPublisher, SlashCommand, SyncError};
use crate::config::ChatConfig;

/// Where command sync publishes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTarget {
    Guild {
        application_id: String,
        guild_id: String,
    },
    Global {
        application_id: String,
    },
}

impl SyncTarget {
    /// Guild-scoped when a guild id is configured, global otherwise
    pub fn from_config(config: &ChatConfig) -> Option<Self> {
        let application_id = config.application_id.clone()?;
        Some(match &config.guild_id {
            Some(guild_id) => SyncTarget::Guild {
                application_id,
                guild_id: guild_id.clone(),
            },
            None => SyncTarget::Global { application_id },
        })
    }

    pub fn path(&self) -> String {
        match self {
            SyncTarget::Guild {
                application_id,
                guild_id,
            } => format!("/applications/{}/guilds/{}/commands", application_id, guild_id),
            SyncTarget::Global { application_id } => {
                format!("/applications/{}/commands", application_id)
            }
        }
    }
}

struct ClientInner {
    http: Client,
    config: ChatConfig,
    connected: AtomicBool,
}

/// Cheaply cloneable handle to the chat platform
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<ClientInner>,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                config,
                connected: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.inner.config
    }

    /// Underlying HTTP client, for plugins making their own platform calls
    pub fn http(&self) -> &Client {
        &self.inner.http
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn sync_target(&self) -> Option<SyncTarget> {
        SyncTarget::from_config(&self.inner.config)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.config.api_base.trim_end_matches('/'), path)
    }

    fn token(&self) -> Result<&str, SyncError> {
        self.inner
            .config
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(SyncError::NotConfigured("missing bot token"))
    }

    /// Verify the bot token against the platform and mark the client connected
    pub async fn connect(&self) -> Result<(), SyncError> {
        let token = self.token()?;
        let response = self
            .inner
            .http
            .get(self.url("/users/@me"))
            .header(header::AUTHORIZATION, format!("Bot {}", token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        self.inner.connected.store(true, Ordering::SeqCst);
        info!("Connected to chat platform");
        Ok(())
    }
}

#[async_trait]
impl CommandPublisher for ChatClient {
    async fn publish(&self, commands: &[SlashCommand]) -> Result<(), SyncError> {
        let target = self
            .sync_target()
            .ok_or(SyncError::NotConfigured("missing application id"))?;
        let token = self.token()?;
        let url = self.url(&target.path());
        debug!(url = %url, count = commands.len(), "Publishing commands");

        let response = self
            .inner
            .http
            .put(&url)
            .header(header::AUTHORIZATION, format!("Bot {}", token))
            .json(commands)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(body = %body, "Command sync rate limited");
        }
        Err(SyncError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
