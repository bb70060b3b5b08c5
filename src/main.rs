//! plughost - runtime host for in-process feature plugins

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plughost::builtin::StatusPlugin;
use plughost::config;
use plughost::server::Host;
use plughost::store::ConfigStore;

#[derive(Parser)]
#[command(name = "plughost")]
#[command(author, version, about = "Runtime host for in-process feature plugins")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize plughost configuration in the current directory
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Load plugins and start the host server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
    },

    /// Show current configuration
    Config,

    /// Show persisted plugin state
    Plugins,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "plughost=debug,tower_http=debug"
    } else {
        "plughost=info,tower_http=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Init { force } => cmd_init(force),
        Commands::Serve { port, host } => cmd_serve(port, host).await,
        Commands::Config => cmd_config(),
        Commands::Plugins => cmd_plugins().await,
    }
}

const DEFAULT_CONFIG: &str = r#"# plughost configuration

server:
  port: 8080
  host: "127.0.0.1"

plugins:
  store_path: .plughost/plugins.json
  hook_timeout_secs: 30

chat:
  api_base: https://discord.com/api/v10
  # token: set via DISCORD_TOKEN
  # application_id: set via DISCORD_APPLICATION_ID
  # guild_id: set via DISCORD_GUILD_ID for instant guild-scoped command sync

# admin:
#   token: set via PLUGHOST_ADMIN__TOKEN to protect /api routes
"#;

/// Initialize plughost configuration
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_dir = PathBuf::from(".plughost");
    let config_file = config_dir.join("config.yaml");

    if config_file.exists() && !force {
        error!("Configuration already exists. Use --force to overwrite.");
        return Ok(());
    }

    fs::create_dir_all(&config_dir)?;
    fs::write(&config_file, DEFAULT_CONFIG)?;

    info!("Initialized plughost configuration in .plughost/");
    info!("  config.yaml   - Main configuration");
    info!("  plugins.json  - Plugin state (created on first change)");
    info!("");
    info!("Start the host:");
    info!("  plughost serve");

    Ok(())
}

/// Start the host server and run until Ctrl-C
async fn cmd_serve(port: Option<u16>, host: Option<String>) -> anyhow::Result<()> {
    let mut config = config::load_config()?;

    if let Some(p) = port {
        config.server.port = p;
    }
    if let Some(h) = host {
        config.server.host = h;
    }

    info!("plughost v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "Admin API: http://{}:{}/api/plugins",
        config.server.host, config.server.port
    );

    let host = Host::new(config)?;
    host.register(Arc::new(StatusPlugin::new()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        let _ = shutdown_tx.send(true);
    });

    host.serve(shutdown_rx).await
}

/// Show current configuration
fn cmd_config() -> anyhow::Result<()> {
    match config::load_config() {
        Ok(config) => {
            println!("plughost Configuration\n");
            print!("{}", serde_yaml::to_string(&config)?);
            println!();
            println!(
                "Chat token: {}",
                if config.chat.token.is_some() {
                    "configured"
                } else {
                    "not set"
                }
            );
            println!(
                "Admin token: {}",
                if config.admin.token.is_some() {
                    "configured"
                } else {
                    "not set (admin API is open)"
                }
            );
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            info!("Run 'plughost init' to create a configuration file.");
        }
    }
    Ok(())
}

/// Print the persisted plugin table
async fn cmd_plugins() -> anyhow::Result<()> {
    let config = config::load_config()?;
    let store = ConfigStore::new(&config.plugins.store_path);
    let entries = store.list_all().await?;

    println!("Plugin store: {}\n", store.path().display());
    if entries.is_empty() {
        println!("No plugin state persisted yet.");
        return Ok(());
    }
    for entry in entries {
        println!(
            "  {} [{}] {}",
            entry.id,
            if entry.enabled { "enabled" } else { "disabled" },
            serde_json::Value::Object(entry.config)
        );
    }
    Ok(())
}
