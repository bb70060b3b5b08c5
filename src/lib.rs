//! plughost - runtime host for in-process feature plugins
//!
//! Owns plugin lifecycle, persisted per-plugin config, slash command
//! registration, scheduled jobs, and HTTP route mounting for plugins that
//! are compiled into the host binary.
//!
//! This library exposes the runtime for both the CLI binary and
//! integration testing.

pub mod admin;
pub mod builtin;
pub mod client;
pub mod commands;
pub mod config;
pub mod context;
pub mod mounts;
pub mod plugins;
pub mod scheduler;
pub mod server;
pub mod store;
