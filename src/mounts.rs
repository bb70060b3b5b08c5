//! Route mounting for plugin HTTP endpoints.
//!
//! Plugins may mount routers before the host HTTP server exists. Those
//! requests wait in a pending queue until [`RouteMounter::attach`] hands over
//! the server; the queue is drained exactly once and every later mount goes
//! straight to the server. Mounts are permanent for the process lifetime.

use axum::Router;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// The host HTTP server as seen by plugins
pub trait MountTarget: Send + Sync {
    fn mount(&self, path: &str, router: Router);
}

/// A mount request waiting for the server
pub struct PendingMount {
    pub plugin_id: String,
    pub path: String,
    router: Router,
}

enum MountState {
    Unattached(Vec<PendingMount>),
    Attached(Arc<dyn MountTarget>),
}

/// Whether a mount went to the server or into the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    Mounted,
    Queued,
}

pub struct RouteMounter {
    state: Mutex<MountState>,
}

impl RouteMounter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MountState::Unattached(Vec::new())),
        }
    }

    pub fn mount(&self, plugin_id: &str, path: &str, router: Router) -> MountOutcome {
        let path = normalize_mount_path(path);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *state {
            MountState::Attached(target) => {
                target.mount(&path, router);
                info!(plugin = %plugin_id, path = %path, "Mounted plugin router");
                MountOutcome::Mounted
            }
            MountState::Unattached(pending) => {
                debug!(plugin = %plugin_id, path = %path, "Queued plugin router until server starts");
                pending.push(PendingMount {
                    plugin_id: plugin_id.to_string(),
                    path,
                    router,
                });
                MountOutcome::Queued
            }
        }
    }

    /// Hand over the server and drain the pending queue.
    ///
    /// Returns the number of queued routers mounted, or `None` if a server
    /// was already attached (the new target is ignored).
    pub fn attach(&self, target: Arc<dyn MountTarget>) -> Option<usize> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let pending = match &mut *state {
            MountState::Attached(_) => {
                warn!("HTTP server already attached, ignoring second attach");
                return None;
            }
            MountState::Unattached(pending) => std::mem::take(pending),
        };

        let drained = pending.len();
        for mount in pending {
            target.mount(&mount.path, mount.router);
            info!(plugin = %mount.plugin_id, path = %mount.path, "Mounted queued plugin router");
        }
        *state = MountState::Attached(target);
        Some(drained)
    }

    pub fn is_attached(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            MountState::Attached(_)
        )
    }

    pub fn pending_count(&self) -> usize {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            MountState::Unattached(pending) => pending.len(),
            MountState::Attached(_) => 0,
        }
    }
}

impl Default for RouteMounter {
    fn default() -> Self {
        Self::new()
    }
}

/// `status/` -> `/status`, `/` stays `/`
pub fn normalize_mount_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}
