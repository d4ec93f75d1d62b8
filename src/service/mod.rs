//! Mode holding service
//!
//! After the mode is committed, the process detaches and keeps the DRM
//! device open so the kernel does not revert the output. Reload requests
//! arrive as signals and are serviced from a coarse polling loop.

pub mod daemon;
pub mod holder;
pub mod params;
pub mod signals;
pub mod startup;

use log::debug;
use serde::{Deserialize, Serialize};

pub use daemon::{detach_into_background, PidFile};
pub use holder::{HolderSettings, ModeHolder};
pub use signals::{install_handlers, ServiceFlags, SERVICE_FLAGS};
pub use startup::establish_mode;

/// What happens to DRM master after the mode is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasterPolicy {
    /// Keep master until the process exits
    #[default]
    Hold,
    /// Drop master right after the commit so another program can take the
    /// display; whether the mode survives depends on the driver
    Yield,
}

/// Whether the service answers reload signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadPolicy {
    #[default]
    Reloadable,
    Static,
}

/// Process lifecycle, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServiceState {
    Init,
    ModeSet,
    Detached,
    Running,
    Terminating,
    Exited,
}

impl ServiceState {
    /// Move to `next`, which must come later in the lifecycle
    pub fn advance(&mut self, next: ServiceState) {
        assert!(next > *self, "invalid transition {:?} -> {:?}", self, next);
        debug!("Service state: {:?} -> {:?}", self, next);
        *self = next;
    }
}
