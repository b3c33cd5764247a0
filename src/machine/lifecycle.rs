//! Lifecycle of a machine instance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `Created → Initialized → Running → Stopped`, with `Stopped → Running`
/// allowed for a restart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    #[default]
    Created,
    Initialized,
    Running,
    Stopped,
}

impl Lifecycle {
    /// Whether `start` may be called in this stage.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Initialized | Self::Stopped)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
