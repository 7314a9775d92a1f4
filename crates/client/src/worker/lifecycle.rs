//! Worker lifecycle states and legal transitions.
//!
//! ```text
//! registering -> installing -> installed -> activating -> activated
//!                     |            |            |             |
//!                     v            v            v             v
//!              install-failed  redundant  activate-failed  redundant
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerState {
    Registering,
    Installing,
    /// Installed and waiting to be promoted.
    Installed,
    Activating,
    /// Activated and controlling pages.
    Activated,
    /// Install failed; nothing was committed and the previous version keeps serving.
    InstallFailed,
    ActivateFailed,
    /// Replaced by a newer version.
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Registering => "registering",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::InstallFailed => "install-failed",
            WorkerState::ActivateFailed => "activate-failed",
            WorkerState::Redundant => "redundant",
        }
    }

    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Registering, Installing)
                | (Installing, Installed)
                | (Installing, InstallFailed)
                | (Installed, Activating)
                | (Installed, Redundant)
                | (Activating, Activated)
                | (Activating, ActivateFailed)
                | (Activated, Redundant)
        )
    }

    /// No further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::InstallFailed | WorkerState::ActivateFailed | WorkerState::Redundant)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
