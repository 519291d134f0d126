use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ValidationError;

/// One managed WSL distribution, as reported by the control tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub state: InstanceState,
    /// Subsystem version tag (e.g. "1" or "2"); informational only and kept
    /// as the tool printed it.
    pub version: String,
    /// Set when the listing carried the default marker for this entry.
    pub is_default: bool,
}

/// Distribution state. Action gating only cares about `Stopped` vs anything
/// else; states we do not recognize pass through opaquely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceState {
    Stopped,
    Running,
    Installing,
    Uninstalling,
    Other(String),
}

impl InstanceState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Stopped" => InstanceState::Stopped,
            "Running" => InstanceState::Running,
            "Installing" => InstanceState::Installing,
            "Uninstalling" => InstanceState::Uninstalling,
            other => InstanceState::Other(other.to_string()),
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, InstanceState::Stopped)
    }

    pub fn as_str(&self) -> &str {
        match self {
            InstanceState::Stopped => "Stopped",
            InstanceState::Running => "Running",
            InstanceState::Installing => "Installing",
            InstanceState::Uninstalling => "Uninstalling",
            InstanceState::Other(s) => s,
        }
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient record of an in-flight rename.
#[derive(Debug, Clone)]
pub struct RenameTask {
    pub old_name: String,
    pub new_name: String,
    pub status: RenameStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameStatus {
    Pending,
    Succeeded,
    Failed(String),
}

impl RenameTask {
    pub fn pending(old_name: &str, new_name: &str) -> Self {
        Self {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
            status: RenameStatus::Pending,
        }
    }
}

/// Commands emitted by presentation layers to drive the controller.
#[derive(Debug, Clone)]
pub enum UiCommand {
    Refresh,
    Start(String),
    OpenShell(String),
    Terminate(String),
    ShutdownAll,
    Rename { old_name: String, new_name: String },
    Quit,
}

/// Events emitted by the controller for presentation layers.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Fresh registry snapshot; replaces whatever the UI was showing.
    Registry(Vec<Instance>),
    Info(InfoEvent),
    RenameStarted {
        old_name: String,
        new_name: String,
    },
    RenameDone {
        task: RenameTask,
        /// Orphaned export archive, when a failed step left one behind.
        archive: Option<PathBuf>,
    },
}

/// Structured diagnostics surfaced to the user; presentation layers decide
/// how (and in which language) to render them.
#[derive(Debug, Clone)]
pub enum InfoEvent {
    Message(String),
    ToolMissing,
    OperationFailed {
        operation: &'static str,
        detail: String,
    },
    Rejected(ValidationError),
}

impl InfoEvent {
    /// Plain-English rendering for headless output; the TUI localizes
    /// through the string catalog instead.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::ToolMissing => {
                "the WSL control tool was not found on this system".to_string()
            }
            InfoEvent::OperationFailed { operation, detail } => {
                format!("{operation} failed: {detail}")
            }
            InfoEvent::Rejected(err) => err.to_string(),
        }
    }
}
