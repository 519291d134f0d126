//! Orchestration layer between presentation and the lifecycle core.
//!
//! The controller task is the only place that mutates the registry; UI
//! layers talk to it exclusively through [`crate::model::UiCommand`] and
//! [`crate::model::AppEvent`] channels.

mod controller;

pub(crate) use controller::{run_controller, ControllerOptions};
