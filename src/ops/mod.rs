//! Lifecycle operations.
//!
//! Every operation validates its preconditions against the current registry
//! snapshot before the control tool is touched; a validation failure means
//! no subprocess was launched and no state changed. Refresh scheduling after
//! an operation is the controller's job, not done here.

pub mod rename;

use crate::error::{OpError, ValidationError};
use crate::model::Instance;
use crate::registry::Registry;
use crate::runner::CommandRunner;

/// Launch an interactive session for a distribution, detached. Also the
/// "start" action: the tool boots a stopped distribution on entry. State
/// settles asynchronously, so the caller schedules a delayed refresh.
pub fn start(
    runner: &impl CommandRunner,
    registry: &Registry,
    name: &str,
) -> Result<(), OpError> {
    require_instance(registry, name)?;
    runner.spawn_detached(&["-d", name, "--cd", "~"])?;
    Ok(())
}

/// Same detached launch as [`start`], but the caller skips the follow-up
/// refresh because opening a shell on a running distribution changes
/// nothing.
pub fn open_shell(
    runner: &impl CommandRunner,
    registry: &Registry,
    name: &str,
) -> Result<(), OpError> {
    require_instance(registry, name)?;
    runner.spawn_detached(&["-d", name, "--cd", "~"])?;
    Ok(())
}

pub fn terminate(
    runner: &impl CommandRunner,
    registry: &Registry,
    name: &str,
) -> Result<(), OpError> {
    require_instance(registry, name)?;
    runner.run(&["--terminate", name])?;
    Ok(())
}

/// Shuts down the whole subsystem; no per-instance precondition.
pub fn shutdown_all(runner: &impl CommandRunner) -> Result<(), OpError> {
    runner.run(&["--shutdown"])?;
    Ok(())
}

fn require_instance<'a>(registry: &'a Registry, name: &str) -> Result<&'a Instance, ValidationError> {
    registry
        .get(name)
        .ok_or_else(|| ValidationError::UnknownInstance(name.to_string()))
}

/// Which actions are available for the current selection.
///
/// This is the pure equivalent of the UI's button enabling: shell is
/// available for any selection, start/rename only for stopped
/// distributions, terminate for everything else. Shutdown-all is always
/// available and not part of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionGates {
    pub open_shell: bool,
    pub start: bool,
    pub rename: bool,
    pub terminate: bool,
}

pub fn gate_actions(selected: Option<&Instance>) -> ActionGates {
    match selected {
        None => ActionGates::default(),
        Some(inst) => {
            let stopped = inst.state.is_stopped();
            ActionGates {
                open_shell: true,
                start: stopped,
                rename: stopped,
                terminate: !stopped,
            }
        }
    }
}
