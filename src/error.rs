//! Error types for the orchestration core.
//!
//! Three failure families, kept distinct so callers can react differently:
//!
//! - [`CommandError`] — the control tool could not be run, or ran and failed.
//! - [`ValidationError`] — a precondition check rejected the operation before
//!   any external call was made; no side effects.
//! - [`RenameError`] — a step of the compound rename failed after earlier
//!   steps may already have taken effect.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures from a single control-tool invocation.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The control tool executable could not be located.
    #[error("the WSL control tool was not found on this system")]
    ToolNotFound,

    /// The tool was found but the process could not be launched.
    #[error("failed to launch the WSL control tool: {0}")]
    Spawn(io::Error),

    /// The tool ran and reported failure; stderr text is preserved verbatim.
    #[error("the WSL control tool exited with {}: {stderr}", exit_label(*code))]
    NonZeroExit {
        code: Option<i32>,
        stderr: String,
    },
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "no exit code".to_string(),
    }
}

impl CommandError {
    /// Maps a spawn-time io error, distinguishing a missing executable from
    /// other launch failures.
    pub fn from_spawn(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            CommandError::ToolNotFound
        } else {
            CommandError::Spawn(err)
        }
    }
}

/// Precondition violations, raised before any subprocess is launched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no distribution named '{0}' is currently registered")]
    UnknownInstance(String),

    #[error("'{0}' must be stopped before it can be renamed")]
    NotStopped(String),

    #[error("the new name must not be empty")]
    EmptyName,

    #[error("the new name '{0}' must not contain whitespace")]
    NameHasWhitespace(String),

    #[error("the new name is the same as the current name")]
    SameName,

    #[error("a distribution named '{0}' already exists")]
    DuplicateName(String),
}

/// The step of the compound rename that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameStep {
    Export,
    Unregister,
    Import,
}

impl RenameStep {
    pub fn as_str(self) -> &'static str {
        match self {
            RenameStep::Export => "export",
            RenameStep::Unregister => "unregister",
            RenameStep::Import => "import",
        }
    }
}

impl std::fmt::Display for RenameStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures from the compound rename workflow.
///
/// When `archive` is set the export archive still exists on disk and can be
/// imported manually; presentation layers must surface that path.
#[derive(Debug, Error)]
pub enum RenameError {
    #[error("rename {step} step failed: {source}{}", archive_note(archive))]
    Step {
        step: RenameStep,
        source: CommandError,
        archive: Option<PathBuf>,
    },

    #[error("could not resolve a per-user directory to import into")]
    NoImportRoot,

    /// Raised between unregister and import; the archive is the only copy
    /// left, so its path always travels with this error.
    #[error(
        "could not create import directory {}: {source} (export archive kept at {})",
        path.display(),
        archive.display()
    )]
    CreateImportDir {
        path: PathBuf,
        source: io::Error,
        archive: PathBuf,
    },
}

fn archive_note(archive: &Option<PathBuf>) -> String {
    match archive {
        Some(p) => format!(" (export archive kept at {})", p.display()),
        None => String::new(),
    }
}

impl RenameError {
    /// Path of the orphaned export archive, if one was left behind.
    pub fn archive_path(&self) -> Option<&PathBuf> {
        match self {
            RenameError::Step { archive, .. } => archive.as_ref(),
            RenameError::CreateImportDir { archive, .. } => Some(archive),
            RenameError::NoImportRoot => None,
        }
    }
}

/// Umbrella error for lifecycle operations.
#[derive(Debug, Error)]
pub enum OpError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Rename(#[from] RenameError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_not_found_is_distinguished_from_other_spawn_errors() {
        let missing = io::Error::new(io::ErrorKind::NotFound, "nope");
        assert!(matches!(
            CommandError::from_spawn(missing),
            CommandError::ToolNotFound
        ));

        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(
            CommandError::from_spawn(denied),
            CommandError::Spawn(_)
        ));
    }

    #[test]
    fn rename_step_error_reports_archive_path() {
        let err = RenameError::Step {
            step: RenameStep::Unregister,
            source: CommandError::NonZeroExit {
                code: Some(1),
                stderr: "busy".into(),
            },
            archive: Some(PathBuf::from("/tmp/ubuntu_export.tar")),
        };
        let msg = err.to_string();
        assert!(msg.contains("unregister"));
        assert!(msg.contains("ubuntu_export.tar"));
        assert_eq!(
            err.archive_path(),
            Some(&PathBuf::from("/tmp/ubuntu_export.tar"))
        );
    }
}
