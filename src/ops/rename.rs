//! The compound rename: export → unregister → import → cleanup.
//!
//! The control tool has no atomic rename primitive, so this is a state
//! machine over three irreversible steps. Completed steps are never rolled
//! back; the safety property is that once unregister has run, the export
//! archive is preserved on any failure and its path travels with the error
//! so the user can re-import by hand.

use std::fs;
use std::path::PathBuf;

use crate::error::{RenameError, RenameStep, ValidationError};
use crate::registry::Registry;
use crate::runner::CommandRunner;

/// Subdirectory of the user's documents folder that receives imported
/// distribution storage, namespaced by the new name.
const IMPORT_ROOT_DIR: &str = "WSL_Distros";

/// Everything the worker needs, resolved up front on the control thread so
/// the blocking worker does no policy decisions of its own.
#[derive(Debug, Clone)]
pub struct RenamePlan {
    pub old_name: String,
    pub new_name: String,
    /// Temporary tar archive the filesystem is exported to.
    pub archive_path: PathBuf,
    /// Per-user storage directory the new instance is imported into.
    pub import_dir: PathBuf,
}

impl RenamePlan {
    pub fn new(old_name: &str, new_name: &str) -> Result<Self, RenameError> {
        let archive_path = std::env::temp_dir().join(format!("{old_name}_export.tar"));
        let import_root = dirs::document_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join("Documents")))
            .ok_or(RenameError::NoImportRoot)?;
        Ok(Self {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
            archive_path,
            import_dir: import_root.join(IMPORT_ROOT_DIR).join(new_name),
        })
    }
}

/// Validates the rename preconditions against the current snapshot.
///
/// Rejections here mean no external call was made and nothing changed.
pub fn validate(registry: &Registry, old_name: &str, new_name: &str) -> Result<(), ValidationError> {
    let instance = registry
        .get(old_name)
        .ok_or_else(|| ValidationError::UnknownInstance(old_name.to_string()))?;
    if !instance.state.is_stopped() {
        return Err(ValidationError::NotStopped(old_name.to_string()));
    }
    if new_name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if new_name.chars().any(char::is_whitespace) {
        return Err(ValidationError::NameHasWhitespace(new_name.to_string()));
    }
    if new_name == old_name {
        return Err(ValidationError::SameName);
    }
    if registry.contains(new_name) {
        return Err(ValidationError::DuplicateName(new_name.to_string()));
    }
    Ok(())
}

/// Runs the rename steps in order. Blocking; run it on a worker.
pub fn execute(runner: &impl CommandRunner, plan: &RenamePlan) -> Result<(), RenameError> {
    let archive = plan.archive_path.to_string_lossy().into_owned();

    // Step 1: export. Nothing has been destroyed yet, so a failure here is
    // a clean abort and the (possibly partial) archive is not advertised.
    runner
        .run(&["--export", &plan.old_name, &archive])
        .map_err(|source| RenameError::Step {
            step: RenameStep::Export,
            source,
            archive: None,
        })?;

    // Step 2: unregister the old name. From here on the archive is the only
    // copy of the filesystem; it is kept on every failure path.
    runner
        .run(&["--unregister", &plan.old_name])
        .map_err(|source| RenameError::Step {
            step: RenameStep::Unregister,
            source,
            archive: Some(plan.archive_path.clone()),
        })?;

    fs::create_dir_all(&plan.import_dir).map_err(|source| RenameError::CreateImportDir {
        path: plan.import_dir.clone(),
        source,
        archive: plan.archive_path.clone(),
    })?;

    // Step 3: import under the new name. On failure the archive stays for a
    // manual retry; the old registration is already gone.
    let import_dir = plan.import_dir.to_string_lossy().into_owned();
    runner
        .run(&["--import", &plan.new_name, &import_dir, &archive])
        .map_err(|source| RenameError::Step {
            step: RenameStep::Import,
            source,
            archive: Some(plan.archive_path.clone()),
        })?;

    // Step 4: cleanup. A leftover tar in the temp dir is harmless.
    let _ = fs::remove_file(&plan.archive_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Instance, InstanceState};
    use crate::runner::testing::{exit_error, MockRunner};

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.apply(vec![
            Instance {
                name: "Ubuntu".into(),
                state: InstanceState::Stopped,
                version: "2".into(),
                is_default: false,
            },
            Instance {
                name: "Debian".into(),
                state: InstanceState::Running,
                version: "2".into(),
                is_default: true,
            },
        ]);
        registry
    }

    fn plan() -> RenamePlan {
        RenamePlan {
            old_name: "Ubuntu".into(),
            new_name: "Jammy".into(),
            archive_path: std::env::temp_dir().join("wsl-orchestrator-test-export.tar"),
            import_dir: std::env::temp_dir().join("wsl-orchestrator-test-import"),
        }
    }

    #[test]
    fn rename_is_refused_unless_the_instance_is_stopped() {
        assert_eq!(
            validate(&registry(), "Debian", "Bookworm"),
            Err(ValidationError::NotStopped("Debian".into()))
        );
    }

    #[test]
    fn rename_is_refused_for_unknown_duplicate_empty_or_spaced_names() {
        let reg = registry();
        assert_eq!(
            validate(&reg, "Ghost", "Anything"),
            Err(ValidationError::UnknownInstance("Ghost".into()))
        );
        assert_eq!(
            validate(&reg, "Ubuntu", "Debian"),
            Err(ValidationError::DuplicateName("Debian".into()))
        );
        assert_eq!(validate(&reg, "Ubuntu", "  "), Err(ValidationError::EmptyName));
        assert_eq!(
            validate(&reg, "Ubuntu", "My Distro"),
            Err(ValidationError::NameHasWhitespace("My Distro".into()))
        );
        assert_eq!(
            validate(&reg, "Ubuntu", "Ubuntu"),
            Err(ValidationError::SameName)
        );
    }

    #[test]
    fn valid_rename_passes_validation() {
        assert_eq!(validate(&registry(), "Ubuntu", "Jammy"), Ok(()));
    }

    #[test]
    fn export_failure_stops_the_workflow_before_unregister() {
        let runner = MockRunner::new(vec![Err(exit_error("disk full"))]);
        let err = execute(&runner, &plan()).unwrap_err();

        match err {
            RenameError::Step { step, archive, .. } => {
                assert_eq!(step, RenameStep::Export);
                assert!(archive.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Only the export call went out.
        let calls = runner.recorded_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], "--export");
    }

    #[test]
    fn unregister_failure_preserves_and_reports_the_archive() {
        let runner = MockRunner::new(vec![
            Ok(String::new()),
            Err(exit_error("in use")),
        ]);
        let p = plan();
        let err = execute(&runner, &p).unwrap_err();

        assert_eq!(err.archive_path(), Some(&p.archive_path));
        let calls = runner.recorded_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1][0], "--unregister");
    }

    #[test]
    fn import_dir_creation_failure_still_reports_the_archive() {
        // Export and unregister succeed, then a regular file where the
        // import directory's parent should be makes create_dir_all fail.
        let runner = MockRunner::new(vec![Ok(String::new()), Ok(String::new())]);
        let blocker = std::env::temp_dir().join("wsl-orchestrator-test-dir-blocker");
        std::fs::write(&blocker, b"").unwrap();
        let mut p = plan();
        p.import_dir = blocker.join("nested");

        let err = execute(&runner, &p).unwrap_err();

        // The old registration is gone; the archive path must survive in
        // the error so the user can import by hand.
        assert_eq!(err.archive_path(), Some(&p.archive_path));
        assert!(matches!(err, RenameError::CreateImportDir { .. }));
        assert!(err.to_string().contains("wsl-orchestrator-test-export.tar"));
        assert_eq!(runner.recorded_calls().len(), 2);
        let _ = std::fs::remove_file(&blocker);
    }

    #[test]
    fn import_failure_preserves_and_reports_the_archive() {
        let runner = MockRunner::new(vec![
            Ok(String::new()),
            Ok(String::new()),
            Err(exit_error("bad tar")),
        ]);
        let p = plan();
        let err = execute(&runner, &p).unwrap_err();

        assert_eq!(err.archive_path(), Some(&p.archive_path));
        match err {
            RenameError::Step { step, .. } => assert_eq!(step, RenameStep::Import),
            other => panic!("unexpected error: {other:?}"),
        }
        let _ = std::fs::remove_dir_all(&p.import_dir);
    }

    #[test]
    fn successful_rename_runs_all_steps_in_order() {
        let runner = MockRunner::new(vec![
            Ok(String::new()),
            Ok(String::new()),
            Ok(String::new()),
        ]);
        let p = plan();
        execute(&runner, &p).unwrap();

        let calls = runner.recorded_calls();
        let ops: Vec<&str> = calls
            .iter()
            .map(|c| match c[0].as_str() {
                "--export" => "export",
                "--unregister" => "unregister",
                "--import" => "import",
                other => panic!("unexpected call {other}"),
            })
            .collect();
        assert_eq!(ops, vec!["export", "unregister", "import"]);

        // Import receives the new name, the storage dir, then the archive.
        assert_eq!(calls[2][1], "Jammy");
        assert_eq!(calls[2][2], p.import_dir.to_string_lossy());
        assert_eq!(calls[2][3], p.archive_path.to_string_lossy());
        let _ = std::fs::remove_dir_all(&p.import_dir);
    }

    #[test]
    fn plan_namespaces_the_import_directory_by_new_name() {
        let p = RenamePlan::new("Ubuntu", "Jammy").unwrap();
        assert!(p.archive_path.ends_with("Ubuntu_export.tar"));
        assert!(p.import_dir.ends_with("WSL_Distros/Jammy"));
    }
}
