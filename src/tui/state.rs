use crate::error::ValidationError;
use crate::i18n::Catalog;
use crate::model::{AppEvent, InfoEvent, Instance, RenameStatus};
use crate::ops::{gate_actions, ActionGates};

/// Which input the UI is currently capturing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    ConfirmTerminate { name: String },
    ConfirmShutdown,
    RenameInput { old_name: String, buffer: String },
    ConfirmRename { old_name: String, new_name: String },
    /// A rename is in flight; input is ignored until the controller
    /// reports completion.
    Renaming,
}

/// UI-thread-owned state; the controller never touches it.
pub struct UiState {
    pub instances: Vec<Instance>,
    pub selected: usize,
    pub info: String,
    pub mode: Mode,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            instances: Vec::new(),
            selected: 0,
            info: String::new(),
            mode: Mode::Normal,
        }
    }
}

impl UiState {
    pub fn selected_instance(&self) -> Option<&Instance> {
        self.instances.get(self.selected)
    }

    pub fn gates(&self) -> ActionGates {
        gate_actions(self.selected_instance())
    }

    pub fn select_next(&mut self) {
        if !self.instances.is_empty() {
            self.selected = (self.selected + 1).min(self.instances.len() - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Command line a user can paste into a terminal or shortcut to open
    /// the selected distribution.
    pub fn shortcut_command(&self) -> String {
        match self.selected_instance() {
            Some(inst) if inst.name.contains(char::is_whitespace) => {
                format!("wsl.exe -d \"{}\"", inst.name)
            }
            Some(inst) => format!("wsl.exe -d {}", inst.name),
            None => String::new(),
        }
    }

    /// Applies a controller event; the snapshot is replaced wholesale and
    /// the selection follows the previously selected name when it survives.
    pub fn apply_event(&mut self, event: AppEvent, catalog: &Catalog) {
        match event {
            AppEvent::Registry(instances) => {
                let previous = self
                    .selected_instance()
                    .map(|i| i.name.clone());
                self.instances = instances;
                self.selected = previous
                    .and_then(|name| self.instances.iter().position(|i| i.name == name))
                    .unwrap_or(0);
                if self.instances.is_empty() {
                    self.selected = 0;
                }
            }
            AppEvent::Info(info) => {
                self.info = localize_info(&info, catalog);
            }
            AppEvent::RenameStarted { old_name, new_name } => {
                self.mode = Mode::Renaming;
                self.info = format!(
                    "{old_name} -> {new_name}: {}",
                    catalog.get("rename_progress_message")
                );
            }
            AppEvent::RenameDone { task, archive } => {
                self.mode = Mode::Normal;
                self.info = match task.status {
                    RenameStatus::Succeeded | RenameStatus::Pending => {
                        catalog.format("rename_success_message", &[("new_name", &task.new_name)])
                    }
                    RenameStatus::Failed(detail) => match archive {
                        Some(path) => format!(
                            "{detail}. {}",
                            catalog.format(
                                "rename_archive_note",
                                &[("archive_path", &path.display().to_string())],
                            )
                        ),
                        None => detail,
                    },
                };
            }
        }
    }
}

/// Maps structured diagnostics onto the localized string table.
pub fn localize_info(info: &InfoEvent, catalog: &Catalog) -> String {
    match info {
        InfoEvent::ToolMissing => catalog.get("error_wsl_not_found"),
        InfoEvent::Rejected(ValidationError::NotStopped(_)) => {
            catalog.get("error_rename_stopped")
        }
        InfoEvent::Rejected(ValidationError::NameHasWhitespace(_)) => {
            catalog.get("error_rename_no_space")
        }
        InfoEvent::Rejected(ValidationError::DuplicateName(name)) => {
            catalog.format("error_rename_duplicate", &[("new_name", name)])
        }
        other => other.to_message(),
    }
}
