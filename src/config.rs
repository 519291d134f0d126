//! Persisted user settings.
//!
//! A single small JSON file under the platform config directory, loaded at
//! startup and written at shutdown. Only the display language lives here;
//! everything else is per-invocation flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "wsl-orchestrator";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub language: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
        }
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

/// Loads settings, falling back to defaults when the file is missing or
/// unreadable; a corrupt config never blocks startup.
pub fn load() -> Settings {
    config_path()
        .map(|p| load_from(&p))
        .unwrap_or_default()
}

pub fn load_from(path: &Path) -> Settings {
    fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

pub fn save(settings: &Settings) -> Result<()> {
    let path = config_path().context("no config directory on this platform")?;
    save_to(&path, settings)
}

pub fn save_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create config directory {}", parent.display()))?;
    }
    let raw = serde_json::to_string_pretty(settings)?;
    fs::write(path, raw).with_context(|| format!("write settings to {}", path.display()))
}
