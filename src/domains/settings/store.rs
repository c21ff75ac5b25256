use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};
use parking_lot::RwLock;

use super::types::{HistorySettings, SessionPreferences, SyncSettings};

const SETTINGS_DIR: &str = "schaltwerk";
const SETTINGS_FILE: &str = "sync.toml";

pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
}

/// TOML-backed settings with an in-memory copy that can be changed at runtime.
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<SyncSettings>,
}

impl SettingsStore {
    /// Reads settings from `path`. A missing file yields defaults; an
    /// unparsable file is logged and replaced by defaults in memory.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = read_settings(&path)?;
        Ok(Self {
            path,
            current: RwLock::new(settings),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> SyncSettings {
        self.current.read().clone()
    }

    pub fn session_preferences(&self) -> SessionPreferences {
        self.current.read().session.clone()
    }

    pub fn history(&self) -> HistorySettings {
        self.current.read().history
    }

    pub fn auto_cancel_after_merge(&self) -> bool {
        self.current.read().session.auto_cancel_after_merge
    }

    pub fn set_auto_cancel_after_merge(&self, enabled: bool) -> Result<()> {
        self.current.write().session.auto_cancel_after_merge = enabled;
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        let settings = self.snapshot();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let raw = toml::to_string_pretty(&settings).context("Failed to serialize settings")?;
        fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))?;
        debug!("Saved settings to {}", self.path.display());
        Ok(())
    }
}

fn read_settings(path: &Path) -> Result<SyncSettings> {
    if !path.exists() {
        return Ok(SyncSettings::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;

    match toml::from_str::<SyncSettings>(&raw) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            warn!(
                "Failed to parse settings at {}, using defaults: {e}",
                path.display()
            );
            Ok(SyncSettings::default())
        }
    }
}
