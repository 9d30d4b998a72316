//! Persisted export settings.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use stroke_model::ExportSettings;

const SETTINGS_SCHEMA_VERSION: u32 = 1;
const SETTINGS_FILE: &str = "settings.json";

/// Overrides the platform data directory, mainly for tests and portable installs.
pub const DATA_DIR_ENV: &str = "INKPAPER_DATA_DIR";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("settings file {path} uses schema version {found}, newest supported is {supported}")]
    UnsupportedVersion { path: PathBuf, found: u32, supported: u32 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct SettingsEnvelope<S> {
    version: u32,
    settings: S,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("dev", "InkPaper", "InkPaper").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    /// Honors [`DATA_DIR_ENV`] before falling back to the platform directory.
    pub fn from_env_or_default() -> Result<Self, StorageError> {
        match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Ok(Self::with_root(dir)),
            _ => Self::from_default_project(),
        }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    /// Stored settings, or the defaults when nothing has been saved yet.
    pub fn load_settings(&self) -> Result<ExportSettings, StorageError> {
        let path = self.settings_path();
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(ExportSettings::default());
        }

        let bytes = fs::read(&path)?;
        let envelope: SettingsEnvelope<ExportSettings> = serde_json::from_slice(&bytes)?;
        if envelope.version > SETTINGS_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion {
                path,
                found: envelope.version,
                supported: SETTINGS_SCHEMA_VERSION,
            });
        }

        Ok(envelope.settings)
    }

    pub fn save_settings(&self, settings: &ExportSettings) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope = SettingsEnvelope { version: SETTINGS_SCHEMA_VERSION, settings };
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        // Write beside the target first so a crash never leaves half a file.
        let staging = self.root.join(format!("{SETTINGS_FILE}.tmp"));
        fs::write(&staging, bytes)?;
        fs::rename(&staging, self.settings_path())?;
        Ok(())
    }
}
