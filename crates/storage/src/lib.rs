use directories::ProjectDirs;
use doc_model::EditorPreferences;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const PREFS_SCHEMA_VERSION: u32 = 1;
const PREFS_FILE_NAME: &str = "editor-preferences.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("preferences schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PreferencesEnvelope {
    version: u32,
    preferences: EditorPreferences,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "Pagemark", "Pagemark")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.root.join(PREFS_FILE_NAME)
    }

    /// Missing files yield defaults; every loaded value passes through
    /// [`EditorPreferences::validated`].
    pub fn load_preferences(&self) -> Result<EditorPreferences, StorageError> {
        let path = self.preferences_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no preferences file, using defaults");
            return Ok(EditorPreferences::default());
        }

        let bytes = fs::read(&path)?;
        let envelope: PreferencesEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version > PREFS_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: envelope.version,
                supported: PREFS_SCHEMA_VERSION,
            });
        }

        Ok(envelope.preferences.validated())
    }

    pub fn save_preferences(&self, preferences: &EditorPreferences) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope = PreferencesEnvelope {
            version: PREFS_SCHEMA_VERSION,
            preferences: preferences.clone().validated(),
        };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        let path = self.preferences_path();
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, bytes)?;
        fs::rename(&staging, &path)?;

        tracing::debug!(path = %path.display(), "saved preferences");
        Ok(())
    }
}
