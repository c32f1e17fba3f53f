//! User-tunable voice settings and their persistence.
//!
//! Settings live as one JSON blob under a fixed key. A missing or unreadable
//! blob is never an error for the caller: defaults are used instead.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::errors::{VoiceNavError, VoiceNavResult};

pub const SETTINGS_KEY: &str = "voice-settings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSettings {
    /// BCP-47 tag used for recognition and synthesis.
    pub language: String,
    /// Final transcripts below this confidence are ignored.
    pub confidence_threshold: f32,
    pub silence_timeout: u64,
    pub show_confidence: bool,
    pub show_timestamp: bool,
    /// Speak the result message after each command.
    pub announce_actions: bool,
    pub max_transcriptions: usize,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            language: "es-ES".into(),
            confidence_threshold: 0.5,
            silence_timeout: 3000,
            show_confidence: true,
            show_timestamp: true,
            announce_actions: true,
            max_transcriptions: 50,
        }
    }
}

/// Key/value blob storage.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> VoiceNavResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> VoiceNavResult<()>;
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    dir: PathBuf,
}

impl FileSettingsStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// `<data dir>/voicenav`, or the working directory when the platform has none.
    pub fn default_location() -> Self {
        let dir = dirs::data_dir()
            .map(|d| d.join("voicenav"))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> VoiceNavResult<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(VoiceNavError::Settings(format!("invalid settings key {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, key: &str) -> VoiceNavResult<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> VoiceNavResult<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, value)?;
        tracing::debug!(path = %path.display(), "settings written");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> VoiceNavResult<Option<String>> {
        let blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(blobs.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> VoiceNavResult<()> {
        let mut blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        blobs.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub fn load_settings(store: &dyn SettingsStore) -> VoiceSettings {
    match store.get(SETTINGS_KEY) {
        Ok(Some(blob)) => match serde_json::from_str::<VoiceSettings>(&blob) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, "stored voice settings unreadable, using defaults");
                VoiceSettings::default()
            }
        },
        Ok(None) => VoiceSettings::default(),
        Err(e) => {
            tracing::warn!(error = %e, "voice settings store failed, using defaults");
            VoiceSettings::default()
        }
    }
}

pub fn save_settings(store: &dyn SettingsStore, settings: &VoiceSettings) -> VoiceNavResult<()> {
    let blob = serde_json::to_string(settings)?;
    store.set(SETTINGS_KEY, &blob)
}

/// Persists and returns the defaults.
pub fn reset_settings(store: &dyn SettingsStore) -> VoiceNavResult<VoiceSettings> {
    let defaults = VoiceSettings::default();
    save_settings(store, &defaults)?;
    Ok(defaults)
}
