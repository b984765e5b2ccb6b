//! Persisted user settings.
//!
//! Surfaces take a [`SettingsStore`] at construction instead of reaching for
//! process-wide state, so tests and embedders can substitute their own
//! backing. The shipped backing is a write-through JSON file in the platform
//! config directory.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

/// Key for the caption preference shared by all surfaces.
pub const CAPTIONS_ENABLED_KEY: &str = "captions.enabled";

/// Minimal key-value store for user preferences.
///
/// Missing keys read as `false`, matching the behavior of platform defaults
/// databases.
pub trait SettingsStore: Send + Sync {
    fn bool_for(&self, key: &str) -> bool;
    fn set_bool(&self, key: &str, value: bool);
}

/// In-memory store for tests and headless embedders.
#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, bool>>,
}

impl MemorySettingsStore {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn bool_for(&self, key: &str) -> bool {
        self.values.lock().get(key).copied().unwrap_or(false)
    }

    fn set_bool(&self, key: &str, value: bool) {
        self.values.lock().insert(key.to_string(), value);
    }
}

/// Write-through JSON settings file.
///
/// Values are flushed to disk on every `set_bool`; reads are served from the
/// in-memory map loaded at construction. I/O failures are logged and the
/// in-memory value wins, so a read-only disk degrades to session-only
/// persistence.
pub struct JsonSettingsStore {
    path: PathBuf,
    values: Mutex<HashMap<String, serde_json::Value>>,
}

impl JsonSettingsStore {
    /// Store at the default platform location
    /// (`<config_dir>/loopview/settings.json`), or `None` when the platform
    /// reports no config directory.
    pub fn new() -> Option<Self> {
        dirs::config_dir().map(|dir| Self::at_path(dir.join("loopview").join("settings.json")))
    }

    /// Store backed by an explicit file path.
    pub fn at_path(path: PathBuf) -> Self {
        let values = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<HashMap<String, serde_json::Value>>(&text) {
                Ok(map) => map,
                Err(err) => {
                    tracing::error!("Failed to parse settings file {}: {err}", path.display());
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    fn flush(&self, values: &HashMap<String, serde_json::Value>) {
        if let Some(parent) = self.path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                tracing::error!("Failed to create settings directory: {err}");
                return;
            }
        }
        match serde_json::to_string_pretty(values) {
            Ok(text) => {
                if let Err(err) = fs::write(&self.path, text) {
                    tracing::error!("Failed to write settings file {}: {err}", self.path.display());
                }
            }
            Err(err) => tracing::error!("Failed to serialize settings: {err}"),
        }
    }
}

impl SettingsStore for JsonSettingsStore {
    fn bool_for(&self, key: &str) -> bool {
        self.values
            .lock()
            .get(key)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    fn set_bool(&self, key: &str, value: bool) {
        let mut values = self.values.lock();
        values.insert(key.to_string(), serde_json::Value::Bool(value));
        self.flush(&values);
    }
}
