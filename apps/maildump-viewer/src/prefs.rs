use directories::BaseDirs;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Stored notification preference, `"true"` or `"false"`.
pub const NOTIFICATIONS_KEY: &str = "notifications";

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("unable to determine home directory")]
    NoHome,
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed preferences file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize preferences: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Durable string key/value storage for viewer-local settings.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), PrefsError>;
}

/// Reads a stringified boolean. Anything but `"true"` is false.
pub fn get_bool(store: &dyn PreferenceStore, key: &str) -> bool {
    store.get(key).as_deref() == Some("true")
}

pub fn set_bool(store: &dyn PreferenceStore, key: &str, value: bool) -> Result<(), PrefsError> {
    store.set(key, if value { "true" } else { "false" })
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferencesFile {
    #[serde(default)]
    values: BTreeMap<String, String>,
}

/// TOML file backed store, rewritten on every change.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl FilePreferences {
    pub fn default_path() -> Result<PathBuf, PrefsError> {
        let base = BaseDirs::new().ok_or(PrefsError::NoHome)?;
        Ok(base
            .home_dir()
            .join(".maildump-viewer")
            .join("preferences.toml"))
    }

    /// Loads `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PrefsError> {
        let path = path.into();
        let values = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| PrefsError::Io {
                path: path.clone(),
                source,
            })?;
            toml::from_str::<PreferencesFile>(&raw)?.values
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), PrefsError> {
        let io_err = |source| PrefsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let serialized = toml::to_string_pretty(&PreferencesFile {
            values: values.clone(),
        })?;
        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(io_err)?;
        file.write_all(serialized.as_bytes()).map_err(io_err)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PrefsError> {
        let mut values = self.values.write();
        let previous = values.insert(key.to_string(), value.to_string());
        if let Err(err) = self.save(&values) {
            match previous {
                Some(previous) => values.insert(key.to_string(), previous),
                None => values.remove(key),
            };
            return Err(err);
        }
        tracing::debug!(target = "viewer::prefs", key, value, "preference stored");
        Ok(())
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferences {
    pub fn with(entries: &[(&str, &str)]) -> Self {
        let values = entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self {
            values: Mutex::new(values),
        }
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
