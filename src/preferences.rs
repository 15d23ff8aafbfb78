//! Persisted viewer preferences (currently only the refresh interval).

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use crate::observability::{
    log_preferences_load_error, log_refresh_interval_invalid, log_refresh_interval_restored,
};

pub const REFRESH_PREFERENCE_KEY: &str = "dash_refresh_sec";
pub const DEFAULT_REFRESH_SECS: u64 = 600;

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("preference file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("preference file is not a JSON string map: {0}")]
    Json(#[from] serde_json::Error),
}

/// String key/value storage surviving restarts.
pub trait PreferenceStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError>;
    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError>;
}

#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, PreferenceError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        let _guard = self
            .write_lock
            .lock()
            .expect("preference write lock should not be poisoned");
        let mut all = self.read_all()?;
        all.insert(key.to_string(), value.to_string());
        write_atomic(&self.path, &serde_json::to_vec_pretty(&all)?)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    inner: Mutex<BTreeMap<String, String>>,
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError> {
        Ok(self
            .inner
            .lock()
            .expect("in-memory preference lock should not be poisoned")
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.inner
            .lock()
            .expect("in-memory preference lock should not be poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Restores the saved interval, falling back to the default when nothing
/// usable is stored.
pub fn load_refresh_interval(store: &dyn PreferenceStore) -> u64 {
    let raw = match store.get(REFRESH_PREFERENCE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return DEFAULT_REFRESH_SECS,
        Err(err) => {
            log_preferences_load_error(&err);
            return DEFAULT_REFRESH_SECS;
        }
    };

    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => {
            log_refresh_interval_restored(secs);
            secs
        }
        _ => {
            log_refresh_interval_invalid(&raw);
            DEFAULT_REFRESH_SECS
        }
    }
}

pub fn save_refresh_interval(
    store: &dyn PreferenceStore,
    secs: u64,
) -> Result<(), PreferenceError> {
    store.set(REFRESH_PREFERENCE_KEY, &secs.to_string())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PreferenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}
