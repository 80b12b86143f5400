use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum SessionStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid session key")]
    InvalidKey,
}

/// One JSON document per session key, written atomically.
pub struct SessionStore {
    base_path: PathBuf,
}

impl SessionStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, SessionStoreError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn session_path(&self, session_key: &str) -> Result<PathBuf, SessionStoreError> {
        if session_key.is_empty()
            || session_key.contains("..")
            || session_key.contains('/')
            || session_key.contains('\\')
        {
            return Err(SessionStoreError::InvalidKey);
        }
        Ok(self.base_path.join(format!("{}.json", session_key)))
    }

    pub fn load<T: DeserializeOwned>(&self, session_key: &str) -> Result<Option<T>, SessionStoreError> {
        let path = self.session_path(session_key)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save<T: Serialize>(&self, session_key: &str, value: &T) -> Result<(), SessionStoreError> {
        let path = self.session_path(session_key)?;
        let temp_path = path.with_extension("tmp");

        {
            let mut file = File::create(&temp_path)?;
            let json = serde_json::to_string_pretty(value)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    /// Returns whether a document existed.
    pub fn remove(&self, session_key: &str) -> Result<bool, SessionStoreError> {
        let path = self.session_path(session_key)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }

    pub fn keys(&self) -> Result<Vec<String>, SessionStoreError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!("Skipping unreadable session entry: {}", e);
                    continue;
                }
            };
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
