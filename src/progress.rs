use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::EngineError;

/// Well-known progress keys shared by the engine and its drivers.
pub mod keys {
    pub const SCENE: &str = "sceneId";
    pub const DIALOGUE: &str = "dialogueId";
    pub const SETTINGS: &str = "settings";

    /// Key for one recorded player choice.
    pub fn choice(scene_id: &str, node_id: &str) -> String {
        format!("choice.{scene_id}.{node_id}")
    }
}

/// Externally-owned key/value persistence for player progress.
///
/// The engine reads and writes through this interface and never owns the
/// storage format; durability is the implementation's problem.
pub trait ProgressStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), EngineError>;
    fn remove(&self, key: &str) -> Result<(), EngineError>;
}

/// In-memory store; clones share the same underlying map.
#[derive(Debug, Default)]
pub struct MemoryProgress {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl Clone for MemoryProgress {
    fn clone(&self) -> Self {
        Self {
            values: Arc::clone(&self.values),
        }
    }
}

impl MemoryProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every stored pair.
    pub fn all(&self) -> HashMap<String, String> {
        self.values.read().clone()
    }
}

impl ProgressStore for MemoryProgress {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), EngineError> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), EngineError> {
        self.values.write().remove(key);
        Ok(())
    }
}

/// JSON-file-backed store, the native analogue of the browser's local
/// storage. Every `set`/`remove` writes the full document through to disk.
#[derive(Debug)]
pub struct FileProgress {
    path: PathBuf,
    values: RwLock<HashMap<String, String>>,
}

impl FileProgress {
    /// Opens the store, loading existing values if the file is present.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let data = fs::read_to_string(&path).map_err(|err| {
                EngineError::persistence(format!("unable to read {}: {err}", path.display()))
            })?;
            serde_json::from_str(&data).map_err(|err| {
                EngineError::persistence(format!("{} is not a valid save file: {err}", path.display()))
            })?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &HashMap<String, String>) -> Result<(), EngineError> {
        let data = serde_json::to_string_pretty(values)
            .map_err(|err| EngineError::persistence(format!("unable to encode save data: {err}")))?;
        fs::write(&self.path, data).map_err(|err| {
            EngineError::persistence(format!("unable to write {}: {err}", self.path.display()))
        })
    }
}

impl ProgressStore for FileProgress {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), EngineError> {
        let mut values = self.values.write();
        values.insert(key.to_string(), value.to_string());
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> Result<(), EngineError> {
        let mut values = self.values.write();
        if values.remove(key).is_some() {
            self.flush(&values)?;
        }
        Ok(())
    }
}
