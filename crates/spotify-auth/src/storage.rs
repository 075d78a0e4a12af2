//! Persistent key-value capability
//!
//! The token lifecycle only needs `get`/`set`/`remove` on string values, the
//! same surface a browser's local storage offers. Two backends:
//!
//! - `MemoryStore`: process-local map, nothing survives a restart
//! - `FileStore`: one JSON object on disk, rewritten atomically on every
//!   mutation so a crash never leaves a half-written record behind

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Synchronous, process-local key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// File-backed store. The whole map is held in memory and the file is the
/// durable copy; the lock serializes writers so two mutations never race on
/// the rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// A missing file is an empty store (created on first write). A file that
    /// cannot be parsed is also treated as empty: the worst outcome is a fresh
    /// login, never a refusal to start.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<HashMap<String, String>>(&contents) {
                Ok(entries) => {
                    info!(path = %path.display(), keys = entries.len(), "loaded storage file");
                    entries
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "storage file is malformed, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "storage file not found, starting empty");
                HashMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "storage file unreadable, starting empty");
                HashMap::new()
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    // Both mutations write the updated map first and only then replace the
    // in-memory copy, so a failed write leaves memory matching disk.
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        let mut updated = entries.clone();
        updated.insert(key.to_string(), value.to_string());
        write_atomic(&self.path, &updated)?;
        *entries = updated;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut updated = entries.clone();
        updated.remove(key);
        write_atomic(&self.path, &updated)?;
        *entries = updated;
        Ok(())
    }
}

/// Write the map to a sibling temp file, then rename it over the target.
///
/// The file holds OAuth tokens, so it is created 0600 on unix.
fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Storage(format!("serializing storage: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)
        .map_err(|e| Error::Storage(format!("creating storage directory: {e}")))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "storage".into());
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| Error::Storage(format!("writing temp storage file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::Storage(format!("setting storage file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Storage(format!("renaming temp storage file: {e}")))?;

    debug!(path = %path.display(), "persisted storage");
    Ok(())
}
