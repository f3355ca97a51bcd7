//! Best-effort artifact persistence keyed by tenant and conversation.
//!
//! DESIGN
//! ======
//! `StorageBackend` is the key/value seam (`MemoryStorage` in process,
//! `FileStorage` one JSON file per key). `load_artifact` and
//! `save_artifact` sit on top and never fail: a missing, corrupt or
//! incomplete record loads as `None`, and write failures are logged and
//! dropped. Persistence is advisory.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use crate::artifact::ReactArtifact;
use crate::error::ErrorCode;

pub const STORAGE_NAMESPACE: &str = "react-artifact";
pub const STORAGE_VERSION: &str = "v1";
pub const DEFAULT_TENANT: &str = "default-tenant";
pub const DRAFT_CONVERSATION: &str = "draft";

// =============================================================================
// KEYS
// =============================================================================

/// `react-artifact:v1:<tenant>:<conversation>`. Absent or blank parts fall
/// back to shared sentinel slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    #[must_use]
    pub fn new(tenant: Option<&str>, conversation: Option<&str>) -> Self {
        let tenant = tenant.map(str::trim).filter(|t| !t.is_empty()).unwrap_or(DEFAULT_TENANT);
        let conversation = conversation.map(str::trim).filter(|c| !c.is_empty()).unwrap_or(DRAFT_CONVERSATION);
        Self(format!("{STORAGE_NAMESPACE}:{STORAGE_VERSION}:{tenant}:{conversation}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// BACKENDS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("artifact serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "E_STORAGE_IO",
            Self::Serialize(_) => "E_STORAGE_SERIALIZE",
        }
    }
}

/// String key/value store in the shape of browser `localStorage`.
pub trait StorageBackend: Send + Sync {
    /// # Errors
    ///
    /// Backend read failures. A missing key is `Ok(None)`.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Backend write failures.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Backend write failures. Removing a missing key succeeds.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
        Ok(())
    }
}

/// One `<escaped key>.json` file per key under `dir`. Writes go through a
/// temporary file and a rename.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { key: key.to_owned(), source }),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io { key: key.to_owned(), source };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value).map_err(io_err)?;
        fs::rename(&staging, &path).map_err(io_err)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(StorageError::Io { key: key.to_owned(), source: e }),
            _ => Ok(()),
        }
    }
}

/// Percent-escape everything outside `[A-Za-z0-9._-]` so any key is a
/// portable file name.
fn file_stem(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-') {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

// =============================================================================
// ARTIFACTS
// =============================================================================

/// The artifact saved under `key`, if it parses and has both code and a
/// source message.
#[must_use]
pub fn load_artifact(backend: &dyn StorageBackend, key: &StorageKey) -> Option<ReactArtifact> {
    let raw = match backend.get_item(key.as_str()) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(key = %key, error = %e, code = e.error_code(), "artifact load failed");
            return None;
        }
    };
    let artifact: ReactArtifact = match serde_json::from_str(&raw) {
        Ok(artifact) => artifact,
        Err(e) => {
            warn!(key = %key, error = %e, "stored artifact is malformed; ignoring");
            return None;
        }
    };
    if artifact.code.trim().is_empty() || artifact.source_message_id.is_empty() {
        debug!(key = %key, "stored artifact is incomplete; ignoring");
        return None;
    }
    Some(artifact)
}

/// Persist `artifact` under `key`. Failures are logged, never returned.
pub fn save_artifact(backend: &dyn StorageBackend, key: &StorageKey, artifact: &ReactArtifact) {
    let result = serde_json::to_string(artifact)
        .map_err(StorageError::from)
        .and_then(|raw| backend.set_item(key.as_str(), &raw));
    match result {
        Ok(()) => debug!(key = %key, artifact_id = %artifact.id, "artifact saved"),
        Err(e) => warn!(key = %key, error = %e, code = e.error_code(), "artifact save failed"),
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
