// Backends for the persisted state
//
// `FileStore` keeps one JSON document on disk and replaces it atomically.
// `MemoryStore` is for tests and for sessions that should not outlive the
// process.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use super::PersistedState;
use crate::error::CoreError;

/// Load/save seam for [`PersistedState`].
pub trait LocalStore: Send + Sync {
    fn load(&self) -> Result<PersistedState, CoreError>;
    fn save(&self, state: &PersistedState) -> Result<(), CoreError>;
}

// ── FileStore ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, message: impl Into<String>) -> CoreError {
        CoreError::Store {
            path: self.path.clone(),
            message: message.into(),
        }
    }
}

impl LocalStore for FileStore {
    /// A missing file is an empty state. A corrupt file is logged and
    /// treated as empty so a damaged cache never blocks logging in again.
    fn load(&self) -> Result<PersistedState, CoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file yet");
                return Ok(PersistedState::default());
            }
            Err(e) => return Err(self.error(e.to_string())),
        };

        match serde_json::from_str(&contents) {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable state file");
                Ok(PersistedState::default())
            }
        }
    }

    fn save(&self, state: &PersistedState) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.error(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(state).map_err(|e| self.error(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.error(e.to_string()))?;
        restrict_permissions(&tmp).map_err(|e| self.error(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.error(e.to_string()))?;

        debug!(path = %self.path.display(), "state saved");
        Ok(())
    }
}

/// The state file holds a bearer token: owner read/write only.
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

// ── MemoryStore ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<PersistedState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing state, e.g. a restored session.
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// What the last `save` wrote.
    pub fn saved(&self) -> PersistedState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LocalStore for MemoryStore {
    fn load(&self) -> Result<PersistedState, CoreError> {
        Ok(self.saved())
    }

    fn save(&self, state: &PersistedState) -> Result<(), CoreError> {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"));
        assert_eq!(store.load().unwrap(), PersistedState::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("state.json"));
        let state = PersistedState {
            token: Some("abc".into()),
            site_id: Some("s1".into()),
            ..PersistedState::default()
        };

        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn state_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"));
        store.save(&PersistedState::default()).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(FileStore::new(path).load().unwrap(), PersistedState::default());
    }
}
