//! Session storage
//!
//! A single "current session" slot: overwritten wholesale on login,
//! removed entirely on logout. No partial updates.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::types::{Session, UserIdentity};

/// Narrow read/write capability over the session slot
pub trait SessionStore: Send + Sync {
    /// Read the stored session, if any
    fn get(&self) -> Result<Option<Session>>;

    /// Replace the stored session
    fn set(&self, session: &Session) -> Result<()>;

    /// Remove the stored session (no-op when empty)
    fn clear(&self) -> Result<()>;

    /// Identity of the logged-in user.
    ///
    /// Absence is an expected outcome; storage failures are logged and
    /// reported as absent.
    fn current_identity(&self) -> Option<UserIdentity> {
        match self.get() {
            Ok(session) => session.map(|s| s.identity()),
            Err(e) => {
                warn!(error = %e, "Could not read session, treating as logged out");
                None
            }
        }
    }
}

/// Session slot backed by a JSON file
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Session(format!("Failed to read {}: {}", self.path.display(), e)))?;

        let session = serde_json::from_str::<Session>(&content).map_err(|e| {
            Error::Session(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;

        debug!(user_id = %session.id, "Loaded session");
        Ok(Some(session))
    }

    fn set(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(session)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, json)
            .map_err(|e| Error::Session(format!("Failed to write {}: {}", tmp.display(), e)))?;

        // Token is a credential: owner-only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Session(format!("Failed to replace session file: {}", e)))?;

        info!(user_id = %session.id, username = %session.username, "Saved session");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Cleared session");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Session(format!(
                "Failed to remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

/// In-process session slot
#[derive(Default)]
pub struct MemorySessionStore {
    slot: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            slot: RwLock::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Result<Option<Session>> {
        self.slot
            .read()
            .map(|slot| slot.clone())
            .map_err(|_| Error::Session("session lock poisoned".into()))
    }

    fn set(&self, session: &Session) -> Result<()> {
        let mut slot = self
            .slot
            .write()
            .map_err(|_| Error::Session("session lock poisoned".into()))?;
        *slot = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .slot
            .write()
            .map_err(|_| Error::Session("session lock poisoned".into()))?;
        *slot = None;
        Ok(())
    }
}
