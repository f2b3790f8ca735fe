use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::warn;

use crate::models::Session;

/// Pluggable persistence for the admin session.
pub trait SessionStore {
    /// Returns the persisted session, or `None` when nothing usable is stored.
    fn load(&self) -> anyhow::Result<Option<Session>>;
    fn save(&self, session: &Session) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

/// JSON-file session backend.
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
}

impl SessionStore for FileStore {
    fn load(&self) -> anyhow::Result<Option<Session>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read session file {}", self.path.display()))
            }
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                // A corrupt file means "not logged in", not a broken CLI.
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "discarding unreadable session file"
                );
                Ok(None)
            }
        }
    }

    fn save(&self, session: &Session) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create session directory {}", parent.display())
                })?;
            }
        }
        let raw = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("failed to write session file {}", self.path.display()))
    }

    fn clear(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| {
                format!("failed to remove session file {}", self.path.display())
            }),
        }
    }
}

/// Trims a raw token and strips an accidental "Bearer " prefix. Returns
/// `None` for blank tokens.
pub fn normalize_token(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("Bearer ").unwrap_or(trimmed).trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
