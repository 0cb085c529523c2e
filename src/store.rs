//! Durable history of completed sessions
//!
//! One JSON document on disk, keyed by fixed namespace keys:
//! - `decibel_sleep_sessions`: completed sessions, newest first
//! - `decibel_mic_permission`: `"granted"` once audio access was granted
//!
//! The file is read once in [`SessionStore::open`] and rewritten in full on
//! every mutation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::session::{Session, SessionSummary};

pub const SESSIONS_KEY: &str = "decibel_sleep_sessions";
pub const PERMISSION_KEY: &str = "decibel_mic_permission";

const PERMISSION_GRANTED: &str = "granted";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("session store encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(rename = "decibel_sleep_sessions", default)]
    sessions: Vec<Session>,

    #[serde(
        rename = "decibel_mic_permission",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    permission: Option<String>,
}

/// File-backed session history
pub struct SessionStore {
    path: PathBuf,
    document: StoreDocument,
}

impl SessionStore {
    /// Load the store at `path`.
    ///
    /// A missing file is an empty history. An unreadable or malformed file is
    /// logged and also treated as empty; the next write replaces it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let document = load_document(&path);

        info!(
            "Session store {} loaded ({} sessions)",
            path.display(),
            document.sessions.len()
        );

        Self { path, document }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Completed sessions, newest first
    pub fn sessions(&self) -> &[Session] {
        &self.document.sessions
    }

    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.document.sessions.iter().map(Session::summary).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.document.sessions.iter().find(|s| s.id() == id)
    }

    /// Most recent session
    pub fn last(&self) -> Option<&Session> {
        self.document.sessions.first()
    }

    pub fn len(&self) -> usize {
        self.document.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.sessions.is_empty()
    }

    /// Record a completed session at the front of the history.
    ///
    /// The session stays in memory even if the write fails.
    pub fn add(&mut self, session: Session) -> Result<(), StoreError> {
        debug!("Adding session {} to store", session.id());
        self.document.sessions.insert(0, session);
        self.save()
    }

    /// Remove a session by id. Returns `false` (and writes nothing) if absent.
    pub fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        let before = self.document.sessions.len();
        self.document.sessions.retain(|s| s.id() != id);

        if self.document.sessions.len() == before {
            return Ok(false);
        }

        info!("Deleted session {}", id);
        self.save()?;
        Ok(true)
    }

    pub fn permission_granted(&self) -> bool {
        self.document.permission.as_deref() == Some(PERMISSION_GRANTED)
    }

    pub fn set_permission_granted(&mut self, granted: bool) -> Result<(), StoreError> {
        self.document.permission = granted.then(|| PERMISSION_GRANTED.to_string());
        self.save()
    }

    fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let payload = serde_json::to_vec_pretty(&self.document)?;

        // Write beside the target, then swap in
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, payload)?;
        fs::rename(&tmp_path, &self.path)?;

        debug!(
            "Session store {} saved ({} sessions)",
            self.path.display(),
            self.document.sessions.len()
        );

        Ok(())
    }
}

fn load_document(path: &Path) -> StoreDocument {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return StoreDocument::default(),
        Err(e) => {
            warn!("Failed to read session store {}: {}", path.display(), e);
            return StoreDocument::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(document) => document,
        Err(e) => {
            warn!("Failed to parse stored sessions in {}: {}", path.display(), e);
            StoreDocument::default()
        }
    }
}
