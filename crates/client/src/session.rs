//! Persisted session state.
//!
//! The session token and the signed-in profile survive restarts on disk as
//! one JSON file. Loading is parse-or-clear: any undecodable or partial
//! file is deleted and treated as signed-out, never bubbled up as an
//! error.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use skypanel_core::roles::Role;
use skypanel_core::types::DbId;
use skypanel_core::CoreError;
use skypanel_gateway::LoginSuccess;

/// The signed-in identity as the client remembers it between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub user_id: DbId,
    pub username: String,
    pub role: Role,
    pub full_name: String,
    pub session_token: String,
}

impl From<LoginSuccess> for StoredSession {
    fn from(profile: LoginSuccess) -> Self {
        Self {
            user_id: profile.user_id,
            username: profile.username,
            role: profile.role,
            full_name: profile.full_name,
            session_token: profile.session_token,
        }
    }
}

/// File-backed session store.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the stored session, if any.
    ///
    /// A missing file means signed-out. A corrupt file is removed and also
    /// treated as signed-out, so one bad write can never wedge the client
    /// in a half-authenticated state.
    pub fn load(&self) -> Option<StoredSession> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Clearing corrupt session file");
                let _ = std::fs::remove_file(&self.path);
                None
            }
        }
    }

    pub fn save(&self, session: &StoredSession) -> Result<(), CoreError> {
        let raw = serde_json::to_string_pretty(session)
            .map_err(|e| CoreError::Internal(format!("Session encode failed: {e}")))?;
        std::fs::write(&self.path, raw)
            .map_err(|e| CoreError::Internal(format!("Session write failed: {e}")))
    }

    /// Remove the stored session. Missing file is not an error.
    pub fn clear(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
