//! Persisted session with role repair.
//!
//! Both login ([`SessionStore::establish`]) and bootstrap
//! ([`SessionStore::restore`]) pass the stored role through
//! [`role::normalize`](crate::role::normalize). A corrected role is written
//! back at once, so the stale value cannot come back on the next restore.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::SyncError;
use crate::model::{Role, User};
use crate::role::{IdentityHints, RoleRules, normalize};
use crate::store::{KeyValueStore, StoreError};

/// Slot holding the current session.
pub const SESSION_SLOT: &str = "session";

/// A session as stored. `role` is the raw claim until normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl SessionRecord {
    /// Role claim of the record, falling back to the one on the user.
    #[must_use]
    pub fn raw_role(&self) -> Option<&str> {
        self.role.as_deref().or(self.user.role.as_deref())
    }
}

/// A session whose role has been normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user: User,
    pub role: Role,
    #[serde(skip)]
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionStore<S> {
    kv: S,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub const fn new(kv: S) -> Self {
        Self { kv }
    }

    /// Normalize and persist a freshly authenticated session.
    ///
    /// # Errors
    ///
    /// Returns an error when the slot cannot be written.
    pub fn establish(&self, record: SessionRecord, rules: &RoleRules) -> Result<Session, SyncError> {
        let session = authorize(record, rules);
        self.write(&session)?;
        info!(role = %session.role, "session established");
        Ok(session)
    }

    /// Load the stored session, repairing its role if needed.
    ///
    /// An absent slot yields `None`. A corrupt slot is logged, cleared and
    /// also yields `None`.
    ///
    /// # Errors
    ///
    /// Returns an error when the slot cannot be read or a repaired role
    /// cannot be written back.
    pub fn restore(&self, rules: &RoleRules) -> Result<Option<Session>, SyncError> {
        let Some(raw) = self.kv.get(SESSION_SLOT)? else {
            return Ok(None);
        };
        let record: SessionRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(err) => {
                let err = SyncError::MalformedLocalState {
                    slot: SESSION_SLOT.to_string(),
                    detail: err.to_string(),
                };
                warn!(error = %err, code = %err.code(), "discarding corrupt session");
                self.kv.remove(SESSION_SLOT)?;
                return Ok(None);
            }
        };

        let stored = record.raw_role().map(str::to_string);
        let session = authorize(record, rules);
        if stored.as_deref() != Some(session.role.as_str()) {
            info!(
                stored = stored.as_deref().unwrap_or("<none>"),
                role = %session.role,
                "persisting corrected role"
            );
            self.write(&session)?;
        }
        Ok(Some(session))
    }

    /// Forget the stored session.
    ///
    /// # Errors
    ///
    /// Returns an error when the slot cannot be removed.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.kv.remove(SESSION_SLOT)
    }

    fn write(&self, session: &Session) -> Result<(), StoreError> {
        let record = SessionRecord {
            user: session.user.clone(),
            role: Some(session.role.as_str().to_string()),
            token: session.token.clone(),
        };
        let encoded = serde_json::to_string(&record).map_err(|source| StoreError::Encode {
            slot: SESSION_SLOT.to_string(),
            source,
        })?;
        self.kv.set(SESSION_SLOT, &encoded)
    }
}

fn authorize(record: SessionRecord, rules: &RoleRules) -> Session {
    let hints = IdentityHints {
        email: Some(record.user.email.clone()).filter(|e| !e.trim().is_empty()),
    };
    let role = normalize(record.raw_role(), &hints, rules);
    let mut user = record.user;
    user.role = Some(role.as_str().to_string());
    Session {
        user,
        role,
        token: record.token,
    }
}
