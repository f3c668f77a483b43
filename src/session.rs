use crate::columns::ColumnMap;
use crate::dataset::Dataset;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "asset_session";

/// Register loaded by one browser session
///
/// The dataset is shared so request handlers can work on it without holding
/// the store lock.
#[derive(Debug, Clone)]
pub struct Session {
    /// Parsed register
    pub dataset: Arc<Dataset>,

    /// Current column mapping, resolved on upload and editable afterwards
    pub columns: ColumnMap,

    /// Time when the session expires unless used again
    pub expires_at: SystemTime,
}

/// In-memory session storage keyed by UUID
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    // A panic while holding the lock leaves plain data behind; keep serving it.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Store an uploaded register
    ///
    /// Reuses `existing` as the session id when given, replacing whatever
    /// register it held; otherwise a fresh id is issued.
    ///
    /// # Returns
    /// * The session id to put in the cookie
    pub fn store(&self, existing: Option<&str>, dataset: Dataset, columns: ColumnMap) -> String {
        self.purge_expired();
        let session_id = match existing {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        let session = Session {
            dataset: Arc::new(dataset),
            columns,
            expires_at: SystemTime::now() + self.ttl,
        };
        self.write().insert(session_id.clone(), session);
        session_id
    }

    /// Look up a live session and extend its lifetime.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let now = SystemTime::now();
        let mut sessions = self.write();
        match sessions.get_mut(session_id) {
            Some(session) if session.expires_at > now => {
                session.expires_at = now + self.ttl;
                Some(session.clone())
            }
            Some(_) => {
                sessions.remove(session_id);
                log::warn!("session {} expired", session_id);
                None
            }
            None => None,
        }
    }

    /// Replace the column mapping of a live session.
    ///
    /// # Returns
    /// * `false` when the session does not exist or has expired
    pub fn set_columns(&self, session_id: &str, columns: ColumnMap) -> bool {
        let now = SystemTime::now();
        match self.write().get_mut(session_id) {
            Some(session) if session.expires_at > now => {
                session.columns = columns;
                true
            }
            _ => false,
        }
    }

    /// Drop every expired session; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        let purged = before - sessions.len();
        if purged > 0 {
            log::warn!("purged {} expired sessions", purged);
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{CanonicalField, resolve_columns};
    use crate::value::CellValue;

    fn register(id: &str) -> Dataset {
        Dataset::prepare("r", vec!["Cost".into()], vec![vec![CellValue::text(id)]])
    }

    #[test]
    fn store_issues_uuid_and_replaces_in_place() {
        let store = SessionStore::new(Duration::from_secs(60));
        let ds = register("1");
        let cols = resolve_columns(&ds.columns);
        let id = store.store(None, ds, cols.clone());
        assert!(Uuid::parse_str(&id).is_ok());

        let again = store.store(Some(&id), register("2"), cols);
        assert_eq!(again, id);
        assert_eq!(store.len(), 1);
        let session = store.get(&id).unwrap();
        assert_eq!(session.dataset.records[0].values[0], CellValue::text("2"));
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let store = SessionStore::new(Duration::ZERO);
        let id = store.store(None, register("1"), ColumnMap::default());
        assert!(store.get(&id).is_none());
        assert!(store.is_empty());
        assert!(!store.set_columns(&id, ColumnMap::default()));
    }

    #[test]
    fn column_mapping_can_be_replaced() {
        let store = SessionStore::new(Duration::from_secs(60));
        let ds = register("1");
        let cols = resolve_columns(&ds.columns);
        assert_eq!(cols.get(CanonicalField::Cost), Some("Cost"));
        let id = store.store(None, ds, cols);

        assert!(store.set_columns(&id, ColumnMap::default()));
        assert_eq!(store.get(&id).unwrap().columns.get(CanonicalField::Cost), None);
        assert!(!store.set_columns("unknown", ColumnMap::default()));
    }
}
