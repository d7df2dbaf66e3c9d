//! In-memory session manager.
//!
//! Owns session and turn lifetimes. The store is the single writer for a
//! session's turn list: every mutation happens under one lock, so appends
//! are ordered, deletes are all-or-nothing, and readers never observe a
//! partial session.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::debug;

use quill_core::{ConversationTurn, Session, SessionConfig, SessionId, SessionSummary};

use crate::error::ReportError;

struct SessionRecord {
    /// Monotonic creation sequence; breaks listing ties between sessions
    /// created within the same timestamp tick.
    seq: u64,
    session: Session,
}

struct StoreInner {
    sessions: HashMap<SessionId, SessionRecord>,
    next_seq: u64,
}

/// Mutex-guarded map of sessions keyed by id.
pub struct SessionStore {
    inner: Mutex<StoreInner>,
    title_max_chars: usize,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                sessions: HashMap::new(),
                next_seq: 0,
            }),
            title_max_chars: config.title_max_chars,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>, ReportError> {
        self.inner
            .lock()
            .map_err(|e| ReportError::Storage(format!("session lock poisoned: {e}")))
    }

    /// Create a session titled from its first query. The title is fixed at
    /// creation and never changes afterwards.
    pub fn create_session(
        &self,
        user_id: &str,
        project_id: &str,
        first_query: &str,
    ) -> Result<Session, ReportError> {
        let session = Session {
            id: SessionId::new(),
            project_id: project_id.to_string(),
            user_id: user_id.to_string(),
            title: derive_title(first_query, self.title_max_chars),
            created_at: Utc::now(),
            turns: Vec::new(),
        };

        let mut inner = self.lock()?;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.sessions.insert(
            session.id,
            SessionRecord {
                seq,
                session: session.clone(),
            },
        );
        debug!("Created session {} for user {user_id}", session.id);
        Ok(session)
    }

    /// List a user's sessions within a project, most recent first.
    ///
    /// The descending creation-time ordering is a hard contract relied on
    /// by the presentation layer.
    pub fn list_sessions(&self, user_id: &str, project_id: &str) -> Vec<SessionSummary> {
        let inner = match self.lock() {
            Ok(inner) => inner,
            Err(_) => return Vec::new(),
        };
        let mut records: Vec<(&u64, &Session)> = inner
            .sessions
            .values()
            .filter(|r| r.session.user_id == user_id && r.session.project_id == project_id)
            .map(|r| (&r.seq, &r.session))
            .collect();
        records.sort_by(|a, b| {
            b.1.created_at
                .cmp(&a.1.created_at)
                .then_with(|| b.0.cmp(a.0))
        });
        records
            .into_iter()
            .map(|(_, s)| SessionSummary {
                id: s.id,
                title: s.title.clone(),
                created_at: s.created_at,
                turn_count: s.turns.len(),
            })
            .collect()
    }

    /// Fetch a full session snapshot by id.
    pub fn get_session(&self, id: SessionId) -> Option<Session> {
        self.lock()
            .ok()
            .and_then(|inner| inner.sessions.get(&id).map(|r| r.session.clone()))
    }

    /// Fetch the ordered turn list of a session.
    pub fn get_turns(&self, id: SessionId) -> Result<Vec<ConversationTurn>, ReportError> {
        let inner = self.lock()?;
        inner
            .sessions
            .get(&id)
            .map(|r| r.session.turns.clone())
            .ok_or(ReportError::SessionNotFound(id))
    }

    /// Append a turn. The only mutator of a session's turn list besides
    /// [`SessionStore::resolve_pending`]; preserves arrival order.
    pub fn append_turn(&self, id: SessionId, turn: ConversationTurn) -> Result<(), ReportError> {
        let mut inner = self.lock()?;
        let record = inner
            .sessions
            .get_mut(&id)
            .ok_or(ReportError::SessionNotFound(id))?;
        record.session.turns.push(turn);
        Ok(())
    }

    /// Atomically check for an in-flight generation and append the pending
    /// marker turn. A session with an unresolved pending turn rejects
    /// further queries so turn ordering can never interleave.
    pub fn begin_pending(&self, id: SessionId, query: &str) -> Result<(), ReportError> {
        let mut inner = self.lock()?;
        let record = inner
            .sessions
            .get_mut(&id)
            .ok_or(ReportError::SessionNotFound(id))?;
        if record.session.turns.iter().any(ConversationTurn::is_pending) {
            return Err(ReportError::SessionBusy(id));
        }
        record.session.turns.push(ConversationTurn::pending(query));
        Ok(())
    }

    /// Replace the trailing pending marker with the final turn, or append
    /// when no marker is present. After this returns, no pending marker is
    /// visible in the session.
    pub fn resolve_pending(
        &self,
        id: SessionId,
        turn: ConversationTurn,
    ) -> Result<(), ReportError> {
        let mut inner = self.lock()?;
        let record = inner
            .sessions
            .get_mut(&id)
            .ok_or(ReportError::SessionNotFound(id))?;
        let turns = &mut record.session.turns;
        match turns.iter().rposition(ConversationTurn::is_pending) {
            Some(index) => turns[index] = turn,
            None => turns.push(turn),
        }
        Ok(())
    }

    /// Remove a session and all its turns as one atomic unit.
    pub fn delete_session(&self, id: SessionId) -> Result<(), ReportError> {
        let mut inner = self.lock()?;
        if inner.sessions.remove(&id).is_some() {
            debug!("Deleted session {id}");
            Ok(())
        } else {
            Err(ReportError::SessionNotFound(id))
        }
    }

    pub fn session_count(&self) -> usize {
        self.lock().map(|inner| inner.sessions.len()).unwrap_or(0)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

fn derive_title(query: &str, max_chars: usize) -> String {
    query.trim().chars().take(max_chars).collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::ReportFormat;

    fn store() -> SessionStore {
        SessionStore::default()
    }

    // ---- Creation ----

    #[test]
    fn test_create_session_titled_from_first_query() {
        let store = store();
        let session = store
            .create_session("user-1", "proj-1", "  show me engagement  ")
            .unwrap();
        assert_eq!(session.title, "show me engagement");
        assert!(session.turns.is_empty());
    }

    #[test]
    fn test_create_session_truncates_long_title() {
        let store = SessionStore::new(SessionConfig { title_max_chars: 10 });
        let session = store
            .create_session("user-1", "proj-1", "a very long first query indeed")
            .unwrap();
        assert_eq!(session.title.chars().count(), 10);
    }

    #[test]
    fn test_empty_session_is_valid_and_listable() {
        let store = store();
        let session = store.create_session("user-1", "proj-1", "query").unwrap();
        let listed = store.list_sessions("user-1", "proj-1");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, session.id);
        assert_eq!(listed[0].turn_count, 0);
        assert_eq!(store.get_turns(session.id).unwrap().len(), 0);
    }

    // ---- Listing order ----

    #[test]
    fn test_list_sessions_most_recent_first() {
        let store = store();
        let s1 = store.create_session("user-1", "proj-1", "first").unwrap();
        let s2 = store.create_session("user-1", "proj-1", "second").unwrap();
        let s3 = store.create_session("user-1", "proj-1", "third").unwrap();

        let listed = store.list_sessions("user-1", "proj-1");
        let ids: Vec<SessionId> = listed.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![s3.id, s2.id, s1.id]);
    }

    #[test]
    fn test_list_sessions_filters_by_user_and_project() {
        let store = store();
        store.create_session("user-1", "proj-1", "mine").unwrap();
        store.create_session("user-2", "proj-1", "other user").unwrap();
        store.create_session("user-1", "proj-2", "other project").unwrap();

        let listed = store.list_sessions("user-1", "proj-1");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "mine");
    }

    #[test]
    fn test_list_sessions_empty_store() {
        assert!(store().list_sessions("user-1", "proj-1").is_empty());
    }

    // ---- Turns ----

    #[test]
    fn test_append_turn_preserves_order() {
        let store = store();
        let session = store.create_session("user-1", "proj-1", "q").unwrap();
        for i in 0..5 {
            store
                .append_turn(session.id, ConversationTurn::user_query(format!("q{i}")))
                .unwrap();
        }
        let turns = store.get_turns(session.id).unwrap();
        let queries: Vec<&str> = turns.iter().map(|t| t.query.as_str()).collect();
        assert_eq!(queries, vec!["q0", "q1", "q2", "q3", "q4"]);
    }

    #[test]
    fn test_append_turn_unknown_session() {
        let store = store();
        let result = store.append_turn(SessionId::new(), ConversationTurn::user_query("q"));
        assert!(matches!(result, Err(ReportError::SessionNotFound(_))));
    }

    #[test]
    fn test_get_turns_unknown_session() {
        let result = store().get_turns(SessionId::new());
        assert!(matches!(result, Err(ReportError::SessionNotFound(_))));
    }

    // ---- Pending markers ----

    #[test]
    fn test_begin_pending_appends_marker() {
        let store = store();
        let session = store.create_session("user-1", "proj-1", "q").unwrap();
        store.begin_pending(session.id, "q").unwrap();
        let turns = store.get_turns(session.id).unwrap();
        assert_eq!(turns.len(), 1);
        assert!(turns[0].is_pending());
    }

    #[test]
    fn test_begin_pending_rejects_busy_session() {
        let store = store();
        let session = store.create_session("user-1", "proj-1", "q").unwrap();
        store.begin_pending(session.id, "first").unwrap();
        let result = store.begin_pending(session.id, "second");
        assert!(matches!(result, Err(ReportError::SessionBusy(_))));
        // Rejected request must not have touched the turn list.
        assert_eq!(store.get_turns(session.id).unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_pending_replaces_marker() {
        let store = store();
        let session = store.create_session("user-1", "proj-1", "q").unwrap();
        store.begin_pending(session.id, "q").unwrap();

        let mut final_turn = ConversationTurn::user_query("q");
        final_turn.format = ReportFormat::Markdown;
        final_turn.answer_text = Some("answer".to_string());
        store.resolve_pending(session.id, final_turn).unwrap();

        let turns = store.get_turns(session.id).unwrap();
        assert_eq!(turns.len(), 1);
        assert!(!turns[0].is_pending());
        assert_eq!(turns[0].answer_text.as_deref(), Some("answer"));
    }

    #[test]
    fn test_resolve_pending_without_marker_appends() {
        let store = store();
        let session = store.create_session("user-1", "proj-1", "q").unwrap();
        store
            .resolve_pending(session.id, ConversationTurn::user_query("q"))
            .unwrap();
        assert_eq!(store.get_turns(session.id).unwrap().len(), 1);
    }

    #[test]
    fn test_pending_resolution_keeps_earlier_turns() {
        let store = store();
        let session = store.create_session("user-1", "proj-1", "q").unwrap();
        let mut done = ConversationTurn::user_query("first");
        done.format = ReportFormat::Markdown;
        done.answer_text = Some("first answer".to_string());
        store.append_turn(session.id, done).unwrap();

        store.begin_pending(session.id, "second").unwrap();
        let mut final_turn = ConversationTurn::user_query("second");
        final_turn.format = ReportFormat::Markdown;
        final_turn.answer_text = Some("second answer".to_string());
        store.resolve_pending(session.id, final_turn).unwrap();

        let turns = store.get_turns(session.id).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].query, "first");
        assert_eq!(turns[1].query, "second");
        assert!(turns.iter().all(|t| !t.is_pending()));
    }

    // ---- Deletion ----

    #[test]
    fn test_delete_session_removes_all_turns_atomically() {
        let store = store();
        let session = store.create_session("user-1", "proj-1", "q").unwrap();
        store
            .append_turn(session.id, ConversationTurn::user_query("q"))
            .unwrap();
        store.delete_session(session.id).unwrap();

        assert!(store.get_session(session.id).is_none());
        assert!(matches!(
            store.get_turns(session.id),
            Err(ReportError::SessionNotFound(_))
        ));
        assert!(store.list_sessions("user-1", "proj-1").is_empty());
    }

    #[test]
    fn test_delete_unknown_session_reports_failure() {
        let result = store().delete_session(SessionId::new());
        assert!(matches!(result, Err(ReportError::SessionNotFound(_))));
    }

    #[test]
    fn test_delete_leaves_other_sessions_intact() {
        let store = store();
        let s1 = store.create_session("user-1", "proj-1", "one").unwrap();
        let s2 = store.create_session("user-1", "proj-1", "two").unwrap();
        store.delete_session(s1.id).unwrap();
        assert!(store.get_session(s2.id).is_some());
        assert_eq!(store.session_count(), 1);
    }

    // ---- Concurrency ----

    #[test]
    fn test_concurrent_creates_all_recorded() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(store());
        let mut handles = Vec::new();
        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                store
                    .create_session("user-1", "proj-1", &format!("query {i}"))
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.session_count(), 10);
        assert_eq!(store.list_sessions("user-1", "proj-1").len(), 10);
    }

    #[test]
    fn test_concurrent_appends_single_session() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(store());
        let session = store.create_session("user-1", "proj-1", "q").unwrap();
        let mut handles = Vec::new();
        for i in 0..10 {
            let store = Arc::clone(&store);
            let id = session.id;
            handles.push(thread::spawn(move || {
                store
                    .append_turn(id, ConversationTurn::user_query(format!("turn {i}")))
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get_turns(session.id).unwrap().len(), 10);
    }

    #[test]
    fn test_concurrent_begin_pending_admits_exactly_one() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(store());
        let session = store.create_session("user-1", "proj-1", "q").unwrap();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let id = session.id;
            handles.push(thread::spawn(move || store.begin_pending(id, "q").is_ok()));
        }
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(store.get_turns(session.id).unwrap().len(), 1);
    }
}
