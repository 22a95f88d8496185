//! Pluggable session/message store.
//!
//! The relay core only needs a minimal CRUD contract; durability is out of
//! scope, so the single production implementation is in-memory. A persistent
//! backend can slot in behind the same trait.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::models::message::{ChatMessage, Sender};
use crate::models::session::{RoleSlot, Session, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The pairing code is already reserved by a session that is still
    /// joinable or paired. The caller should regenerate and retry.
    CodeInUse,
}

/// Partial update applied to a session record, mirroring the fields the hub
/// is allowed to mutate after creation.
#[derive(Debug, Default)]
pub struct SessionUpdate {
    pub host: Option<RoleSlot>,
    pub viewer: Option<RoleSlot>,
    pub state: Option<SessionState>,
    pub connected_at: Option<chrono::DateTime<chrono::Utc>>,
    /// When set, the update only applies if the session is currently in this
    /// state; otherwise nothing changes and `update_session` returns `None`.
    /// This is the arbiter for transitions that race with teardown.
    pub expected_state: Option<SessionState>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session, atomically reserving its pairing code.
    async fn create_session(&self, session: Session) -> Result<(), StoreError>;
    async fn session_by_id(&self, id: &str) -> Option<Session>;
    async fn session_by_code(&self, code: &str) -> Option<Session>;
    /// Apply a partial update; returns the updated record, or `None` if the
    /// session is unknown or an `expected_state` guard failed. `connected_at`
    /// is write-once and silently kept if already set.
    async fn update_session(&self, id: &str, update: SessionUpdate) -> Option<Session>;
    async fn delete_session(&self, id: &str) -> bool;
    /// Append to the session's transcript. The id and timestamp are assigned
    /// under the per-session log lock, so per-session order is authoritative.
    async fn append_message(&self, session_id: &str, content: &str, sender: Sender)
        -> ChatMessage;
    async fn messages_by_session(&self, session_id: &str) -> Vec<ChatMessage>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

pub struct MemoryStore {
    sessions: DashMap<String, Session>,
    /// pairing code → session id. Entries for disconnected sessions are
    /// reclaimed lazily when the code is reissued.
    codes: DashMap<String, String>,
    messages: DashMap<String, Vec<ChatMessage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            codes: DashMap::new(),
            messages: DashMap::new(),
        }
    }

    /// Whether the session currently holding this code still blocks reuse.
    fn code_still_live(&self, session_id: &str) -> bool {
        self.sessions
            .get(session_id)
            .map(|s| s.state != SessionState::Disconnected)
            .unwrap_or(false)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, session: Session) -> Result<(), StoreError> {
        match self.codes.entry(session.pairing_code.clone()) {
            Entry::Occupied(mut entry) => {
                if self.code_still_live(entry.get()) {
                    return Err(StoreError::CodeInUse);
                }
                entry.insert(session.id.clone());
            }
            Entry::Vacant(entry) => {
                entry.insert(session.id.clone());
            }
        }
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn session_by_id(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    async fn session_by_code(&self, code: &str) -> Option<Session> {
        let id = self.codes.get(code)?.value().clone();
        self.sessions.get(&id).map(|s| s.value().clone())
    }

    async fn update_session(&self, id: &str, update: SessionUpdate) -> Option<Session> {
        let mut session = self.sessions.get_mut(id)?;
        if let Some(expected) = update.expected_state {
            if session.state != expected {
                return None;
            }
        }
        if let Some(host) = update.host {
            session.host = host;
        }
        if let Some(viewer) = update.viewer {
            session.viewer = viewer;
        }
        if let Some(state) = update.state {
            session.state = state;
        }
        if let Some(at) = update.connected_at {
            if session.connected_at.is_none() {
                session.connected_at = Some(at);
            }
        }
        Some(session.clone())
    }

    async fn delete_session(&self, id: &str) -> bool {
        let Some((_, session)) = self.sessions.remove(id) else {
            return false;
        };
        self.codes
            .remove_if(&session.pairing_code, |_, owner| owner.as_str() == id);
        true
    }

    async fn append_message(
        &self,
        session_id: &str,
        content: &str,
        sender: Sender,
    ) -> ChatMessage {
        let mut log = self.messages.entry(session_id.to_string()).or_default();
        let message = ChatMessage::new(session_id, content, sender);
        log.push(message.clone());
        message
    }

    async fn messages_by_session(&self, session_id: &str) -> Vec<ChatMessage> {
        self.messages
            .get(session_id)
            .map(|log| log.value().clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_lookup_by_id_and_code() {
        let store = MemoryStore::new();
        let session = Session::new("AB12C3".to_string(), "conn_a");
        let id = session.id.clone();
        store.create_session(session).await.unwrap();

        assert_eq!(store.session_by_id(&id).await.unwrap().id, id);
        assert_eq!(store.session_by_code("AB12C3").await.unwrap().id, id);
        assert!(store.session_by_code("ZZZZZZ").await.is_none());
    }

    #[tokio::test]
    async fn duplicate_code_is_rejected_while_session_live() {
        let store = MemoryStore::new();
        store
            .create_session(Session::new("AB12C3".to_string(), "conn_a"))
            .await
            .unwrap();

        let err = store
            .create_session(Session::new("AB12C3".to_string(), "conn_b"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::CodeInUse);
    }

    #[tokio::test]
    async fn code_is_reusable_after_disconnect() {
        let store = MemoryStore::new();
        let first = Session::new("AB12C3".to_string(), "conn_a");
        let first_id = first.id.clone();
        store.create_session(first).await.unwrap();

        store
            .update_session(
                &first_id,
                SessionUpdate {
                    state: Some(SessionState::Disconnected),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let second = Session::new("AB12C3".to_string(), "conn_b");
        let second_id = second.id.clone();
        store.create_session(second).await.unwrap();

        // Code now resolves to the new session; the old one stays reachable by id.
        assert_eq!(store.session_by_code("AB12C3").await.unwrap().id, second_id);
        assert!(store.session_by_id(&first_id).await.is_some());
    }

    #[tokio::test]
    async fn connected_at_is_write_once() {
        let store = MemoryStore::new();
        let session = Session::new("AB12C3".to_string(), "conn_a");
        let id = session.id.clone();
        store.create_session(session).await.unwrap();

        let first = chrono::Utc::now();
        store
            .update_session(
                &id,
                SessionUpdate {
                    connected_at: Some(first),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let updated = store
            .update_session(
                &id,
                SessionUpdate {
                    connected_at: Some(first + chrono::Duration::seconds(60)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.connected_at, Some(first));
    }

    #[tokio::test]
    async fn guarded_update_fails_on_state_mismatch() {
        let store = MemoryStore::new();
        let session = Session::new("AB12C3".to_string(), "conn_a");
        let id = session.id.clone();
        store.create_session(session).await.unwrap();

        store
            .update_session(
                &id,
                SessionUpdate {
                    state: Some(SessionState::Disconnected),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // The session left Created, so the guarded pairing update must not apply.
        let paired = store
            .update_session(
                &id,
                SessionUpdate {
                    viewer: Some(RoleSlot::Occupied("conn_b".to_string())),
                    state: Some(SessionState::Paired),
                    connected_at: Some(chrono::Utc::now()),
                    expected_state: Some(SessionState::Created),
                    ..Default::default()
                },
            )
            .await;
        assert!(paired.is_none());

        let session = store.session_by_id(&id).await.unwrap();
        assert_eq!(session.state, SessionState::Disconnected);
        assert!(!session.viewer.is_occupied());
        assert!(session.connected_at.is_none());
    }

    #[tokio::test]
    async fn messages_keep_append_order_and_session_isolation() {
        let store = MemoryStore::new();
        store.append_message("ses_1", "first", Sender::User).await;
        store.append_message("ses_1", "second", Sender::Ai).await;
        store.append_message("ses_2", "other", Sender::User).await;

        let log = store.messages_by_session("ses_1").await;
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].content, "first");
        assert_eq!(log[1].content, "second");
        assert!(log[0].timestamp <= log[1].timestamp);
        assert_eq!(store.messages_by_session("ses_2").await.len(), 1);
        assert!(store.messages_by_session("ses_3").await.is_empty());
    }

    #[tokio::test]
    async fn delete_session_frees_the_code() {
        let store = MemoryStore::new();
        let session = Session::new("AB12C3".to_string(), "conn_a");
        let id = session.id.clone();
        store.create_session(session).await.unwrap();

        assert!(store.delete_session(&id).await);
        assert!(!store.delete_session(&id).await);
        assert!(store.session_by_code("AB12C3").await.is_none());

        store
            .create_session(Session::new("AB12C3".to_string(), "conn_b"))
            .await
            .unwrap();
    }
}
