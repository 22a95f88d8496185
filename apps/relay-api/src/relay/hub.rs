//! Relay hub: the pairing state machine and message router.
//!
//! The hub interprets inbound client events, drives session-state
//! transitions through the store, and decides fan-out targets through the
//! registry. Chat messages fan out to every member of the session, sender
//! included, so all clients see one authoritative ordering; WebRTC signaling
//! goes only to the opposite role and is never echoed.

use std::sync::Arc;

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::Mutex;

use crate::models::message::{ChatMessage, Sender};
use crate::models::session::{Role, RoleSlot, Session, SessionState};
use crate::store::{SessionStore, SessionUpdate, StoreError};

use super::events::{ClientEvent, ServerEvent};
use super::registry::{BindError, ConnectionRegistry};
use super::responder::Responder;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 6;

/// Collision-retry bound for pairing-code generation. 36^6 codes make more
/// than a couple of retries vanishingly unlikely.
const CODE_RETRY_LIMIT: usize = 32;

/// Client-visible relay errors. Delivered as `{type:"error"}` frames on the
/// connection that caused them; they never terminate the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    /// Join target missing or not joinable.
    InvalidCode,
    /// The viewer slot is already occupied.
    SessionFull,
    /// The action requires a session binding that does not exist.
    NoActiveSession,
    /// The connection is already part of a session.
    AlreadyBound,
    /// Unparseable or unrecognized inbound frame.
    MalformedEvent,
    /// Pairing-code generation exhausted its retry budget.
    CodeExhausted,
}

impl RelayError {
    pub fn message(&self) -> &'static str {
        match self {
            RelayError::InvalidCode => "Invalid connection code",
            RelayError::SessionFull => "Session already has a viewer",
            RelayError::NoActiveSession => "No active session",
            RelayError::AlreadyBound => "Already in a session",
            RelayError::MalformedEvent => "Invalid message format",
            RelayError::CodeExhausted => "Unable to allocate a pairing code",
        }
    }
}

impl From<RelayError> for ServerEvent {
    fn from(err: RelayError) -> Self {
        ServerEvent::Error {
            message: err.message().to_string(),
        }
    }
}

/// Generate a candidate pairing code: 6 characters uniform over `[A-Z0-9]`.
/// Collision resistance, not secrecy, is the requirement.
pub fn generate_pairing_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// The relay hub. Cheap to clone; spawned responder tasks re-enter it.
#[derive(Clone)]
pub struct RelayHub {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn SessionStore>,
    responder: Arc<dyn Responder>,
    /// Per-session write lock held across the append + fan-out pair, so every
    /// member sees messages in log order even when senders run concurrently.
    message_seq: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl RelayHub {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn SessionStore>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self {
            registry,
            store,
            responder,
            message_seq: Arc::new(DashMap::new()),
        }
    }

    /// Process one inbound client event. Validation failures are reported
    /// back to the offending connection and leave all state untouched.
    pub async fn handle_event(&self, handle: &str, event: ClientEvent) {
        let result = match event {
            ClientEvent::CreateSession => self.create_session(handle).await,
            ClientEvent::JoinSession { connection_code } => {
                self.join_session(handle, &connection_code).await
            }
            ClientEvent::SendMessage { content, sender } => {
                self.send_message(handle, content, sender).await
            }
            ClientEvent::WebrtcSignal { signal } => self.forward_signal(handle, signal),
            ClientEvent::DisconnectSession => {
                self.disconnect_session(handle).await;
                Ok(())
            }
        };

        if let Err(err) = result {
            tracing::debug!(conn = %handle, ?err, "relay event rejected");
            self.registry.send_to(handle, err.into());
        }
    }

    /// Report a malformed inbound frame on the connection that sent it.
    pub fn reject_malformed(&self, handle: &str) {
        self.registry.send_to(handle, RelayError::MalformedEvent.into());
    }

    /// Transport-close cleanup. Must run even on abrupt network drops.
    pub async fn connection_closed(&self, handle: &str) {
        if let Some((session_id, role)) = self.registry.unregister(handle) {
            self.teardown_session(&session_id, role).await;
        }
    }

    async fn create_session(&self, handle: &str) -> Result<(), RelayError> {
        if self.registry.binding(handle).is_some() {
            return Err(RelayError::AlreadyBound);
        }

        for _ in 0..CODE_RETRY_LIMIT {
            let session = Session::new(generate_pairing_code(), handle);
            match self.store.create_session(session.clone()).await {
                Err(StoreError::CodeInUse) => continue,
                Ok(()) => {
                    if let Err(err) = self.registry.bind(handle, &session.id, Role::Host) {
                        // Keep create all-or-nothing: drop the orphaned record.
                        self.store.delete_session(&session.id).await;
                        return Err(match err {
                            BindError::AlreadyBound => RelayError::AlreadyBound,
                            _ => RelayError::NoActiveSession,
                        });
                    }
                    tracing::info!(
                        session_id = %session.id,
                        code = %session.pairing_code,
                        "session created"
                    );
                    self.registry.send_to(
                        handle,
                        ServerEvent::SessionCreated {
                            session_id: session.id,
                            connection_code: session.pairing_code,
                        },
                    );
                    return Ok(());
                }
            }
        }

        tracing::error!("pairing-code generation exhausted retries");
        Err(RelayError::CodeExhausted)
    }

    async fn join_session(&self, handle: &str, code: &str) -> Result<(), RelayError> {
        if self.registry.binding(handle).is_some() {
            return Err(RelayError::AlreadyBound);
        }

        let session = self
            .store
            .session_by_code(code)
            .await
            .ok_or(RelayError::InvalidCode)?;
        match session.state {
            SessionState::Created => {}
            SessionState::Paired => return Err(RelayError::SessionFull),
            SessionState::Disconnected => return Err(RelayError::InvalidCode),
        }

        self.registry
            .bind(handle, &session.id, Role::Viewer)
            .map_err(|err| match err {
                BindError::RoleConflict => RelayError::SessionFull,
                _ => RelayError::AlreadyBound,
            })?;

        // The guarded update is the arbiter against a concurrent host close:
        // if the session left Created since the lookup above, back out the
        // bind instead of resurrecting a dead session.
        let paired = self
            .store
            .update_session(
                &session.id,
                SessionUpdate {
                    viewer: Some(RoleSlot::Occupied(handle.to_string())),
                    state: Some(SessionState::Paired),
                    connected_at: Some(chrono::Utc::now()),
                    expected_state: Some(SessionState::Created),
                    ..Default::default()
                },
            )
            .await;
        if paired.is_none() {
            self.registry.unbind(handle);
            return Err(RelayError::InvalidCode);
        }

        tracing::info!(session_id = %session.id, "viewer joined, session paired");

        self.registry.send_to(
            handle,
            ServerEvent::SessionJoined {
                session_id: session.id.clone(),
            },
        );
        if let Some(host) = self.registry.peer_of_role(&session.id, Role::Host) {
            self.registry.send_to(
                &host,
                ServerEvent::PhoneConnected {
                    session_id: session.id.clone(),
                },
            );
        }
        Ok(())
    }

    async fn send_message(
        &self,
        handle: &str,
        content: String,
        sender: Sender,
    ) -> Result<(), RelayError> {
        let (session_id, _) = self
            .registry
            .binding(handle)
            .ok_or(RelayError::NoActiveSession)?;

        self.append_and_fan_out(&session_id, &content, sender).await;

        // The responder runs off the critical path: delivery of the user's
        // own message above never waits on it, and no lock is held here.
        if sender == Sender::User {
            let hub = self.clone();
            tokio::spawn(async move {
                let answer = hub.responder.respond(&content, None).await;
                hub.append_and_fan_out(&session_id, &answer, Sender::Ai).await;
            });
        }
        Ok(())
    }

    /// Accept a message into the session log and deliver it to every member.
    /// The session's sequence lock stays held across both steps, so delivery
    /// order on every connection matches the transcript order.
    async fn append_and_fan_out(&self, session_id: &str, content: &str, sender: Sender) {
        let seq = self
            .message_seq
            .entry(session_id.to_string())
            .or_default()
            .clone();
        let _guard = seq.lock().await;
        let message = self.store.append_message(session_id, content, sender).await;
        self.fan_out(session_id, &message);
    }

    fn forward_signal(&self, handle: &str, signal: serde_json::Value) -> Result<(), RelayError> {
        let (session_id, role) = self
            .registry
            .binding(handle)
            .ok_or(RelayError::NoActiveSession)?;

        if let Some(peer) = self.registry.peer_of_role(&session_id, role.opposite()) {
            self.registry.send_to(&peer, ServerEvent::WebrtcSignal { signal });
        }
        Ok(())
    }

    /// Graceful leave via a `disconnect_session` frame. A no-op for unbound
    /// connections, matching transport-close idempotency.
    async fn disconnect_session(&self, handle: &str) {
        if let Some((session_id, role)) = self.registry.unbind(handle) {
            self.teardown_session(&session_id, role).await;
        }
    }

    /// Mark the session disconnected, vacate the departed slot, and notify
    /// whoever is still bound. The departed connection is already out of the
    /// registry, so concurrent closes of both sides deliver at most one
    /// notification to each survivor.
    async fn teardown_session(&self, session_id: &str, departed: Role) {
        let mut update = SessionUpdate {
            state: Some(SessionState::Disconnected),
            ..Default::default()
        };
        match departed {
            Role::Host => update.host = Some(RoleSlot::Unoccupied),
            Role::Viewer => update.viewer = Some(RoleSlot::Unoccupied),
        }
        if self.store.update_session(session_id, update).await.is_none() {
            return;
        }
        self.message_seq.remove(session_id);

        for member in self.registry.session_members(session_id) {
            self.registry.send_to(&member, ServerEvent::SessionDisconnected);
        }
        tracing::info!(%session_id, ?departed, "session disconnected");
    }

    fn fan_out(&self, session_id: &str, message: &ChatMessage) {
        for member in self.registry.session_members(session_id) {
            self.registry.send_to(
                &member,
                ServerEvent::MessageReceived {
                    message: message.clone(),
                },
            );
        }
    }
}
