use chrono::{DateTime, Utc};
use pairlink_common::id::{prefix, prefixed_ulid};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Device role within a pairing session. Assigned when a connection creates
/// or joins a session and immutable for that connection's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Viewer,
}

impl Role {
    pub fn opposite(self) -> Role {
        match self {
            Role::Host => Role::Viewer,
            Role::Viewer => Role::Host,
        }
    }
}

/// Occupancy of one role slot on a session.
///
/// The handle inside `Occupied` is a weak reference to a live connection; the
/// session never owns the connection and must tolerate it vanishing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoleSlot {
    #[default]
    Unoccupied,
    Occupied(String),
}

impl RoleSlot {
    pub fn handle(&self) -> Option<&str> {
        match self {
            RoleSlot::Occupied(handle) => Some(handle),
            RoleSlot::Unoccupied => None,
        }
    }

    pub fn is_occupied(&self) -> bool {
        matches!(self, RoleSlot::Occupied(_))
    }
}

/// Pairing state machine: `Created` (host only, joinable by code) →
/// `Paired` (host and viewer both connected) → `Disconnected` (either side
/// left; still resolvable by id, no longer joinable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Created,
    Paired,
    Disconnected,
}

/// A pairing session between a screen-sharing host and a viewer.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub pairing_code: String,
    pub host: RoleSlot,
    pub viewer: RoleSlot,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, on the first successful join.
    pub connected_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(pairing_code: String, host_handle: &str) -> Self {
        Self {
            id: prefixed_ulid(prefix::SESSION),
            pairing_code,
            host: RoleSlot::Occupied(host_handle.to_string()),
            viewer: RoleSlot::Unoccupied,
            state: SessionState::Created,
            created_at: Utc::now(),
            connected_at: None,
        }
    }

    /// True only while both host and viewer are connected.
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Paired
    }

    pub fn slot(&self, role: Role) -> &RoleSlot {
        match role {
            Role::Host => &self.host,
            Role::Viewer => &self.viewer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_created_with_host_bound() {
        let session = Session::new("AB12C3".to_string(), "conn_host");
        assert!(session.id.starts_with("ses_"));
        assert_eq!(session.state, SessionState::Created);
        assert_eq!(session.host.handle(), Some("conn_host"));
        assert!(!session.viewer.is_occupied());
        assert!(!session.is_active());
        assert!(session.connected_at.is_none());
    }

    #[test]
    fn opposite_role() {
        assert_eq!(Role::Host.opposite(), Role::Viewer);
        assert_eq!(Role::Viewer.opposite(), Role::Host);
    }
}
