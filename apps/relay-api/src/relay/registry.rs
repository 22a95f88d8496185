//! Connection registry: maps live connection handles to session membership.
//!
//! One registry is instantiated per process and injected into the hub. All
//! interior state sits behind a single non-async mutex, so `bind`,
//! `resolve_peers`, and `unregister` are atomic with respect to each other
//! and never observe a half-updated binding. Nothing here suspends; the lock
//! is never held across an await point.

use std::collections::HashMap;

use pairlink_common::id::{prefix, prefixed_ulid};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use crate::models::session::{Role, RoleSlot};

use super::events::ServerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindError {
    /// The connection already belongs to a session.
    AlreadyBound,
    /// The session already has an occupant for the requested role.
    RoleConflict,
    /// The handle was never registered or has been unregistered.
    UnknownHandle,
}

#[derive(Debug, Clone)]
struct Binding {
    session_id: String,
    role: Role,
}

struct ConnEntry {
    sender: UnboundedSender<ServerEvent>,
    binding: Option<Binding>,
}

#[derive(Default)]
struct MemberSlots {
    host: RoleSlot,
    viewer: RoleSlot,
}

impl MemberSlots {
    fn slot_mut(&mut self, role: Role) -> &mut RoleSlot {
        match role {
            Role::Host => &mut self.host,
            Role::Viewer => &mut self.viewer,
        }
    }

    fn handles(&self) -> impl Iterator<Item = &str> {
        self.host.handle().into_iter().chain(self.viewer.handle())
    }

    fn is_empty(&self) -> bool {
        !self.host.is_occupied() && !self.viewer.is_occupied()
    }
}

#[derive(Default)]
struct RegistryInner {
    connections: HashMap<String, ConnEntry>,
    members: HashMap<String, MemberSlots>,
}

impl RegistryInner {
    /// Clear the slot `handle` occupies on `session_id`, dropping the members
    /// entry once both slots are free.
    fn release_slot(&mut self, session_id: &str, role: Role, handle: &str) {
        if let Some(slots) = self.members.get_mut(session_id) {
            let slot = slots.slot_mut(role);
            if slot.handle() == Some(handle) {
                *slot = RoleSlot::Unoccupied;
            }
            if slots.is_empty() {
                self.members.remove(session_id);
            }
        }
    }
}

pub struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Admit a new anonymous connection, keeping its outbound channel so the
    /// hub can push events to it. Never fails.
    pub fn register(&self, sender: UnboundedSender<ServerEvent>) -> String {
        let handle = prefixed_ulid(prefix::CONNECTION);
        let mut inner = self.inner.lock();
        inner.connections.insert(
            handle.clone(),
            ConnEntry {
                sender,
                binding: None,
            },
        );
        handle
    }

    /// Associate a connection with a session and role.
    pub fn bind(&self, handle: &str, session_id: &str, role: Role) -> Result<(), BindError> {
        let mut inner = self.inner.lock();

        match inner.connections.get(handle) {
            None => return Err(BindError::UnknownHandle),
            Some(entry) if entry.binding.is_some() => return Err(BindError::AlreadyBound),
            Some(_) => {}
        }

        let slots = inner.members.entry(session_id.to_string()).or_default();
        let slot = slots.slot_mut(role);
        if slot.is_occupied() {
            return Err(BindError::RoleConflict);
        }
        *slot = RoleSlot::Occupied(handle.to_string());

        // Checked present above; still holding the lock.
        if let Some(entry) = inner.connections.get_mut(handle) {
            entry.binding = Some(Binding {
                session_id: session_id.to_string(),
                role,
            });
        }
        Ok(())
    }

    /// The session and role this connection is bound to, if any.
    pub fn binding(&self, handle: &str) -> Option<(String, Role)> {
        let inner = self.inner.lock();
        let binding = inner.connections.get(handle)?.binding.as_ref()?;
        Some((binding.session_id.clone(), binding.role))
    }

    /// All other connections bound to the same session as `handle`.
    pub fn resolve_peers(&self, handle: &str) -> Vec<String> {
        let inner = self.inner.lock();
        let Some(binding) = inner
            .connections
            .get(handle)
            .and_then(|entry| entry.binding.as_ref())
        else {
            return Vec::new();
        };
        inner
            .members
            .get(&binding.session_id)
            .map(|slots| {
                slots
                    .handles()
                    .filter(|member| *member != handle)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All connections currently bound to `session_id`, as one consistent
    /// snapshot for fan-out.
    pub fn session_members(&self, session_id: &str) -> Vec<String> {
        let inner = self.inner.lock();
        inner
            .members
            .get(session_id)
            .map(|slots| slots.handles().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// The connection occupying `role` on `session_id`, if any.
    pub fn peer_of_role(&self, session_id: &str, role: Role) -> Option<String> {
        let inner = self.inner.lock();
        let slots = inner.members.get(session_id)?;
        match role {
            Role::Host => slots.host.handle().map(str::to_string),
            Role::Viewer => slots.viewer.handle().map(str::to_string),
        }
    }

    /// Detach a connection from its session without removing it from the
    /// registry (graceful leave; the transport stays open and unbound).
    pub fn unbind(&self, handle: &str) -> Option<(String, Role)> {
        let mut inner = self.inner.lock();
        let binding = inner.connections.get_mut(handle)?.binding.take()?;
        inner.release_slot(&binding.session_id, binding.role, handle);
        Some((binding.session_id, binding.role))
    }

    /// Remove a connection entirely. Idempotent; unregistering an unknown
    /// handle is a no-op. Returns the binding the connection held, if any,
    /// so the caller can drive session cleanup.
    pub fn unregister(&self, handle: &str) -> Option<(String, Role)> {
        let mut inner = self.inner.lock();
        let entry = inner.connections.remove(handle)?;
        let binding = entry.binding?;
        inner.release_slot(&binding.session_id, binding.role, handle);
        Some((binding.session_id, binding.role))
    }

    /// Push an event to one connection. Delivery is best-effort: a closed
    /// or unknown connection swallows the event.
    pub fn send_to(&self, handle: &str, event: ServerEvent) -> bool {
        let sender = {
            let inner = self.inner.lock();
            match inner.connections.get(handle) {
                Some(entry) => entry.sender.clone(),
                None => return false,
            }
        };
        sender.send(event).is_ok()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
