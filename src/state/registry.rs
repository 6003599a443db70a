//! The session registry - central shared state for live connections.
//!
//! Tracks which connections claim which identity and which rooms each
//! connection has joined. Both maps live behind a single mutex so every
//! operation is atomic and presence reads always observe a consistent
//! snapshot; callers never read-then-write the maps directly.
//!
//! Presence is a full rescan of live connections rather than a maintained
//! counter: O(connections) per query, but always exactly derivable from the
//! membership relation with no drift after partial failures.
//!
//! Outbound routing (connection -> mpsc sender) is kept in a separate
//! concurrent map; it carries no membership state. Pushes use `try_send` so
//! a slow client's full queue drops the event instead of blocking the
//! pipeline.

use crate::error::HandlerError;
use crate::events::ServerEvent;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique connection identifier, assigned by the transport layer at accept.
pub type ConnId = Uuid;

#[derive(Default)]
struct Sessions {
    /// Connection -> claimed username. Absent until registration.
    identities: HashMap<ConnId, String>,
    /// Connection -> joined room keys.
    memberships: HashMap<ConnId, HashSet<String>>,
}

/// Shared registry of live sessions and their room memberships.
pub struct SessionRegistry {
    sessions: Mutex<Sessions>,
    /// Connection -> outbound event queue, for routing pushes.
    senders: DashMap<ConnId, mpsc::Sender<ServerEvent>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Sessions::default()),
            senders: DashMap::new(),
        }
    }

    /// Register a connection's outbound queue for routing.
    pub fn attach_sender(&self, conn: ConnId, sender: mpsc::Sender<ServerEvent>) {
        self.senders.insert(conn, sender);
    }

    /// Remove a connection's outbound queue.
    pub fn detach_sender(&self, conn: ConnId) {
        self.senders.remove(&conn);
    }

    /// Bind an identity to a connection. Re-registration overwrites.
    pub fn register(&self, conn: ConnId, username: &str) -> Result<(), HandlerError> {
        if username.is_empty() {
            return Err(HandlerError::MissingUsername);
        }
        self.sessions
            .lock()
            .identities
            .insert(conn, username.to_string());
        Ok(())
    }

    /// The username bound to a connection, if registered.
    pub fn identity(&self, conn: ConnId) -> Option<String> {
        self.sessions.lock().identities.get(&conn).cloned()
    }

    /// Add a room to a connection's membership set.
    pub fn join(&self, conn: ConnId, room: &str) -> Result<(), HandlerError> {
        let mut sessions = self.sessions.lock();
        if !sessions.identities.contains_key(&conn) {
            return Err(HandlerError::NotRegistered);
        }
        sessions
            .memberships
            .entry(conn)
            .or_default()
            .insert(room.to_string());
        Ok(())
    }

    /// Remove a room from a connection's membership set. Idempotent.
    pub fn leave(&self, conn: ConnId, room: &str) {
        let mut sessions = self.sessions.lock();
        if let Some(rooms) = sessions.memberships.get_mut(&conn) {
            rooms.remove(room);
        }
    }

    /// Atomically drop a connection's identity and memberships.
    ///
    /// Returns the vacated room keys so the caller can broadcast updated
    /// presence to each.
    pub fn disconnect(&self, conn: ConnId) -> Vec<String> {
        let mut sessions = self.sessions.lock();
        sessions.identities.remove(&conn);
        let mut vacated: Vec<String> = sessions
            .memberships
            .remove(&conn)
            .map(|rooms| rooms.into_iter().collect())
            .unwrap_or_default();
        vacated.sort();
        vacated
    }

    /// Distinct, sorted usernames of live connections joined to a room.
    ///
    /// Multiple connections sharing a username collapse to one entry.
    pub fn members_of(&self, room: &str) -> Vec<String> {
        let sessions = self.sessions.lock();
        let mut users = BTreeSet::new();
        for (conn, rooms) in &sessions.memberships {
            if rooms.contains(room)
                && let Some(username) = sessions.identities.get(conn)
            {
                users.insert(username.clone());
            }
        }
        users.into_iter().collect()
    }

    /// Whether a connection has joined a room.
    pub fn is_member(&self, conn: ConnId, room: &str) -> bool {
        self.sessions
            .lock()
            .memberships
            .get(&conn)
            .is_some_and(|rooms| rooms.contains(room))
    }

    /// All live connections currently registered as `username`.
    pub fn sessions_of(&self, username: &str) -> Vec<ConnId> {
        self.sessions
            .lock()
            .identities
            .iter()
            .filter(|(_, name)| name.as_str() == username)
            .map(|(conn, _)| *conn)
            .collect()
    }

    /// Queue an event for one connection. Returns false if it was dropped.
    pub fn send_to_conn(&self, conn: ConnId, event: ServerEvent) -> bool {
        let Some(sender) = self.senders.get(&conn) else {
            return false;
        };
        if sender.try_send(event).is_err() {
            crate::metrics::record_dropped();
            return false;
        }
        true
    }

    /// Push an event to every connection in a room.
    ///
    /// Returns the number of connections the event was queued for.
    pub fn broadcast_to_room(&self, room: &str, event: &ServerEvent) -> usize {
        let conns: Vec<ConnId> = {
            let sessions = self.sessions.lock();
            sessions
                .memberships
                .iter()
                .filter(|(_, rooms)| rooms.contains(room))
                .map(|(conn, _)| *conn)
                .collect()
        };

        let mut delivered = 0;
        for conn in conns {
            if self.send_to_conn(conn, event.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Push an event to every live session of a user.
    pub fn push_to_user(&self, username: &str, event: &ServerEvent) -> usize {
        let mut delivered = 0;
        for conn in self.sessions_of(username) {
            if self.send_to_conn(conn, event.clone()) {
                delivered += 1;
            }
        }
        delivered
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
