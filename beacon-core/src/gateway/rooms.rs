//! Room registry for the push channel.
//!
//! Each connection registers an unbounded sender per room it belongs to.
//! Membership is mutated only at connection establishment, teardown, and
//! explicit incident-room joins; event emission reads a snapshot of senders.
//! Delivery is best-effort — a closed receiver is simply skipped.

use super::events::PushEvent;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Shared room joined by every responder connection.
pub const RESPONDER_ROOM: &str = "responders";

/// Personal room name for a subject identity.
pub fn personal_room(user_id: Uuid) -> String {
    format!("user-{user_id}")
}

/// Live-location room name for an incident.
pub fn incident_room(dispatch_id: &str) -> String {
    format!("incident-{dispatch_id}")
}

/// Connection registry: room name -> connection id -> event sender.
#[derive(Clone, Default)]
pub struct Rooms {
    inner: Arc<Mutex<HashMap<String, HashMap<Uuid, UnboundedSender<PushEvent>>>>>,
}

impl std::fmt::Debug for Rooms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rooms").finish()
    }
}

impl Rooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection's sender to a room. Joining the same room twice is
    /// harmless (the sender is replaced).
    pub async fn join(&self, room: &str, connection_id: Uuid, tx: UnboundedSender<PushEvent>) {
        let mut rooms = self.inner.lock().await;
        rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection_id, tx);
    }

    /// Remove a connection from every room it joined. Empty rooms are
    /// dropped. Safe to call repeatedly.
    pub async fn leave_all(&self, connection_id: Uuid) {
        let mut rooms = self.inner.lock().await;
        for members in rooms.values_mut() {
            members.remove(&connection_id);
        }
        rooms.retain(|_, members| !members.is_empty());
    }

    /// Deliver an event to every member of a room. Returns how many senders
    /// accepted it; closed receivers are skipped.
    pub async fn emit(&self, room: &str, event: &PushEvent) -> usize {
        let rooms = self.inner.lock().await;
        let Some(members) = rooms.get(room) else {
            return 0;
        };
        members
            .values()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }

    /// Number of members currently joined to a room.
    pub async fn member_count(&self, room: &str) -> usize {
        let rooms = self.inner.lock().await;
        rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }

    /// Number of distinct connections across all rooms.
    pub async fn connection_count(&self) -> usize {
        let rooms = self.inner.lock().await;
        let mut seen: HashSet<Uuid> = HashSet::new();
        for members in rooms.values() {
            seen.extend(members.keys().copied());
        }
        seen.len()
    }
}
