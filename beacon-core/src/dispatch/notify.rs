//! Geospatially-targeted incident notification with broadcast fallback.

use crate::directory::ResponderLookup;
use crate::error::NotifyError;
use crate::gateway::{PushEvent, RESPONDER_ROOM, Rooms, personal_room};
use crate::types::Incident;
use std::sync::Arc;
use tracing::{info, warn};

/// How a notification round went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Delivered individually to this many nearby responders.
    Targeted(usize),
    /// No candidates (or the lookup failed) — broadcast to the shared
    /// responder room, reaching this many connections.
    Broadcast(usize),
}

/// Resolves which responder terminals to notify for a new incident,
/// preferring proximity, falling back to a full broadcast.
#[derive(Clone)]
pub struct GeoDispatchNotifier {
    lookup: Arc<dyn ResponderLookup>,
    rooms: Rooms,
    max_distance_m: f64,
}

impl GeoDispatchNotifier {
    pub fn new(lookup: Arc<dyn ResponderLookup>, rooms: Rooms, max_distance_m: f64) -> Self {
        Self {
            lookup,
            rooms,
            max_distance_m,
        }
    }

    /// Fan an incident-created event out to responders.
    ///
    /// An incident must never go unnotified because of a query miss or
    /// error: zero candidates and lookup failures both fall back to
    /// broadcasting on the shared responder room.
    pub async fn notify(&self, incident: &Incident) -> DispatchOutcome {
        let event = PushEvent::IncidentCreated {
            incident: incident.clone(),
        };

        match self
            .lookup
            .responders_near(incident.location, self.max_distance_m)
            .await
        {
            Ok(responders) if !responders.is_empty() => {
                let mut delivered = 0;
                for responder in &responders {
                    delivered += self
                        .rooms
                        .emit(&personal_room(responder.user_id), &event)
                        .await;
                }
                info!(
                    dispatch_id = %incident.dispatch_id,
                    candidates = responders.len(),
                    delivered,
                    "notified nearby responders"
                );
                DispatchOutcome::Targeted(delivered)
            }
            Ok(_) => {
                let delivered = self.rooms.emit(RESPONDER_ROOM, &event).await;
                info!(
                    dispatch_id = %incident.dispatch_id,
                    delivered,
                    "no nearby responders; broadcast to responder room"
                );
                DispatchOutcome::Broadcast(delivered)
            }
            Err(err) => {
                let err = NotifyError::Lookup(err);
                warn!(
                    dispatch_id = %incident.dispatch_id,
                    error = %err,
                    "responder lookup failed; broadcast to responder room"
                );
                let delivered = self.rooms.emit(RESPONDER_ROOM, &event).await;
                DispatchOutcome::Broadcast(delivered)
            }
        }
    }
}
