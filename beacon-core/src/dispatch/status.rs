//! Status transitions shared by the incident owner and all responders.

use crate::error::{BeaconError, Result};
use crate::gateway::{PushEvent, RESPONDER_ROOM, Rooms, personal_room};
use crate::store::IncidentStore;
use crate::types::{Incident, IncidentStatus};
use tracing::info;

/// Applies status writes and pushes the change to both observer rooms.
///
/// Transitions are deliberately unordered (any value may replace any other,
/// including Resolved back to Pending) and concurrent writers are
/// last-write-wins with no version token — two simultaneous updates from
/// different responders race, and the later write silently wins.
#[derive(Clone)]
pub struct IncidentStatusMachine {
    store: IncidentStore,
    rooms: Rooms,
}

impl IncidentStatusMachine {
    pub fn new(store: IncidentStore, rooms: Rooms) -> Self {
        Self { store, rooms }
    }

    /// Write `status` to the incident with the given id and emit
    /// `StatusChanged` to the shared responder room and the owner's personal
    /// room. Re-applying the current status is accepted and re-emits.
    pub async fn update(&self, id: i64, status: IncidentStatus) -> Result<Incident> {
        let incident = self
            .store
            .update_status(id, status)
            .await?
            .ok_or_else(|| BeaconError::NotFound(format!("incident {id}")))?;

        let event = PushEvent::StatusChanged {
            incident: incident.clone(),
        };
        self.rooms.emit(RESPONDER_ROOM, &event).await;
        self.rooms
            .emit(&personal_room(incident.owner_user_id), &event)
            .await;

        info!(
            dispatch_id = %incident.dispatch_id,
            status = status.as_str(),
            "incident status updated"
        );
        Ok(incident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coordinates, new_dispatch_id};
    use tokio::sync::mpsc;
    use uuid::Uuid;

    async fn machine_with_incident() -> (IncidentStatusMachine, Incident, Rooms) {
        let store = IncidentStore::open_in_memory().unwrap();
        let rooms = Rooms::new();
        let incident = store
            .create(
                &new_dispatch_id(),
                Coordinates {
                    longitude: 77.2,
                    latitude: 28.6,
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();
        (
            IncidentStatusMachine::new(store, rooms.clone()),
            incident,
            rooms,
        )
    }

    #[tokio::test]
    async fn test_update_writes_and_returns_record() {
        let (machine, incident, _rooms) = machine_with_incident().await;
        let updated = machine
            .update(incident.id, IncidentStatus::Dispatched)
            .await
            .unwrap();
        assert_eq!(updated.status, IncidentStatus::Dispatched);
        assert_eq!(updated.dispatch_id, incident.dispatch_id);
    }

    #[tokio::test]
    async fn test_update_unknown_incident_is_not_found() {
        let (machine, _incident, _rooms) = machine_with_incident().await;
        let err = machine.update(9999, IncidentStatus::Resolved).await.unwrap_err();
        assert!(matches!(err, BeaconError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_emits_to_both_rooms() {
        let (machine, incident, rooms) = machine_with_incident().await;
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        let (owner_tx, mut owner_rx) = mpsc::unbounded_channel();
        rooms.join(RESPONDER_ROOM, Uuid::new_v4(), resp_tx).await;
        rooms
            .join(&personal_room(incident.owner_user_id), Uuid::new_v4(), owner_tx)
            .await;

        machine
            .update(incident.id, IncidentStatus::Resolved)
            .await
            .unwrap();

        for rx in [&mut resp_rx, &mut owner_rx] {
            match rx.try_recv() {
                Ok(PushEvent::StatusChanged { incident: got }) => {
                    assert_eq!(got.status, IncidentStatus::Resolved);
                }
                other => panic!("Expected StatusChanged, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_reapplying_same_status_reemits() {
        let (machine, incident, rooms) = machine_with_incident().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        rooms.join(RESPONDER_ROOM, Uuid::new_v4(), tx).await;

        machine
            .update(incident.id, IncidentStatus::Pending)
            .await
            .unwrap();
        machine
            .update(incident.id, IncidentStatus::Pending)
            .await
            .unwrap();

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_backward_transition_accepted() {
        let (machine, incident, _rooms) = machine_with_incident().await;
        machine
            .update(incident.id, IncidentStatus::Resolved)
            .await
            .unwrap();
        let back = machine
            .update(incident.id, IncidentStatus::Pending)
            .await
            .unwrap();
        assert_eq!(back.status, IncidentStatus::Pending);
    }
}
