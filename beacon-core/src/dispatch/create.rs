//! Incident creation — validate, persist, acknowledge, then notify.

use crate::dispatch::notify::GeoDispatchNotifier;
use crate::error::Result;
use crate::gateway::{PushEvent, Rooms, personal_room};
use crate::store::IncidentStore;
use crate::types::{Coordinates, Incident, new_dispatch_id};
use tracing::{debug, info};
use uuid::Uuid;

/// Creates incidents. The caller is acknowledged as soon as the record is
/// durable; all fan-out runs in a detached task afterwards.
#[derive(Clone)]
pub struct IncidentCreateService {
    store: IncidentStore,
    rooms: Rooms,
    notifier: GeoDispatchNotifier,
}

impl IncidentCreateService {
    pub fn new(store: IncidentStore, rooms: Rooms, notifier: GeoDispatchNotifier) -> Self {
        Self {
            store,
            rooms,
            notifier,
        }
    }

    /// Validate coordinates, persist a `Pending` incident, and return it.
    ///
    /// Ordering is a hard requirement: the returned record is already
    /// durable, and the create latency observed by the caller excludes the
    /// geospatial query and fan-out. Notification failures are contained in
    /// the detached task — they are logged and never surface here.
    pub async fn create(
        &self,
        owner_user_id: Uuid,
        latitude: f64,
        longitude: f64,
    ) -> Result<Incident> {
        let location = Coordinates::new(longitude, latitude)?;
        let dispatch_id = new_dispatch_id();

        let incident = self.store.create(&dispatch_id, location, owner_user_id).await?;
        info!(dispatch_id = %incident.dispatch_id, owner = %owner_user_id, "incident created");

        let notifier = self.notifier.clone();
        let rooms = self.rooms.clone();
        let snapshot = incident.clone();
        tokio::spawn(async move {
            // The owner's other sessions see the record on their own room.
            let own = rooms
                .emit(
                    &personal_room(snapshot.owner_user_id),
                    &PushEvent::IncidentCreated {
                        incident: snapshot.clone(),
                    },
                )
                .await;
            debug!(dispatch_id = %snapshot.dispatch_id, delivered = own, "owner room notified");

            notifier.notify(&snapshot).await;
        });

        Ok(incident)
    }
}
