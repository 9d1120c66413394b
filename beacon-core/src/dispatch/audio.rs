//! Server side of the asynchronous audio upload.
//!
//! Uploads are routed by dispatch id, not the store's internal id, so their
//! completion order is independent of the create response. An unknown
//! dispatch id fails only the upload — the underlying incident (if any) is
//! never affected.

use crate::error::{BeaconError, Result};
use crate::gateway::{PushEvent, RESPONDER_ROOM, Rooms, personal_room};
use crate::media::MediaStore;
use crate::store::IncidentStore;
use crate::types::Incident;
use tracing::info;

/// Attaches uploaded clips to incidents and announces them.
#[derive(Clone)]
pub struct AudioAttachService {
    store: IncidentStore,
    rooms: Rooms,
    media: MediaStore,
}

impl AudioAttachService {
    pub fn new(store: IncidentStore, rooms: Rooms, media: MediaStore) -> Self {
        Self {
            store,
            rooms,
            media,
        }
    }

    /// Store the clip, attach its reference, and emit `AudioAttached` to the
    /// responder room and the owner's personal room. Returns the reference.
    pub async fn attach(&self, dispatch_id: &str, data: &[u8]) -> Result<(Incident, String)> {
        // Resolve the incident first so an unknown id never writes a file.
        self.store
            .find_by_dispatch_id(dispatch_id)
            .await?
            .ok_or_else(|| BeaconError::NotFound(format!("incident {dispatch_id}")))?;

        let audio_ref = self.media.store_clip(dispatch_id, data)?;
        let incident = self
            .store
            .attach_audio(dispatch_id, &audio_ref)
            .await?
            .ok_or_else(|| BeaconError::NotFound(format!("incident {dispatch_id}")))?;

        let event = PushEvent::AudioAttached {
            incident: incident.clone(),
        };
        self.rooms.emit(RESPONDER_ROOM, &event).await;
        self.rooms
            .emit(&personal_room(incident.owner_user_id), &event)
            .await;

        info!(dispatch_id, audio_ref = %audio_ref, "audio clip attached");
        Ok((incident, audio_ref))
    }
}
