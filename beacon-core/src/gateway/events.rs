//! Gateway event types and message protocol.

use crate::types::Incident;
use serde::{Deserialize, Serialize};

/// Events pushed from the gateway to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PushEvent {
    /// A new incident was created. Delivered to targeted responder rooms
    /// (or broadcast) and to the owner's personal room.
    IncidentCreated { incident: Incident },
    /// An incident's status changed.
    StatusChanged { incident: Incident },
    /// An audio clip was attached to an incident.
    AudioAttached { incident: Incident },
    /// A live position sample for an incident's location stream.
    LiveLocation {
        dispatch_id: String,
        latitude: f64,
        longitude: f64,
    },
}

/// Messages sent from clients to the gateway.
///
/// Status-change requests arrive over REST, not this channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Subscribe to a specific incident's live-location stream.
    JoinIncidentRoom { dispatch_id: String },
    /// The triggering device's live position, relayed to the incident room.
    LiveLocation {
        dispatch_id: String,
        latitude: f64,
        longitude: f64,
    },
    /// A responder's own position report (responder connections only).
    PositionReport { latitude: f64, longitude: f64 },
}
