//! Fundamental types shared across the dispatch pipeline.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A longitude/latitude pair in degrees. Longitude first — the convention is
/// fixed everywhere (wire, store, geo math) and never swapped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinates {
    /// Validate and construct a coordinate pair.
    ///
    /// Latitude must be finite within [-90, 90], longitude finite within
    /// [-180, 180]. The (0, 0) sentinel for "position unavailable" passes.
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, ValidationError> {
        if !latitude.is_finite() {
            return Err(ValidationError::NotFinite { field: "latitude" });
        }
        if !longitude.is_finite() {
            return Err(ValidationError::NotFinite { field: "longitude" });
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::OutOfRange {
                field: "latitude",
                min: -90.0,
                max: 90.0,
            });
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::OutOfRange {
                field: "longitude",
                min: -180.0,
                max: 180.0,
            });
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }
}

/// Lifecycle status of an incident.
///
/// The store enforces no ordering between these values: any status may
/// replace any other, including Resolved back to Pending. Callers relying on
/// a monotonic lifecycle must enforce it themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncidentStatus {
    Pending,
    Dispatched,
    Resolved,
}

/// Presentation metadata for a status value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusStyle {
    pub label: &'static str,
    pub color: &'static str,
}

impl IncidentStatus {
    /// Stable string form used in the store and on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            IncidentStatus::Pending => "Pending",
            IncidentStatus::Dispatched => "Dispatched",
            IncidentStatus::Resolved => "Resolved",
        }
    }

    /// Parse the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(IncidentStatus::Pending),
            "Dispatched" => Some(IncidentStatus::Dispatched),
            "Resolved" => Some(IncidentStatus::Resolved),
            _ => None,
        }
    }

    /// Display metadata for this status.
    pub fn style(self) -> StatusStyle {
        match self {
            IncidentStatus::Pending => StatusStyle {
                label: "Pending",
                color: "#ef4444",
            },
            IncidentStatus::Dispatched => StatusStyle {
                label: "Dispatched",
                color: "#f59e0b",
            },
            IncidentStatus::Resolved => StatusStyle {
                label: "Resolved",
                color: "#22c55e",
            },
        }
    }
}

/// Account role carried in the bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Civilian,
    Responder,
    Admin,
}

impl Role {
    /// Stable string form used in the directory table.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Civilian => "civilian",
            Role::Responder => "responder",
            Role::Admin => "admin",
        }
    }

    /// Parse the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "civilian" => Some(Role::Civilian),
            "responder" => Some(Role::Responder),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Whether this role may view the full incident feed and change status.
    pub fn can_dispatch(self) -> bool {
        matches!(self, Role::Responder | Role::Admin)
    }
}

/// The durable record created when a trigger fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Store-assigned row id.
    pub id: i64,
    /// Caller-visible unique identifier, immutable. Correlates asynchronous
    /// audio uploads with creation.
    pub dispatch_id: String,
    pub location: Coordinates,
    pub status: IncidentStatus,
    /// Absent until an audio upload completes.
    pub audio_ref: Option<String>,
    pub owner_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Generate a fresh caller-visible dispatch identifier.
pub fn new_dispatch_id() -> String {
    format!("INC-{}", Uuid::new_v4())
}
