//! SQLite-backed incident store of record.
//!
//! The store is the durability boundary of the create pipeline: a create
//! commits here before any notification work starts, and fan-out failures
//! never touch it. The connection handle is owned by application context and
//! shared behind an async mutex; there is no module-level singleton.

use crate::error::StoreError;
use crate::geo;
use crate::types::{Coordinates, Incident, IncidentStatus};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS incidents (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    dispatch_id   TEXT NOT NULL UNIQUE,
    longitude     REAL NOT NULL,
    latitude      REAL NOT NULL,
    status        TEXT NOT NULL,
    audio_ref     TEXT,
    owner_user_id TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_incidents_owner ON incidents(owner_user_id);
CREATE INDEX IF NOT EXISTS idx_incidents_created ON incidents(created_at);
";

const COLUMNS: &str =
    "id, dispatch_id, longitude, latitude, status, audio_ref, owner_user_id, created_at, updated_at";

/// Persistent record of incidents, keyed by unique dispatch identifier.
#[derive(Clone)]
pub struct IncidentStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for IncidentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncidentStore").finish()
    }
}

impl IncidentStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory store (tests and ephemeral deployments).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Persist a new incident in `Pending` status.
    ///
    /// `dispatch_id` uniqueness is enforced by the UNIQUE column; a collision
    /// surfaces as [`StoreError::DuplicateDispatchId`].
    pub async fn create(
        &self,
        dispatch_id: &str,
        location: Coordinates,
        owner_user_id: Uuid,
    ) -> Result<Incident, StoreError> {
        let conn = self.conn.lock().await;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO incidents \
             (dispatch_id, longitude, latitude, status, owner_user_id, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                dispatch_id,
                location.longitude,
                location.latitude,
                IncidentStatus::Pending.as_str(),
                owner_user_id.to_string(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::DuplicateDispatchId(dispatch_id.to_string())
            }
            other => StoreError::Sqlite(other),
        })?;

        let id = conn.last_insert_rowid();
        Ok(Incident {
            id,
            dispatch_id: dispatch_id.to_string(),
            location,
            status: IncidentStatus::Pending,
            audio_ref: None,
            owner_user_id,
            created_at: now,
            updated_at: now,
        })
    }

    /// Look up an incident by its store id.
    pub async fn find(&self, id: i64) -> Result<Option<Incident>, StoreError> {
        let conn = self.conn.lock().await;
        find_by_id(&conn, id)
    }

    /// Look up an incident by its caller-visible dispatch id.
    pub async fn find_by_dispatch_id(
        &self,
        dispatch_id: &str,
    ) -> Result<Option<Incident>, StoreError> {
        let conn = self.conn.lock().await;
        let incident = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM incidents WHERE dispatch_id = ?1"),
                params![dispatch_id],
                row_to_incident,
            )
            .optional()?;
        Ok(incident)
    }

    /// All incidents, newest first.
    pub async fn all(&self) -> Result<Vec<Incident>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM incidents ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map([], row_to_incident)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    /// One owner's incidents, newest first.
    pub async fn by_owner(&self, owner_user_id: Uuid) -> Result<Vec<Incident>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM incidents WHERE owner_user_id = ?1 \
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![owner_user_id.to_string()], row_to_incident)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    /// Incidents within `radius_m` of `center`, closest first.
    pub async fn nearby(
        &self,
        center: Coordinates,
        radius_m: f64,
    ) -> Result<Vec<Incident>, StoreError> {
        let all = self.all().await?;
        Ok(geo::within(
            center,
            radius_m,
            all.into_iter().map(|i| (i.location, i)),
        ))
    }

    /// Write a new status. Any value may replace any other — the store
    /// enforces no transition ordering. Returns `None` when the id is
    /// unknown. Concurrent writers are last-write-wins.
    pub async fn update_status(
        &self,
        id: i64,
        status: IncidentStatus,
    ) -> Result<Option<Incident>, StoreError> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE incidents SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now().to_rfc3339(), id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        find_by_id(&conn, id)
    }

    /// Attach an audio reference to the incident with the given dispatch id.
    /// Returns `None` when the dispatch id is unknown.
    pub async fn attach_audio(
        &self,
        dispatch_id: &str,
        audio_ref: &str,
    ) -> Result<Option<Incident>, StoreError> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE incidents SET audio_ref = ?1, updated_at = ?2 WHERE dispatch_id = ?3",
            params![audio_ref, Utc::now().to_rfc3339(), dispatch_id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        let incident = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM incidents WHERE dispatch_id = ?1"),
                params![dispatch_id],
                row_to_incident,
            )
            .optional()?;
        Ok(incident)
    }
}

fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Incident>, StoreError> {
    let incident = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM incidents WHERE id = ?1"),
            params![id],
            row_to_incident,
        )
        .optional()?;
    Ok(incident)
}

fn row_to_incident(row: &rusqlite::Row<'_>) -> rusqlite::Result<Incident> {
    let status_text: String = row.get(4)?;
    let owner_text: String = row.get(6)?;
    let created_text: String = row.get(7)?;
    let updated_text: String = row.get(8)?;

    Ok(Incident {
        id: row.get(0)?,
        dispatch_id: row.get(1)?,
        location: Coordinates {
            longitude: row.get(2)?,
            latitude: row.get(3)?,
        },
        status: IncidentStatus::parse(&status_text)
            .ok_or_else(|| text_conversion_error(4, format!("unknown status {status_text:?}")))?,
        audio_ref: row.get(5)?,
        owner_user_id: Uuid::parse_str(&owner_text)
            .map_err(|e| text_conversion_error(6, e.to_string()))?,
        created_at: parse_timestamp(7, &created_text)?,
        updated_at: parse_timestamp(8, &updated_text)?,
    })
}

fn parse_timestamp(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| text_conversion_error(idx, e.to_string()))
}

fn text_conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        message.into(),
    )
}
