//! Responder directory — last known positions for proximity targeting.
//!
//! Entries are keyed by user id. Positions are mutated only by the reporting
//! responder's own connection; the notifier only ever reads.

use crate::error::StoreError;
use crate::geo;
use crate::types::{Coordinates, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS responder_directory (
    user_id    TEXT PRIMARY KEY,
    role       TEXT NOT NULL,
    longitude  REAL,
    latitude   REAL,
    updated_at TEXT NOT NULL
);
";

/// One directory row: who, what role, and where they last reported from.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    pub user_id: Uuid,
    pub role: Role,
    pub location: Option<Coordinates>,
    pub updated_at: DateTime<Utc>,
}

/// Read seam used by the notifier, so a failing lookup is testable without a
/// broken database.
#[async_trait]
pub trait ResponderLookup: Send + Sync {
    /// Responder-role entries with a known position within `max_distance_m`
    /// of `center`, closest first.
    async fn responders_near(
        &self,
        center: Coordinates,
        max_distance_m: f64,
    ) -> Result<Vec<DirectoryEntry>, StoreError>;
}

/// SQLite-backed directory.
pub struct ResponderDirectory {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for ResponderDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponderDirectory").finish()
    }
}

impl ResponderDirectory {
    /// Open (or create) the directory at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory directory (tests and ephemeral deployments).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Record that a user connected with the given role. Keeps any previously
    /// reported position.
    pub async fn register(&self, user_id: Uuid, role: Role) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO responder_directory (user_id, role, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(user_id) DO UPDATE SET role = excluded.role, updated_at = excluded.updated_at",
            params![user_id.to_string(), role.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Update a user's last known position.
    pub async fn update_position(
        &self,
        user_id: Uuid,
        location: Coordinates,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO responder_directory (user_id, role, longitude, latitude, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(user_id) DO UPDATE SET \
                 longitude = excluded.longitude, \
                 latitude = excluded.latitude, \
                 updated_at = excluded.updated_at",
            params![
                user_id.to_string(),
                Role::Responder.as_str(),
                location.longitude,
                location.latitude,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a single entry.
    pub async fn entry(&self, user_id: Uuid) -> Result<Option<DirectoryEntry>, StoreError> {
        let conn = self.conn.lock().await;
        let entry = conn
            .query_row(
                "SELECT user_id, role, longitude, latitude, updated_at \
                 FROM responder_directory WHERE user_id = ?1",
                params![user_id.to_string()],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }
}

#[async_trait]
impl ResponderLookup for ResponderDirectory {
    async fn responders_near(
        &self,
        center: Coordinates,
        max_distance_m: f64,
    ) -> Result<Vec<DirectoryEntry>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT user_id, role, longitude, latitude, updated_at \
             FROM responder_directory \
             WHERE role = ?1 AND longitude IS NOT NULL AND latitude IS NOT NULL",
        )?;
        let rows = stmt.query_map(params![Role::Responder.as_str()], row_to_entry)?;
        let entries = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(geo::within(
            center,
            max_distance_m,
            entries.into_iter().filter_map(|e| e.location.map(|l| (l, e))),
        ))
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<DirectoryEntry> {
    let user_text: String = row.get(0)?;
    let role_text: String = row.get(1)?;
    let longitude: Option<f64> = row.get(2)?;
    let latitude: Option<f64> = row.get(3)?;
    let updated_text: String = row.get(4)?;

    let location = match (longitude, latitude) {
        (Some(longitude), Some(latitude)) => Some(Coordinates {
            longitude,
            latitude,
        }),
        _ => None,
    };

    Ok(DirectoryEntry {
        user_id: Uuid::parse_str(&user_text).map_err(|e| conversion_error(0, e.to_string()))?,
        role: Role::parse(&role_text)
            .ok_or_else(|| conversion_error(1, format!("unknown role {role_text:?}")))?,
        location,
        updated_at: DateTime::parse_from_rfc3339(&updated_text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(4, e.to_string()))?,
    })
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(longitude: f64, latitude: f64) -> Coordinates {
        Coordinates {
            longitude,
            latitude,
        }
    }

    #[tokio::test]
    async fn test_register_then_entry() {
        let dir = ResponderDirectory::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        dir.register(user, Role::Responder).await.unwrap();

        let entry = dir.entry(user).await.unwrap().unwrap();
        assert_eq!(entry.role, Role::Responder);
        assert!(entry.location.is_none());
    }

    #[tokio::test]
    async fn test_register_keeps_position() {
        let dir = ResponderDirectory::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        dir.update_position(user, coords(10.0, 20.0)).await.unwrap();
        dir.register(user, Role::Responder).await.unwrap();

        let entry = dir.entry(user).await.unwrap().unwrap();
        assert_eq!(entry.location, Some(coords(10.0, 20.0)));
    }

    #[tokio::test]
    async fn test_update_position_overwrites() {
        let dir = ResponderDirectory::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        dir.update_position(user, coords(1.0, 1.0)).await.unwrap();
        dir.update_position(user, coords(2.0, 2.0)).await.unwrap();

        let entry = dir.entry(user).await.unwrap().unwrap();
        assert_eq!(entry.location, Some(coords(2.0, 2.0)));
    }

    #[tokio::test]
    async fn test_responders_near_orders_by_distance() {
        let dir = ResponderDirectory::open_in_memory().unwrap();
        let near = Uuid::new_v4();
        let nearer = Uuid::new_v4();
        dir.update_position(near, coords(0.01, 0.0)).await.unwrap();
        dir.update_position(nearer, coords(0.001, 0.0)).await.unwrap();

        let hits = dir
            .responders_near(coords(0.0, 0.0), 10_000.0)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].user_id, nearer);
        assert_eq!(hits[1].user_id, near);
    }

    #[tokio::test]
    async fn test_only_responder_role_participates() {
        let dir = ResponderDirectory::open_in_memory().unwrap();
        let civilian = Uuid::new_v4();
        // A civilian row with a position must not be targeted.
        dir.update_position(civilian, coords(0.0, 0.0)).await.unwrap();
        dir.register(civilian, Role::Civilian).await.unwrap();

        let hits = dir
            .responders_near(coords(0.0, 0.0), 1_000_000.0)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_positionless_responders_not_targeted() {
        let dir = ResponderDirectory::open_in_memory().unwrap();
        dir.register(Uuid::new_v4(), Role::Responder).await.unwrap();

        let hits = dir
            .responders_near(coords(0.0, 0.0), 1_000_000.0)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
