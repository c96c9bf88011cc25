//! Favorite places, keyed by name, backed by SQLite.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::StorageResult;

/// A saved place. Re-adding a name replaces the stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoritePlace {
    pub name: String,
    pub region: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
}

impl FavoritePlace {
    /// New record stamped with the current time.
    pub fn new(
        name: impl Into<String>,
        region: impl Into<String>,
        country: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            country: country.into(),
            latitude,
            longitude,
            created_at: Utc::now(),
        }
    }
}

/// Persistent favorites table with a live listing.
#[async_trait]
pub trait FavoritesStore: Send + Sync {
    /// Insert, or replace the record with the same name.
    async fn upsert(&self, favorite: &FavoritePlace) -> StorageResult<()>;

    /// Remove by name; absent names are ignored.
    async fn delete(&self, name: &str) -> StorageResult<()>;

    async fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Current listing, newest first, followed by one update per committed write.
    fn observe_all(&self) -> watch::Receiver<Vec<FavoritePlace>>;
}

pub struct SqliteFavoritesStore {
    conn: Arc<Mutex<Connection>>,
    listing: Arc<watch::Sender<Vec<FavoritePlace>>>,
}

impl SqliteFavoritesStore {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        let initial = Self::list_all(&conn)?;
        let (listing, _) = watch::channel(initial);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            listing: Arc::new(listing),
        })
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS favorites (
                name TEXT PRIMARY KEY,
                region TEXT NOT NULL,
                country TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_favorites_created ON favorites(created_at DESC);
            "#,
        )
    }

    fn row_to_favorite(row: &rusqlite::Row) -> rusqlite::Result<FavoritePlace> {
        let created_ms: i64 = row.get(5)?;

        Ok(FavoritePlace {
            name: row.get(0)?,
            region: row.get(1)?,
            country: row.get(2)?,
            latitude: row.get(3)?,
            longitude: row.get(4)?,
            created_at: DateTime::from_timestamp_millis(created_ms).unwrap_or_else(Utc::now),
        })
    }

    fn list_all(conn: &Connection) -> rusqlite::Result<Vec<FavoritePlace>> {
        let mut stmt = conn.prepare(
            "SELECT name, region, country, latitude, longitude, created_at
             FROM favorites
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([], Self::row_to_favorite)?;
        rows.collect()
    }

    /// Run a write on the blocking pool and publish the new listing.
    ///
    /// The listing is published while the connection lock is held, so
    /// observers see writes in commit order.
    async fn write<F>(&self, op: F) -> StorageResult<()>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<()> + Send + 'static,
    {
        let conn = self.conn.clone();
        let listing = self.listing.clone();

        tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let conn = conn.lock();
            op(&conn)?;
            let all = Self::list_all(&conn)?;
            listing.send_replace(all);
            Ok(())
        })
        .await?
    }
}

#[async_trait]
impl FavoritesStore for SqliteFavoritesStore {
    async fn upsert(&self, favorite: &FavoritePlace) -> StorageResult<()> {
        let favorite = favorite.clone();
        self.write(move |conn| {
            conn.execute(
                r#"
                INSERT INTO favorites (name, region, country, latitude, longitude, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(name) DO UPDATE SET
                    region = excluded.region,
                    country = excluded.country,
                    latitude = excluded.latitude,
                    longitude = excluded.longitude,
                    created_at = excluded.created_at
                "#,
                params![
                    favorite.name,
                    favorite.region,
                    favorite.country,
                    favorite.latitude,
                    favorite.longitude,
                    favorite.created_at.timestamp_millis(),
                ],
            )?;
            tracing::debug!("Saved favorite: {}", favorite.name);
            Ok(())
        })
        .await
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        let name = name.to_string();
        self.write(move |conn| {
            let removed = conn.execute("DELETE FROM favorites WHERE name = ?1", params![name])?;
            tracing::debug!("Deleted favorite {} ({} rows)", name, removed);
            Ok(())
        })
        .await
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        let conn = self.conn.clone();
        let name = name.to_string();

        tokio::task::spawn_blocking(move || -> StorageResult<bool> {
            let count: i64 = conn.lock().query_row(
                "SELECT COUNT(*) FROM favorites WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await?
    }

    fn observe_all(&self) -> watch::Receiver<Vec<FavoritePlace>> {
        self.listing.subscribe()
    }
}
