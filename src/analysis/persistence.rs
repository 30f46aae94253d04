use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Mutex, MutexGuard};
use crate::analysis::types::{AnalysisRecord, FavoriteListing};

/// SQLite record sink for analyses and the host's favorites.
pub struct AnalysisDatabase {
    conn: Mutex<Connection>,
}

impl AnalysisDatabase {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS analyses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TIMESTAMP NOT NULL,
                checkin TEXT NOT NULL,
                checkout TEXT NOT NULL,
                adults INTEGER NOT NULL,
                suggested_price REAL NOT NULL,
                discount_percentage REAL NOT NULL,
                strategy TEXT NOT NULL,
                market_source TEXT NOT NULL,
                auto_generated INTEGER NOT NULL DEFAULT 0,
                payload TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS favorites (
                listing_url TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                price_per_night REAL NOT NULL,
                is_beachfront INTEGER NOT NULL DEFAULT 0,
                location TEXT NOT NULL DEFAULT '',
                image_url TEXT NOT NULL DEFAULT '',
                added_at TIMESTAMP NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_analyses_created_at ON analyses(created_at);
            "#
        )?;

        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("database connection lock poisoned"))
    }

    /// Store a full analysis; returns its row id
    pub fn insert_analysis(&self, record: &AnalysisRecord) -> Result<i64> {
        let payload = serde_json::to_string(record).context("Failed to serialize analysis")?;
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO analyses (created_at, checkin, checkout, adults, suggested_price, discount_percentage, strategy, market_source, auto_generated, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.created_at.to_rfc3339(),
                record.request.stay.checkin.to_string(),
                record.request.stay.checkout.to_string(),
                record.request.adults,
                record.pricing.suggested_price,
                record.pricing.discount_percentage,
                record.pricing.strategy_label,
                record.market_source.as_str(),
                record.request.auto_generated,
                payload,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn decode(id: i64, payload: &str) -> Result<AnalysisRecord> {
        let mut record: AnalysisRecord = serde_json::from_str(payload)
            .with_context(|| format!("Corrupt analysis payload for id {}", id))?;
        record.id = Some(id);
        Ok(record)
    }

    pub fn latest_analysis(&self) -> Result<Option<AnalysisRecord>> {
        let row: Option<(i64, String)> = self.conn()?
            .query_row(
                "SELECT id, payload FROM analyses ORDER BY id DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(id, payload)| Self::decode(id, &payload)).transpose()
    }

    /// The most recent `limit` analyses, oldest first
    pub fn analysis_history(&self, limit: usize) -> Result<Vec<AnalysisRecord>> {
        let rows: Vec<(i64, String)> = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(
                "SELECT id, payload FROM analyses ORDER BY id DESC LIMIT ?1"
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        rows.iter()
            .rev()
            .map(|(id, payload)| Self::decode(*id, payload))
            .collect()
    }

    pub fn count_analyses(&self) -> Result<usize> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM analyses",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Insert or replace a favorite by listing URL
    pub fn upsert_favorite(&self, favorite: &FavoriteListing) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO favorites (listing_url, title, price_per_night, is_beachfront, location, image_url, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(listing_url) DO UPDATE SET
                title = excluded.title,
                price_per_night = excluded.price_per_night,
                is_beachfront = excluded.is_beachfront,
                location = excluded.location,
                image_url = excluded.image_url",
            params![
                favorite.listing_url,
                favorite.title,
                favorite.price_per_night,
                favorite.is_beachfront,
                favorite.location,
                favorite.image_url,
                favorite.added_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Returns whether a row was deleted
    pub fn delete_favorite(&self, listing_url: &str) -> Result<bool> {
        let deleted = self.conn()?.execute(
            "DELETE FROM favorites WHERE listing_url = ?1",
            params![listing_url],
        )?;
        Ok(deleted > 0)
    }

    pub fn list_favorites(&self) -> Result<Vec<FavoriteListing>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT listing_url, title, price_per_night, is_beachfront, location, image_url, added_at
             FROM favorites
             ORDER BY added_at, listing_url"
        )?;

        let rows = stmt.query_map([], |row| {
            let added_at: String = row.get(6)?;
            let added_at = DateTime::parse_from_rfc3339(&added_at)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?
                .with_timezone(&Utc);

            Ok(FavoriteListing {
                listing_url: row.get(0)?,
                title: row.get(1)?,
                price_per_night: row.get(2)?,
                is_beachfront: row.get(3)?,
                location: row.get(4)?,
                image_url: row.get(5)?,
                added_at,
            })
        })?;

        let favorites = rows
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read favorites")?;
        Ok(favorites)
    }

    pub fn clear_favorites(&self) -> Result<()> {
        self.conn()?.execute("DELETE FROM favorites", [])?;
        Ok(())
    }
}
