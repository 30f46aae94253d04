use anyhow::Result;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};
use crate::analysis::persistence::AnalysisDatabase;
use crate::analysis::types::{AnalysisRecord, FavoriteListing};

#[derive(Debug, Error, PartialEq)]
pub enum FavoriteError {
    #[error("favorite listing URL must not be empty")]
    EmptyUrl,

    #[error("listing {0} is already a favorite")]
    AlreadyExists(String),

    #[error("listing {0} is not a favorite")]
    NotFound(String),

    #[error("favorite {url} has an invalid price: {price}")]
    InvalidPrice { url: String, price: f64 },
}

fn has_usable_price(favorite: &FavoriteListing) -> bool {
    favorite.price_per_night.is_finite() && favorite.price_per_night >= 0.0
}

/// Shared application state: latest analysis, bounded history and the
/// host's favorites, optionally mirrored to SQLite.
pub struct AppState {
    latest: RwLock<Option<AnalysisRecord>>,
    history: RwLock<VecDeque<AnalysisRecord>>,
    history_limit: usize,
    favorites: DashMap<String, FavoriteListing>,
    db: Option<Arc<AnalysisDatabase>>,
}

impl AppState {
    pub fn new(history_limit: usize) -> Self {
        Self {
            latest: RwLock::new(None),
            history: RwLock::new(VecDeque::new()),
            history_limit: history_limit.max(1),
            favorites: DashMap::new(),
            db: None,
        }
    }

    /// State backed by `db`, restored from what it already holds
    pub fn with_database(history_limit: usize, db: Arc<AnalysisDatabase>) -> Result<Self> {
        let mut state = Self::new(history_limit);

        let history = db.analysis_history(state.history_limit)?;
        for favorite in db.list_favorites()? {
            state.favorites.insert(favorite.listing_url.clone(), favorite);
        }

        info!(
            "Restored {} analyses and {} favorites from database",
            history.len(),
            state.favorites.len()
        );

        state.latest = RwLock::new(db.latest_analysis()?);
        state.history = RwLock::new(history.into());
        state.db = Some(db);
        Ok(state)
    }

    /// Persist (when backed) and publish as the latest analysis. A storage
    /// failure is logged and the record is still kept in memory.
    pub async fn record_analysis(&self, mut record: AnalysisRecord) -> AnalysisRecord {
        if let Some(db) = &self.db {
            match db.insert_analysis(&record) {
                Ok(id) => record.id = Some(id),
                Err(e) => warn!("Failed to persist analysis: {:#}", e),
            }
        }

        {
            let mut history = self.history.write().await;
            history.push_back(record.clone());
            while history.len() > self.history_limit {
                history.pop_front();
            }
        }

        *self.latest.write().await = Some(record.clone());
        record
    }

    pub async fn latest(&self) -> Option<AnalysisRecord> {
        self.latest.read().await.clone()
    }

    /// Up to `limit` most recent analyses, oldest first
    pub async fn history(&self, limit: usize) -> Vec<AnalysisRecord> {
        let history = self.history.read().await;
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    pub fn add_favorite(&self, favorite: FavoriteListing) -> Result<(), FavoriteError> {
        let url = favorite.listing_url.trim().to_string();
        if url.is_empty() {
            return Err(FavoriteError::EmptyUrl);
        }
        if !has_usable_price(&favorite) {
            return Err(FavoriteError::InvalidPrice { url, price: favorite.price_per_night });
        }

        match self.favorites.entry(url.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => return Err(FavoriteError::AlreadyExists(url)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let favorite = FavoriteListing { listing_url: url.clone(), ..favorite };
                self.persist_favorite(&favorite);
                slot.insert(favorite);
            }
        }

        info!("⭐ Added favorite {}", url);
        Ok(())
    }

    pub fn remove_favorite(&self, listing_url: &str) -> Result<FavoriteListing, FavoriteError> {
        let (_, removed) = self
            .favorites
            .remove(listing_url.trim())
            .ok_or_else(|| FavoriteError::NotFound(listing_url.to_string()))?;

        if let Some(db) = &self.db {
            if let Err(e) = db.delete_favorite(&removed.listing_url) {
                warn!("Failed to delete favorite from database: {:#}", e);
            }
        }

        info!("Removed favorite {}", removed.listing_url);
        Ok(removed)
    }

    /// Favorites ordered by when they were added
    pub fn favorites(&self) -> Vec<FavoriteListing> {
        let mut favorites: Vec<FavoriteListing> = self.favorites.iter().map(|e| e.value().clone()).collect();
        favorites.sort_by(|a, b| a.added_at.cmp(&b.added_at).then_with(|| a.listing_url.cmp(&b.listing_url)));
        favorites
    }

    /// Replace every favorite. Entries with an empty URL or a negative or
    /// non-finite price are skipped, and a repeated URL keeps its last occurrence.
    pub fn sync_favorites(&self, favorites: Vec<FavoriteListing>) -> usize {
        self.favorites.clear();
        if let Some(db) = &self.db {
            if let Err(e) = db.clear_favorites() {
                warn!("Failed to clear favorites in database: {:#}", e);
            }
        }

        for favorite in favorites {
            let url = favorite.listing_url.trim().to_string();
            if url.is_empty() {
                warn!("Skipping favorite without URL: {}", favorite.title);
                continue;
            }
            if !has_usable_price(&favorite) {
                warn!("Skipping favorite {} with invalid price {}", url, favorite.price_per_night);
                continue;
            }
            let favorite = FavoriteListing { listing_url: url.clone(), ..favorite };
            self.persist_favorite(&favorite);
            self.favorites.insert(url, favorite);
        }

        info!("Synced {} favorites", self.favorites.len());
        self.favorites.len()
    }

    fn persist_favorite(&self, favorite: &FavoriteListing) {
        if let Some(db) = &self.db {
            if let Err(e) = db.upsert_favorite(favorite) {
                warn!("Failed to persist favorite: {:#}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use crate::analysis::types::{AnalysisRequest, MarketSource};
    use crate::strategies::competitive_pricing::calculate_price;

    fn record(adults: u32) -> AnalysisRecord {
        let request = AnalysisRequest::new("2026-01-09", "2026-01-11", adults, false, None).unwrap();
        AnalysisRecord {
            id: None,
            created_at: Utc::now(),
            nights: 2,
            request,
            market_source: MarketSource::Unavailable,
            pricing: calculate_price(&[], false, None).unwrap(),
            weather_adjustment: None,
            weather: vec![],
            competitors: vec![],
            total_found: 0,
            similar_count: 0,
            municipality: None,
        }
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let state = AppState::new(3);
        for adults in 1..=5 {
            state.record_analysis(record(adults)).await;
        }

        let history = state.history(10).await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].request.adults, 3);
        assert_eq!(history[2].request.adults, 5);
        assert_eq!(state.latest().await.unwrap().request.adults, 5);

        let last_two = state.history(2).await;
        assert_eq!(last_two[0].request.adults, 4);
    }

    #[test]
    fn test_favorite_rules() {
        let state = AppState::new(10);
        let fav = FavoriteListing::new("https://www.airbnb.com.br/rooms/1", "Casa", 300.0, true);

        state.add_favorite(fav.clone()).unwrap();
        assert_eq!(
            state.add_favorite(fav.clone()),
            Err(FavoriteError::AlreadyExists(fav.listing_url.clone()))
        );
        assert_eq!(
            state.add_favorite(FavoriteListing::new("  ", "Empty", 100.0, false)),
            Err(FavoriteError::EmptyUrl)
        );

        assert_eq!(
            state.add_favorite(FavoriteListing::new("https://www.airbnb.com.br/rooms/2", "Neg", -10.0, false)),
            Err(FavoriteError::InvalidPrice { url: "https://www.airbnb.com.br/rooms/2".into(), price: -10.0 })
        );
        assert!(matches!(
            state.add_favorite(FavoriteListing::new("https://www.airbnb.com.br/rooms/3", "NaN", f64::NAN, false)),
            Err(FavoriteError::InvalidPrice { .. })
        ));

        assert_eq!(state.favorites().len(), 1);
        assert!(state.remove_favorite(&fav.listing_url).is_ok());
        assert_eq!(
            state.remove_favorite(&fav.listing_url),
            Err(FavoriteError::NotFound(fav.listing_url.clone()))
        );
    }

    #[test]
    fn test_sync_replaces_favorites() {
        let state = AppState::new(10);
        state.add_favorite(FavoriteListing::new("old", "Old", 100.0, false)).unwrap();

        let mut first = FavoriteListing::new("a", "A", 100.0, false);
        first.added_at = Utc::now() - Duration::hours(1);
        let count = state.sync_favorites(vec![
            first,
            FavoriteListing::new("b", "B", 200.0, true),
            FavoriteListing::new("", "No url", 50.0, false),
            FavoriteListing::new("c", "Negative", -5.0, false),
            FavoriteListing::new("d", "Infinite", f64::INFINITY, false),
            FavoriteListing::new("b", "B again", 210.0, true),
        ]);

        assert_eq!(count, 2);
        let favorites = state.favorites();
        assert_eq!(favorites[0].listing_url, "a");
        assert_eq!(favorites[1].title, "B again");
    }

    #[tokio::test]
    async fn test_state_round_trips_through_database() {
        let db = Arc::new(AnalysisDatabase::new(":memory:").unwrap());
        {
            let state = AppState::with_database(5, db.clone()).unwrap();
            state.record_analysis(record(2)).await;
            let stored = state.record_analysis(record(4)).await;
            assert!(stored.id.is_some());
            state.add_favorite(FavoriteListing::new("u", "Fav", 150.0, false)).unwrap();
        }

        let restored = AppState::with_database(5, db).unwrap();
        assert_eq!(restored.history(10).await.len(), 2);
        assert_eq!(restored.latest().await.unwrap().request.adults, 4);
        assert_eq!(restored.favorites().len(), 1);
    }
}
