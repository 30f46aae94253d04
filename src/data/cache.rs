use dashmap::DashMap;
use std::time::{Duration, Instant};
use crate::data::types::WeatherDay;

/// Short-lived forecast cache keyed by forecast page URL.
pub struct ForecastCache {
    cache: DashMap<String, CachedForecast>,
    ttl: Duration,
}

struct CachedForecast {
    days: Vec<WeatherDay>,
    timestamp: Instant,
}

impl ForecastCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: DashMap::new(),
            ttl,
        }
    }

    pub fn insert(&self, key: String, days: Vec<WeatherDay>) {
        self.cache.insert(key, CachedForecast {
            days,
            timestamp: Instant::now(),
        });
    }

    /// Get forecast if not expired (evict on read)
    pub fn get(&self, key: &str) -> Option<Vec<WeatherDay>> {
        let entry = self.cache.get(key)?;
        if entry.timestamp.elapsed() > self.ttl {
            drop(entry); // release the shard read lock before removing
            self.cache.remove(key);
            None
        } else {
            Some(entry.days.clone())
        }
    }
}
