use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use crate::data::types::{CompetitorListing, WeatherDay};
use crate::strategies::types::{PricingSuggestion, WeatherAdjustment};
use crate::strategies::weather_adjustment::{StayDates, StayValidationError};

/// One pricing run requested by the host or the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub stay: StayDates,
    pub adults: u32,
    pub my_listing_is_beachfront: bool,
    pub listing_url: Option<String>,
    pub auto_generated: bool,
}

impl AnalysisRequest {
    pub fn new(
        checkin: &str,
        checkout: &str,
        adults: u32,
        my_listing_is_beachfront: bool,
        listing_url: Option<String>,
    ) -> Result<Self, StayValidationError> {
        Ok(Self::for_stay(
            StayDates::parse(checkin, checkout)?,
            adults,
            my_listing_is_beachfront,
            listing_url,
        ))
    }

    pub fn for_stay(
        stay: StayDates,
        adults: u32,
        my_listing_is_beachfront: bool,
        listing_url: Option<String>,
    ) -> Self {
        Self {
            stay,
            adults,
            my_listing_is_beachfront,
            listing_url: listing_url.filter(|url| !url.trim().is_empty()),
            auto_generated: false,
        }
    }

    /// Mark as started by the monitor rather than the host
    pub fn auto_generated(mut self) -> Self {
        self.auto_generated = true;
        self
    }
}

/// Where the competitor pool of a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketSource {
    Scraped,
    Simulated,
    Unavailable,
}

impl MarketSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketSource::Scraped => "scraped",
            MarketSource::Simulated => "simulated",
            MarketSource::Unavailable => "unavailable",
        }
    }
}

/// Everything one run produced, handed to the record sink as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub request: AnalysisRequest,
    pub nights: i64,
    pub market_source: MarketSource,
    pub pricing: PricingSuggestion,
    /// Reported next to `pricing.suggested_price`, never folded into it
    pub weather_adjustment: Option<WeatherAdjustment>,
    pub weather: Vec<WeatherDay>,
    pub competitors: Vec<CompetitorListing>,
    pub total_found: usize,
    pub similar_count: usize,
    pub municipality: Option<String>,
}

/// A competitor the host pinned as a reference, keyed by listing URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteListing {
    pub listing_url: String,
    pub title: String,
    pub price_per_night: f64,
    pub is_beachfront: bool,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

impl FavoriteListing {
    pub fn new(listing_url: impl Into<String>, title: impl Into<String>, price_per_night: f64, is_beachfront: bool) -> Self {
        Self {
            listing_url: listing_url.into(),
            title: title.into(),
            price_per_night,
            is_beachfront,
            location: String::new(),
            image_url: String::new(),
            added_at: Utc::now(),
        }
    }

    pub fn from_competitor(listing: &CompetitorListing) -> Self {
        Self {
            listing_url: listing.listing_url.clone(),
            title: listing.title.clone(),
            price_per_night: listing.price_per_night,
            is_beachfront: listing.is_beachfront,
            location: String::new(),
            image_url: listing.image_url.clone(),
            added_at: Utc::now(),
        }
    }

    pub fn to_competitor(&self) -> CompetitorListing {
        let mut listing = CompetitorListing::new(self.title.clone(), self.price_per_night, self.is_beachfront);
        listing.is_favorite = true;
        listing.listing_url = self.listing_url.clone();
        listing.image_url = self.image_url.clone();
        listing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodKind {
    Weekend,
    Weekday,
}

/// A candidate stay to price ahead of time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayPeriod {
    pub kind: PeriodKind,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub label: String,
    /// 1 is highest
    pub priority: u8,
}

impl StayPeriod {
    pub fn stay(&self) -> Result<StayDates, StayValidationError> {
        StayDates::new(self.checkin, self.checkout)
    }
}
