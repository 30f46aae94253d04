use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A competitor listing scraped from a search page (or built from a favorite).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorListing {
    pub title: String,
    pub price_per_night: f64,
    /// 0.0 means the rating is unknown, not zero stars
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub is_beachfront: bool,
    /// Heuristic 0-100 score from keyword and image-tag matching
    #[serde(default)]
    pub beachfront_confidence: f64,
    #[serde(default)]
    pub beach_evidence: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub listing_url: String,
    #[serde(default)]
    pub image_url: String,
}

impl CompetitorListing {
    pub fn new(title: impl Into<String>, price_per_night: f64, is_beachfront: bool) -> Self {
        Self {
            title: title.into(),
            price_per_night,
            rating: 0.0,
            review_count: 0,
            is_beachfront,
            beachfront_confidence: 0.0,
            beach_evidence: Vec::new(),
            is_favorite: false,
            listing_url: String::new(),
            image_url: String::new(),
        }
    }

    pub fn has_valid_price(&self) -> bool {
        self.price_per_night > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherCondition {
    Sunny,
    PartlyCloudy,
    Rainy,
    Variable,
}

impl WeatherCondition {
    pub fn from_rain_probability(rain_probability: u8) -> Self {
        if rain_probability > 60 {
            WeatherCondition::Rainy
        } else if rain_probability > 30 {
            WeatherCondition::PartlyCloudy
        } else {
            WeatherCondition::Sunny
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WeatherCondition::Sunny => "Sunny",
            WeatherCondition::PartlyCloudy => "Partly cloudy",
            WeatherCondition::Rainy => "Rainy",
            WeatherCondition::Variable => "Variable conditions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherDay {
    pub date: NaiveDate,
    pub rain_probability: u8,
    pub condition: WeatherCondition,
}

impl WeatherDay {
    pub fn new(date: NaiveDate, rain_probability: u8) -> Self {
        let rain_probability = rain_probability.min(100);
        Self {
            date,
            rain_probability,
            condition: WeatherCondition::from_rain_probability(rain_probability),
        }
    }
}

/// The host's own listing page, scraped for reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingPage {
    pub listing: CompetitorListing,
    pub municipality: Option<String>,
    pub price_found: bool,
}

/// Result of a best-effort fetch. `Unavailable` means the fetch failed,
/// as opposed to `Available` with an empty payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Available(T),
    Unavailable(String),
}

/// Parameters for one competitor search round.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub adults: u32,
}
