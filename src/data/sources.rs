use async_trait::async_trait;
use crate::data::types::{CompetitorListing, FetchOutcome, ListingPage, SearchParams, WeatherDay};
use crate::strategies::weather_adjustment::StayDates;

/// Upstream source of competitor listings.
/// Implementations log failures and report them as `FetchOutcome::Unavailable`.
#[async_trait]
pub trait CompetitorSource: Send + Sync {
    /// Competitor listings for the given stay
    async fn fetch_competitors(&self, params: &SearchParams) -> FetchOutcome<Vec<CompetitorListing>>;

    /// The host's own listing page
    async fn fetch_listing(&self, url: &str, stay: &StayDates) -> FetchOutcome<ListingPage>;

    fn source_name(&self) -> &'static str;
}

/// Upstream source of daily rain forecasts.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_weather(&self, municipality: Option<&str>) -> FetchOutcome<Vec<WeatherDay>>;
}
