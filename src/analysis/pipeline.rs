use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use crate::analysis::types::{AnalysisRecord, AnalysisRequest, FavoriteListing, MarketSource};
use crate::config::Config;
use crate::data::simulated::simulated_market_data;
use crate::data::sources::{CompetitorSource, WeatherSource};
use crate::data::types::{CompetitorListing, FetchOutcome, SearchParams};
use crate::strategies::competitive_pricing::calculate_price;
use crate::strategies::similarity::filter_similar;
use crate::strategies::weather_adjustment::weekend_weather_adjustment;

/// Fetch → similarity → pricing → weather adjustment.
pub struct PricingPipeline {
    competitors: Arc<dyn CompetitorSource>,
    weather: Arc<dyn WeatherSource>,
    similarity_threshold: f64,
    simulate_on_unavailable: bool,
    default_municipality: String,
}

impl PricingPipeline {
    pub fn new(competitors: Arc<dyn CompetitorSource>, weather: Arc<dyn WeatherSource>, config: &Config) -> Self {
        Self {
            competitors,
            weather,
            similarity_threshold: config.scraper.similarity_threshold,
            simulate_on_unavailable: config.scraper.simulate_on_unavailable,
            default_municipality: config.listing.default_municipality.clone(),
        }
    }

    async fn market(&self, request: &AnalysisRequest) -> (Vec<CompetitorListing>, MarketSource) {
        let params = SearchParams {
            checkin: request.stay.checkin,
            checkout: request.stay.checkout,
            adults: request.adults,
        };

        match self.competitors.fetch_competitors(&params).await {
            FetchOutcome::Available(listings) => (listings, MarketSource::Scraped),
            FetchOutcome::Unavailable(reason) if self.simulate_on_unavailable => {
                warn!("{} unavailable ({}), using simulated market data", self.competitors.source_name(), reason);
                let listings = simulated_market_data(&mut rand::thread_rng(), &request.stay);
                (listings, MarketSource::Simulated)
            }
            FetchOutcome::Unavailable(reason) => {
                warn!("{} unavailable ({}), pricing without market data", self.competitors.source_name(), reason);
                (Vec::new(), MarketSource::Unavailable)
            }
        }
    }

    pub async fn run(&self, request: &AnalysisRequest, favorites: &[FavoriteListing]) -> Result<AnalysisRecord> {
        info!(
            "🏖️ Analyzing stay {} → {} ({} nights, {} adults)",
            request.stay.checkin,
            request.stay.checkout,
            request.stay.nights(),
            request.adults
        );

        let reference = match &request.listing_url {
            Some(url) => match self.competitors.fetch_listing(url, &request.stay).await {
                FetchOutcome::Available(page) => Some(page),
                FetchOutcome::Unavailable(reason) => {
                    warn!("Own listing unavailable, continuing without it: {}", reason);
                    None
                }
            },
            None => None,
        };

        let (market, market_source) = self.market(request).await;
        let total_found = market.len();
        let market: Vec<CompetitorListing> = market
            .into_iter()
            .filter(|c| {
                let usable = c.price_per_night.is_finite() && c.price_per_night >= 0.0;
                if !usable {
                    warn!("Dropping competitor '{}' with invalid price {}", c.title, c.price_per_night);
                }
                usable
            })
            .collect();

        let competitors = match &reference {
            Some(page) if !market.is_empty() => {
                filter_similar(&page.listing, &market, self.similarity_threshold)
            }
            _ => market,
        };
        let similar_count = competitors.len();

        let favorites: Vec<CompetitorListing> = favorites
            .iter()
            .filter(|f| {
                let usable = f.price_per_night.is_finite() && f.price_per_night > 0.0;
                if !usable {
                    warn!("Ignoring favorite {} without a usable price ({})", f.listing_url, f.price_per_night);
                }
                usable
            })
            .map(FavoriteListing::to_competitor)
            .collect();
        let pricing = calculate_price(&competitors, request.my_listing_is_beachfront, Some(&favorites))?;

        let municipality = reference
            .as_ref()
            .and_then(|page| page.municipality.clone())
            .unwrap_or_else(|| self.default_municipality.clone());

        let (weather, weather_adjustment) = match self.weather.fetch_weather(Some(&municipality)).await {
            FetchOutcome::Available(days) => {
                let adjustment = weekend_weather_adjustment(pricing.suggested_price, &days, &request.stay);
                info!(
                    "🌦️ Weekend/weather adjusted price R${:.2} (×{:.2}, {})",
                    adjustment.adjusted_price,
                    adjustment.multiplier,
                    adjustment.factor.label()
                );
                (days, Some(adjustment))
            }
            FetchOutcome::Unavailable(reason) => {
                warn!("Weather unavailable, no adjustment: {}", reason);
                (Vec::new(), None)
            }
        };

        Ok(AnalysisRecord {
            id: None,
            created_at: Utc::now(),
            request: request.clone(),
            nights: request.stay.nights(),
            market_source,
            pricing,
            weather_adjustment,
            weather,
            competitors,
            total_found,
            similar_count,
            municipality: Some(municipality),
        })
    }
}

#[cfg(test)]
pub mod testing {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use crate::config::Config;
    use crate::data::sources::{CompetitorSource, WeatherSource};
    use crate::data::types::{CompetitorListing, FetchOutcome, ListingPage, SearchParams, WeatherDay};
    use crate::strategies::weather_adjustment::StayDates;
    use super::PricingPipeline;

    pub struct StubCompetitors {
        pub market: FetchOutcome<Vec<CompetitorListing>>,
        pub listing: FetchOutcome<ListingPage>,
        pub delay: Duration,
        pub calls: AtomicUsize,
    }

    impl StubCompetitors {
        pub fn new(market: FetchOutcome<Vec<CompetitorListing>>) -> Self {
            Self {
                market,
                listing: FetchOutcome::Unavailable("no listing".into()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CompetitorSource for StubCompetitors {
        async fn fetch_competitors(&self, _params: &SearchParams) -> FetchOutcome<Vec<CompetitorListing>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.market.clone()
        }

        async fn fetch_listing(&self, _url: &str, _stay: &StayDates) -> FetchOutcome<ListingPage> {
            self.listing.clone()
        }

        fn source_name(&self) -> &'static str {
            "stub"
        }
    }

    pub struct StubWeather(pub FetchOutcome<Vec<WeatherDay>>);

    #[async_trait]
    impl WeatherSource for StubWeather {
        async fn fetch_weather(&self, _municipality: Option<&str>) -> FetchOutcome<Vec<WeatherDay>> {
            self.0.clone()
        }
    }

    pub fn test_config() -> Config {
        Config::from_toml("[system]\ndatabase_path = \":memory:\"\n").unwrap()
    }

    pub fn pipeline(competitors: Arc<StubCompetitors>, weather: FetchOutcome<Vec<WeatherDay>>) -> PricingPipeline {
        PricingPipeline::new(competitors, Arc::new(StubWeather(weather)), &test_config())
    }
}
