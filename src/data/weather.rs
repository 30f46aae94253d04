use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use regex::Regex;
use reqwest::Client;
use scraper::Html;
use std::time::Duration;
use tracing::{debug, info, warn};
use crate::config::WeatherConfig;
use crate::data::cache::ForecastCache;
use crate::data::sources::WeatherSource;
use crate::data::types::{FetchOutcome, WeatherCondition, WeatherDay};

const BASE_URL: &str = "https://www.climatempo.com.br/previsao-do-tempo/15-dias/cidade";
const DEFAULT_CITY: &str = "3211/itacuruca-rj";
const FALLBACK_RAIN_PROBABILITY: u8 = 30;

/// Coastal towns with a known ClimaTempo city page, matched in order.
const CITY_PAGES: &[(&str, &str)] = &[
    ("itacuruçá", "3211/itacuruca-rj"),
    ("mangaratiba", "3212/mangaratiba-rj"),
    ("angra dos reis", "3213/angra-dos-reis-rj"),
    ("paraty", "3214/paraty-rj"),
    ("búzios", "3215/armacao-dos-buzios-rj"),
    ("cabo frio", "3216/cabo-frio-rj"),
    ("arraial do cabo", "3217/arraial-do-cabo-rj"),
    ("saquarema", "3218/saquarema-rj"),
    ("maricá", "3219/marica-rj"),
    ("niterói", "3220/niteroi-rj"),
    ("rio de janeiro", "3221/rio-de-janeiro-rj"),
];

/// 15-day forecast URL for a municipality: exact name, then partial match,
/// then the Itacuruçá page.
pub fn forecast_url(municipality: Option<&str>) -> String {
    let city = municipality
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .and_then(|m| {
            CITY_PAGES
                .iter()
                .find(|(name, _)| *name == m)
                .or_else(|| CITY_PAGES.iter().find(|(name, _)| m.contains(name) || name.contains(m.as_str())))
                .map(|(_, page)| *page)
        });

    if city.is_none() {
        if let Some(m) = municipality {
            warn!("No forecast page known for {}, using Itacuruçá", m);
        }
    }

    format!("{}/{}", BASE_URL, city.unwrap_or(DEFAULT_CITY))
}

/// Scrapes daily rain probabilities from ClimaTempo.
pub struct ClimateClient {
    client: Client,
    forecast_days: usize,
    cache: ForecastCache,
    rain_text: Regex,
    percentage: Regex,
    weather_words: Regex,
}

impl ClimateClient {
    pub fn new(config: &WeatherConfig, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            forecast_days: config.forecast_days,
            cache: ForecastCache::new(Duration::from_secs(config.cache_ttl_secs)),
            rain_text: Regex::new(r"(?i)\d+%.*chuva|chuva.*\d+%")?,
            percentage: Regex::new(r"(\d+)%")?,
            weather_words: Regex::new(r"(?i)chuva|sol|nublado|tempo")?,
        })
    }

    /// Daily forecasts starting at `today`. Every text node mentioning a rain
    /// percentage yields one day. A page that only talks about the weather
    /// yields `forecast_days` days of variable conditions. `None` when the
    /// page says nothing about the weather.
    pub fn parse_forecast(&self, html: &str, today: NaiveDate) -> Option<Vec<WeatherDay>> {
        let document = Html::parse_document(html);

        let days: Vec<WeatherDay> = document
            .root_element()
            .text()
            .filter(|text| self.rain_text.is_match(text))
            .filter_map(|text| self.percentage.captures(text))
            .filter_map(|cap| cap[1].parse::<u32>().ok())
            .take(self.forecast_days)
            .enumerate()
            .map(|(i, probability)| {
                WeatherDay::new(today + ChronoDuration::days(i as i64), probability.min(100) as u8)
            })
            .collect();

        if !days.is_empty() {
            return Some(days);
        }

        let mentions_weather = document
            .root_element()
            .text()
            .any(|text| self.weather_words.is_match(text));

        if !mentions_weather {
            return None;
        }

        debug!("No per-day rain figures, assuming variable conditions");
        Some(
            (0..self.forecast_days)
                .map(|i| WeatherDay {
                    date: today + ChronoDuration::days(i as i64),
                    rain_probability: FALLBACK_RAIN_PROBABILITY,
                    condition: WeatherCondition::Variable,
                })
                .collect(),
        )
    }

    async fn download(&self, url: &str) -> Result<String> {
        let response = self.client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("{} returned status {}", url, response.status());
        }

        response.text().await.context("Failed to read forecast page")
    }
}

#[async_trait]
impl WeatherSource for ClimateClient {
    async fn fetch_weather(&self, municipality: Option<&str>) -> FetchOutcome<Vec<WeatherDay>> {
        let url = forecast_url(municipality);

        if let Some(days) = self.cache.get(&url) {
            debug!("Forecast cache hit for {}", url);
            return FetchOutcome::Available(days);
        }

        info!("🌤️ Fetching forecast for {}", municipality.unwrap_or("Itacuruçá"));

        let html = match self.download(&url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Weather fetch failed: {:#}", e);
                return FetchOutcome::Unavailable(format!("{:#}", e));
            }
        };

        match self.parse_forecast(&html, Local::now().date_naive()) {
            Some(days) => {
                info!("Forecast has {} days", days.len());
                self.cache.insert(url, days.clone());
                FetchOutcome::Available(days)
            }
            None => {
                warn!("Forecast page for {} has no weather information", url);
                FetchOutcome::Unavailable("no weather information on forecast page".to_string())
            }
        }
    }
}
