use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub system: SystemConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    pub database_path: String,
    #[serde(default)]
    pub csv_logging: bool,
    #[serde(default = "default_csv_log_path")]
    pub csv_log_path: String,
}

/// The host's own listing
#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_true")]
    pub is_beachfront: bool,
    #[serde(default = "default_adults")]
    pub adults: u32,
    #[serde(default = "default_municipality")]
    pub default_municipality: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    #[serde(default = "default_search_url")]
    pub search_url: String,
    #[serde(default = "default_site_root")]
    pub site_root: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_listings")]
    pub max_listings_per_search: usize,
    #[serde(default = "default_min_price")]
    pub min_price: f64,
    #[serde(default = "default_max_price")]
    pub max_price: f64,
    #[serde(default = "default_pause_ms")]
    pub pause_between_searches_ms: u64,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default)]
    pub simulate_on_unavailable: bool,
    #[serde(default = "default_searches")]
    pub searches: Vec<SearchConfig>,
}

/// One search round against the listing site
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub name: String,
    /// Overrides `ScraperConfig::search_url`
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub price_min: Option<u32>,
    #[serde(default)]
    pub price_max: Option<u32>,
    #[serde(default)]
    pub room_types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_forecast_days")]
    pub forecast_days: usize,
    #[serde(default = "default_weather_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReportConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub recipient: Option<String>,
}

fn default_true() -> bool { true }
fn default_adults() -> u32 { 2 }
fn default_municipality() -> String { "Itacuruçá".to_string() }
fn default_csv_log_path() -> String { "analyses.csv".to_string() }
fn default_search_url() -> String {
    "https://www.airbnb.com.br/s/Itacuru%C3%A7%C3%A1--Mangaratiba/homes".to_string()
}
fn default_site_root() -> String { "https://www.airbnb.com.br".to_string() }
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}
fn default_timeout_secs() -> u64 { 30 }
fn default_max_listings() -> usize { 20 }
fn default_min_price() -> f64 { 50.0 }
fn default_max_price() -> f64 { 2000.0 }
fn default_pause_ms() -> u64 { 2000 }
fn default_similarity_threshold() -> f64 { 40.0 }
fn default_forecast_days() -> usize { 7 }
fn default_weather_ttl() -> u64 { 1800 }
fn default_interval_secs() -> u64 { 12 * 3600 }
fn default_history_limit() -> usize { 50 }

fn default_searches() -> Vec<SearchConfig> {
    let itacuruca = Some("ChIJBZOnamAOnAARLKakGipY0SI".to_string());
    vec![
        SearchConfig {
            name: "Main search - Itacuruçá".to_string(),
            url: None,
            place_id: itacuruca.clone(),
            price_min: None,
            price_max: None,
            room_types: vec![],
        },
        SearchConfig {
            name: "Mangaratiba".to_string(),
            url: Some("https://www.airbnb.com.br/s/Mangaratiba--Estado-do-Rio-de-Janeiro--Brasil/homes".to_string()),
            place_id: None,
            price_min: None,
            price_max: None,
            room_types: vec![],
        },
        SearchConfig {
            name: "Price band".to_string(),
            url: None,
            place_id: itacuruca.clone(),
            price_min: Some(100),
            price_max: Some(1500),
            room_types: vec![],
        },
        SearchConfig {
            name: "Entire homes".to_string(),
            url: None,
            place_id: itacuruca,
            price_min: Some(300),
            price_max: Some(1500),
            room_types: vec!["Entire home/apt".to_string()],
        },
    ]
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            url: None,
            is_beachfront: default_true(),
            adults: default_adults(),
            default_municipality: default_municipality(),
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            site_root: default_site_root(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_timeout_secs(),
            max_listings_per_search: default_max_listings(),
            min_price: default_min_price(),
            max_price: default_max_price(),
            pause_between_searches_ms: default_pause_ms(),
            similarity_threshold: default_similarity_threshold(),
            simulate_on_unavailable: false,
            searches: default_searches(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            forecast_days: default_forecast_days(),
            cache_ttl_secs: default_weather_ttl(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_interval_secs(),
            history_limit: default_history_limit(),
        }
    }
}

/// Secrets and deployment settings read from the environment
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }
}

impl EnvConfig {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            smtp_host: std::env::var("SMTP_HOST")
                .unwrap_or_else(|_| "smtp.gmail.com".to_string()),
            smtp_port: std::env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .context("SMTP_PORT must be a port number")?,
            smtp_username: std::env::var("SMTP_USERNAME").ok().filter(|v| !v.is_empty()),
            smtp_password: std::env::var("SMTP_PASSWORD").ok().filter(|v| !v.is_empty()),
            smtp_from: std::env::var("SMTP_FROM").ok().filter(|v| !v.is_empty()),
        })
    }

    pub fn smtp_configured(&self) -> bool {
        self.smtp_username.is_some() && self.smtp_password.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [system]
            database_path = "hostlink.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.system.database_path, "hostlink.db");
        assert!(!config.system.csv_logging);
        assert!(config.listing.is_beachfront);
        assert_eq!(config.listing.adults, 2);
        assert_eq!(config.scraper.max_listings_per_search, 20);
        assert_eq!(config.scraper.searches.len(), 4);
        assert_eq!(config.weather.forecast_days, 7);
        assert_eq!(config.monitoring.interval_secs, 43_200);
        assert_eq!(config.monitoring.history_limit, 50);
        assert!(!config.report.enabled);
    }

    #[test]
    fn test_custom_searches() {
        let config = Config::from_toml(
            r#"
            [system]
            database_path = ":memory:"

            [listing]
            url = "https://www.airbnb.com.br/rooms/42"
            is_beachfront = false

            [[scraper.searches]]
            name = "Paraty"
            url = "https://www.airbnb.com.br/s/Paraty/homes"
            price_max = 900

            [monitoring]
            enabled = true
            interval_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.listing.url.as_deref(), Some("https://www.airbnb.com.br/rooms/42"));
        assert!(!config.listing.is_beachfront);
        assert_eq!(config.scraper.searches.len(), 1);
        assert_eq!(config.scraper.searches[0].price_max, Some(900));
        assert!(config.scraper.searches[0].room_types.is_empty());
        assert!(config.monitoring.enabled);
        assert_eq!(config.monitoring.interval_secs, 60);
    }

    #[test]
    fn test_missing_system_section_fails() {
        assert!(Config::from_toml("[listing]\nadults = 3\n").is_err());
    }
}
