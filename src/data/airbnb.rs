use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};
use crate::config::{ScraperConfig, SearchConfig};
use crate::data::extract::{beachfront_signal, ListingExtractor};
use crate::data::sources::CompetitorSource;
use crate::data::types::{CompetitorListing, FetchOutcome, ListingPage, SearchParams};
use crate::strategies::weather_adjustment::StayDates;

const MAX_TITLE_CHARS: usize = 100;
const MAX_EVIDENCE: usize = 3;

/// Scrapes Airbnb search-result and listing pages.
pub struct AirbnbClient {
    client: Client,
    config: ScraperConfig,
    extractor: ListingExtractor,
    selectors: PageSelectors,
}

struct PageSelectors {
    /// Tried in order, the first one that matches anything wins
    containers: Vec<Selector>,
    links: Vec<Selector>,
    images: Selector,
    heading: Selector,
    title: Selector,
    location: Selector,
    meta_og_title: Selector,
    meta_description: Selector,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {}: {:?}", css, e))
}

impl PageSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            containers: vec![
                selector(
                    r#"div[class*="listing"], div[class*="card"], div[class*="property"], article[class*="listing"], article[class*="card"], article[class*="property"]"#,
                )?,
                selector(r#"div[data-testid*="listing"], div[data-testid*="card"]"#)?,
                selector(r#"div[itemprop="itemListElement"]"#)?,
                selector("div.c1yo0219")?,
                selector("a[aria-label]")?,
            ],
            links: vec![
                selector(r#"a[href*="/rooms/"]"#)?,
                selector(r#"a[data-testid="listing-link"]"#)?,
                selector(r#"a[href*="/plus/"]"#)?,
                selector(r#"a[href*="/luxury/"]"#)?,
            ],
            images: selector("img")?,
            heading: selector("h1")?,
            title: selector("title")?,
            location: selector(r#"[data-testid="listing-location"]"#)?,
            meta_og_title: selector(r#"meta[property="og:title"]"#)?,
            meta_description: selector(r#"meta[name="description"]"#)?,
        })
    }
}

impl AirbnbClient {
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            config,
            extractor: ListingExtractor::new()?,
            selectors: PageSelectors::new()?,
        })
    }

    async fn get_html(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let response = self.client
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("{} returned status {}", url, response.status());
        }

        let html = response.text().await.context("Failed to read response body")?;
        debug!("Downloaded {} bytes from {}", html.len(), url);
        Ok(html)
    }

    fn search_query(search: &SearchConfig, params: &SearchParams) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("refinement_paths[]", "/homes".to_string()),
            ("date_picker_type", "calendar".to_string()),
            ("checkin", params.checkin.format("%Y-%m-%d").to_string()),
            ("checkout", params.checkout.format("%Y-%m-%d").to_string()),
            ("adults", params.adults.to_string()),
            ("guests", params.adults.to_string()),
            ("search_type", "AUTOSUGGEST".to_string()),
        ];

        if let Some(place_id) = &search.place_id {
            query.push(("place_id", place_id.clone()));
        }
        if let Some(min) = search.price_min {
            query.push(("price_min", min.to_string()));
        }
        if let Some(max) = search.price_max {
            query.push(("price_max", max.to_string()));
        }
        for room_type in &search.room_types {
            query.push(("room_types[]", room_type.clone()));
        }

        query
    }

    /// Parse one search-results page. `None` when no listing container
    /// matched at all, which usually means the markup changed.
    pub fn parse_search_results(&self, html: &str, search_name: &str) -> Option<Vec<CompetitorListing>> {
        let document = Html::parse_document(html);

        let containers: Vec<ElementRef> = self.selectors.containers
            .iter()
            .map(|sel| document.select(sel).collect::<Vec<_>>())
            .find(|found| !found.is_empty())?;

        debug!("{} - {} listing containers", search_name, containers.len());

        let mut listings: Vec<CompetitorListing> = Vec::new();

        for (i, container) in containers.iter().take(self.config.max_listings_per_search).enumerate() {
            let Some(listing) = self.parse_container(container) else {
                debug!("{} - container {} has no price, skipping", search_name, i + 1);
                continue;
            };

            if listings.iter().any(|l| is_same_listing(l, &listing)) {
                debug!("{} - duplicate skipped: {}", search_name, listing.title);
                continue;
            }

            debug!(
                "{} - {} @ R${:.2} (beachfront={}, confidence={:.0})",
                search_name, listing.title, listing.price_per_night,
                listing.is_beachfront, listing.beachfront_confidence
            );
            listings.push(listing);
        }

        Some(listings)
    }

    fn parse_container(&self, container: &ElementRef) -> Option<CompetitorListing> {
        let text = container.text().collect::<Vec<_>>().join(" ");

        let price = self.extractor.search_card_price(&text, self.config.min_price, self.config.max_price)?;

        let title = container
            .text()
            .map(str::trim)
            .find(|t| t.chars().any(char::is_alphanumeric))
            .map(|t| t.chars().take(MAX_TITLE_CHARS).collect::<String>())
            .unwrap_or_else(|| "Untitled listing".to_string());

        let images: Vec<(String, String)> = container
            .select(&self.selectors.images)
            .map(|img| {
                let src = img.value().attr("src").unwrap_or_default().to_string();
                let alt = img.value().attr("alt").unwrap_or_default().to_string();
                (src, alt)
            })
            .collect();

        let beach = beachfront_signal(&text, &images);
        let (rating, review_count) = self.extractor.rating(&text);

        Some(CompetitorListing {
            title,
            price_per_night: price,
            rating,
            review_count,
            is_beachfront: beach.is_beachfront,
            beachfront_confidence: beach.confidence,
            beach_evidence: beach.evidence.into_iter().take(MAX_EVIDENCE).collect(),
            is_favorite: false,
            listing_url: self.listing_url(container).unwrap_or_default(),
            image_url: self.image_url(container).unwrap_or_default(),
        })
    }

    fn listing_url(&self, container: &ElementRef) -> Option<String> {
        let is_listing_href = |href: &str| {
            href.contains("/rooms/") || href.contains("/plus/") || href.contains("/luxury/")
        };

        // The container itself may be the anchor
        let own_href = container.value().attr("href").filter(|h| is_listing_href(h));

        let href = own_href.map(str::to_string).or_else(|| {
            self.selectors.links.iter().find_map(|sel| {
                container
                    .select(sel)
                    .filter_map(|a| a.value().attr("href"))
                    .find(|h| is_listing_href(h))
                    .map(str::to_string)
            })
        });

        match href {
            Some(href) if href.starts_with('/') => Some(format!("{}{}", self.config.site_root, href)),
            Some(href) if href.starts_with("http") => Some(href),
            _ => self.extractor
                .room_path(&container.html())
                .map(|path| format!("{}{}", self.config.site_root, path)),
        }
    }

    fn image_url(&self, container: &ElementRef) -> Option<String> {
        let from_cdn = |src: &str| src.contains("pictures") || src.contains("airbnb") || src.contains("muscache");

        container.select(&self.selectors.images).find_map(|img| {
            let attrs = img.value();
            let src = ["src", "data-src", "data-original", "data-lazy-src", "data-srcset"]
                .iter()
                .find_map(|name| attrs.attr(name))
                .or_else(|| {
                    attrs
                        .attr("srcset")
                        .and_then(|srcset| srcset.split(',').next())
                        .and_then(|first| first.split_whitespace().next())
                })?
                .trim();

            if src.starts_with("http") && from_cdn(src) {
                Some(src.to_string())
            } else if src.starts_with("//") && from_cdn(src) {
                Some(format!("https:{}", src))
            } else if src.starts_with('/') && src.contains("pictures") {
                Some(format!("https://a0.muscache.com{}", src))
            } else {
                None
            }
        })
    }

    /// Parse the host's own listing page.
    pub fn parse_listing_page(&self, html: &str, url: &str, nights: i64) -> ListingPage {
        let document = Html::parse_document(html);
        let page_text = document.root_element().text().collect::<Vec<_>>().join(" ");

        let element_text = |sel: &Selector| {
            document
                .select(sel)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty())
        };
        let meta_content = |sel: &Selector| {
            document
                .select(sel)
                .next()
                .and_then(|el| el.value().attr("content"))
                .map(str::to_string)
        };

        let heading = element_text(&self.selectors.heading);
        let page_title = element_text(&self.selectors.title);

        let title = heading
            .clone()
            .or_else(|| page_title.clone())
            .map(|t| t.chars().take(MAX_TITLE_CHARS).collect())
            .unwrap_or_else(|| "My listing".to_string());

        let snippets: Vec<String> = [
            element_text(&self.selectors.location),
            heading,
            page_title,
            meta_content(&self.selectors.meta_og_title),
            meta_content(&self.selectors.meta_description),
            Some(page_text.clone()),
        ]
        .into_iter()
        .flatten()
        .collect();
        let municipality = self.extractor.municipality(snippets.iter().map(String::as_str));

        let price = self.extractor.stay_price(&page_text, nights);
        let (rating, review_count) = self.extractor.rating(&page_text);

        let images: Vec<(String, String)> = document
            .select(&self.selectors.images)
            .map(|img| {
                let src = img.value().attr("src").unwrap_or_default().to_string();
                let alt = img.value().attr("alt").unwrap_or_default().to_string();
                (src, alt)
            })
            .collect();
        let beach = beachfront_signal(&page_text, &images);

        ListingPage {
            listing: CompetitorListing {
                title,
                price_per_night: price.unwrap_or(0.0),
                rating,
                review_count,
                is_beachfront: beach.is_beachfront,
                beachfront_confidence: beach.confidence,
                beach_evidence: beach.evidence.into_iter().take(MAX_EVIDENCE).collect(),
                is_favorite: false,
                listing_url: url.to_string(),
                image_url: document
                    .root_element()
                    .select(&self.selectors.images)
                    .find_map(|img| img.value().attr("src"))
                    .filter(|src| src.starts_with("http"))
                    .unwrap_or_default()
                    .to_string(),
            },
            municipality,
            price_found: price.is_some(),
        }
    }
}

fn is_same_listing(a: &CompetitorListing, b: &CompetitorListing) -> bool {
    a.title == b.title && a.price_per_night == b.price_per_night
}

/// Merge listings into `into`, skipping `(title, price)` duplicates.
pub fn merge_unique(into: &mut Vec<CompetitorListing>, listings: Vec<CompetitorListing>) {
    for listing in listings {
        if !into.iter().any(|existing| is_same_listing(existing, &listing)) {
            into.push(listing);
        }
    }
}

#[async_trait]
impl CompetitorSource for AirbnbClient {
    async fn fetch_competitors(&self, params: &SearchParams) -> FetchOutcome<Vec<CompetitorListing>> {
        if self.config.searches.is_empty() {
            return FetchOutcome::Unavailable("no searches configured".to_string());
        }

        let mut all_listings = Vec::new();
        let mut failures = Vec::new();

        for (i, search) in self.config.searches.iter().enumerate() {
            if i > 0 && self.config.pause_between_searches_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.pause_between_searches_ms)).await;
            }

            let url = search.url.as_deref().unwrap_or(&self.config.search_url);
            info!("🔍 Running search '{}' ({} → {}, {} adults)", search.name, params.checkin, params.checkout, params.adults);

            let html = match self.get_html(url, &Self::search_query(search, params)).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Search '{}' failed: {:#}", search.name, e);
                    failures.push(format!("{}: {:#}", search.name, e));
                    continue;
                }
            };

            match self.parse_search_results(&html, &search.name) {
                Some(listings) => {
                    info!("Search '{}' found {} priced listings", search.name, listings.len());
                    merge_unique(&mut all_listings, listings);
                }
                None => {
                    warn!("Search '{}' returned no listing containers", search.name);
                    failures.push(format!("{}: no listing containers", search.name));
                }
            }
        }

        if failures.len() == self.config.searches.len() {
            return FetchOutcome::Unavailable(failures.join("; "));
        }

        info!("📊 {} unique competitor listings collected", all_listings.len());
        FetchOutcome::Available(all_listings)
    }

    async fn fetch_listing(&self, url: &str, stay: &StayDates) -> FetchOutcome<ListingPage> {
        info!("Analyzing listing page: {}", url);

        match self.get_html(url, &[]).await {
            Ok(html) => {
                let page = self.parse_listing_page(&html, url, stay.nights());
                if !page.price_found {
                    warn!("No nightly price found on listing page {}", url);
                }
                FetchOutcome::Available(page)
            }
            Err(e) => {
                warn!("Failed to fetch listing page: {:#}", e);
                FetchOutcome::Unavailable(format!("{:#}", e))
            }
        }
    }

    fn source_name(&self) -> &'static str {
        "Airbnb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_PAGE: &str = r#"
        <html><body>
          <div class="listing-card">
            <span>Casa pé na areia em Itacuruçá</span>
            <a href="/rooms/111?adults=2">ver</a>
            <img src="https://a0.muscache.com/im/pictures/beach-house.jpg" alt="praia">
            <span>R$ 450 por noite</span>
            <span>4,92 (87 avaliações)</span>
          </div>
          <div class="listing-card">
            <span>Apartamento centro</span>
            <a href="https://www.airbnb.com.br/rooms/222">ver</a>
            <span>R$ 280 noite</span>
          </div>
          <div class="listing-card">
            <span>Apartamento centro</span>
            <span>R$ 280 noite</span>
          </div>
          <div class="listing-card">
            <span>Sem preço</span>
          </div>
        </body></html>
    "#;

    fn client() -> AirbnbClient {
        AirbnbClient::new(ScraperConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_search_results() {
        let listings = client().parse_search_results(SEARCH_PAGE, "test").unwrap();

        // duplicate and priceless cards are dropped
        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first.title, "Casa pé na areia em Itacuruçá");
        assert_eq!(first.price_per_night, 450.0);
        assert_eq!(first.rating, 4.92);
        assert_eq!(first.review_count, 87);
        assert_eq!(first.listing_url, "https://www.airbnb.com.br/rooms/111?adults=2");
        assert_eq!(first.image_url, "https://a0.muscache.com/im/pictures/beach-house.jpg");
        assert!(first.beachfront_confidence > 0.0);
        assert!(first.beach_evidence.len() <= MAX_EVIDENCE);

        let second = &listings[1];
        assert_eq!(second.price_per_night, 280.0);
        assert_eq!(second.listing_url, "https://www.airbnb.com.br/rooms/222");
        assert_eq!(second.rating, 0.0);
    }

    #[test]
    fn test_parse_search_results_without_containers() {
        let html = "<html><body><p>Access denied</p></body></html>";
        assert!(client().parse_search_results(html, "blocked").is_none());
    }

    #[test]
    fn test_parse_listing_page() {
        let html = r#"
            <html><head><title>Casa frente ao mar - Airbnb</title></head>
            <body>
              <h1>Casa frente ao mar com vista para o mar</h1>
              <span data-testid="listing-location">Itacuruçá, Rio de Janeiro, Brasil</span>
              <div>R$ 1.200,00 por 2 noites</div>
              <div>4,95 (40 avaliações)</div>
            </body></html>
        "#;

        let page = client().parse_listing_page(html, "https://www.airbnb.com.br/rooms/42", 2);

        assert!(page.price_found);
        assert_eq!(page.listing.price_per_night, 600.0);
        assert_eq!(page.listing.title, "Casa frente ao mar com vista para o mar");
        assert_eq!(page.municipality.as_deref(), Some("Itacuruçá"));
        assert_eq!(page.listing.rating, 4.95);
        assert!(page.listing.beach_evidence.contains(&"frente ao mar".to_string()));
    }

    #[test]
    fn test_parse_listing_page_without_price() {
        let html = "<html><body><h1>Chalé</h1></body></html>";
        let page = client().parse_listing_page(html, "https://example.com/rooms/1", 2);
        assert!(!page.price_found);
        assert_eq!(page.listing.price_per_night, 0.0);
        assert_eq!(page.municipality, None);
    }

    #[test]
    fn test_merge_unique() {
        let mut all = vec![CompetitorListing::new("A", 100.0, false)];
        merge_unique(&mut all, vec![
            CompetitorListing::new("A", 100.0, true),
            CompetitorListing::new("A", 120.0, false),
        ]);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_search_query_includes_filters() {
        let search = SearchConfig {
            name: "Entire homes".to_string(),
            url: None,
            place_id: Some("abc".to_string()),
            price_min: Some(300),
            price_max: None,
            room_types: vec!["Entire home/apt".to_string()],
        };
        let params = SearchParams {
            checkin: chrono::NaiveDate::from_ymd_opt(2026, 1, 9).unwrap(),
            checkout: chrono::NaiveDate::from_ymd_opt(2026, 1, 11).unwrap(),
            adults: 2,
        };

        let query = AirbnbClient::search_query(&search, &params);
        assert!(query.contains(&("checkin", "2026-01-09".to_string())));
        assert!(query.contains(&("place_id", "abc".to_string())));
        assert!(query.contains(&("price_min", "300".to_string())));
        assert!(query.contains(&("room_types[]", "Entire home/apt".to_string())));
        assert!(!query.iter().any(|(k, _)| *k == "price_max"));
    }
}
