use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};
use crate::data::types::CompetitorListing;

const ROOM_TYPES: &[&str] = &["bedroom", "kitchen", "bathroom", "living", "pool", "beach", "garden", "balcony"];
const STYLE_KEYWORDS: &[&str] = &["modern", "rustic", "luxury", "cozy", "spacious", "bright", "dark", "colorful"];
const AMENITY_KEYWORDS: &[&str] = &[
    "piscina",
    "pool",
    "wifi",
    "ar condicionado",
    "churrasqueira",
    "garagem",
    "vista",
    "varanda",
];

const VISUAL_WEIGHT: f64 = 0.30;
const TEXT_WEIGHT: f64 = 0.25;
const AMENITIES_WEIGHT: f64 = 0.25;
const LOCATION_WEIGHT: f64 = 0.20;

/// Same search region, so location starts high
const LOCATION_BASE: f64 = 80.0;
const SAME_BEACH_BONUS: f64 = 20.0;

/// Per-dimension similarity of a competitor to the host's listing, 0-100 each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityBreakdown {
    pub visual: f64,
    pub text: f64,
    pub amenities: f64,
    pub location: f64,
    pub total: f64,
    pub reasons: Vec<String>,
}

/// `|a ∩ b| / max(|a|, |b|) × 100`, 0 when either side is empty.
fn overlap<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let common = a.intersection(b).count();
    common as f64 / a.len().max(b.len()) as f64 * 100.0
}

fn keywords_in(haystack: &str, keywords: &[&'static str]) -> HashSet<&'static str> {
    keywords.iter().copied().filter(|k| haystack.contains(k)).collect()
}

fn visual_score(reference: &CompetitorListing, competitor: &CompetitorListing) -> f64 {
    let ref_url = reference.image_url.to_lowercase();
    let comp_url = competitor.image_url.to_lowercase();

    let rooms = overlap(&keywords_in(&ref_url, ROOM_TYPES), &keywords_in(&comp_url, ROOM_TYPES));
    let style = overlap(&keywords_in(&ref_url, STYLE_KEYWORDS), &keywords_in(&comp_url, STYLE_KEYWORDS));

    (rooms * 0.6 + style * 0.4).min(100.0)
}

fn title_words(title: &str) -> HashSet<String> {
    title
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .map(str::to_string)
        .collect()
}

fn text_score(reference: &CompetitorListing, competitor: &CompetitorListing) -> f64 {
    overlap(&title_words(&reference.title), &title_words(&competitor.title)).min(100.0)
}

fn amenity_features(listing: &CompetitorListing) -> HashSet<String> {
    let mut features: HashSet<String> = listing.beach_evidence.iter().map(|e| e.to_lowercase()).collect();
    if listing.is_beachfront {
        features.insert("beachfront".to_string());
    }

    let title = listing.title.to_lowercase();
    features.extend(keywords_in(&title, AMENITY_KEYWORDS).into_iter().map(str::to_string));
    features
}

fn amenities_score(reference: &CompetitorListing, competitor: &CompetitorListing) -> f64 {
    overlap(&amenity_features(reference), &amenity_features(competitor)).min(100.0)
}

fn location_score(reference: &CompetitorListing, competitor: &CompetitorListing) -> f64 {
    let mut score = LOCATION_BASE;
    if reference.is_beachfront == competitor.is_beachfront {
        score += SAME_BEACH_BONUS;
    }
    score.min(100.0)
}

pub fn similarity_score(reference: &CompetitorListing, competitor: &CompetitorListing) -> SimilarityBreakdown {
    let visual = visual_score(reference, competitor);
    let text = text_score(reference, competitor);
    let amenities = amenities_score(reference, competitor);
    let location = location_score(reference, competitor);

    let total = visual * VISUAL_WEIGHT
        + text * TEXT_WEIGHT
        + amenities * AMENITIES_WEIGHT
        + location * LOCATION_WEIGHT;

    let mut reasons = Vec::new();
    if visual > 70.0 {
        reasons.push(format!("Very similar photos ({:.1}% match)", visual));
    }
    if text > 60.0 {
        reasons.push(format!("Similar descriptions ({:.1}% match)", text));
    }
    if amenities > 50.0 {
        reasons.push(format!("Similar amenities ({:.1}% match)", amenities));
    }
    if location > 80.0 {
        reasons.push(format!("Very close location ({:.1}% match)", location));
    }

    SimilarityBreakdown {
        visual,
        text,
        amenities,
        location,
        total,
        reasons,
    }
}

/// Competitors scoring above `threshold`; every competitor when none does.
pub fn filter_similar(
    reference: &CompetitorListing,
    competitors: &[CompetitorListing],
    threshold: f64,
) -> Vec<CompetitorListing> {
    let similar: Vec<CompetitorListing> = competitors
        .iter()
        .filter(|c| {
            let score = similarity_score(reference, c);
            debug!("Similarity {:.1} for {}", score.total, c.title);
            score.total > threshold
        })
        .cloned()
        .collect();

    if similar.is_empty() {
        info!("No competitor above {:.0}% similarity, keeping all {}", threshold, competitors.len());
        return competitors.to_vec();
    }

    info!("🎯 {} of {} competitors are similar", similar.len(), competitors.len());
    similar
}
