use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info};
use crate::data::types::CompetitorListing;
use crate::strategies::types::{
    MarketAnalysis, MarketPosition, PartitionStats, PricingSuggestion, ReferenceGroup,
};

pub const FALLBACK_PRICE: f64 = 200.0;
/// Never undercut the cheapest reference listing by more than 10%
const FLOOR_RATIO: f64 = 0.90;

#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("listing '{title}' has an invalid price: {price}")]
    InvalidPrice { title: String, price: f64 },
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn fallback(strategy_label: &str, justification: &str) -> PricingSuggestion {
    PricingSuggestion {
        suggested_price: FALLBACK_PRICE,
        discount_percentage: 0.0,
        strategy_label: strategy_label.to_string(),
        justification: justification.to_string(),
        reference_avg: 0.0,
        reference_group: None,
        market_position: None,
        floor_clamped: false,
        market: MarketAnalysis::default(),
    }
}

fn validate(listings: &[CompetitorListing]) -> Result<(), PricingError> {
    match listings
        .iter()
        .find(|l| l.price_per_night.is_nan() || l.price_per_night < 0.0)
    {
        Some(bad) => Err(PricingError::InvalidPrice {
            title: bad.title.clone(),
            price: bad.price_per_night,
        }),
        None => Ok(()),
    }
}

/// Combine scraped competitors with the host's favorites. A competitor
/// sharing a non-empty URL with a favorite is the same listing and is
/// dropped in favor of the favorite.
fn merge_pool<'a>(
    competitors: &'a [CompetitorListing],
    favorites: &'a [CompetitorListing],
) -> Vec<(&'a CompetitorListing, bool)> {
    let favorite_urls: HashSet<&str> = favorites
        .iter()
        .map(|f| f.listing_url.as_str())
        .filter(|url| !url.is_empty())
        .collect();

    let scraped = competitors
        .iter()
        .filter(|c| c.listing_url.is_empty() || !favorite_urls.contains(c.listing_url.as_str()))
        .map(|c| (c, c.is_favorite));

    scraped.chain(favorites.iter().map(|f| (f, true))).collect()
}

fn prices_where(
    pool: &[(&CompetitorListing, bool)],
    keep: impl Fn(&CompetitorListing, bool) -> bool,
) -> Vec<f64> {
    pool.iter()
        .filter(|(listing, favorite)| keep(*listing, *favorite))
        .map(|(listing, _)| listing.price_per_night)
        .collect()
}

/// Discount `avg_price` by `discount` percent, raised to the floor under
/// `min_price` when needed. Returns the price, the effective discount and
/// whether the floor applied.
fn apply_floor(avg_price: f64, min_price: f64, discount: f64) -> (f64, f64, bool) {
    let suggested = avg_price * (1.0 - discount / 100.0);
    let floor = min_price * FLOOR_RATIO;
    if suggested < floor {
        (floor, (avg_price - floor) / avg_price * 100.0, true)
    } else {
        (suggested, discount, false)
    }
}

fn floor_note(min_price: f64) -> String {
    format!(
        " Price raised so it is never more than 10% below the cheapest competitor (R${:.2}).",
        min_price
    )
}

/// Suggest a nightly price from the competitor pool.
///
/// The reference group is the favorites when there are any, else the
/// beachfront listings when the host's own listing is beachfront, else the
/// whole market. The discount tier follows where the reference average sits
/// in the group's price range. Inputs are never mutated; the same inputs
/// always give the same suggestion.
pub fn calculate_price(
    competitors: &[CompetitorListing],
    my_listing_is_beachfront: bool,
    favorites: Option<&[CompetitorListing]>,
) -> Result<PricingSuggestion, PricingError> {
    let favorites = favorites.unwrap_or(&[]);
    validate(competitors)?;
    validate(favorites)?;

    let pool = merge_pool(competitors, favorites);
    if pool.is_empty() {
        return Ok(fallback(
            "Base price - no competitor data",
            "No market data available for comparison",
        ));
    }

    let valid: Vec<(&CompetitorListing, bool)> = pool
        .into_iter()
        .filter(|(l, _)| l.has_valid_price())
        .collect();
    if valid.is_empty() {
        return Ok(fallback(
            "Base price - no valid prices found",
            "Competitor prices are invalid",
        ));
    }

    let all_prices = prices_where(&valid, |_, _| true);
    let beachfront_prices = prices_where(&valid, |l, _| l.is_beachfront);
    let other_prices = prices_where(&valid, |l, _| !l.is_beachfront);
    let favorite_prices = prices_where(&valid, |_, fav| fav);

    let market = MarketAnalysis {
        all: PartitionStats::from_prices(&all_prices),
        beachfront: PartitionStats::from_prices(&beachfront_prices),
        other: PartitionStats::from_prices(&other_prices),
        favorites: PartitionStats::from_prices(&favorite_prices),
    };

    let (group, reference) = if !market.favorites.is_empty() {
        (ReferenceGroup::Favorites, market.favorites)
    } else if my_listing_is_beachfront && !market.beachfront.is_empty() {
        (ReferenceGroup::Beachfront, market.beachfront)
    } else {
        (ReferenceGroup::WholeMarket, market.all)
    };

    let position = MarketPosition::classify(reference.avg_price, reference.min_price, reference.max_price);
    let mut justification = position.justification(reference.count, group.competitor_kind());

    debug!(
        "Reference {:?}: n={} avg={:.2} range=[{:.2}, {:.2}] → {:?}",
        group, reference.count, reference.avg_price, reference.min_price, reference.max_price, position
    );

    let (suggested, discount, floor_clamped) =
        apply_floor(reference.avg_price, reference.min_price, position.discount_percentage());
    if floor_clamped {
        justification.push_str(&floor_note(reference.min_price));
    }

    let suggestion = PricingSuggestion {
        suggested_price: round_to(suggested, 2),
        discount_percentage: round_to(discount, 1),
        strategy_label: format!("{} - {}", group.describe(reference.count), position.strategy()),
        justification,
        reference_avg: reference.avg_price,
        reference_group: Some(group),
        market_position: Some(position),
        floor_clamped,
        market,
    };

    info!(
        "💰 Suggested R${:.2} ({:.1}% below R${:.2} average)",
        suggestion.suggested_price, suggestion.discount_percentage, suggestion.reference_avg
    );

    Ok(suggestion)
}
