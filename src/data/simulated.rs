use chrono::Datelike;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;
use crate::data::types::CompetitorListing;
use crate::strategies::weather_adjustment::StayDates;

const LISTING_TYPES: &[&str] = &[
    "Casa completa",
    "Apartamento",
    "Chalé",
    "Pousada",
    "Casa de praia",
    "Studio",
    "Loft",
    "Casa de campo",
];

const SAMPLE_IMAGES: &[&str] = &[
    "https://a0.muscache.com/im/pictures/miso/Hosting-53274539/original/0e6c8b8b.jpg",
    "https://a0.muscache.com/im/pictures/miso/Hosting-12345678/original/1a2b3c4d.jpg",
    "https://a0.muscache.com/im/pictures/prohost-api/Hosting-87654321/original/9f8e7d6c.jpg",
    "https://a0.muscache.com/im/pictures/hosting/Hosting-11223344/original/abcd1234.jpg",
];

const BEACHFRONT_RANGE: (u32, u32) = (180, 350);
const REGULAR_RANGE: (u32, u32) = (120, 250);
const WEEKEND_MULTIPLIER: f64 = 1.3;

/// Synthetic Itacuruçá market used when scraping is unavailable and the
/// simulated fallback is switched on.
pub fn simulated_market_data<R: Rng>(rng: &mut R, stay: &StayDates) -> Vec<CompetitorListing> {
    let weekend = stay.checkin.weekday().num_days_from_monday() >= 5;
    let multiplier = if weekend { WEEKEND_MULTIPLIER } else { 1.0 };

    let count = rng.gen_range(8..=12);
    let listings: Vec<CompetitorListing> = (0..count)
        .map(|i| {
            // one in three is beachfront
            let is_beachfront = rng.gen_range(0..3) == 0;
            let (min, max) = if is_beachfront { BEACHFRONT_RANGE } else { REGULAR_RANGE };

            let base = rng.gen_range(min..=max) as f64;
            let price = ((base * multiplier).trunc() * rng.gen_range(0.9..=1.1)).trunc();

            let kind = LISTING_TYPES.choose(rng).copied().unwrap_or("Casa");
            let image = SAMPLE_IMAGES.choose(rng).copied().unwrap_or_default();

            CompetitorListing {
                title: format!("{} em Itacuruçá {}", kind, i + 1),
                price_per_night: price,
                rating: (rng.gen_range(4.0..=4.9_f64) * 10.0).round() / 10.0,
                review_count: rng.gen_range(15..=150),
                is_beachfront,
                beachfront_confidence: if is_beachfront { 80.0 } else { 20.0 },
                beach_evidence: if is_beachfront {
                    vec!["vista para o mar".to_string(), "acesso à praia".to_string()]
                } else {
                    Vec::new()
                },
                is_favorite: false,
                listing_url: format!("https://www.airbnb.com.br/rooms/{}", rng.gen_range(100_000..=999_999)),
                image_url: image.to_string(),
            }
        })
        .collect();

    info!(
        "📊 Generated {} simulated listings ({} beachfront)",
        listings.len(),
        listings.iter().filter(|l| l.is_beachfront).count()
    );

    listings
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn stay(checkin: &str, checkout: &str) -> StayDates {
        StayDates::parse(checkin, checkout).unwrap()
    }

    #[test]
    fn test_simulated_market_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        // Tuesday check-in, no weekend uplift
        let listings = simulated_market_data(&mut rng, &stay("2026-01-13", "2026-01-15"));

        assert!((8..=12).contains(&listings.len()));
        for l in &listings {
            if l.is_beachfront {
                assert!(l.price_per_night >= (180.0 * 0.9_f64).trunc() && l.price_per_night <= 350.0 * 1.1);
                assert_eq!(l.beachfront_confidence, 80.0);
            } else {
                assert!(l.price_per_night >= (120.0 * 0.9_f64).trunc() && l.price_per_night <= 250.0 * 1.1);
                assert!(l.beach_evidence.is_empty());
            }
            assert!((4.0..=4.9).contains(&l.rating));
            assert!((15..=150).contains(&l.review_count));
            assert!(l.listing_url.starts_with("https://www.airbnb.com.br/rooms/"));
            assert!(!l.is_favorite);
        }
    }

    #[test]
    fn test_simulated_weekend_uplift() {
        let mut rng = StdRng::seed_from_u64(11);
        // Saturday check-in
        let listings = simulated_market_data(&mut rng, &stay("2026-01-10", "2026-01-11"));

        let lowest = listings.iter().map(|l| l.price_per_night).fold(f64::INFINITY, f64::min);
        assert!(lowest >= (120.0 * 1.3 * 0.9_f64).trunc() - 1.0);
    }

    #[test]
    fn test_simulated_is_deterministic_for_a_seed() {
        let stay = stay("2026-01-13", "2026-01-15");
        let a = simulated_market_data(&mut StdRng::seed_from_u64(3), &stay);
        let b = simulated_market_data(&mut StdRng::seed_from_u64(3), &stay);
        assert_eq!(a, b);
    }
}
