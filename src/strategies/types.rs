use serde::{Deserialize, Serialize};

/// count/min/max/avg over one partition; all zero when empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionStats {
    pub count: usize,
    pub min_price: f64,
    pub max_price: f64,
    pub avg_price: f64,
}

impl PartitionStats {
    pub fn from_prices(prices: &[f64]) -> Self {
        if prices.is_empty() {
            return Self::default();
        }

        let min_price = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max_price = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg_price = prices.iter().sum::<f64>() / prices.len() as f64;

        Self {
            count: prices.len(),
            min_price,
            max_price,
            // float summation can land a hair outside [min, max]
            avg_price: avg_price.clamp(min_price, max_price),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalysis {
    pub all: PartitionStats,
    pub beachfront: PartitionStats,
    pub other: PartitionStats,
    pub favorites: PartitionStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketPosition {
    LowCompetition,
    ModerateCompetition,
    HighCompetition,
    /// Zero-width price range
    Stable,
}

impl MarketPosition {
    /// Where `avg` sits in `[min, max]`.
    pub fn classify(avg: f64, min: f64, max: f64) -> Self {
        let range = max - min;
        if range == 0.0 {
            return MarketPosition::Stable;
        }

        let ratio = (avg - min) / range;
        if ratio < 0.3 {
            MarketPosition::LowCompetition
        } else if ratio > 0.7 {
            MarketPosition::HighCompetition
        } else {
            MarketPosition::ModerateCompetition
        }
    }

    pub fn discount_percentage(&self) -> f64 {
        match self {
            MarketPosition::LowCompetition => 3.0,
            MarketPosition::ModerateCompetition => 6.0,
            MarketPosition::HighCompetition => 10.0,
            MarketPosition::Stable => 5.0,
        }
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            MarketPosition::LowCompetition => "Minimal discount for a low-competition market",
            MarketPosition::ModerateCompetition => "Moderate discount balancing competitiveness and margin",
            MarketPosition::HighCompetition => "Aggressive discount for a highly competitive market",
            MarketPosition::Stable => "Standard discount for a stable market",
        }
    }

    pub fn justification(&self, competitor_count: usize, competitor_kind: &str) -> String {
        match self {
            MarketPosition::LowCompetition => format!(
                "Low competition ({} {} competitors). Applying the minimum 3% discount to stay competitive without giving up margin.",
                competitor_count, competitor_kind
            ),
            MarketPosition::ModerateCompetition => format!(
                "Moderate competition ({} {} competitors). A 6% discount balances attractiveness and profitability.",
                competitor_count, competitor_kind
            ),
            MarketPosition::HighCompetition => format!(
                "Highly competitive market ({} {} competitors). A 10% discount is needed to stand out and secure occupancy.",
                competitor_count, competitor_kind
            ),
            MarketPosition::Stable => format!(
                "Stable prices ({} {} competitors). Standard 5% discount to stay competitive.",
                competitor_count, competitor_kind
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceGroup {
    Favorites,
    Beachfront,
    WholeMarket,
}

impl ReferenceGroup {
    pub fn describe(&self, count: usize) -> String {
        match self {
            ReferenceGroup::Favorites => format!("Based on {} selected favorite listings", count),
            ReferenceGroup::Beachfront => "Competing with beachfront listings".to_string(),
            ReferenceGroup::WholeMarket => "Competing with the whole market".to_string(),
        }
    }

    pub fn competitor_kind(&self) -> &'static str {
        match self {
            ReferenceGroup::Favorites => "favorite",
            ReferenceGroup::Beachfront => "beachfront",
            ReferenceGroup::WholeMarket => "regular",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSuggestion {
    pub suggested_price: f64,
    pub discount_percentage: f64,
    pub strategy_label: String,
    pub justification: String,
    pub reference_avg: f64,
    /// `None` on the fallback path
    pub reference_group: Option<ReferenceGroup>,
    pub market_position: Option<MarketPosition>,
    pub floor_clamped: bool,
    pub market: MarketAnalysis,
}

impl PricingSuggestion {
    pub fn is_fallback(&self) -> bool {
        self.reference_group.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherFactor {
    RainDiscount,
    FairWeatherPremium,
    Neutral,
}

impl WeatherFactor {
    pub fn label(&self) -> &'static str {
        match self {
            WeatherFactor::RainDiscount => "Rain discount",
            WeatherFactor::FairWeatherPremium => "Fair-weather premium",
            WeatherFactor::Neutral => "Normal price",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAdjustment {
    pub base_price: f64,
    pub adjusted_price: f64,
    pub multiplier: f64,
    pub is_weekend: bool,
    pub avg_rain_probability: f64,
    pub factor: WeatherFactor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_stats() {
        let stats = PartitionStats::from_prices(&[120.0, 80.0, 100.0]);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min_price, 80.0);
        assert_eq!(stats.max_price, 120.0);
        assert_eq!(stats.avg_price, 100.0);

        let empty = PartitionStats::from_prices(&[]);
        assert!(empty.is_empty());
        assert_eq!(empty.avg_price, 0.0);
    }

    #[test]
    fn test_partition_avg_between_bounds() {
        let prices = [0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1];
        let stats = PartitionStats::from_prices(&prices);
        assert!(stats.min_price <= stats.avg_price && stats.avg_price <= stats.max_price);
    }

    #[test]
    fn test_market_position_tiers() {
        assert_eq!(MarketPosition::classify(100.0, 100.0, 100.0), MarketPosition::Stable);
        assert_eq!(MarketPosition::classify(110.0, 100.0, 200.0), MarketPosition::LowCompetition);
        assert_eq!(MarketPosition::classify(150.0, 100.0, 200.0), MarketPosition::ModerateCompetition);
        assert_eq!(MarketPosition::classify(130.0, 100.0, 200.0), MarketPosition::ModerateCompetition);
        assert_eq!(MarketPosition::classify(180.0, 100.0, 200.0), MarketPosition::HighCompetition);
        assert_eq!(MarketPosition::Stable.discount_percentage(), 5.0);
    }
}
