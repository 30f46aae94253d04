use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::data::types::WeatherDay;
use crate::strategies::types::{WeatherAdjustment, WeatherFactor};

const WEEKEND_MULTIPLIER: f64 = 1.3;
const RAIN_MULTIPLIER: f64 = 0.85;
const FAIR_WEATHER_MULTIPLIER: f64 = 1.15;
const RAINY_ABOVE: f64 = 70.0;
const FAIR_BELOW: f64 = 20.0;

#[derive(Debug, Error, PartialEq)]
pub enum StayValidationError {
    #[error("invalid {field} date '{value}', expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },

    #[error("checkout {checkout} must be after checkin {checkin}")]
    CheckoutNotAfterCheckin { checkin: NaiveDate, checkout: NaiveDate },
}

/// A validated stay: checkin strictly before checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayDates {
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
}

impl StayDates {
    pub fn new(checkin: NaiveDate, checkout: NaiveDate) -> Result<Self, StayValidationError> {
        if checkout <= checkin {
            return Err(StayValidationError::CheckoutNotAfterCheckin { checkin, checkout });
        }
        Ok(Self { checkin, checkout })
    }

    pub fn parse(checkin: &str, checkout: &str) -> Result<Self, StayValidationError> {
        let parse_date = |field: &'static str, value: &str| {
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| StayValidationError::InvalidDate {
                field,
                value: value.to_string(),
            })
        };

        Self::new(parse_date("checkin", checkin)?, parse_date("checkout", checkout)?)
    }

    pub fn nights(&self) -> i64 {
        (self.checkout - self.checkin).num_days()
    }

    /// Saturday or Sunday at either end of the stay
    pub fn touches_weekend(&self) -> bool {
        is_weekend_day(self.checkin) || is_weekend_day(self.checkout)
    }
}

fn is_weekend_day(date: NaiveDate) -> bool {
    date.weekday().num_days_from_monday() >= 5
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Weekend and weather multiplier applied to `base_price`.
///
/// Rain is averaged over forecast days inside the stay (both ends
/// included); no matching day counts as 0%, which earns the fair-weather
/// premium.
pub fn weekend_weather_adjustment(base_price: f64, weather: &[WeatherDay], stay: &StayDates) -> WeatherAdjustment {
    let is_weekend = stay.touches_weekend();

    let relevant: Vec<f64> = weather
        .iter()
        .filter(|day| stay.checkin <= day.date && day.date <= stay.checkout)
        .map(|day| f64::from(day.rain_probability))
        .collect();
    let avg_rain = if relevant.is_empty() {
        0.0
    } else {
        relevant.iter().sum::<f64>() / relevant.len() as f64
    };

    let mut multiplier = 1.0;
    if is_weekend {
        multiplier *= WEEKEND_MULTIPLIER;
    }

    let factor = if avg_rain > RAINY_ABOVE {
        multiplier *= RAIN_MULTIPLIER;
        WeatherFactor::RainDiscount
    } else if avg_rain < FAIR_BELOW {
        multiplier *= FAIR_WEATHER_MULTIPLIER;
        WeatherFactor::FairWeatherPremium
    } else {
        WeatherFactor::Neutral
    };

    WeatherAdjustment {
        base_price,
        adjusted_price: round_to(base_price * multiplier, 2),
        multiplier: round_to(multiplier, 2),
        is_weekend,
        avg_rain_probability: round_to(avg_rain, 1),
        factor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn day(s: &str, rain: u8) -> WeatherDay {
        WeatherDay::new(date(s), rain)
    }

    #[test]
    fn test_parse_valid_stay() {
        let stay = StayDates::parse("2026-01-09", "2026-01-11").unwrap();
        assert_eq!(stay.nights(), 2);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            StayDates::parse("09/01/2026", "2026-01-11"),
            Err(StayValidationError::InvalidDate { field: "checkin", .. })
        ));
        assert!(matches!(
            StayDates::parse("2026-01-09", "2026-02-30"),
            Err(StayValidationError::InvalidDate { field: "checkout", .. })
        ));
        assert!(matches!(
            StayDates::parse("2026-01-11", "2026-01-11"),
            Err(StayValidationError::CheckoutNotAfterCheckin { .. })
        ));
        assert!(matches!(
            StayDates::parse("2026-01-12", "2026-01-11"),
            Err(StayValidationError::CheckoutNotAfterCheckin { .. })
        ));
    }

    #[test]
    fn test_saturday_checkin_without_weather() {
        // 2026-01-10 is a Saturday
        let stay = StayDates::parse("2026-01-10", "2026-01-11").unwrap();
        let adj = weekend_weather_adjustment(100.0, &[], &stay);

        assert!(adj.is_weekend);
        assert_eq!(adj.avg_rain_probability, 0.0);
        // no rain data means 0% which is below the fair-weather threshold
        assert_eq!(adj.factor, WeatherFactor::FairWeatherPremium);
        assert_eq!(adj.adjusted_price, 149.5);
        assert!((adj.multiplier - 1.495).abs() < 0.006);
    }

    #[test]
    fn test_weekday_rainy_stay() {
        // Tuesday to Thursday
        let stay = StayDates::parse("2026-01-13", "2026-01-15").unwrap();
        let weather = vec![
            day("2026-01-12", 0),
            day("2026-01-13", 80),
            day("2026-01-14", 90),
            day("2026-01-15", 70),
            day("2026-01-16", 0),
        ];
        let adj = weekend_weather_adjustment(200.0, &weather, &stay);

        assert!(!adj.is_weekend);
        assert_eq!(adj.avg_rain_probability, 80.0);
        assert_eq!(adj.factor, WeatherFactor::RainDiscount);
        assert_eq!(adj.multiplier, 0.85);
        assert_eq!(adj.adjusted_price, 170.0);
    }

    #[test]
    fn test_neutral_weather_on_sunday_checkout() {
        // Friday to Sunday
        let stay = StayDates::parse("2026-01-09", "2026-01-11").unwrap();
        let weather = vec![day("2026-01-09", 40), day("2026-01-10", 50), day("2026-01-11", 60)];
        let adj = weekend_weather_adjustment(100.0, &weather, &stay);

        assert!(adj.is_weekend);
        assert_eq!(adj.factor, WeatherFactor::Neutral);
        assert_eq!(adj.multiplier, 1.3);
        assert_eq!(adj.adjusted_price, 130.0);
    }

    #[test]
    fn test_threshold_boundaries_are_neutral() {
        let stay = StayDates::parse("2026-01-13", "2026-01-14").unwrap();

        let adj = weekend_weather_adjustment(100.0, &[day("2026-01-13", 70)], &stay);
        assert_eq!(adj.factor, WeatherFactor::Neutral);

        let adj = weekend_weather_adjustment(100.0, &[day("2026-01-13", 20)], &stay);
        assert_eq!(adj.factor, WeatherFactor::Neutral);
        assert_eq!(adj.adjusted_price, 100.0);
    }
}
