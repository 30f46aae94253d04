pub mod competitive_pricing;
pub mod similarity;
pub mod types;
pub mod weather_adjustment;
