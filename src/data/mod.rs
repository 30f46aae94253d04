pub mod airbnb;
pub mod cache;
pub mod extract;
pub mod simulated;
pub mod sources;
pub mod types;
pub mod weather;
