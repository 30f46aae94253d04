pub mod periods;
pub mod persistence;
pub mod pipeline;
pub mod service;
pub mod state;
pub mod types;
