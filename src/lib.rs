// Core domain types
pub mod core;

// Sliding window aggregation
pub mod window;

// HTTP endpoints
pub mod handlers;

// Outbound API client
pub mod client;

pub mod config;

// Re-export commonly used types for convenience
pub use crate::core::*;
pub use window::Aggregator;
pub use config::ServiceConfig;
