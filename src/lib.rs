// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod feed;
pub mod indicators;
pub mod models;
pub mod sensors;

// Re-export commonly used types
pub use api::{CryptoComClient, Exchange};
pub use error::{Error, Result};
pub use feed::MarketData;
pub use models::*;
