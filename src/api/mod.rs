pub mod cryptocom;
pub mod exchange;

pub use cryptocom::{CryptoComClient, Credentials, CRYPTOCOM_API_BASE, DEFAULT_RATE_LIMIT};
pub use exchange::Exchange;
