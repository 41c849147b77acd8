// ============================================================================
// Module : api
// ============================================================================
// Accès aux données de marché : client CoinGecko, cache TTL + rate limiting,
// et la couche transport HTTP en dessous.
// ============================================================================

pub mod cache;     // Cache TTL + rate limiter
pub mod coingecko; // Client CoinGecko typé
pub mod error;     // MarketDataError
pub mod transport; // Trait HttpTransport + implémentation reqwest

// Re-export des types principaux
pub use cache::MarketDataCache;
pub use coingecko::{format_market_cap, format_percent, MarketClient, TRACKED_COINS};
pub use error::MarketDataError;
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};
