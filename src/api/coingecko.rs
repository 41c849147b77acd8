// ============================================================================
// API Client : CoinGecko
// ============================================================================
// Récupère les prix crypto depuis l'API publique CoinGecko (sans clé)
//
// Toutes les requêtes passent par MarketDataCache : les URL identiques dans
// la fenêtre de fraîcheur ne coûtent aucune requête, et les autres sont
// espacées pour respecter la limite du tier gratuit.
//
// CONCEPTS RUST :
// 1. Généricité : decode::<T>() désérialise le JSON partagé vers n'importe quel T
// 2. &Value implémente Deserializer : pas besoin de cloner le JSON du cache
// 3. Iterators : filter_map pour ignorer les points invalides
// ============================================================================

use std::sync::Arc;

use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::api::{HttpTransport, MarketDataCache, MarketDataError, ReqwestTransport};
use crate::config::MarketConfig;
use crate::models::market::{GlobalResponse, MarketChartResponse};
use crate::models::{CoinMarket, GlobalMarketData, PricePoint};

/// Les dix cryptos suivies par la vue marché
pub const TRACKED_COINS: [&str; 10] = [
    "bitcoin",
    "ethereum",
    "binancecoin",
    "solana",
    "cardano",
    "ripple",
    "polkadot",
    "dogecoin",
    "tron",
    "avalanche-2",
];

/// Client CoinGecko adossé au cache
pub struct MarketClient {
    base_url: String,
    cache: MarketDataCache,
}

impl MarketClient {
    /// Client de production : transport reqwest + paramètres de `config`
    pub fn from_config(config: &MarketConfig) -> Result<Self, MarketDataError> {
        let transport = ReqwestTransport::new(
            &config.user_agent,
            std::time::Duration::from_millis(config.timeout_ms),
        )?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: &MarketConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let cache = MarketDataCache::new(
            transport,
            config.cache_ttl(),
            config.min_request_interval(),
        );
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache,
        }
    }

    /// Top des cryptos par capitalisation, avec sparkline 7 jours
    #[instrument(skip(self))]
    pub async fn fetch_markets(&self, per_page: u32) -> Result<Vec<CoinMarket>, MarketDataError> {
        let url = format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&price_change_percentage=24h&sparkline=true",
            self.base_url, per_page
        );
        let value = self.cache.fetch(&url).await?;
        let coins: Vec<CoinMarket> = decode(&value, "coins/markets")?;

        info!(coins = coins.len(), "Fetched market data");
        Ok(coins)
    }

    /// Prix d'une seule crypto, None si l'identifiant est inconnu de CoinGecko
    #[instrument(skip(self))]
    pub async fn fetch_coin(&self, coin_id: &str) -> Result<Option<CoinMarket>, MarketDataError> {
        let url = format!(
            "{}/coins/markets?vs_currency=usd&ids={}",
            self.base_url, coin_id
        );
        let value = self.cache.fetch(&url).await?;
        let coins: Vec<CoinMarket> = decode(&value, "coins/markets")?;
        Ok(coins.into_iter().next())
    }

    /// Historique de prix sur `days` jours (le tier gratuit limite la granularité)
    ///
    /// Les points dont le timestamp n'est pas représentable sont ignorés
    /// avec un warning plutôt que de faire échouer tout le graphique.
    #[instrument(skip(self))]
    pub async fn fetch_market_chart(
        &self,
        coin_id: &str,
        days: u32,
    ) -> Result<Vec<PricePoint>, MarketDataError> {
        let url = format!(
            "{}/coins/{}/market_chart?vs_currency=usd&days={}",
            self.base_url, coin_id, days
        );
        let value = self.cache.fetch(&url).await?;
        let chart: MarketChartResponse = decode(&value, "market_chart")?;

        let total = chart.prices.len();
        let points: Vec<PricePoint> = chart
            .prices
            .into_iter()
            .filter_map(|(timestamp_ms, price)| {
                DateTime::from_timestamp_millis(timestamp_ms as i64)
                    .map(|time| PricePoint { time, price })
            })
            .collect();

        if points.len() < total {
            warn!(
                skipped = total - points.len(),
                total,
                "Skipped price points with invalid timestamps"
            );
        }
        debug!(points = points.len(), "Parsed market chart");

        Ok(points)
    }

    /// Statistiques globales (capitalisation totale, dominance BTC...)
    #[instrument(skip(self))]
    pub async fn fetch_global(&self) -> Result<GlobalMarketData, MarketDataError> {
        let url = format!("{}/global", self.base_url);
        let value = self.cache.fetch(&url).await?;
        let global: GlobalResponse = decode(&value, "global")?;
        Ok(global.data)
    }
}

/// Désérialise le JSON partagé du cache vers le type attendu
fn decode<T: DeserializeOwned>(value: &Value, what: &'static str) -> Result<T, MarketDataError> {
    T::deserialize(value).map_err(|source| {
        warn!(payload = what, error = %source, "Rejected malformed market payload");
        MarketDataError::Malformed { what, source }
    })
}

// ============================================================================
// Formatage
// ============================================================================

/// Capitalisation lisible : $1.2T, $350.4B, $12.0M, $5.3K, $999.00
pub fn format_market_cap(cap: f64) -> String {
    if cap >= 1e12 {
        format!("${:.1}T", cap / 1e12)
    } else if cap >= 1e9 {
        format!("${:.1}B", cap / 1e9)
    } else if cap >= 1e6 {
        format!("${:.1}M", cap / 1e6)
    } else if cap >= 1e3 {
        format!("${:.1}K", cap / 1e3)
    } else {
        format!("${:.2}", cap)
    }
}

/// Pourcentage signé : "+2.11%", "-0.50%"
pub fn format_percent(value: f64, decimals: usize) -> String {
    let sign = if value >= 0.0 { "+" } else { "" };
    format!("{}{:.*}%", sign, decimals, value)
}

// ============================================================================
// Tests unitaires
// ============================================================================
