// ============================================================================
// Structures : données de marché CoinGecko
// ============================================================================
// Représentation typée des réponses de l'API CoinGecko
//
// CONCEPTS RUST :
// 1. Validation à la frontière : serde refuse un payload sans les champs requis
//    au lieu de propager un serde_json::Value "any" dans le reste du code
// 2. #[serde(default)] : champs que CoinGecko renvoie parfois à null
// 3. Option<T> pour les valeurs réellement optionnelles
// ============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Une ligne de `/coins/markets`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinMarket {
    /// Identifiant CoinGecko (ex: "bitcoin", "avalanche-2")
    pub id: String,

    /// Symbole en minuscules tel que renvoyé par l'API (ex: "btc")
    pub symbol: String,

    pub name: String,

    #[serde(default)]
    pub image: String,

    pub current_price: f64,

    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,

    #[serde(default)]
    pub market_cap: Option<f64>,

    #[serde(default)]
    pub total_volume: Option<f64>,

    #[serde(default)]
    pub market_cap_rank: Option<u32>,

    /// Présent uniquement avec `sparkline=true`
    #[serde(default)]
    pub sparkline_in_7d: Option<Sparkline>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sparkline {
    pub price: Vec<f64>,
}

impl CoinMarket {
    /// Symbole en majuscules pour l'affichage ("btc" -> "BTC")
    pub fn display_symbol(&self) -> String {
        self.symbol.to_uppercase()
    }

    /// Variation 24h, 0 si CoinGecko ne la fournit pas
    pub fn change_percent(&self) -> f64 {
        self.price_change_percentage_24h.unwrap_or(0.0)
    }

    pub fn is_positive(&self) -> bool {
        self.change_percent() >= 0.0
    }

    /// Formatte la ligne pour l'affichage dans une liste
    ///
    /// Format : "BTC      Bitcoin              $67000.00  ▲ +2.11%"
    pub fn display(&self) -> String {
        let change = self.change_percent();
        let arrow = if change >= 0.0 { "▲" } else { "▼" };

        // Tronque le nom à 20 caractères avec ellipse si nécessaire
        let name = if self.name.chars().count() <= 20 {
            self.name.clone()
        } else {
            let truncated: String = self.name.chars().take(19).collect();
            format!("{}…", truncated)
        };

        format!(
            "{:<8} {:<20} {:>12}  {} {:+.2}%",
            self.display_symbol(),
            name,
            format!("${:.2}", self.current_price),
            arrow,
            change
        )
    }
}

/// Un point de `/coins/{id}/market_chart`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub time: DateTime<Utc>,
    pub price: f64,
}

/// Réponse brute de `/coins/{id}/market_chart` : paires [timestamp_ms, prix]
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MarketChartResponse {
    #[serde(default)]
    pub prices: Vec<(f64, f64)>,
}

/// Enveloppe de `/global` : les données utiles sont sous "data"
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GlobalResponse {
    pub data: GlobalMarketData,
}

/// Statistiques globales du marché crypto
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalMarketData {
    pub total_market_cap: HashMap<String, f64>,
    pub total_volume: HashMap<String, f64>,
    pub market_cap_percentage: HashMap<String, f64>,
    #[serde(default)]
    pub market_cap_change_percentage_24h_usd: Option<f64>,
}

impl GlobalMarketData {
    pub fn total_market_cap_usd(&self) -> f64 {
        self.total_market_cap.get("usd").copied().unwrap_or(0.0)
    }

    pub fn total_volume_usd(&self) -> f64 {
        self.total_volume.get("usd").copied().unwrap_or(0.0)
    }

    pub fn bitcoin_dominance(&self) -> f64 {
        self.market_cap_percentage.get("btc").copied().unwrap_or(0.0)
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
