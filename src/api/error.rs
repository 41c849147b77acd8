// ============================================================================
// MarketDataError
// ============================================================================
// Erreur typée de la couche données de marché
//
// CONCEPT RUST : thiserror
// - derive(Error) génère Display et std::error::Error
// - #[from] génère la conversion pour l'opérateur ?
// - L'appelant peut matcher sur la variante (ex: HTTP 429 -> garder les
//   anciennes valeurs affichées) au lieu de parser un message
// ============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketDataError {
    /// Statut HTTP hors de la plage 2xx
    #[error("CoinGecko API error: HTTP {status}")]
    Status { status: u16 },

    /// Échec réseau (DNS, connexion, timeout...)
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Le corps de la réponse n'est pas du JSON
    #[error("invalid JSON body: {0}")]
    Parse(#[source] serde_json::Error),

    /// JSON valide mais ne correspondant pas au format attendu
    #[error("malformed {what} payload: {source}")]
    Malformed {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl MarketDataError {
    /// Statut HTTP si l'erreur en porte un
    pub fn status(&self) -> Option<u16> {
        match self {
            MarketDataError::Status { status } => Some(*status),
            _ => None,
        }
    }
}
