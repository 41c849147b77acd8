// ============================================================================
// Module : models
// ============================================================================
// Ce module contient toutes les structures de données de l'application
//
// CONCEPT RUST : Modules et visibilité
// - "pub mod" : déclare un sous-module publique (accessible depuis l'extérieur)
// - Sans "pub", le module serait privé au crate
// ============================================================================

pub mod currency;    // Devises d'affichage et taux de change
pub mod market;      // Données CoinGecko typées
pub mod token;       // Métadonnées ERC-20 et reçus
pub mod transaction; // Historique des transactions

// Re-export des structures principales pour simplifier les imports
// Au lieu de : use bbcwallet::models::currency::Currency;
// On peut faire : use bbcwallet::models::Currency;
pub use currency::{Currency, ExchangeRates};
pub use market::{CoinMarket, GlobalMarketData, PricePoint, Sparkline};
pub use token::{Receipt, TokenInfo};
pub use transaction::{
    Transaction, TransactionHistory, TransactionStats, TxKind, TxStatus, MAX_TRANSACTIONS,
};
