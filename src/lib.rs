// ============================================================================
// BBC Wallet - Library
// ============================================================================
// Expose les modules publics pour le binaire et les tests
// ============================================================================

pub mod api;     // Données de marché CoinGecko (cache + rate limit)
pub mod config;  // Configuration de l'application
pub mod models;  // Structures de données
pub mod utils;   // Formatage et conversion d'unités
pub mod wallet;  // État du wallet et blockchain
