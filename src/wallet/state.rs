// ============================================================================
// Structure : WalletState
// ============================================================================
// L'état complet du wallet. Seul WalletStore le modifie ; les lecteurs
// reçoivent une copie (snapshot) et ne peuvent donc pas le muter.
//
// CONCEPTS RUST :
// 1. Enum pour state machine : Disconnected -> Connecting -> Connected
// 2. U256 pour les balances : toujours en base units, jamais de flottant
// 3. Option<T> pour les champs "nullables" (adresse, erreur)
// ============================================================================

use std::collections::HashSet;

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};

use crate::models::{Currency, ExchangeRates, TokenInfo, TransactionHistory};
use crate::utils::to_display;

/// État de la connexion au wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone)]
pub struct WalletState {
    pub status: ConnectionStatus,
    pub address: Option<Address>,

    /// ETH, en wei
    pub native_balance: U256,

    /// BBC, en base units (10^decimals)
    pub token_balance: U256,

    /// Adresses issues du fichier de déploiement (None : contrat inconnu)
    pub token_address: Option<Address>,
    pub oracle_address: Option<Address>,

    pub selected_currency: Currency,
    pub exchange_rates: ExchangeRates,

    pub transactions: TransactionHistory,
    pub pending_transactions: HashSet<String>,

    pub token: TokenInfo,

    pub estimated_gas: U256,
    pub gas_price: U256,

    /// Dernière erreur de connect / send, à effacer avec clear_error()
    pub error: Option<String>,

    /// Dernier rafraîchissement réussi des balances / taux
    ///
    /// Les échecs de rafraîchissement sont silencieux (seulement loggés) :
    /// ces horodatages permettent de savoir depuis quand les valeurs
    /// affichées n'ont pas été mises à jour.
    pub balances_refreshed_at: Option<DateTime<Utc>>,
    pub rates_refreshed_at: Option<DateTime<Utc>>,

    /// Incrémenté à chaque connexion, déconnexion ou changement de compte
    pub(crate) session: u64,
}

impl WalletState {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.status == ConnectionStatus::Connecting
    }

    /// Balance BBC en décimal
    pub fn token_units(&self) -> f64 {
        to_display(self.token_balance, self.token.decimals)
    }

    /// Balance ETH en décimal (18 décimales)
    pub fn native_units(&self) -> f64 {
        to_display(self.native_balance, 18)
    }

    /// Valeur de la balance BBC dans la devise sélectionnée
    pub fn token_in_currency(&self) -> f64 {
        self.exchange_rates
            .convert(self.token_units(), Currency::Bbc, self.selected_currency)
    }

    /// Valeur totale (BBC + ETH) dans la devise sélectionnée
    pub fn balance_in_currency(&self) -> f64 {
        let bbc = self.token_in_currency();
        let eth = self
            .exchange_rates
            .convert(self.native_units(), Currency::Eth, self.selected_currency);
        bbc + eth
    }

    /// Remet à zéro tout ce qui dépend de la session
    ///
    /// Conservés : devise, taux, métadonnées du token, historique persistant
    /// (le stockage n'est pas touché ici).
    pub(crate) fn reset_session(&mut self) {
        self.status = ConnectionStatus::Disconnected;
        self.address = None;
        self.native_balance = U256::ZERO;
        self.token_balance = U256::ZERO;
        self.transactions.clear();
        self.pending_transactions.clear();
        self.session += 1;
    }
}

impl Default for WalletState {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            address: None,
            native_balance: U256::ZERO,
            token_balance: U256::ZERO,
            token_address: None,
            oracle_address: None,
            selected_currency: Currency::Usd,
            exchange_rates: ExchangeRates::default(),
            transactions: TransactionHistory::new(),
            pending_transactions: HashSet::new(),
            token: TokenInfo::default(),
            estimated_gas: U256::ZERO,
            gas_price: U256::ZERO,
            error: None,
            balances_refreshed_at: None,
            rates_refreshed_at: None,
            session: 0,
        }
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn units(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    #[test]
    fn test_default_state() {
        let state = WalletState::default();
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert!(state.address.is_none());
        assert_eq!(state.token.symbol, "BBC");
        assert_eq!(state.selected_currency, Currency::Usd);
    }

    #[test]
    fn test_token_in_own_currency_is_unchanged() {
        let mut state = WalletState::default();
        state.token_balance = units(42);
        state.selected_currency = Currency::Bbc;
        state.exchange_rates.set(Currency::Bbc, 7.0);

        assert_eq!(state.token_in_currency(), 42.0);
    }

    #[test]
    fn test_balance_in_currency() {
        let mut state = WalletState::default();
        state.token_balance = units(100);
        state.native_balance = units(2);
        // BBC = 1 USD, ETH = 3000 USD par défaut
        assert_eq!(state.balance_in_currency(), 6100.0);

        state.selected_currency = Currency::Eth;
        // 100 BBC = 100 USD = 100/3000 ETH, plus 2 ETH inchangés
        let expected = 100.0 / 3000.0 + 2.0;
        assert!((state.balance_in_currency() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_reset_session() {
        let mut state = WalletState::default();
        state.status = ConnectionStatus::Connected;
        state.address = Some(Address::repeat_byte(1));
        state.token_balance = units(1);
        state.selected_currency = Currency::Eur;
        let session = state.session;

        state.reset_session();

        assert!(!state.is_connected());
        assert!(state.address.is_none());
        assert!(state.token_balance.is_zero());
        assert_eq!(state.selected_currency, Currency::Eur);
        assert_eq!(state.session, session + 1);
    }
}
