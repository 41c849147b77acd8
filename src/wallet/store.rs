// ============================================================================
// Structure : WalletStore
// ============================================================================
// Source de vérité unique pour l'état du wallet
//
// PATTERN : "Application State" (comme App dans une app TUI)
// - Tous les lecteurs lisent un snapshot de WalletState
// - Toutes les modifications passent par les actions nommées du store
// - Pas de singleton global : le store est une valeur possédée, partagée
//   explicitement via Arc par ceux qui en ont besoin
//
// CONCEPTS RUST :
// 1. Mutex<WalletState> : jamais tenu pendant un .await, chaque action
//    copie ce dont elle a besoin, relâche le verrou, puis appelle le réseau
// 2. tokio::join! / try_join! : requêtes indépendantes lancées ensemble
// 3. Session : chaque action note la session au départ ; un résultat qui
//    arrive après une déconnexion ou un changement de compte est ignoré
//
// POLITIQUE D'ERREURS :
// - Rafraîchissements en arrière-plan (balances, taux, token, gas) :
//   loggés seulement, l'état précédent est conservé
// - Actions utilisateur (connect, send) : message dans `error` + Err retourné
// ============================================================================

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy_primitives::Address;
use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info, instrument, warn};

use crate::config::DeploymentInfo;
use crate::models::{
    Currency, Transaction, TransactionHistory, TransactionStats, TxKind, TxStatus,
};
use crate::wallet::storage::{SELECTED_CURRENCY_KEY, TX_HISTORY_KEY};
use crate::wallet::{Chain, ConnectionStatus, KeyValueStore, ProviderEvent, WalletState};

pub struct WalletStore {
    chain: Arc<dyn Chain>,
    storage: Arc<dyn KeyValueStore>,
    deployment: DeploymentInfo,
    state: Mutex<WalletState>,
}

impl WalletStore {
    pub fn new(
        chain: Arc<dyn Chain>,
        storage: Arc<dyn KeyValueStore>,
        deployment: DeploymentInfo,
    ) -> Self {
        Self {
            chain,
            storage,
            deployment,
            state: Mutex::new(WalletState::default()),
        }
    }

    /// Copie de l'état courant pour l'affichage
    pub fn snapshot(&self) -> WalletState {
        self.state().clone()
    }

    // ========================================================================
    // Connexion
    // ========================================================================

    /// Disconnected -> Connecting -> Connected (ou retour à Disconnected)
    ///
    /// En cas de succès, lance le chargement initial (historique, balances,
    /// taux, métadonnées du token, devise préférée).
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<()> {
        {
            let mut state = self.state();
            state.status = ConnectionStatus::Connecting;
            state.error = None;
        }

        let address = match self.chain.connect().await {
            Ok(address) => address,
            Err(e) => {
                error!(error = %e, "Wallet connection failed");
                let mut state = self.state();
                state.reset_session();
                state.error = Some(e.to_string());
                return Err(e);
            }
        };

        let token = parse_contract(&self.deployment.contracts.big_black_coin, "BigBlackCoin");
        let oracle = parse_contract(&self.deployment.contracts.mock_oracle, "MockOracle");

        {
            let mut state = self.state();
            state.address = Some(address);
            state.status = ConnectionStatus::Connected;
            state.token_address = token;
            state.oracle_address = oracle;
            state.session += 1;
        }
        info!(%address, "Wallet connected");

        self.load_initial_data().await;
        Ok(())
    }

    /// Connected -> Disconnected
    ///
    /// Vide l'adresse, les balances et l'historique en mémoire. L'historique
    /// persistant n'est pas touché.
    pub fn disconnect(&self) {
        self.state().reset_session();
        info!("Wallet disconnected");
    }

    /// Réagit à un changement de compte ou de réseau côté provider
    ///
    /// - aucun compte : déconnexion
    /// - nouveau compte : bascule d'adresse + rechargement, sans déconnexion
    /// - nouveau réseau : rechargement
    pub async fn handle_provider_event(&self, event: ProviderEvent) {
        if !self.state().is_connected() {
            debug!(?event, "Ignoring provider event while not connected");
            return;
        }

        match event {
            ProviderEvent::AccountsChanged(accounts) => match accounts.first().copied() {
                None => {
                    info!("Provider reported no accounts");
                    self.disconnect();
                }
                Some(account) => {
                    let switched = {
                        let mut state = self.state();
                        if state.address == Some(account) {
                            false
                        } else {
                            state.address = Some(account);
                            state.session += 1;
                            true
                        }
                    };

                    if switched {
                        info!(address = %account, "Active account changed");
                        self.load_initial_data().await;
                    }
                }
            },
            ProviderEvent::ChainChanged(chain_id) => {
                info!(chain_id, "Network changed, reloading");
                self.load_initial_data().await;
            }
        }
    }

    /// Chargement initial après connexion
    ///
    /// 1. Restaure l'historique persistant
    /// 2. Balances, taux et token en parallèle
    /// 3. Restaure la devise préférée
    pub async fn load_initial_data(&self) {
        self.restore_history();

        tokio::join!(
            self.refresh_balances(),
            self.refresh_exchange_rates(),
            self.load_token_info(),
        );

        self.restore_currency();
    }

    // ========================================================================
    // Rafraîchissements (best effort)
    // ========================================================================

    /// Recharge les balances ETH et BBC
    ///
    /// Les deux balances sont écrites ensemble ou pas du tout.
    #[instrument(skip(self))]
    pub async fn refresh_balances(&self) {
        let (session, address, token) = {
            let state = self.state();
            if !state.is_connected() {
                debug!("Not connected, skipping balance refresh");
                return;
            }
            (state.session, state.address, state.token_address)
        };

        let (Some(address), Some(token)) = (address, token) else {
            debug!("Address or token contract unknown, skipping balance refresh");
            return;
        };

        let result = tokio::try_join!(
            self.chain.native_balance(address),
            self.chain.token_balance(address, token),
        );

        match result {
            Ok((native, token_balance)) => {
                let applied = self.update_if_current(session, |state| {
                    state.native_balance = native;
                    state.token_balance = token_balance;
                    state.balances_refreshed_at = Some(Utc::now());
                });
                if applied {
                    debug!(%native, token = %token_balance, "Balances refreshed");
                } else {
                    debug!("Discarding balances from a previous session");
                }
            }
            Err(e) => error!(error = %e, "Failed to refresh balances"),
        }
    }

    /// Recharge le taux de chaque devise depuis l'oracle
    ///
    /// Chaque devise est interrogée séparément : une devise en échec garde
    /// son taux précédent sans affecter les autres.
    #[instrument(skip(self))]
    pub async fn refresh_exchange_rates(&self) {
        let (session, oracle) = {
            let state = self.state();
            (state.session, state.oracle_address)
        };

        let Some(oracle) = oracle else {
            debug!("Oracle unknown, skipping rate refresh");
            return;
        };

        let results = join_all(Currency::ALL.iter().map(|&currency| async move {
            (currency, self.chain.price(currency, oracle).await)
        }))
        .await;

        let mut fresh = Vec::with_capacity(results.len());
        for (currency, result) in results {
            match result {
                Ok(rate) => fresh.push((currency, rate)),
                Err(e) => warn!(%currency, error = %e, "Failed to fetch rate, keeping previous value"),
            }
        }

        let updated = fresh.len();
        let applied = self.update_if_current(session, |state| {
            for (currency, rate) in fresh {
                state.exchange_rates.set(currency, rate);
            }
            if updated > 0 {
                state.rates_refreshed_at = Some(Utc::now());
            }
        });

        if applied {
            debug!(updated, total = Currency::ALL.len(), "Exchange rates refreshed");
        } else {
            debug!("Discarding rates from a previous session");
        }
    }

    /// Recharge name / symbol / decimals / totalSupply du token
    #[instrument(skip(self))]
    pub async fn load_token_info(&self) {
        let (session, token) = {
            let state = self.state();
            (state.session, state.token_address)
        };

        let Some(token) = token else {
            debug!("Token contract unknown, skipping token info");
            return;
        };

        match self.chain.token_info(token).await {
            Ok(info) => {
                debug!(name = %info.name, symbol = %info.symbol, decimals = info.decimals, "Token info loaded");
                self.update_if_current(session, |state| state.token = info);
            }
            Err(e) => error!(error = %e, "Failed to load token info"),
        }
    }

    /// Estimation du gas pour un transfert (indication pour l'UI uniquement)
    #[instrument(skip(self))]
    pub async fn estimate_gas(&self, to: &str, amount: &str) {
        let (session, address, token) = {
            let state = self.state();
            (state.session, state.address, state.token_address)
        };

        let (Some(address), Some(token)) = (address, token) else {
            debug!("Not connected or token unknown, skipping gas estimate");
            return;
        };

        let result = tokio::try_join!(
            self.chain.estimate_transfer_gas(address, to, amount, token),
            self.chain.gas_price(),
        );

        match result {
            Ok((gas, price)) => {
                debug!(%gas, %price, "Gas estimated");
                self.update_if_current(session, |state| {
                    state.estimated_gas = gas;
                    state.gas_price = price;
                });
            }
            Err(e) => error!(error = %e, "Failed to estimate gas"),
        }
    }

    // ========================================================================
    // Envoi
    // ========================================================================

    /// Envoie `amount` BBC à `to` et retourne le hash de la transaction
    ///
    /// Le store ne valide ni l'adresse ni la balance : c'est à l'appelant de
    /// le faire avant (voir `utils::is_valid_address`). Seuls les échecs
    /// réseau / contrat sont interceptés : ils sont stockés dans `error`
    /// et retournés.
    #[instrument(skip(self))]
    pub async fn send_token(&self, to: &str, amount: &str) -> Result<String> {
        let timestamp = Utc::now().timestamp_millis();
        let (session, address, token, symbol) = {
            let mut state = self.state();
            state.error = None;
            (
                state.session,
                state.address,
                state.token_address,
                state.token.symbol.clone(),
            )
        };

        let result = async {
            let from = address.context("Wallet not connected")?;
            let token = token.context("Token contract address unknown")?;
            let receipt = self.chain.transfer_token(from, to, amount, token).await?;
            Ok::<_, anyhow::Error>((from, receipt))
        }
        .await;

        let (from, receipt) = match result {
            Ok(sent) => sent,
            Err(e) => {
                error!(error = %e, "Token transfer failed");
                let message = e.to_string();
                self.update_if_current(session, |state| state.error = Some(message));
                return Err(e);
            }
        };

        let status = if receipt.is_success() {
            TxStatus::Success
        } else {
            TxStatus::Failed
        };
        info!(hash = %receipt.hash, ?status, "Token transfer confirmed");

        let tx = Transaction {
            hash: receipt.hash.clone(),
            from: from.to_string(),
            to: to.to_string(),
            amount: amount.to_string(),
            timestamp,
            status,
            kind: TxKind::Send,
            token_symbol: symbol,
            gas_used: receipt.gas_used.map(|gas| gas.to_string()),
        };
        self.modify_history(Some(session), |history| history.push(tx));

        self.refresh_balances().await;

        Ok(receipt.hash)
    }

    // ========================================================================
    // Devise, erreurs, historique
    // ========================================================================

    /// Change la devise d'affichage et la persiste immédiatement
    pub fn set_selected_currency(&self, currency: Currency) {
        self.state().selected_currency = currency;
        if let Err(e) = self.storage.set(SELECTED_CURRENCY_KEY, currency.as_str()) {
            warn!(%currency, error = %e, "Failed to persist selected currency");
        }
    }

    pub fn clear_error(&self) {
        self.state().error = None;
    }

    /// Ajoute une transaction en tête d'historique et persiste la liste
    ///
    /// L'ensemble des transactions en attente suit le statut de l'entrée
    /// ajoutée (une entrée qui en remplace une autre compris).
    pub fn add_transaction(&self, tx: Transaction) {
        debug!(hash = %tx.hash, status = ?tx.status, "Adding transaction");
        self.modify_history(None, |history| history.push(tx));
    }

    /// Met à jour le statut d'une transaction, la retire des transactions en
    /// attente, et persiste la liste
    pub fn update_transaction_status(&self, hash: &str, status: TxStatus) {
        self.modify_history(None, |history| {
            if !history.set_status(hash, status) {
                debug!(%hash, "Status update for unknown transaction");
            }
        });
    }

    /// Interroge la chaîne pour chaque transaction en attente
    pub async fn poll_pending(&self) {
        let (session, pending) = {
            let state = self.state();
            let pending: Vec<String> = state.pending_transactions.iter().cloned().collect();
            (state.session, pending)
        };

        for hash in pending {
            match self.chain.receipt(&hash).await {
                Ok(Some(receipt)) => {
                    let status = if receipt.is_success() {
                        TxStatus::Success
                    } else {
                        TxStatus::Failed
                    };
                    info!(%hash, ?status, "Pending transaction mined");
                    self.modify_history(Some(session), |history| {
                        history.set_status(&hash, status);
                    });
                }
                Ok(None) => debug!(%hash, "Transaction still pending"),
                Err(e) => warn!(%hash, error = %e, "Failed to fetch receipt"),
            }
        }
    }

    // ========================================================================
    // Lecture
    // ========================================================================

    pub fn transaction_stats(&self) -> TransactionStats {
        self.state().transactions.stats()
    }

    pub fn recent_transactions(&self, n: usize) -> Vec<Transaction> {
        self.state().transactions.recent(n)
    }

    pub fn transactions_by_type(&self, kind: TxKind) -> Vec<Transaction> {
        self.state().transactions.by_kind(kind)
    }

    /// Valeur totale BBC + ETH dans la devise sélectionnée
    pub fn balance_in_currency(&self) -> f64 {
        self.state().balance_in_currency()
    }

    pub fn token_in_currency(&self) -> f64 {
        self.state().token_in_currency()
    }

    // ========================================================================
    // Interne
    // ========================================================================

    fn state(&self) -> MutexGuard<'_, WalletState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applique `apply` seulement si la session n'a pas changé depuis `session`
    fn update_if_current<F>(&self, session: u64, apply: F) -> bool
    where
        F: FnOnce(&mut WalletState),
    {
        let mut state = self.state();
        if state.session != session {
            return false;
        }
        apply(&mut state);
        true
    }

    /// Applique une modification à l'historique
    ///
    /// - session active (et égale à `session` si fournie) : en mémoire, puis
    ///   la liste complète est persistée
    /// - sinon : la modification est fusionnée dans l'historique persisté,
    ///   la liste en mémoire (vidée par la déconnexion) n'est jamais écrite
    ///
    /// Le verrou d'état reste pris pendant l'écriture : deux écritures de
    /// l'historique ne peuvent pas s'entrelacer.
    fn modify_history<F>(&self, session: Option<u64>, apply: F)
    where
        F: FnOnce(&mut TransactionHistory),
    {
        let mut state = self.state();
        let current = state.is_connected() && session.map_or(true, |s| s == state.session);

        if current {
            apply(&mut state.transactions);
            state.pending_transactions = pending_hashes(&state.transactions);
            self.persist_history(&state.transactions);
        } else {
            debug!("Session ended, merging history change into storage");
            let mut stored = self.load_history().unwrap_or_default();
            apply(&mut stored);
            self.persist_history(&stored);
        }
    }

    fn persist_history(&self, history: &TransactionHistory) {
        let result = serde_json::to_string(history.as_slice())
            .context("Échec de la sérialisation de l'historique")
            .and_then(|json| self.storage.set(TX_HISTORY_KEY, &json));

        if let Err(e) = result {
            warn!(error = %e, "Failed to persist transaction history");
        }
    }

    /// Historique persisté, None s'il est absent ou illisible
    fn load_history(&self) -> Option<TransactionHistory> {
        let raw = match self.storage.get(TX_HISTORY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read transaction history");
                return None;
            }
        };

        match serde_json::from_str::<Vec<Transaction>>(&raw) {
            Ok(entries) => Some(TransactionHistory::from_entries(entries)),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable transaction history");
                None
            }
        }
    }

    fn restore_history(&self) {
        if let Some(history) = self.load_history() {
            let mut state = self.state();
            state.pending_transactions = pending_hashes(&history);
            debug!(count = history.len(), "Restored transaction history");
            state.transactions = history;
        }
    }

    fn restore_currency(&self) {
        match self.storage.get(SELECTED_CURRENCY_KEY) {
            Ok(Some(saved)) => match Currency::from_str(&saved) {
                Ok(currency) => self.state().selected_currency = currency,
                Err(_) => warn!(value = %saved, "Ignoring unknown saved currency"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read saved currency"),
        }
    }
}

fn pending_hashes(history: &TransactionHistory) -> HashSet<String> {
    history
        .as_slice()
        .iter()
        .filter(|tx| tx.is_pending())
        .map(|tx| tx.hash.clone())
        .collect()
}

/// Adresse de contrat issue du fichier de déploiement, None si vide ou invalide
fn parse_contract(raw: &str, name: &str) -> Option<Address> {
    if raw.is_empty() {
        warn!(contract = name, "Contract not deployed");
        return None;
    }
    match Address::from_str(raw) {
        Ok(address) => Some(address),
        Err(e) => {
            warn!(contract = name, value = raw, error = %e, "Invalid contract address");
            None
        }
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use tokio::sync::Notify;

    use crate::config::DeployedContracts;
    use crate::models::{Receipt, MAX_TRANSACTIONS};
    use crate::wallet::mock::{alice, bob, MockChain};
    use crate::wallet::MemoryStorage;

    fn deployment() -> DeploymentInfo {
        DeploymentInfo {
            contracts: DeployedContracts {
                mock_oracle: Address::repeat_byte(0x0c).to_string(),
                big_black_coin: Address::repeat_byte(0x0b).to_string(),
            },
            ..DeploymentInfo::default()
        }
    }

    fn setup() -> (Arc<MockChain>, Arc<MemoryStorage>, WalletStore) {
        let chain = Arc::new(MockChain::new());
        let storage = Arc::new(MemoryStorage::new());
        let store = WalletStore::new(chain.clone(), storage.clone(), deployment());
        (chain, storage, store)
    }

    fn tx(hash: &str, status: TxStatus) -> Transaction {
        Transaction {
            hash: hash.to_string(),
            from: alice().to_string(),
            to: bob().to_string(),
            amount: "1".to_string(),
            timestamp: 1_700_000_000_000,
            status,
            kind: TxKind::Send,
            token_symbol: "BBC".to_string(),
            gas_used: None,
        }
    }

    fn persisted_history(storage: &MemoryStorage) -> Vec<Transaction> {
        let raw = storage.get(TX_HISTORY_KEY).unwrap().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn test_connect_loads_initial_data() {
        let (_chain, _storage, store) = setup();

        store.connect().await.unwrap();
        let state = store.snapshot();

        assert!(state.is_connected());
        assert_eq!(state.address, Some(alice()));
        assert_eq!(state.native_balance, U256::from(5_000_000_000_000_000_000u128));
        assert_eq!(state.token_balance, U256::from(100_000_000_000_000_000_000u128));
        assert_eq!(state.exchange_rates.get(Currency::Eth), 6000.0);
        assert_eq!(state.token.total_supply, U256::from(1_000_000u64));
        assert!(state.balances_refreshed_at.is_some());
        assert!(state.rates_refreshed_at.is_some());
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_connect_failure_sets_error() {
        let (chain, _storage, store) = setup();
        *chain.connect.lock().unwrap() = Err("No wallet found".to_string());

        let result = store.connect().await;
        let state = store.snapshot();

        assert!(result.is_err());
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert_eq!(state.error.as_deref(), Some("No wallet found"));
        assert!(state.address.is_none());
    }

    #[tokio::test]
    async fn test_connect_restores_history_and_currency() {
        let (_chain, storage, store) = setup();
        let saved = vec![tx("0x2", TxStatus::Pending), tx("0x1", TxStatus::Success)];
        storage
            .set(TX_HISTORY_KEY, &serde_json::to_string(&saved).unwrap())
            .unwrap();
        storage.set(SELECTED_CURRENCY_KEY, "GBP").unwrap();

        store.connect().await.unwrap();
        let state = store.snapshot();

        assert_eq!(state.transactions.len(), 2);
        assert_eq!(state.transactions.as_slice()[0].hash, "0x2");
        assert!(state.pending_transactions.contains("0x2"));
        assert_eq!(state.selected_currency, Currency::Gbp);
    }

    #[tokio::test]
    async fn test_unknown_saved_currency_is_ignored() {
        let (_chain, storage, store) = setup();
        storage.set(SELECTED_CURRENCY_KEY, "JPY").unwrap();

        store.connect().await.unwrap();
        assert_eq!(store.snapshot().selected_currency, Currency::Usd);
    }

    #[tokio::test]
    async fn test_missing_contracts_skip_refreshes() {
        let chain = Arc::new(MockChain::new());
        let storage = Arc::new(MemoryStorage::new());
        let store = WalletStore::new(chain, storage, DeploymentInfo::default());

        store.connect().await.unwrap();
        let state = store.snapshot();

        assert!(state.is_connected());
        assert!(state.token_balance.is_zero());
        assert!(state.balances_refreshed_at.is_none());
        assert_eq!(state.exchange_rates.get(Currency::Eth), 3000.0);
    }

    #[tokio::test]
    async fn test_refresh_balances_is_noop_when_disconnected() {
        let (_chain, _storage, store) = setup();

        store.refresh_balances().await;

        let state = store.snapshot();
        assert!(state.native_balance.is_zero());
        assert!(state.balances_refreshed_at.is_none());
    }

    #[tokio::test]
    async fn test_partial_balance_failure_keeps_both_values() {
        let (chain, _storage, store) = setup();
        store.connect().await.unwrap();
        let before = store.snapshot();

        *chain.native_balance.lock().unwrap() = Ok(U256::from(1u64));
        *chain.token_balance.lock().unwrap() = Err("rpc timeout".to_string());
        store.refresh_balances().await;

        let after = store.snapshot();
        assert_eq!(after.native_balance, before.native_balance);
        assert_eq!(after.token_balance, before.token_balance);
        assert_eq!(after.balances_refreshed_at, before.balances_refreshed_at);
        assert!(after.error.is_none());
    }

    #[tokio::test]
    async fn test_rate_failure_is_isolated_per_symbol() {
        let (chain, _storage, store) = setup();
        store.connect().await.unwrap();
        let eur_before = store.snapshot().exchange_rates.get(Currency::Eur);

        chain.set_price(Currency::Eur, Err("unsupported"));
        chain.set_price(Currency::Usd, Ok(1.01));
        chain.set_price(Currency::Bbc, Ok(0.5));
        store.refresh_exchange_rates().await;

        let rates = store.snapshot().exchange_rates;
        assert_eq!(rates.get(Currency::Usd), 1.01);
        assert_eq!(rates.get(Currency::Bbc), 0.5);
        assert_eq!(rates.get(Currency::Eur), eur_before);
    }

    #[tokio::test]
    async fn test_disconnect_resets_but_keeps_storage() {
        let (_chain, storage, store) = setup();
        store.connect().await.unwrap();
        store.add_transaction(tx("0x1", TxStatus::Success));

        store.disconnect();
        let state = store.snapshot();

        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert!(state.address.is_none());
        assert!(state.native_balance.is_zero());
        assert!(state.token_balance.is_zero());
        assert!(state.transactions.is_empty());
        assert_eq!(persisted_history(&storage).len(), 1);
    }

    #[tokio::test]
    async fn test_send_token_happy_path() {
        let (chain, storage, store) = setup();
        store.connect().await.unwrap();

        let hash = store.send_token("0xRecipient", "10").await.unwrap();
        assert_eq!(hash, "0xabc");

        let state = store.snapshot();
        let sent = state.transactions.get("0xabc").unwrap();
        assert_eq!(sent.status, TxStatus::Success);
        assert_eq!(sent.kind, TxKind::Send);
        assert_eq!(sent.to, "0xRecipient");
        assert_eq!(sent.amount, "10");
        assert_eq!(sent.gas_used.as_deref(), Some("21000"));
        assert_eq!(sent.from, alice().to_string());

        let transfers = chain.transfers.lock().unwrap().clone();
        assert_eq!(transfers, vec![(alice(), "0xRecipient".to_string(), "10".to_string())]);
        assert_eq!(persisted_history(&storage)[0].hash, "0xabc");
    }

    #[tokio::test]
    async fn test_send_token_reverted_receipt_is_failed() {
        let (chain, _storage, store) = setup();
        store.connect().await.unwrap();
        *chain.transfer.lock().unwrap() = Ok(Receipt {
            hash: "0xdead".to_string(),
            status: 0,
            gas_used: Some(U256::from(30_000u64)),
        });

        let hash = store.send_token("0xRecipient", "1").await.unwrap();

        assert_eq!(hash, "0xdead");
        let state = store.snapshot();
        assert_eq!(state.transactions.get("0xdead").unwrap().status, TxStatus::Failed);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_send_token_failure_sets_error() {
        let (chain, _storage, store) = setup();
        store.connect().await.unwrap();
        *chain.transfer.lock().unwrap() = Err("execution reverted".to_string());

        let err = store.send_token("0xRecipient", "10").await.unwrap_err();

        assert!(err.to_string().contains("execution reverted"));
        let state = store.snapshot();
        assert_eq!(state.error.as_deref(), Some("execution reverted"));
        assert!(state.transactions.is_empty());

        store.clear_error();
        assert!(store.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn test_send_token_when_disconnected() {
        let (chain, _storage, store) = setup();

        assert!(store.send_token("0xRecipient", "10").await.is_err());
        assert!(store.snapshot().error.is_some());
        assert!(chain.transfers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_estimate_gas() {
        let (chain, _storage, store) = setup();
        store.connect().await.unwrap();

        store.estimate_gas("0xRecipient", "10").await;
        let state = store.snapshot();
        assert_eq!(state.estimated_gas, U256::from(52_000u64));
        assert_eq!(state.gas_price, U256::from(1_875_000_000u64));

        *chain.gas_price.lock().unwrap() = Err("boom".to_string());
        *chain.gas_estimate.lock().unwrap() = Ok(U256::from(1u64));
        store.estimate_gas("0xRecipient", "10").await;
        let state = store.snapshot();
        assert_eq!(state.estimated_gas, U256::from(52_000u64));
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_set_selected_currency_persists() {
        let (_chain, storage, store) = setup();

        store.set_selected_currency(Currency::Eth);

        assert_eq!(store.snapshot().selected_currency, Currency::Eth);
        assert_eq!(storage.get(SELECTED_CURRENCY_KEY).unwrap().as_deref(), Some("ETH"));
    }

    #[tokio::test]
    async fn test_pending_transaction_lifecycle() {
        let (chain, storage, store) = setup();
        store.connect().await.unwrap();

        store.add_transaction(tx("0xp1", TxStatus::Pending));
        store.add_transaction(tx("0xp2", TxStatus::Pending));
        assert_eq!(store.snapshot().pending_transactions.len(), 2);

        store.update_transaction_status("0xp1", TxStatus::Failed);
        let state = store.snapshot();
        assert!(!state.pending_transactions.contains("0xp1"));
        assert_eq!(state.transactions.get("0xp1").unwrap().status, TxStatus::Failed);
        assert_eq!(
            persisted_history(&storage)
                .iter()
                .find(|t| t.hash == "0xp1")
                .unwrap()
                .status,
            TxStatus::Failed
        );

        chain.receipts.lock().unwrap().insert(
            "0xp2".to_string(),
            Receipt {
                hash: "0xp2".to_string(),
                status: 1,
                gas_used: None,
            },
        );
        store.poll_pending().await;

        let state = store.snapshot();
        assert!(state.pending_transactions.is_empty());
        assert_eq!(state.transactions.get("0xp2").unwrap().status, TxStatus::Success);
        assert_eq!(store.transaction_stats().successful, 1);
    }

    #[tokio::test]
    async fn test_history_is_capped_and_persisted() {
        let (_chain, storage, store) = setup();
        store.connect().await.unwrap();

        for i in 0..=MAX_TRANSACTIONS {
            store.add_transaction(tx(&format!("0x{}", i), TxStatus::Success));
        }

        let state = store.snapshot();
        assert_eq!(state.transactions.len(), MAX_TRANSACTIONS);
        assert!(state.transactions.get("0x0").is_none());
        assert!(state.transactions.get(&format!("0x{}", MAX_TRANSACTIONS)).is_some());
        assert_eq!(persisted_history(&storage).len(), MAX_TRANSACTIONS);
    }

    #[tokio::test]
    async fn test_provider_events() {
        let (chain, _storage, store) = setup();
        store.connect().await.unwrap();

        store
            .handle_provider_event(ProviderEvent::AccountsChanged(vec![bob()]))
            .await;
        let state = store.snapshot();
        assert!(state.is_connected());
        assert_eq!(state.address, Some(bob()));
        assert!(!state.token_balance.is_zero());

        *chain.token_balance.lock().unwrap() = Ok(U256::from(42u64));
        chain.set_price(Currency::Eth, Ok(4000.0));
        store.handle_provider_event(ProviderEvent::ChainChanged(1)).await;
        let state = store.snapshot();
        assert!(state.is_connected());
        assert_eq!(state.token_balance, U256::from(42u64));
        assert_eq!(state.exchange_rates.get(Currency::Eth), 4000.0);

        store
            .handle_provider_event(ProviderEvent::AccountsChanged(Vec::new()))
            .await;
        assert_eq!(store.snapshot().status, ConnectionStatus::Disconnected);

        // Ignoré une fois déconnecté
        store
            .handle_provider_event(ProviderEvent::AccountsChanged(vec![alice()]))
            .await;
        assert!(store.snapshot().address.is_none());
    }

    #[tokio::test]
    async fn test_refresh_from_previous_session_is_discarded() {
        let (chain, _storage, store) = setup();
        store.connect().await.unwrap();
        store.disconnect();
        store.connect().await.unwrap();

        let gate = Arc::new(Notify::new());
        *chain.balance_gate.lock().unwrap() = Some(gate.clone());
        *chain.native_balance.lock().unwrap() = Ok(U256::from(7u64));

        tokio::join!(store.refresh_balances(), async {
            tokio::task::yield_now().await;
            store.disconnect();
            gate.notify_one();
        });

        let state = store.snapshot();
        assert!(state.native_balance.is_zero());
        assert!(state.address.is_none());
    }

    #[tokio::test]
    async fn test_failed_reconnect_resets_session() {
        let (chain, storage, store) = setup();
        store.connect().await.unwrap();
        store.add_transaction(tx("0x1", TxStatus::Success));

        *chain.connect.lock().unwrap() = Err("user rejected".to_string());
        assert!(store.connect().await.is_err());

        let state = store.snapshot();
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert!(state.address.is_none());
        assert!(state.token_balance.is_zero());
        assert!(state.native_balance.is_zero());
        assert!(state.transactions.is_empty());
        assert_eq!(state.error.as_deref(), Some("user rejected"));
        assert_eq!(persisted_history(&storage).len(), 1);
    }

    #[tokio::test]
    async fn test_replacing_pending_entry_clears_pending_set() {
        let (_chain, _storage, store) = setup();
        store.connect().await.unwrap();

        store.add_transaction(tx("0xp", TxStatus::Pending));
        assert!(store.snapshot().pending_transactions.contains("0xp"));

        store.add_transaction(tx("0xp", TxStatus::Success));
        let state = store.snapshot();
        assert!(state.pending_transactions.is_empty());
        assert_eq!(state.transactions.len(), 1);
        assert_eq!(state.transactions.get("0xp").unwrap().status, TxStatus::Success);
    }

    #[tokio::test]
    async fn test_send_confirmed_after_disconnect_keeps_durable_history() {
        let (chain, storage, store) = setup();
        let saved = vec![tx("0x2", TxStatus::Success), tx("0x1", TxStatus::Success)];
        storage
            .set(TX_HISTORY_KEY, &serde_json::to_string(&saved).unwrap())
            .unwrap();
        store.connect().await.unwrap();

        let gate = Arc::new(Notify::new());
        *chain.transfer_gate.lock().unwrap() = Some(gate.clone());

        let (result, _) = tokio::join!(store.send_token("0xRecipient", "1"), async {
            tokio::task::yield_now().await;
            store.disconnect();
            gate.notify_one();
        });

        assert_eq!(result.unwrap(), "0xabc");
        let state = store.snapshot();
        assert!(state.transactions.is_empty());
        assert!(state.error.is_none());

        let durable = persisted_history(&storage);
        let hashes: Vec<&str> = durable.iter().map(|t| t.hash.as_str()).collect();
        assert_eq!(hashes, vec!["0xabc", "0x2", "0x1"]);
    }

    #[tokio::test]
    async fn test_receipt_after_disconnect_updates_storage_only() {
        let (chain, storage, store) = setup();
        let saved = vec![
            tx("0xp", TxStatus::Pending),
            tx("0x2", TxStatus::Success),
            tx("0x1", TxStatus::Failed),
        ];
        storage
            .set(TX_HISTORY_KEY, &serde_json::to_string(&saved).unwrap())
            .unwrap();
        store.connect().await.unwrap();
        assert!(store.snapshot().pending_transactions.contains("0xp"));

        chain.receipts.lock().unwrap().insert(
            "0xp".to_string(),
            Receipt {
                hash: "0xp".to_string(),
                status: 1,
                gas_used: None,
            },
        );
        let gate = Arc::new(Notify::new());
        *chain.receipt_gate.lock().unwrap() = Some(gate.clone());

        tokio::join!(store.poll_pending(), async {
            tokio::task::yield_now().await;
            store.disconnect();
            gate.notify_one();
        });

        assert!(store.snapshot().transactions.is_empty());

        let durable = persisted_history(&storage);
        assert_eq!(durable.len(), 3);
        let mined = durable.iter().find(|t| t.hash == "0xp").unwrap();
        assert_eq!(mined.status, TxStatus::Success);
    }

    #[tokio::test]
    async fn test_add_transaction_while_disconnected_merges_into_storage() {
        let (_chain, storage, store) = setup();
        store.connect().await.unwrap();
        store.add_transaction(tx("0x1", TxStatus::Success));
        store.disconnect();

        store.add_transaction(tx("0x2", TxStatus::Pending));

        assert!(store.snapshot().transactions.is_empty());
        assert!(store.snapshot().pending_transactions.is_empty());
        assert_eq!(persisted_history(&storage).len(), 2);
    }

    #[tokio::test]
    async fn test_currency_helpers() {
        let (_chain, _storage, store) = setup();
        store.connect().await.unwrap();

        store.set_selected_currency(Currency::Bbc);
        assert_eq!(store.token_in_currency(), 100.0);
        assert!(store.balance_in_currency() > 100.0);
    }
}
