// ============================================================================
// Trait : Chain (collaborateur blockchain)
// ============================================================================
// Tout ce que le store sait de la blockchain passe par ce trait : connexion,
// balances, métadonnées du token, transferts, gas, oracle de prix.
//
// CONCEPTS RUST :
// 1. Trait objet : le store tient un Arc<dyn Chain>, l'implémentation réelle
//    (JsonRpcChain) ou un mock dans les tests
// 2. async_trait : méthodes async dans un trait utilisable en dyn
// 3. mpsc channel : les notifications compte / réseau sont des messages
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::{Currency, Receipt, TokenInfo};

#[async_trait]
pub trait Chain: Send + Sync {
    /// Demande l'accès au wallet et retourne l'adresse active
    async fn connect(&self) -> Result<Address>;

    /// Comptes actuellement exposés par le provider
    async fn accounts(&self) -> Result<Vec<Address>>;

    async fn chain_id(&self) -> Result<u64>;

    /// Balance native (ETH) en wei
    async fn native_balance(&self, owner: Address) -> Result<U256>;

    /// Balance ERC-20 en base units
    async fn token_balance(&self, owner: Address, token: Address) -> Result<U256>;

    async fn token_info(&self, token: Address) -> Result<TokenInfo>;

    /// Envoie `amount` (décimal, ex: "10") de tokens à `to` et attend le reçu
    ///
    /// `to` et `amount` ne sont pas validés par l'appelant du store : une
    /// adresse ou un montant invalide est une erreur de cette méthode.
    async fn transfer_token(
        &self,
        from: Address,
        to: &str,
        amount: &str,
        token: Address,
    ) -> Result<Receipt>;

    async fn estimate_transfer_gas(
        &self,
        from: Address,
        to: &str,
        amount: &str,
        token: Address,
    ) -> Result<U256>;

    async fn gas_price(&self) -> Result<U256>;

    /// Prix USD d'une devise selon l'oracle
    async fn price(&self, currency: Currency, oracle: Address) -> Result<f64>;

    /// Reçu d'une transaction, None tant qu'elle n'est pas minée
    async fn receipt(&self, hash: &str) -> Result<Option<Receipt>>;
}

/// Notifications du provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Liste des comptes exposés ; vide = l'utilisateur a déconnecté le wallet
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

/// Surveille les comptes et le chain id et émet un événement à chaque changement
///
/// CONCEPT : Polling + channel
/// - Un nœud JSON-RPC n'a pas de push pour ces changements, on interroge
///   périodiquement et on compare à la dernière valeur vue
/// - La tâche s'arrête d'elle-même quand le receiver est droppé
/// - Une erreur de polling est loggée, la tâche continue
pub fn spawn_provider_watcher(
    chain: Arc<dyn Chain>,
    interval: Duration,
) -> (JoinHandle<()>, mpsc::Receiver<ProviderEvent>) {
    let (tx, rx) = mpsc::channel(16);

    let handle = tokio::spawn(async move {
        let mut last_accounts: Option<Vec<Address>> = None;
        let mut last_chain: Option<u64> = None;
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;

            match chain.accounts().await {
                Ok(accounts) => {
                    if last_accounts.as_ref().is_some_and(|prev| *prev != accounts) {
                        info!(count = accounts.len(), "Provider accounts changed");
                        if tx.send(ProviderEvent::AccountsChanged(accounts.clone())).await.is_err() {
                            break;
                        }
                    }
                    last_accounts = Some(accounts);
                }
                Err(e) => warn!(error = %e, "Failed to poll accounts"),
            }

            match chain.chain_id().await {
                Ok(chain_id) => {
                    if last_chain.is_some_and(|prev| prev != chain_id) {
                        info!(chain_id, "Provider network changed");
                        if tx.send(ProviderEvent::ChainChanged(chain_id)).await.is_err() {
                            break;
                        }
                    }
                    last_chain = Some(chain_id);
                }
                Err(e) => warn!(error = %e, "Failed to poll chain id"),
            }

            if tx.is_closed() {
                break;
            }
        }

        debug!("Provider watcher exiting (receiver dropped)");
    });

    (handle, rx)
}
