// ============================================================================
// MockChain : implémentation scriptée de Chain pour les tests
// ============================================================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, U256};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::Notify;

use crate::models::{Currency, Receipt, TokenInfo};
use crate::wallet::Chain;

/// Résultat scripté : Ok(valeur) ou Err(message)
type Scripted<T> = Mutex<Result<T, String>>;

fn scripted<T: Clone>(value: &Scripted<T>) -> Result<T> {
    value.lock().unwrap().clone().map_err(|e| anyhow!(e))
}

/// Attend la notification si une barrière est installée
async fn pass(gate: &Mutex<Option<Arc<Notify>>>) {
    let gate = gate.lock().unwrap().clone();
    if let Some(gate) = gate {
        gate.notified().await;
    }
}

pub(crate) struct MockChain {
    pub connect: Scripted<Address>,
    pub accounts: Mutex<Vec<Address>>,
    pub chain_id: Mutex<u64>,
    pub native_balance: Scripted<U256>,
    pub token_balance: Scripted<U256>,
    pub token_info: Scripted<TokenInfo>,
    pub prices: Mutex<HashMap<Currency, Result<f64, String>>>,
    pub transfer: Scripted<Receipt>,
    pub gas_estimate: Scripted<U256>,
    pub gas_price: Scripted<U256>,
    pub receipts: Mutex<HashMap<String, Receipt>>,

    /// Appels à transfer_token : (from, to, amount)
    pub transfers: Mutex<Vec<(Address, String, String)>>,

    /// Si présentes, ces méthodes attendent une notification avant de répondre
    pub balance_gate: Mutex<Option<Arc<Notify>>>,
    pub transfer_gate: Mutex<Option<Arc<Notify>>>,
    pub receipt_gate: Mutex<Option<Arc<Notify>>>,
}

pub(crate) fn alice() -> Address {
    Address::repeat_byte(0xa1)
}

pub(crate) fn bob() -> Address {
    Address::repeat_byte(0xb0)
}

impl MockChain {
    pub(crate) fn new() -> Self {
        let prices = Currency::ALL
            .iter()
            .map(|c| (*c, Ok(c.default_rate() * 2.0)))
            .collect();

        Self {
            connect: Mutex::new(Ok(alice())),
            accounts: Mutex::new(vec![alice()]),
            chain_id: Mutex::new(31337),
            native_balance: Mutex::new(Ok(U256::from(5_000_000_000_000_000_000u128))),
            token_balance: Mutex::new(Ok(U256::from(100_000_000_000_000_000_000u128))),
            token_info: Mutex::new(Ok(TokenInfo {
                name: "BigBlackCoin".to_string(),
                symbol: "BBC".to_string(),
                decimals: 18,
                total_supply: U256::from(1_000_000u64),
            })),
            prices: Mutex::new(prices),
            transfer: Mutex::new(Ok(Receipt {
                hash: "0xabc".to_string(),
                status: 1,
                gas_used: Some(U256::from(21_000u64)),
            })),
            gas_estimate: Mutex::new(Ok(U256::from(52_000u64))),
            gas_price: Mutex::new(Ok(U256::from(1_875_000_000u64))),
            receipts: Mutex::new(HashMap::new()),
            transfers: Mutex::new(Vec::new()),
            balance_gate: Mutex::new(None),
            transfer_gate: Mutex::new(None),
            receipt_gate: Mutex::new(None),
        }
    }

    pub(crate) fn set_price(&self, currency: Currency, price: Result<f64, &str>) {
        self.prices
            .lock()
            .unwrap()
            .insert(currency, price.map_err(str::to_string));
    }
}

#[async_trait]
impl Chain for MockChain {
    async fn connect(&self) -> Result<Address> {
        scripted(&self.connect)
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(*self.chain_id.lock().unwrap())
    }

    async fn native_balance(&self, _owner: Address) -> Result<U256> {
        pass(&self.balance_gate).await;
        scripted(&self.native_balance)
    }

    async fn token_balance(&self, _owner: Address, _token: Address) -> Result<U256> {
        scripted(&self.token_balance)
    }

    async fn token_info(&self, _token: Address) -> Result<TokenInfo> {
        scripted(&self.token_info)
    }

    async fn transfer_token(
        &self,
        from: Address,
        to: &str,
        amount: &str,
        _token: Address,
    ) -> Result<Receipt> {
        self.transfers
            .lock()
            .unwrap()
            .push((from, to.to_string(), amount.to_string()));
        pass(&self.transfer_gate).await;
        scripted(&self.transfer)
    }

    async fn estimate_transfer_gas(
        &self,
        _from: Address,
        _to: &str,
        _amount: &str,
        _token: Address,
    ) -> Result<U256> {
        scripted(&self.gas_estimate)
    }

    async fn gas_price(&self) -> Result<U256> {
        scripted(&self.gas_price)
    }

    async fn price(&self, currency: Currency, _oracle: Address) -> Result<f64> {
        self.prices
            .lock()
            .unwrap()
            .get(&currency)
            .cloned()
            .unwrap_or_else(|| Err(format!("unknown currency {}", currency)))
            .map_err(|e| anyhow!(e))
    }

    async fn receipt(&self, hash: &str) -> Result<Option<Receipt>> {
        pass(&self.receipt_gate).await;
        Ok(self.receipts.lock().unwrap().get(hash).cloned())
    }
}
