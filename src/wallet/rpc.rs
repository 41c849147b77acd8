// ============================================================================
// JsonRpcChain : implémentation de Chain sur un nœud Ethereum JSON-RPC
// ============================================================================
// Parle directement à un nœud local (Hardhat, Anvil) dont les comptes sont
// déverrouillés : eth_sendTransaction signe côté nœud, pas de clé privée ici.
//
// Méthodes JSON-RPC utilisées :
// - eth_accounts, eth_chainId, eth_getBalance, eth_gasPrice
// - eth_call (lecture de contrat), eth_estimateGas
// - eth_sendTransaction, eth_getTransactionReceipt
//
// CONCEPTS RUST :
// 1. Encodage ABI à la main : selector (4 octets) + arguments en mots de 32 octets
// 2. alloy-primitives : U256, Address, keccak256, hex
// 3. AtomicU64 : compteur d'id de requête partagé sans Mutex
// ============================================================================

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{hex, keccak256, Address, U256};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::models::{Currency, Receipt, TokenInfo};
use crate::utils::{parse_units, to_display};
use crate::wallet::Chain;

// Selectors ERC-20 : 4 premiers octets de keccak256(signature)
const BALANCE_OF: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
const TRANSFER: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
const DECIMALS: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];
const NAME: [u8; 4] = [0x06, 0xfd, 0xde, 0x03];
const SYMBOL: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41];
const TOTAL_SUPPLY: [u8; 4] = [0x18, 0x16, 0x0d, 0xdd];

/// Signature de la fonction de prix de l'oracle
const GET_PRICE_SIGNATURE: &str = "getPrice(string)";

/// Les prix de l'oracle ont 8 décimales
const ORACLE_DECIMALS: u8 = 8;

/// Marge ajoutée à l'estimation de gas d'un transfert (en %)
const GAS_BUFFER_PERCENT: u64 = 20;

pub struct JsonRpcChain {
    client: reqwest::Client,
    url: String,
    expected_chain_id: u64,
    account_index: usize,
    receipt_poll: Duration,
    receipt_max_polls: u32,
    next_id: AtomicU64,
}

/// Enveloppe de réponse JSON-RPC 2.0
#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Reçu tel que renvoyé par eth_getTransactionReceipt (quantités en hex)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    gas_used: Option<String>,
}

impl RawReceipt {
    fn into_receipt(self) -> Result<Receipt> {
        let status = match self.status.as_deref() {
            Some(raw) => parse_quantity(raw)?.saturating_to::<u64>(),
            // Reçus pré-Byzantium : pas de champ status
            None => 1,
        };
        let gas_used = self.gas_used.as_deref().map(parse_quantity).transpose()?;

        Ok(Receipt {
            hash: self.transaction_hash,
            status,
            gas_used,
        })
    }
}

impl JsonRpcChain {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.market.timeout_ms))
            .build()
            .context("Échec de la création du client HTTP JSON-RPC")?;

        Ok(Self {
            client,
            url: config.rpc_url.clone(),
            expected_chain_id: config.chain_id,
            account_index: config.account_index,
            receipt_poll: config.receipt_poll_interval(),
            receipt_max_polls: config.receipt_max_polls,
            next_id: AtomicU64::new(1),
        })
    }

    /// Appel JSON-RPC générique
    ///
    /// CONCEPT RUST : DeserializeOwned
    /// - Le type de retour est choisi par l'appelant (String, Vec<String>, Option<RawReceipt>)
    /// - Une erreur JSON-RPC ({"error": {...}}) devient une erreur anyhow
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, "Sending JSON-RPC request");
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Échec de la requête {} vers {}", method, self.url))?;

        if !response.status().is_success() {
            bail!("{} : HTTP {}", method, response.status());
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .with_context(|| format!("Réponse {} invalide", method))?;

        if let Some(error) = rpc.error {
            debug!(method, code = error.code, message = %error.message, "JSON-RPC error");
            bail!("{}", error.message);
        }

        serde_json::from_value(rpc.result.unwrap_or(Value::Null))
            .with_context(|| format!("Résultat {} inattendu", method))
    }

    /// eth_call sur `to` avec `data`, retourne les octets bruts
    async fn eth_call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>> {
        let raw: String = self
            .call(
                "eth_call",
                json!([{ "to": to.to_string(), "data": hex::encode_prefixed(data) }, "latest"]),
            )
            .await?;
        decode_hex(&raw)
    }

    async fn call_uint(&self, to: Address, data: &[u8]) -> Result<U256> {
        decode_uint(&self.eth_call(to, data).await?)
    }

    async fn call_string(&self, to: Address, data: &[u8]) -> Result<String> {
        decode_string(&self.eth_call(to, data).await?)
    }

    async fn decimals(&self, token: Address) -> Result<u8> {
        let decimals = self.call_uint(token, &DECIMALS).await?;
        if decimals > U256::from(u8::MAX) {
            bail!("decimals() hors limites : {}", decimals);
        }
        Ok(decimals.to::<u8>())
    }

    /// Prépare le calldata d'un transfert : adresse validée, montant en base units
    async fn transfer_calldata(&self, to: &str, amount: &str, token: Address) -> Result<Vec<u8>> {
        let recipient = Address::from_str(to.trim())
            .with_context(|| format!("Adresse de destination invalide : {}", to))?;
        let decimals = self.decimals(token).await?;
        let value = parse_units(amount, decimals)?;
        Ok(encode_call(TRANSFER, &[address_word(recipient), uint_word(value)]))
    }

    async fn estimate(&self, from: Address, token: Address, data: &[u8]) -> Result<U256> {
        let raw: String = self
            .call(
                "eth_estimateGas",
                json!([{
                    "from": from.to_string(),
                    "to": token.to_string(),
                    "data": hex::encode_prefixed(data),
                }]),
            )
            .await?;
        parse_quantity(&raw)
    }

    /// Attend qu'une transaction soit minée (polling de eth_getTransactionReceipt)
    async fn wait_for_receipt(&self, hash: &str) -> Result<Receipt> {
        for attempt in 1..=self.receipt_max_polls {
            if let Some(receipt) = self.receipt(hash).await? {
                debug!(%hash, attempt, "Receipt available");
                return Ok(receipt);
            }
            tokio::time::sleep(self.receipt_poll).await;
        }
        bail!(
            "Transaction {} toujours en attente après {} tentatives",
            hash,
            self.receipt_max_polls
        )
    }
}

#[async_trait]
impl Chain for JsonRpcChain {
    #[instrument(skip(self))]
    async fn connect(&self) -> Result<Address> {
        let accounts = self.accounts().await?;
        if accounts.is_empty() {
            bail!("No wallet found. Start a local node with unlocked accounts.");
        }

        let chain_id = self.chain_id().await?;
        if chain_id != self.expected_chain_id {
            bail!(
                "Wrong network: chain id {} (expected {})",
                chain_id,
                self.expected_chain_id
            );
        }

        let address = accounts.get(self.account_index).copied().with_context(|| {
            format!(
                "Compte {} introuvable ({} comptes disponibles)",
                self.account_index,
                accounts.len()
            )
        })?;

        info!(%address, chain_id, "Connected to node");
        Ok(address)
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        let raw: Vec<String> = self.call("eth_accounts", json!([])).await?;
        raw.iter()
            .map(|a| Address::from_str(a).with_context(|| format!("Adresse invalide : {}", a)))
            .collect()
    }

    async fn chain_id(&self) -> Result<u64> {
        let raw: String = self.call("eth_chainId", json!([])).await?;
        let chain_id = parse_quantity(&raw)?;
        if chain_id > U256::from(u64::MAX) {
            bail!("Chain id hors limites : {}", raw);
        }
        Ok(chain_id.to::<u64>())
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        let raw: String = self
            .call("eth_getBalance", json!([owner.to_string(), "latest"]))
            .await?;
        parse_quantity(&raw)
    }

    async fn token_balance(&self, owner: Address, token: Address) -> Result<U256> {
        self.call_uint(token, &encode_call(BALANCE_OF, &[address_word(owner)]))
            .await
    }

    async fn token_info(&self, token: Address) -> Result<TokenInfo> {
        let (name, symbol, decimals, total_supply) = tokio::try_join!(
            self.call_string(token, &NAME),
            self.call_string(token, &SYMBOL),
            self.decimals(token),
            self.call_uint(token, &TOTAL_SUPPLY),
        )?;

        Ok(TokenInfo {
            name,
            symbol,
            decimals,
            total_supply,
        })
    }

    #[instrument(skip(self))]
    async fn transfer_token(
        &self,
        from: Address,
        to: &str,
        amount: &str,
        token: Address,
    ) -> Result<Receipt> {
        let data = self.transfer_calldata(to, amount, token).await?;

        let estimate = self.estimate(from, token, &data).await?;
        let gas_limit = estimate * U256::from(100 + GAS_BUFFER_PERCENT) / U256::from(100u64);
        debug!(%estimate, %gas_limit, "Gas limit computed");

        let hash: String = self
            .call(
                "eth_sendTransaction",
                json!([{
                    "from": from.to_string(),
                    "to": token.to_string(),
                    "data": hex::encode_prefixed(&data),
                    "gas": format!("{:#x}", gas_limit),
                }]),
            )
            .await?;
        info!(%hash, "Transaction submitted");

        let receipt = self.wait_for_receipt(&hash).await?;
        if !receipt.is_success() {
            warn!(%hash, "Transaction reverted");
        }
        Ok(receipt)
    }

    async fn estimate_transfer_gas(
        &self,
        from: Address,
        to: &str,
        amount: &str,
        token: Address,
    ) -> Result<U256> {
        let data = self.transfer_calldata(to, amount, token).await?;
        self.estimate(from, token, &data).await
    }

    async fn gas_price(&self) -> Result<U256> {
        let raw: String = self.call("eth_gasPrice", json!([])).await?;
        parse_quantity(&raw)
    }

    async fn price(&self, currency: Currency, oracle: Address) -> Result<f64> {
        let data = encode_string_call(selector(GET_PRICE_SIGNATURE), currency.as_str());
        let raw = self
            .call_uint(oracle, &data)
            .await
            .with_context(|| format!("getPrice({}) a échoué", currency))?;
        Ok(to_display(raw, ORACLE_DECIMALS))
    }

    async fn receipt(&self, hash: &str) -> Result<Option<Receipt>> {
        let raw: Option<RawReceipt> = self
            .call("eth_getTransactionReceipt", json!([hash]))
            .await?;
        raw.map(RawReceipt::into_receipt).transpose()
    }
}

// ============================================================================
// Encodage / décodage ABI
// ============================================================================

/// 4 premiers octets de keccak256(signature)
fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Adresse alignée à droite sur 32 octets
fn address_word(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

fn uint_word(value: U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

/// selector + arguments statiques
fn encode_call(selector: [u8; 4], args: &[[u8; 32]]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 * args.len());
    data.extend_from_slice(&selector);
    for arg in args {
        data.extend_from_slice(arg);
    }
    data
}

/// selector + un unique argument `string`
///
/// Layout : offset (0x20), longueur, octets complétés à un multiple de 32
fn encode_string_call(selector: [u8; 4], value: &str) -> Vec<u8> {
    let bytes = value.as_bytes();
    let padded_len = bytes.len().div_ceil(32) * 32;

    let mut data = encode_call(
        selector,
        &[uint_word(U256::from(32u64)), uint_word(U256::from(bytes.len()))],
    );
    data.extend_from_slice(bytes);
    data.resize(data.len() + padded_len - bytes.len(), 0);
    data
}

fn decode_uint(data: &[u8]) -> Result<U256> {
    if data.len() < 32 {
        bail!("Retour de contrat trop court ({} octets)", data.len());
    }
    Ok(U256::from_be_slice(&data[..32]))
}

fn decode_string(data: &[u8]) -> Result<String> {
    let offset = word_as_usize(data, 0)?;
    let len = word_as_usize(data, offset)?;
    let start = offset + 32;
    let bytes = data
        .get(start..start + len)
        .with_context(|| format!("Chaîne ABI tronquée ({} octets attendus)", len))?;
    String::from_utf8(bytes.to_vec()).context("Chaîne ABI non UTF-8")
}

/// Lit le mot de 32 octets à `at` comme un usize (offset ou longueur)
fn word_as_usize(data: &[u8], at: usize) -> Result<usize> {
    let word = data
        .get(at..at + 32)
        .with_context(|| format!("Mot ABI manquant à l'offset {}", at))?;
    let value = U256::from_be_slice(word);
    if value > U256::from(data.len()) {
        bail!("Valeur ABI incohérente : {}", value);
    }
    Ok(value.to::<usize>())
}

fn decode_hex(raw: &str) -> Result<Vec<u8>> {
    hex::decode(raw.trim_start_matches("0x"))
        .with_context(|| format!("Hex invalide : {}", raw))
}

/// Quantité JSON-RPC ("0x1a") vers U256 ; "0x" vaut zéro
fn parse_quantity(raw: &str) -> Result<U256> {
    let digits = raw
        .strip_prefix("0x")
        .with_context(|| format!("Quantité sans préfixe 0x : {}", raw))?;
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).with_context(|| format!("Quantité invalide : {}", raw))
}

// ============================================================================
// Tests unitaires
// ============================================================================
