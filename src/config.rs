// ============================================================================
// Module : config
// ============================================================================
// Configuration de l'application
//
// Toutes les valeurs ont un défaut raisonnable pour un nœud Hardhat local :
// le fichier `bbcwallet.json` est optionnel et peut ne contenir que les champs
// à surcharger. Deux variables d'environnement ont priorité sur le fichier :
// - BBCWALLET_RPC_URL : URL du nœud JSON-RPC
// - BBCWALLET_DEPLOYMENT : chemin du fichier de déploiement
//
// CONCEPT RUST : #[serde(default)]
// - Un champ absent du JSON prend la valeur de Default::default()
// - Permet des fichiers de config partiels
// ============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Nom du fichier de configuration cherché dans le répertoire courant
pub const CONFIG_FILENAME: &str = "bbcwallet.json";

/// Chain id du réseau Hardhat local
pub const HARDHAT_CHAIN_ID: u64 = 31337;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// URL du nœud JSON-RPC
    pub rpc_url: String,

    /// Chain id attendu, la connexion échoue sur un autre réseau
    pub chain_id: u64,

    /// Index du compte à utiliser parmi `eth_accounts`
    pub account_index: usize,

    /// Fichier JSON produit par le script de déploiement
    pub deployment_path: PathBuf,

    /// Fichier du stockage persistant (None : répertoire de données de la plateforme)
    pub storage_path: Option<PathBuf>,

    pub market: MarketConfig,

    /// Intervalle entre deux interrogations de `eth_getTransactionReceipt`
    pub receipt_poll_ms: u64,

    /// Nombre maximum d'interrogations avant d'abandonner l'attente d'un reçu
    pub receipt_max_polls: u32,

    /// Intervalle de surveillance des changements de compte / réseau
    pub watch_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub base_url: String,

    /// Durée de fraîcheur d'une réponse en cache
    pub cache_ttl_secs: u64,

    /// Espacement minimum entre deux requêtes sortantes
    pub min_request_interval_ms: u64,

    /// Période de rafraîchissement de la vue marché
    pub refresh_secs: u64,

    pub user_agent: String,
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: HARDHAT_CHAIN_ID,
            account_index: 0,
            deployment_path: PathBuf::from("deployment.json"),
            storage_path: None,
            market: MarketConfig::default(),
            receipt_poll_ms: 500,
            receipt_max_polls: 120,
            watch_interval_ms: 2_000,
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            cache_ttl_secs: 30,
            min_request_interval_ms: 2_000,
            refresh_secs: 60,
            user_agent: concat!("bbcwallet/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl MarketConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

impl Config {
    /// Charge la configuration : fichier optionnel puis variables d'environnement
    pub fn load() -> Result<Self> {
        let mut config = Self::from_file_or_default(Path::new(CONFIG_FILENAME))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        info!(rpc_url = %config.rpc_url, chain_id = config.chain_id, "Configuration loaded");
        Ok(config)
    }

    /// Lit `path` s'il existe, sinon retourne la configuration par défaut
    pub fn from_file_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(?path, "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Échec de la lecture de {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Configuration invalide dans {}", path.display()))
    }

    /// CONCEPT RUST : Closure en paramètre
    /// - `lookup` abstrait std::env::var pour pouvoir tester sans toucher
    ///   à l'environnement du processus
    fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("BBCWALLET_RPC_URL") {
            self.rpc_url = url;
        }
        if let Some(path) = lookup("BBCWALLET_DEPLOYMENT") {
            self.deployment_path = PathBuf::from(path);
        }
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }

    /// Chemin effectif du stockage persistant
    ///
    /// Linux : ~/.local/share/bbcwallet/storage.json
    pub fn resolved_storage_path(&self) -> PathBuf {
        match &self.storage_path {
            Some(path) => path.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("bbcwallet")
                .join("storage.json"),
        }
    }
}

// ============================================================================
// DeploymentInfo
// ============================================================================

/// Adresses des contrats déployés, écrites par le script de déploiement
///
/// Format :
/// { "network": "localhost", "chainId": "31337",
///   "contracts": { "MockOracle": "0x...", "BigBlackCoin": "0x..." } }
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentInfo {
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub deployed_at: Option<String>,
    #[serde(default)]
    pub contracts: DeployedContracts,
    #[serde(default)]
    pub deployer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployedContracts {
    /// Chaîne vide si le contrat n'est pas déployé
    #[serde(rename = "MockOracle", default)]
    pub mock_oracle: String,
    #[serde(rename = "BigBlackCoin", default)]
    pub big_black_coin: String,
}

impl DeploymentInfo {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Fichier de déploiement introuvable : {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Fichier de déploiement invalide : {}", path.display()))
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.chain_id, 31337);
        assert_eq!(config.market.cache_ttl(), Duration::from_secs(30));
        assert_eq!(config.market.min_request_interval(), Duration::from_secs(2));
        assert_eq!(config.market.refresh_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bbcwallet.json");
        std::fs::write(&path, r#"{ "rpc_url": "http://node:8545", "market": { "refresh_secs": 10 } }"#)
            .unwrap();

        let config = Config::from_file_or_default(&path).unwrap();
        assert_eq!(config.rpc_url, "http://node:8545");
        assert_eq!(config.market.refresh_secs, 10);
        assert_eq!(config.market.cache_ttl_secs, 30);
        assert_eq!(config.account_index, 0);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_file_or_default(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| match key {
            "BBCWALLET_RPC_URL" => Some("http://10.0.0.2:8545".to_string()),
            _ => None,
        });
        assert_eq!(config.rpc_url, "http://10.0.0.2:8545");
        assert_eq!(config.deployment_path, PathBuf::from("deployment.json"));
    }

    #[test]
    fn test_deployment_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployment.json");
        std::fs::write(
            &path,
            r#"{ "network": "localhost", "chainId": "31337",
                 "contracts": { "MockOracle": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
                                "BigBlackCoin": "" } }"#,
        )
        .unwrap();

        let info = DeploymentInfo::load(&path).unwrap();
        assert_eq!(info.chain_id, "31337");
        assert!(info.contracts.big_black_coin.is_empty());
        assert!(info.deployer.is_none());
    }
}
