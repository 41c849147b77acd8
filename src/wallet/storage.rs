// ============================================================================
// Stockage persistant clé / valeur
// ============================================================================
// Équivalent du localStorage d'un navigateur : des chaînes indexées par clé,
// qui survivent au redémarrage du programme.
//
// Clés utilisées par le wallet :
// - "bbc-tx-history"        : historique des transactions (tableau JSON)
// - "bbc-selected-currency" : devise d'affichage ("USD", "EUR"...)
// ============================================================================

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use tracing::{debug, warn};

pub const TX_HISTORY_KEY: &str = "bbc-tx-history";
pub const SELECTED_CURRENCY_KEY: &str = "bbc-selected-currency";

/// CONCEPT RUST : trait synchrone
/// - Lecture / écriture locales et rapides, pas besoin d'async
/// - Send + Sync : partagé par le store entre tâches tokio
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

// ============================================================================
// FileStorage
// ============================================================================

/// Stockage dans un unique fichier JSON `{ "clé": "valeur", ... }`
///
/// Le fichier est relu à l'ouverture puis réécrit en entier à chaque `set`,
/// via un fichier temporaire renommé pour ne jamais laisser un JSON tronqué.
pub struct FileStorage {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let values = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Échec de la lecture de {}", path.display()))?;
            match serde_json::from_str(&raw) {
                Ok(values) => values,
                Err(e) => {
                    // Un fichier corrompu ne doit pas empêcher le wallet de démarrer
                    warn!(path = %path.display(), error = %e, "Corrupted storage file, starting empty");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), keys = values.len(), "Opened storage");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn values(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Échec de la création de {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(values).context("Échec de la sérialisation du stockage")?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Échec de l'écriture de {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Échec du remplacement de {}", self.path.display()))?;
        Ok(())
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values();
        values.insert(key.to_string(), value.to_string());
        self.flush(&values)
    }
}

// ============================================================================
// MemoryStorage
// ============================================================================

/// Stockage en mémoire (tests, mode sans persistance)
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
