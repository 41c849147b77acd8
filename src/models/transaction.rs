// ============================================================================
// Structure : Transaction et historique
// ============================================================================
// Une transaction telle qu'affichée et persistée par le wallet, et
// l'historique borné qui les contient.
//
// CONCEPTS RUST :
// 1. #[serde(rename_all = "camelCase")] : format JSON du stockage persistant
//    (tokenSymbol, gasUsed) sans renommer les champs Rust
// 2. #[serde(rename = "type")] : "type" est un mot-clé réservé en Rust
// 3. VecDeque serait possible, mais un Vec trié du plus récent au plus ancien
//    correspond directement au JSON persisté
// ============================================================================

use serde::{Deserialize, Serialize};

/// Nombre maximum de transactions conservées (les plus anciennes sont évincées)
pub const MAX_TRANSACTIONS: usize = 50;

/// Statut d'une transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

/// Type de transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Send,
    Receive,
    Approval,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    pub to: String,

    /// Montant décimal tel que saisi ("10", "0.5")
    pub amount: String,

    /// Epoch en millisecondes
    pub timestamp: i64,

    pub status: TxStatus,

    #[serde(rename = "type")]
    pub kind: TxKind,

    pub token_symbol: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<String>,
}

impl Transaction {
    pub fn is_pending(&self) -> bool {
        self.status == TxStatus::Pending
    }
}

// ============================================================================
// TransactionHistory
// ============================================================================

/// Historique des transactions, du plus récent au plus ancien
///
/// Invariants :
/// - au plus MAX_TRANSACTIONS entrées
/// - un hash n'apparaît qu'une fois
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionHistory {
    entries: Vec<Transaction>,
}

impl TransactionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstruit un historique depuis une liste persistée
    ///
    /// La liste est normalisée : doublons de hash retirés (on garde le plus
    /// récent, donc le premier) et troncature au plafond.
    pub fn from_entries(entries: Vec<Transaction>) -> Self {
        let mut history = Self::new();
        for tx in entries.into_iter().rev() {
            history.push(tx);
        }
        history
    }

    /// Ajoute une transaction en tête de liste
    ///
    /// Une transaction avec un hash déjà présent remplace l'ancienne entrée.
    pub fn push(&mut self, tx: Transaction) {
        self.entries.retain(|existing| existing.hash != tx.hash);
        self.entries.insert(0, tx);
        self.entries.truncate(MAX_TRANSACTIONS);
    }

    /// Met à jour le statut d'une transaction, retourne false si le hash est inconnu
    pub fn set_status(&mut self, hash: &str, status: TxStatus) -> bool {
        match self.entries.iter_mut().find(|tx| tx.hash == hash) {
            Some(tx) => {
                tx.status = status;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, hash: &str) -> Option<&Transaction> {
        self.entries.iter().find(|tx| tx.hash == hash)
    }

    pub fn as_slice(&self) -> &[Transaction] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Les `n` transactions les plus récentes (par timestamp)
    pub fn recent(&self, n: usize) -> Vec<Transaction> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sorted.truncate(n);
        sorted
    }

    /// Filtre par type, triées du plus récent au plus ancien
    pub fn by_kind(&self, kind: TxKind) -> Vec<Transaction> {
        let mut filtered: Vec<Transaction> = self
            .entries
            .iter()
            .filter(|tx| tx.kind == kind)
            .cloned()
            .collect();
        filtered.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        filtered
    }

    pub fn stats(&self) -> TransactionStats {
        let mut stats = TransactionStats {
            total: self.entries.len(),
            ..TransactionStats::default()
        };

        for tx in &self.entries {
            match tx.kind {
                TxKind::Send => stats.sent += 1,
                TxKind::Receive => stats.received += 1,
                TxKind::Approval => {}
            }
            match tx.status {
                TxStatus::Pending => stats.pending += 1,
                TxStatus::Success => stats.successful += 1,
                TxStatus::Failed => stats.failed += 1,
            }
        }

        stats
    }
}

/// Compteurs pour la page d'historique
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    pub total: usize,
    pub sent: usize,
    pub received: usize,
    pub pending: usize,
    pub successful: usize,
    pub failed: usize,
}

// ============================================================================
// Tests unitaires
// ============================================================================
