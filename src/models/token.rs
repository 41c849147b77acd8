// ============================================================================
// Structures : métadonnées du token et reçu de transaction
// ============================================================================

use alloy_primitives::U256;

/// Métadonnées du token ERC-20 (name / symbol / decimals / totalSupply)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
}

impl Default for TokenInfo {
    /// Valeurs affichées avant que le contrat n'ait été interrogé
    fn default() -> Self {
        Self {
            name: "BigBlackCoin".to_string(),
            symbol: "BBC".to_string(),
            decimals: 18,
            total_supply: U256::ZERO,
        }
    }
}

/// Reçu d'une transaction incluse dans un bloc
///
/// CONCEPT : status suit la convention Ethereum
/// - 1 : succès
/// - 0 : revert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub hash: String,
    pub status: u64,
    pub gas_used: Option<U256>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status == 1
    }
}
