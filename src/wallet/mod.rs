// ============================================================================
// Module : wallet
// ============================================================================
// État du wallet et ses collaborateurs :
// - store   : WalletStore, source de vérité et actions
// - state   : WalletState, la donnée lue par l'affichage
// - chain   : trait Chain (blockchain) + surveillance du provider
// - rpc     : implémentation JSON-RPC de Chain
// - storage : stockage clé / valeur persistant
// ============================================================================

pub mod chain;
pub mod rpc;
pub mod state;
pub mod storage;
pub mod store;

#[cfg(test)]
mod mock;

pub use chain::{spawn_provider_watcher, Chain, ProviderEvent};
pub use rpc::JsonRpcChain;
pub use state::{ConnectionStatus, WalletState};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage};
pub use store::WalletStore;
