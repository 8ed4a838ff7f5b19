// Aurelis blockchain node
// Append-only ledger, UTXO set, mempool, proof-of-work miner, JSON-RPC
// query surface, and P2P handshake.

pub mod chain;
pub mod constants;
pub mod core;
pub mod miner;
pub mod network;
pub mod rpc;

// Re-exports for convenience
pub use chain::{BlockChain, BlockIndex, Mempool, OutPoint, Utxo, UtxoSet, ValidationError};
pub use core::{Block, BlockHeader, Hash256, Serializable, Transaction, TxIn, TxOut};
pub use miner::Miner;
pub use network::P2PServer;
pub use rpc::RpcServer;
