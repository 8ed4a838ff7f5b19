// Core data model and primitives

pub mod address;
mod block;
mod hash;
mod serialize;
mod transaction;
mod types;

pub use block::{Block, BlockHeader};
pub use hash::{hash160, hash256, sha256};
pub use serialize::{DecodeError, Decoder, Encoder, Serializable};
pub use transaction::{Transaction, TxIn, TxOut};
pub use types::Hash256;
