// UTXO (unspent transaction output) set

use std::collections::BTreeMap;

use crate::core::{Block, Hash256, TxOut};

/// UTXO identifier - transaction hash + output index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutPoint {
    pub hash: Hash256,
    pub n: u32,
}

impl OutPoint {
    pub fn new(hash: Hash256, n: u32) -> Self {
        Self { hash, n }
    }
}

/// An unspent output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub out: TxOut,
}

/// In-memory UTXO index. Owned exclusively by the chain; rebuilt from the
/// block log on startup and advanced once per accepted block. No rollback.
#[derive(Debug, Default)]
pub struct UtxoSet {
    entries: BTreeMap<OutPoint, Utxo>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&Utxo> {
        self.entries.get(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.entries.contains_key(outpoint)
    }

    /// Apply a block's transactions in order: spend each non-zero prevout,
    /// then create an entry per output. A zero prevout hash is a
    /// coinbase/mint and spends nothing. Later transactions in the block
    /// may spend outputs created by earlier ones.
    pub fn apply_block(&mut self, block: &Block) {
        for tx in &block.vtx {
            let txid = tx.hash();

            for input in &tx.vin {
                if !input.prevout_hash.is_zero() {
                    self.entries
                        .remove(&OutPoint::new(input.prevout_hash, input.prevout_n));
                }
            }

            for (n, out) in tx.vout.iter().enumerate() {
                self.entries
                    .insert(OutPoint::new(txid, n as u32), Utxo { out: out.clone() });
            }
        }
    }

    /// Sum of unspent value whose script_pubkey equals the address bytes
    pub fn balance(&self, address: &[u8]) -> i64 {
        self.entries
            .values()
            .filter(|utxo| utxo.out.script_pubkey == address)
            .map(|utxo| utxo.out.value)
            .sum()
    }

    /// All unspent outputs whose script_pubkey equals the address bytes
    pub fn utxos_for_address(&self, address: &[u8]) -> Vec<(OutPoint, Utxo)> {
        self.entries
            .iter()
            .filter(|(_, utxo)| utxo.out.script_pubkey == address)
            .map(|(outpoint, utxo)| (*outpoint, utxo.clone()))
            .collect()
    }
}
