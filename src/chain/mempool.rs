// Memory pool of pending transactions

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::core::{Hash256, Transaction};

/// Hash-keyed set of transactions waiting for inclusion in a block.
/// No expiration, no size cap, no fee ordering.
#[derive(Debug, Default)]
pub struct Mempool {
    pool: Mutex<BTreeMap<Hash256, Transaction>>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a transaction. Returns false on duplicates and on policy
    /// failures; neither is an error.
    pub fn add_transaction(&self, tx: Transaction) -> bool {
        let mut pool = self.pool.lock().unwrap();

        let hash = tx.hash();
        if pool.contains_key(&hash) {
            return false;
        }

        if !Self::admissible(&tx) {
            return false;
        }

        pool.insert(hash, tx);
        log::info!("mempool: added transaction {} | total: {}", hash, pool.len());
        true
    }

    /// Snapshot of all pending transactions
    pub fn transactions(&self) -> Vec<Transaction> {
        self.pool.lock().unwrap().values().cloned().collect()
    }

    /// Best-effort removal by hash, used when a block confirms
    pub fn remove_transactions(&self, txs: &[Transaction]) {
        let mut pool = self.pool.lock().unwrap();
        for tx in txs {
            pool.remove(&tx.hash());
        }
        if !txs.is_empty() {
            log::info!(
                "mempool: removed {} transactions, {} remaining",
                txs.len(),
                pool.len()
            );
        }
    }

    pub fn len(&self) -> usize {
        self.pool.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.lock().unwrap().is_empty()
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.pool.lock().unwrap().contains_key(hash)
    }

    /// Admission policy: outputs present and positive, and no
    /// coinbase-shaped transactions except the "MINT" protocol mint.
    fn admissible(tx: &Transaction) -> bool {
        if tx.vout.is_empty() {
            return false;
        }

        if tx.vout.iter().any(|out| out.value <= 0) {
            return false;
        }

        if !tx.is_mint() && tx.vin.len() == 1 && tx.vin[0].prevout_hash.is_zero() {
            return false;
        }

        true
    }
}
