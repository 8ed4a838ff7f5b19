// Chain state: height-ordered block index, full-block map, UTXO set, and
// the append-only disk log

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::chain::{validate_block, OutPoint, Utxo, UtxoSet};
use crate::core::{Block, BlockHeader, Decoder, Hash256, Serializable, Transaction};

/// Position of a block in the chain. Lives for the whole process.
#[derive(Debug, Clone)]
pub struct BlockIndex {
    pub hash: Hash256,
    pub header: BlockHeader,
    pub height: i32,
}

impl BlockIndex {
    fn new(block: &Block, height: i32) -> Self {
        Self {
            hash: block.header.hash(),
            header: block.header.clone(),
            height,
        }
    }
}

#[derive(Default)]
struct ChainState {
    chain: Vec<Arc<BlockIndex>>,
    index_by_hash: BTreeMap<Hash256, Arc<BlockIndex>>,
    blocks: BTreeMap<Hash256, Block>,
    utxo_set: UtxoSet,
}

impl ChainState {
    fn tip_hash(&self) -> Option<Hash256> {
        self.chain.last().map(|index| index.hash)
    }

    fn install(&mut self, block: Block) -> Arc<BlockIndex> {
        let height = self.chain.len() as i32;
        let index = Arc::new(BlockIndex::new(&block, height));
        self.chain.push(index.clone());
        self.index_by_hash.insert(index.hash, index.clone());
        self.utxo_set.apply_block(&block);
        self.blocks.insert(index.hash, block);
        index
    }
}

/// The ledger: an append-only single chain plus the UTXO set derived from
/// it. One mutex guards everything, held for the whole of `add_block`
/// (including persistence) and for every reader query.
pub struct BlockChain {
    state: Mutex<ChainState>,
    data_path: PathBuf,
}

impl BlockChain {
    /// Create an empty chain persisting to `data_path`
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            state: Mutex::new(ChainState::default()),
            data_path: data_path.into(),
        }
    }

    /// Validate and append a candidate block. Returns false on duplicates
    /// and on validation failure; true once the block is installed,
    /// applied to the UTXO set, and persisted.
    pub fn add_block(&self, block: &Block) -> bool {
        let mut state = self.state.lock().unwrap();

        let hash = block.header.hash();
        if state.index_by_hash.contains_key(&hash) {
            return false;
        }

        let tip = state.tip_hash();
        if let Err(err) = validate_block(block, tip.as_ref()) {
            log::warn!("block {} rejected: {}", hash, err);
            return false;
        }

        let index = state.install(block.clone());
        log::info!("accepted block #{} hash: {}", index.height, hash);
        self.save_block(block);
        true
    }

    /// Current height; -1 when the chain is empty
    pub fn height(&self) -> i32 {
        let state = self.state.lock().unwrap();
        state.chain.len() as i32 - 1
    }

    /// Tip hash; zero when the chain is empty
    pub fn best_hash(&self) -> Hash256 {
        let state = self.state.lock().unwrap();
        state.tip_hash().unwrap_or_else(Hash256::zero)
    }

    pub fn get_index(&self, hash: &Hash256) -> Option<Arc<BlockIndex>> {
        let state = self.state.lock().unwrap();
        state.index_by_hash.get(hash).cloned()
    }

    pub fn get_block(&self, hash: &Hash256) -> Option<Block> {
        let state = self.state.lock().unwrap();
        state.blocks.get(hash).cloned()
    }

    pub fn get_block_by_height(&self, height: i32) -> Option<Block> {
        let state = self.state.lock().unwrap();
        if height < 0 || height as usize >= state.chain.len() {
            return None;
        }
        let hash = state.chain[height as usize].hash;
        state.blocks.get(&hash).cloned()
    }

    /// Find a confirmed transaction and its containing block, scanning
    /// newest blocks first
    pub fn get_transaction(&self, hash: &Hash256) -> Option<(Transaction, Hash256)> {
        let state = self.state.lock().unwrap();
        for index in state.chain.iter().rev() {
            if let Some(block) = state.blocks.get(&index.hash) {
                for tx in &block.vtx {
                    if tx.hash() == *hash {
                        return Some((tx.clone(), index.hash));
                    }
                }
            }
        }
        None
    }

    /// Unspent balance of an address (verbatim script_pubkey byte match)
    pub fn get_balance(&self, address: &str) -> i64 {
        let state = self.state.lock().unwrap();
        state.utxo_set.balance(address.as_bytes())
    }

    /// Unspent outputs of an address
    pub fn get_utxos(&self, address: &str) -> Vec<(OutPoint, Utxo)> {
        let state = self.state.lock().unwrap();
        state.utxo_set.utxos_for_address(address.as_bytes())
    }

    /// Append the serialized block to the on-disk log. I/O failures are
    /// logged and swallowed; durability is best-effort.
    fn save_block(&self, block: &Block) {
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.data_path)
            .and_then(|mut file| file.write_all(&block.serialize()));

        if let Err(err) = result {
            log::warn!(
                "failed to persist block to {}: {}",
                self.data_path.display(),
                err
            );
        }
    }

    /// Rebuild chain state from the on-disk log. Blocks are trusted (no
    /// re-validation); a decode underflow marks the end of the usable log
    /// and drops the partial tail. Called once at startup before any
    /// other thread touches the chain.
    pub fn load_chain(&self) {
        let data = match fs::read(&self.data_path) {
            Ok(data) => data,
            Err(_) => return,
        };
        if data.is_empty() {
            return;
        }

        let mut state = self.state.lock().unwrap();
        let mut decoder = Decoder::new(&data);
        let mut count = 0usize;

        while !decoder.is_exhausted() {
            let block = match Block::decode(&mut decoder) {
                Ok(block) => block,
                Err(err) => {
                    log::warn!("corrupt block log, loaded {} blocks: {}", count, err);
                    break;
                }
            };

            // Genesis replay guard: skip a re-logged copy of chain[0]
            let hash = block.header.hash();
            if let Some(genesis) = state.chain.first() {
                if hash == genesis.hash {
                    continue;
                }
            }

            state.install(block);
            count += 1;
        }

        log::info!("loaded {} blocks from disk", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::genesis::{configured_genesis, create_block_template};
    use crate::chain::meets_pow_target;
    use crate::constants::{BLOCK_REWARD, RESERVE_ADDRESS};
    use crate::core::{TxIn, TxOut};
    use tempfile::TempDir;

    fn temp_chain() -> (TempDir, BlockChain) {
        let dir = TempDir::new().unwrap();
        let chain = BlockChain::new(dir.path().join("blockchain.dat"));
        (dir, chain)
    }

    /// Search nonces until the header meets the work target
    fn mine(block: &mut Block) {
        while !meets_pow_target(&block.header.hash()) {
            block.header.nonce = block.header.nonce.wrapping_add(1);
        }
    }

    /// A mined block extending `prev`, rewarding `addr` with a coinbase
    /// distinguished by `tag`
    fn mined_child(prev: Hash256, addr: &str, tag: u8) -> Block {
        let tx = Transaction::new(
            vec![TxIn::coinbase(vec![tag])],
            vec![TxOut::new(BLOCK_REWARD, addr.as_bytes().to_vec())],
        );
        let mut block = create_block_template(prev, 1_800_000_000, BLOCK_REWARD, addr);
        block.vtx = vec![tx];
        block.header.merkle_root = Block::compute_merkle_root(&block.vtx);
        mine(&mut block);
        block
    }

    #[test]
    fn test_genesis_acceptance() {
        let (_dir, chain) = temp_chain();
        let genesis = configured_genesis();

        assert!(chain.add_block(&genesis));
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.best_hash(), genesis.header.hash());

        // Exactly one UTXO: the genesis coinbase output
        let utxos = chain.get_utxos(RESERVE_ADDRESS);
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].0, OutPoint::new(genesis.vtx[0].hash(), 0));
        assert_eq!(utxos[0].1.out, genesis.vtx[0].vout[0]);
    }

    #[test]
    fn test_duplicate_add_is_idempotent() {
        let (_dir, chain) = temp_chain();
        let genesis = configured_genesis();

        assert!(chain.add_block(&genesis));
        assert!(!chain.add_block(&genesis));
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.get_utxos(RESERVE_ADDRESS).len(), 1);
    }

    #[test]
    fn test_linkage_rejection() {
        let (_dir, chain) = temp_chain();
        let genesis = configured_genesis();
        assert!(chain.add_block(&genesis));

        // Mined (so the work check passes) but pointing at a bogus parent
        let block = mined_child(Hash256::new([0xff; 32]), RESERVE_ADDRESS, 7);
        assert!(!chain.add_block(&block));
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.get_balance(RESERVE_ADDRESS), BLOCK_REWARD);
    }

    #[test]
    fn test_pow_rejection_post_genesis() {
        let (_dir, chain) = temp_chain();
        let genesis = configured_genesis();
        assert!(chain.add_block(&genesis));

        let mut block = mined_child(genesis.header.hash(), RESERVE_ADDRESS, 7);
        // Break the proof of work without touching anything else
        while meets_pow_target(&block.header.hash()) {
            block.header.nonce = block.header.nonce.wrapping_add(1);
        }
        assert!(!chain.add_block(&block));
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn test_chain_extension_and_lookup() {
        let (_dir, chain) = temp_chain();
        let genesis = configured_genesis();
        assert!(chain.add_block(&genesis));

        let b1 = mined_child(genesis.header.hash(), RESERVE_ADDRESS, 7);
        assert!(chain.add_block(&b1));

        assert_eq!(chain.height(), 1);
        assert_eq!(chain.best_hash(), b1.header.hash());

        let index = chain.get_index(&b1.header.hash()).unwrap();
        assert_eq!(index.height, 1);
        assert_eq!(index.header.prev_block, genesis.header.hash());
        // Index hash round-trips through the header
        assert_eq!(index.hash, index.header.hash());

        assert_eq!(
            chain.get_block_by_height(1).unwrap().header.hash(),
            b1.header.hash()
        );
        assert!(chain.get_block_by_height(2).is_none());
        assert!(chain.get_block_by_height(-1).is_none());

        let (tx, containing) = chain.get_transaction(&b1.vtx[0].hash()).unwrap();
        assert_eq!(tx, b1.vtx[0]);
        assert_eq!(containing, b1.header.hash());
        assert!(chain.get_transaction(&Hash256::new([9; 32])).is_none());
    }

    #[test]
    fn test_round_trip_via_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blockchain.dat");

        let genesis = configured_genesis();
        let b1 = mined_child(genesis.header.hash(), RESERVE_ADDRESS, 7);

        {
            let chain = BlockChain::new(&path);
            assert!(chain.add_block(&genesis));
            assert!(chain.add_block(&b1));
        }

        let reloaded = BlockChain::new(&path);
        reloaded.load_chain();

        assert_eq!(reloaded.height(), 1);
        assert_eq!(reloaded.best_hash(), b1.header.hash());
        // Both coinbases are distinct, so the reserve holds their sum
        assert_eq!(reloaded.get_balance(RESERVE_ADDRESS), 2 * BLOCK_REWARD);
    }

    #[test]
    fn test_load_chain_drops_partial_tail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blockchain.dat");

        let genesis = configured_genesis();
        {
            let chain = BlockChain::new(&path);
            assert!(chain.add_block(&genesis));
        }

        // Append half a block's worth of garbage
        let mut truncated = mined_child(genesis.header.hash(), RESERVE_ADDRESS, 7).serialize();
        truncated.truncate(truncated.len() / 2);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&truncated).unwrap();

        let reloaded = BlockChain::new(&path);
        reloaded.load_chain();
        assert_eq!(reloaded.height(), 0);
        assert_eq!(reloaded.best_hash(), genesis.header.hash());
    }

    #[test]
    fn test_load_chain_skips_replayed_genesis() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blockchain.dat");

        let genesis = configured_genesis();
        {
            let chain = BlockChain::new(&path);
            assert!(chain.add_block(&genesis));
        }

        // Boot order under test: genesis installed first, then the log
        // replayed over it
        let chain = BlockChain::new(&path);
        assert!(chain.add_block(&genesis));
        chain.load_chain();
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.get_balance(RESERVE_ADDRESS), BLOCK_REWARD);
    }

    #[test]
    fn test_missing_log_is_fine() {
        let (_dir, chain) = temp_chain();
        chain.load_chain();
        assert_eq!(chain.height(), -1);
        assert_eq!(chain.best_hash(), Hash256::zero());
    }
}
