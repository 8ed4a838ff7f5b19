// Genesis block and mining template construction

use crate::constants::{
    BLOCK_REWARD, GENESIS_BITS, GENESIS_COINBASE_TEXT, GENESIS_TIMESTAMP, RESERVE_ADDRESS,
};
use crate::core::{Block, BlockHeader, Hash256, Transaction, TxIn, TxOut};

/// The coinbase paying the block reward to `reward_address`
fn coinbase(reward: i64, reward_address: &str) -> Transaction {
    let script_pubkey = reward_address.as_bytes().to_vec();
    Transaction::new(
        vec![TxIn::coinbase(GENESIS_COINBASE_TEXT.as_bytes().to_vec())],
        vec![TxOut::new(reward, script_pubkey)],
    )
}

/// Build a genesis block from explicit parameters
pub fn create_genesis_block(
    timestamp: u32,
    nonce: u32,
    bits: u32,
    version: i32,
    reward: i64,
    reward_address: &str,
) -> Block {
    let tx = coinbase(reward, reward_address);
    let header = BlockHeader {
        version,
        prev_block: Hash256::zero(),
        merkle_root: tx.hash(),
        timestamp,
        bits,
        nonce,
    };
    Block::new(header, vec![tx])
}

/// The network's configured genesis block
pub fn configured_genesis() -> Block {
    create_genesis_block(
        GENESIS_TIMESTAMP,
        0,
        GENESIS_BITS,
        1,
        BLOCK_REWARD,
        RESERVE_ADDRESS,
    )
}

/// Build a mining template anchored on `prev_block`: a fresh coinbase, a
/// zeroed nonce, and the caller's timestamp. The miner appends mempool
/// transactions and recomputes the merkle root on each work refresh.
pub fn create_block_template(
    prev_block: Hash256,
    timestamp: u32,
    reward: i64,
    reward_address: &str,
) -> Block {
    let tx = coinbase(reward, reward_address);
    let header = BlockHeader {
        version: 1,
        prev_block,
        merkle_root: tx.hash(),
        timestamp,
        bits: GENESIS_BITS,
        nonce: 0,
    };
    Block::new(header, vec![tx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::validate_block;

    #[test]
    fn test_configured_genesis_shape() {
        let genesis = configured_genesis();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.vtx.len(), 1);
        assert!(genesis.vtx[0].is_coinbase());
        assert_eq!(genesis.vtx[0].vout[0].value, BLOCK_REWARD);
        assert_eq!(
            genesis.vtx[0].vout[0].script_pubkey,
            RESERVE_ADDRESS.as_bytes()
        );
        assert_eq!(genesis.header.timestamp, GENESIS_TIMESTAMP);
        assert_eq!(genesis.header.bits, GENESIS_BITS);
    }

    #[test]
    fn test_genesis_merkle_is_coinbase_hash() {
        let genesis = configured_genesis();
        assert_eq!(genesis.header.merkle_root, genesis.vtx[0].hash());
        // Valid as the first block of an empty chain
        assert!(validate_block(&genesis, None).is_ok());
    }

    #[test]
    fn test_template_anchors_on_parent() {
        let parent = Hash256::new([0xaa; 32]);
        let template = create_block_template(parent, 1_800_000_000, BLOCK_REWARD, "AURtest");
        assert_eq!(template.header.prev_block, parent);
        assert_eq!(template.header.nonce, 0);
        assert_eq!(template.header.merkle_root, template.vtx[0].hash());
        assert_eq!(template.vtx.len(), 1);
    }
}
