// Block validation

use thiserror::Error;

use crate::core::{Block, Hash256};

/// Reasons a candidate block is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("insufficient difficulty: hash {hash}")]
    InsufficientProofOfWork { hash: Hash256 },

    #[error("block has no transactions")]
    EmptyBlock,

    #[error("merkle root mismatch: header {header}, computed {computed}")]
    MerkleMismatch { header: Hash256, computed: Hash256 },

    #[error("prev_block mismatch: expected {expected}, got {got}")]
    PrevBlockMismatch { expected: Hash256, got: Hash256 },
}

/// Fixed work target: the first two bytes of the header hash must be zero
pub fn meets_pow_target(hash: &Hash256) -> bool {
    let bytes = hash.as_bytes();
    bytes[0] == 0 && bytes[1] == 0
}

/// Validate a candidate block against the current tip.
///
/// `tip` is `None` when the chain is empty, which waives the work
/// requirement so a zero-work genesis can be installed. Transaction
/// contents, values, and signatures are not inspected. Pure function of
/// the block and the tip hash.
pub fn validate_block(block: &Block, tip: Option<&Hash256>) -> Result<(), ValidationError> {
    let hash = block.header.hash();
    if !meets_pow_target(&hash) && tip.is_some() {
        return Err(ValidationError::InsufficientProofOfWork { hash });
    }

    if block.vtx.is_empty() {
        return Err(ValidationError::EmptyBlock);
    }

    let computed = Block::compute_merkle_root(&block.vtx);
    if computed != block.header.merkle_root {
        return Err(ValidationError::MerkleMismatch {
            header: block.header.merkle_root,
            computed,
        });
    }

    if let Some(tip) = tip {
        if block.header.prev_block != *tip {
            return Err(ValidationError::PrevBlockMismatch {
                expected: *tip,
                got: block.header.prev_block,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BlockHeader, Transaction, TxIn, TxOut};

    fn block_with_coinbase(prev_block: Hash256) -> Block {
        let tx = Transaction::new(
            vec![TxIn::coinbase(vec![1, 2, 3])],
            vec![TxOut::new(1000, vec![9])],
        );
        let header = BlockHeader {
            prev_block,
            merkle_root: Block::compute_merkle_root(std::slice::from_ref(&tx)),
            timestamp: 1_700_000_000,
            ..Default::default()
        };
        Block::new(header, vec![tx])
    }

    #[test]
    fn test_pow_target_requires_two_zero_bytes() {
        let mut bytes = [0u8; 32];
        bytes[2] = 0xff;
        assert!(meets_pow_target(&Hash256::new(bytes)));

        bytes[1] = 1;
        assert!(!meets_pow_target(&Hash256::new(bytes)));
    }

    #[test]
    fn test_genesis_bypasses_pow() {
        let block = block_with_coinbase(Hash256::zero());
        // Arbitrary header hash, but accepted because the chain is empty
        assert!(validate_block(&block, None).is_ok());
    }

    #[test]
    fn test_pow_enforced_with_tip() {
        let tip = Hash256::new([5; 32]);
        let block = block_with_coinbase(tip);
        // The odds of this header meeting the target by accident are 2^-16
        assert!(matches!(
            validate_block(&block, Some(&tip)),
            Err(ValidationError::InsufficientProofOfWork { .. })
        ));
    }

    #[test]
    fn test_empty_block_rejected() {
        let block = Block::default();
        assert_eq!(validate_block(&block, None), Err(ValidationError::EmptyBlock));
    }

    #[test]
    fn test_merkle_mismatch_rejected() {
        let mut block = block_with_coinbase(Hash256::zero());
        block.header.merkle_root = Hash256::new([0xee; 32]);
        assert!(matches!(
            validate_block(&block, None),
            Err(ValidationError::MerkleMismatch { .. })
        ));
    }

    #[test]
    fn test_error_text_names_prev_block_mismatch() {
        let err = ValidationError::PrevBlockMismatch {
            expected: Hash256::zero(),
            got: Hash256::new([0xff; 32]),
        };
        assert!(err.to_string().contains("prev_block mismatch"));
    }
}
