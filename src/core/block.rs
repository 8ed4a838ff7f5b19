// Block data structures

use crate::core::{hash256, Decoder, DecodeError, Encoder, Hash256, Serializable, Transaction};

/// Block header - 80 bytes on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block version
    pub version: i32,
    /// Hash of the previous block (zero for genesis)
    pub prev_block: Hash256,
    /// Merkle root of the block's transactions
    pub merkle_root: Hash256,
    /// Block timestamp (Unix seconds)
    pub timestamp: u32,
    /// Difficulty encoding. Stored but never interpreted.
    pub bits: u32,
    /// Nonce for proof-of-work
    pub nonce: u32,
}

impl BlockHeader {
    /// Block hash (double SHA256 of the 80 serialized header bytes)
    pub fn hash(&self) -> Hash256 {
        hash256(&self.serialize())
    }
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self {
            version: 1,
            prev_block: Hash256::zero(),
            merkle_root: Hash256::zero(),
            timestamp: 0,
            bits: 0,
            nonce: 0,
        }
    }
}

impl Serializable for BlockHeader {
    fn encode(&self, out: &mut Encoder) {
        out.put_i32(self.version);
        out.put_hash(&self.prev_block);
        out.put_hash(&self.merkle_root);
        out.put_u32(self.timestamp);
        out.put_u32(self.bits);
        out.put_u32(self.nonce);
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            version: input.read_i32()?,
            prev_block: input.read_hash()?,
            merkle_root: input.read_hash()?,
            timestamp: input.read_u32()?,
            bits: input.read_u32()?,
            nonce: input.read_u32()?,
        })
    }
}

/// Block - header plus ordered transactions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub vtx: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, vtx: Vec<Transaction>) -> Self {
        Self { header, vtx }
    }

    /// Block hash
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// Whether this block claims the genesis position
    pub fn is_genesis(&self) -> bool {
        self.header.prev_block.is_zero()
    }

    /// Merkle root over a transaction list.
    ///
    /// Single-level construction: one transaction hashes to its own id;
    /// several hash to the double SHA256 of their concatenated ids. Not a
    /// pairwise tree - the chain format depends on this exact shape.
    pub fn compute_merkle_root(transactions: &[Transaction]) -> Hash256 {
        match transactions.len() {
            0 => Hash256::zero(),
            1 => transactions[0].hash(),
            _ => {
                let mut leaves = Vec::with_capacity(transactions.len() * 32);
                for tx in transactions {
                    leaves.extend_from_slice(tx.hash().as_bytes());
                }
                hash256(&leaves)
            }
        }
    }
}

impl Serializable for Block {
    fn encode(&self, out: &mut Encoder) {
        self.header.encode(out);
        out.put_vec(&self.vtx);
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            header: BlockHeader::decode(input)?,
            vtx: input.read_vec()?,
        })
    }
}
