// Transaction data structures

use crate::constants::MINT_TAG;
use crate::core::{hash256, Decoder, DecodeError, Encoder, Hash256, Serializable};

/// Transaction input - references a previous transaction output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    /// Hash of the previous transaction (zero for coinbase inputs)
    pub prevout_hash: Hash256,
    /// Index of the output in the previous transaction
    pub prevout_n: u32,
    /// Signature script
    pub script_sig: Vec<u8>,
    /// Sequence number
    pub sequence: u32,
}

impl TxIn {
    /// Create a new transaction input
    pub fn new(prevout_hash: Hash256, prevout_n: u32, script_sig: Vec<u8>) -> Self {
        Self {
            prevout_hash,
            prevout_n,
            script_sig,
            sequence: 0xFFFF_FFFF,
        }
    }

    /// Create a coinbase input carrying arbitrary scriptSig data
    pub fn coinbase(script_sig: Vec<u8>) -> Self {
        Self::new(Hash256::zero(), 0, script_sig)
    }

    /// Whether this input spends nothing (zero prevout hash)
    pub fn is_coinbase(&self) -> bool {
        self.prevout_hash.is_zero()
    }
}

impl Default for TxIn {
    fn default() -> Self {
        Self {
            prevout_hash: Hash256::zero(),
            prevout_n: 0,
            script_sig: Vec::new(),
            sequence: 0xFFFF_FFFF,
        }
    }
}

impl Serializable for TxIn {
    fn encode(&self, out: &mut Encoder) {
        out.put_hash(&self.prevout_hash);
        out.put_u32(self.prevout_n);
        out.put_var_bytes(&self.script_sig);
        out.put_u32(self.sequence);
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            prevout_hash: input.read_hash()?,
            prevout_n: input.read_u32()?,
            script_sig: input.read_var_bytes()?,
            sequence: input.read_u32()?,
        })
    }
}

/// Transaction output - value and destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    /// Amount in base units (-1 when unset)
    pub value: i64,
    /// Destination address bytes, stored verbatim. No scripting.
    pub script_pubkey: Vec<u8>,
}

impl TxOut {
    pub fn new(value: i64, script_pubkey: Vec<u8>) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }
}

impl Default for TxOut {
    fn default() -> Self {
        Self {
            value: -1,
            script_pubkey: Vec::new(),
        }
    }
}

impl Serializable for TxOut {
    fn encode(&self, out: &mut Encoder) {
        out.put_i64(self.value);
        out.put_var_bytes(&self.script_pubkey);
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            value: input.read_i64()?,
            script_pubkey: input.read_var_bytes()?,
        })
    }
}

/// Transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub vin: Vec<TxIn>,
    pub vout: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(vin: Vec<TxIn>, vout: Vec<TxOut>) -> Self {
        Self {
            version: 1,
            vin,
            vout,
            lock_time: 0,
        }
    }

    /// Transaction hash (double SHA256 of the serialized transaction)
    pub fn hash(&self) -> Hash256 {
        hash256(&self.serialize())
    }

    /// Whether this transaction creates supply: a single input with a
    /// zero prevout hash
    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].is_coinbase()
    }

    /// Whether this is a protocol mint: a single input whose scriptSig is
    /// exactly the 4-byte "MINT" marker
    pub fn is_mint(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].script_sig == MINT_TAG
    }

    /// Sum of all output values
    pub fn total_output_value(&self) -> i64 {
        self.vout.iter().map(|out| out.value).sum()
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl Serializable for Transaction {
    fn encode(&self, out: &mut Encoder) {
        out.put_i32(self.version);
        out.put_vec(&self.vin);
        out.put_vec(&self.vout);
        out.put_u32(self.lock_time);
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            version: input.read_i32()?,
            vin: input.read_vec()?,
            vout: input.read_vec()?,
            lock_time: input.read_u32()?,
        })
    }
}
