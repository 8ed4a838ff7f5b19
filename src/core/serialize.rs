// Binary codec for chain data structures
//
// Everything is little-endian and deterministic so that hashes are
// reproducible. Variable-length byte strings and sequences carry a u64
// little-endian length prefix (not a compact-size varint); the on-disk
// block log depends on this exact layout.

use thiserror::Error;

use crate::core::Hash256;

/// Errors raised while decoding binary data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("decode underflow: needed {needed} bytes, {remaining} remaining")]
    Underflow { needed: usize, remaining: usize },
}

/// Types that encode to and decode from the wire/disk format.
pub trait Serializable: Sized {
    fn encode(&self, out: &mut Encoder);
    fn decode(input: &mut Decoder<'_>) -> Result<Self, DecodeError>;

    fn serialize(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        self.encode(&mut enc);
        enc.into_bytes()
    }

    fn deserialize(data: &[u8]) -> Result<Self, DecodeError> {
        let mut dec = Decoder::new(data);
        Self::decode(&mut dec)
    }
}

/// Growable write buffer.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Raw bytes, no length prefix
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_hash(&mut self, hash: &Hash256) {
        self.buf.extend_from_slice(hash.as_bytes());
    }

    /// u64 length prefix followed by the bytes
    pub fn put_var_bytes(&mut self, bytes: &[u8]) {
        self.put_u64(bytes.len() as u64);
        self.put_bytes(bytes);
    }

    /// u64 length prefix followed by the encoded items
    pub fn put_vec<T: Serializable>(&mut self, items: &[T]) {
        self.put_u64(items.len() as u64);
        for item in items {
            item.encode(self);
        }
    }
}

/// Cursor over a byte slice. Every read fails with `Underflow` when fewer
/// bytes remain than requested; the caller decides whether that is fatal.
#[derive(Debug)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::Underflow {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("4 bytes")))
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes(bytes.try_into().expect("4 bytes")))
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("8 bytes")))
    }

    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        let bytes = self.take(8)?;
        Ok(i64::from_le_bytes(bytes.try_into().expect("8 bytes")))
    }

    pub fn read_hash(&mut self) -> Result<Hash256, DecodeError> {
        let bytes = self.take(32)?;
        Ok(Hash256::from_slice(bytes).expect("32 bytes"))
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self.take(N)?;
        Ok(bytes.try_into().expect("fixed width"))
    }

    /// u64 length prefix followed by the bytes
    pub fn read_var_bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_u64()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// u64 length prefix followed by the encoded items
    pub fn read_vec<T: Serializable>(&mut self) -> Result<Vec<T>, DecodeError> {
        let len = self.read_u64()?;
        let mut items = Vec::new();
        for _ in 0..len {
            items.push(T::decode(self)?);
        }
        Ok(items)
    }
}
