// P2P wire messages
//
// Every message is a 24-byte header { magic, 12-byte NUL-padded command,
// payload length, checksum } followed by the payload. The checksum is the
// first four bytes of the payload's double SHA256.

use crate::constants::{NET_MAGIC, PROTOCOL_VERSION};
use crate::core::{hash256, Decoder, DecodeError, Encoder, Serializable};

/// Width of the command field
pub const COMMAND_SIZE: usize = 12;

/// Header size on the wire
pub const HEADER_SIZE: usize = 24;

/// Checksum carried by `verack` (empty payload)
pub const VERACK_CHECKSUM: u32 = 0x5df6_e0e2;

/// First four bytes of hash256(payload), read little-endian
pub fn payload_checksum(payload: &[u8]) -> u32 {
    let hash = hash256(payload);
    u32::from_le_bytes(hash.as_bytes()[0..4].try_into().expect("4 bytes"))
}

/// 24-byte message header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub magic: u32,
    pub command: [u8; COMMAND_SIZE],
    pub length: u32,
    pub checksum: u32,
}

impl MessageHeader {
    /// Header announcing `payload` under the given command name
    pub fn new(command: &str, payload: &[u8]) -> Self {
        Self {
            magic: NET_MAGIC,
            command: Self::pack_command(command),
            length: payload.len() as u32,
            checksum: payload_checksum(payload),
        }
    }

    fn pack_command(command: &str) -> [u8; COMMAND_SIZE] {
        let mut packed = [0u8; COMMAND_SIZE];
        let bytes = command.as_bytes();
        let len = bytes.len().min(COMMAND_SIZE);
        packed[..len].copy_from_slice(&bytes[..len]);
        packed
    }

    /// Command name with NUL padding stripped
    pub fn command_str(&self) -> String {
        let end = self
            .command
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(COMMAND_SIZE);
        String::from_utf8_lossy(&self.command[..end]).into_owned()
    }
}

impl Serializable for MessageHeader {
    fn encode(&self, out: &mut Encoder) {
        out.put_u32(self.magic);
        out.put_bytes(&self.command);
        out.put_u32(self.length);
        out.put_u32(self.checksum);
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            magic: input.read_u32()?,
            command: input.read_array()?,
            length: input.read_u32()?,
            checksum: input.read_u32()?,
        })
    }
}

/// `version` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMessage {
    pub version: i32,
    pub services: u64,
    pub timestamp: i64,
    pub start_height: i32,
}

impl VersionMessage {
    pub fn new(timestamp: i64, start_height: i32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            services: 0,
            timestamp,
            start_height,
        }
    }
}

impl Serializable for VersionMessage {
    fn encode(&self, out: &mut Encoder) {
        out.put_i32(self.version);
        out.put_u64(self.services);
        out.put_i64(self.timestamp);
        out.put_i32(self.start_height);
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            version: input.read_i32()?,
            services: input.read_u64()?,
            timestamp: input.read_i64()?,
            start_height: input.read_i32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_24_bytes() {
        let header = MessageHeader::new("version", b"payload");
        assert_eq!(header.serialize().len(), HEADER_SIZE);
    }

    #[test]
    fn test_header_roundtrip() {
        let header = MessageHeader::new("version", b"abc");
        let decoded = MessageHeader::deserialize(&header.serialize()).unwrap();
        assert_eq!(header, decoded);
        assert_eq!(decoded.command_str(), "version");
        assert_eq!(decoded.length, 3);
        assert_eq!(decoded.magic, NET_MAGIC);
    }

    #[test]
    fn test_command_is_nul_padded() {
        let header = MessageHeader::new("verack", &[]);
        assert_eq!(&header.command[..6], b"verack");
        assert_eq!(&header.command[6..], &[0u8; 6]);
    }

    #[test]
    fn test_magic_spells_aurl() {
        assert_eq!(&NET_MAGIC.to_le_bytes(), b"LRUA");
        assert_eq!(NET_MAGIC, 0x4155_524C);
    }

    #[test]
    fn test_empty_payload_checksum_bytes() {
        // hash256("") begins 5d f6 e0 e2; read little-endian that is
        // 0xe2e0f65d
        assert_eq!(payload_checksum(&[]), 0xe2e0_f65d);
    }

    #[test]
    fn test_version_message_roundtrip() {
        let msg = VersionMessage::new(1_800_000_000, 42);
        assert_eq!(msg.serialize().len(), 4 + 8 + 8 + 4);
        let decoded = VersionMessage::deserialize(&msg.serialize()).unwrap();
        assert_eq!(msg, decoded);
        assert_eq!(decoded.version, PROTOCOL_VERSION);
        assert_eq!(decoded.services, 0);
    }
}
