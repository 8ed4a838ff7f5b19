// Network and monetary constants

/// P2P network magic ("AURL" little-endian).
pub const NET_MAGIC: u32 = 0x4155_524C;

/// Default JSON-RPC listen port.
pub const DEFAULT_RPC_PORT: u16 = 18883;

/// Default P2P listen port.
pub const DEFAULT_P2P_PORT: u16 = 18882;

/// Protocol version advertised in the P2P `version` message.
pub const PROTOCOL_VERSION: i32 = 1;

/// Base units per coin.
pub const COIN: i64 = 100_000_000;

/// Coinbase reward per block (2500 AUC).
pub const BLOCK_REWARD: i64 = 2_500 * COIN;

/// Address that collects the configured block rewards.
pub const RESERVE_ADDRESS: &str = "AUR131FCE87dAe14b2A9568D0146950125Fe217Bf0e";

/// Genesis block timestamp (2026-01-09 00:00:00 UTC).
pub const GENESIS_TIMESTAMP: u32 = 1_767_916_800;

/// Genesis difficulty encoding. Stored in headers, never interpreted.
pub const GENESIS_BITS: u32 = 0x1e00_ffff;

/// Coinbase scriptSig text of the genesis transaction.
pub const GENESIS_COINBASE_TEXT: &str = "2026-01-08 Aurelis Republic Established";

/// scriptSig marker that admits a coinbase-shaped transaction into the
/// mempool as a protocol mint.
pub const MINT_TAG: &[u8; 4] = b"MINT";

/// Name of the append-only block log in the data directory.
pub const BLOCK_DATA_FILE: &str = "blockchain.dat";

/// Human-facing address prefix.
pub const ADDRESS_PREFIX: &str = "AUR";
