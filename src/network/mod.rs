// P2P networking: wire framing and the handshake server

pub mod message;
mod p2p;

pub use message::{MessageHeader, VersionMessage};
pub use p2p::P2PServer;
