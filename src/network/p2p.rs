// P2P server: TCP listener, one thread per peer, version/verack handshake

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::NET_MAGIC;
use crate::core::Serializable;
use crate::network::message::{MessageHeader, VersionMessage, HEADER_SIZE, VERACK_CHECKSUM};

/// Accepts peer connections and performs the version/verack handshake.
/// No block or transaction gossip; the handshake is the whole protocol.
pub struct P2PServer {
    port: u16,
    running: Arc<AtomicBool>,
    local_port: AtomicU16,
    listen_thread: Mutex<Option<JoinHandle<()>>>,
}

impl P2PServer {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            running: Arc::new(AtomicBool::new(false)),
            local_port: AtomicU16::new(0),
            listen_thread: Mutex::new(None),
        }
    }

    /// Bind the listener and spawn the accept loop
    pub fn start(&self) -> std::io::Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let listener = TcpListener::bind(("0.0.0.0", self.port))?;
        let local_port = listener.local_addr()?.port();
        self.local_port.store(local_port, Ordering::SeqCst);
        log::info!("p2p server listening on port {}", local_port);

        let running = self.running.clone();
        let handle = thread::spawn(move || accept_loop(listener, running));
        *self.listen_thread.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Signal the accept loop to wind down. Peers drop on their own when
    /// their sockets close.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        // The accept loop exits after its next connection; don't block on it
        drop(self.listen_thread.lock().unwrap().take());
    }

    /// Port actually bound (differs from the configured one for port 0)
    pub fn local_port(&self) -> u16 {
        self.local_port.load(Ordering::SeqCst)
    }

    /// Dial a peer and run the same handshake from our side
    pub fn connect_to(&self, addr: &str) {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                let peer_addr = stream
                    .peer_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| addr.to_string());
                log::info!("p2p: connected to {}", peer_addr);
                let running = self.running.clone();
                thread::spawn(move || {
                    if let Err(err) = handle_peer(stream, &peer_addr, running) {
                        log::debug!("p2p: peer {} error: {}", peer_addr, err);
                    }
                });
            }
            Err(err) => log::warn!("p2p: failed to connect to {}: {}", addr, err),
        }
    }
}

fn accept_loop(listener: TcpListener, running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                log::info!("p2p: new connection from {}", addr);
                let running = running.clone();
                thread::spawn(move || {
                    let addr = addr.to_string();
                    if let Err(err) = handle_peer(stream, &addr, running) {
                        log::debug!("p2p: peer {} error: {}", addr, err);
                    }
                });
            }
            Err(err) => {
                log::warn!("p2p: accept failed: {}", err);
                return;
            }
        }
    }
}

fn handle_peer(
    mut stream: TcpStream,
    addr: &str,
    running: Arc<AtomicBool>,
) -> std::io::Result<()> {
    send_version(&mut stream)?;

    while running.load(Ordering::SeqCst) {
        let mut header_buf = [0u8; HEADER_SIZE];
        if stream.read_exact(&mut header_buf).is_err() {
            break;
        }

        let header = match MessageHeader::deserialize(&header_buf) {
            Ok(header) => header,
            Err(_) => break,
        };

        if header.magic != NET_MAGIC {
            log::warn!("p2p: invalid magic from {}", addr);
            break;
        }

        let mut payload = vec![0u8; header.length as usize];
        if header.length > 0 {
            stream.read_exact(&mut payload)?;
        }

        let command = header.command_str();
        log::debug!(
            "p2p: received '{}' ({} bytes) from {}",
            command,
            header.length,
            addr
        );

        match command.as_str() {
            "version" => {
                if let Ok(version) = VersionMessage::deserialize(&payload) {
                    log::info!(
                        "p2p: peer version {} | height {}",
                        version.version,
                        version.start_height
                    );
                }
                send_verack(&mut stream)?;
            }
            "verack" => {
                log::info!("p2p: handshake complete with {}", addr);
            }
            other => {
                log::debug!("p2p: ignoring '{}' from {}", other, addr);
            }
        }
    }

    log::info!("p2p: peer disconnected: {}", addr);
    Ok(())
}

fn send_version(stream: &mut TcpStream) -> std::io::Result<()> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let payload = VersionMessage::new(timestamp, 0).serialize();
    let header = MessageHeader::new("version", &payload);

    stream.write_all(&header.serialize())?;
    stream.write_all(&payload)?;
    log::debug!("p2p: sent 'version'");
    Ok(())
}

fn send_verack(stream: &mut TcpStream) -> std::io::Result<()> {
    let mut header = MessageHeader::new("verack", &[]);
    header.checksum = VERACK_CHECKSUM;
    stream.write_all(&header.serialize())?;
    log::debug!("p2p: sent 'verack'");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::message::payload_checksum;

    fn read_message(stream: &mut TcpStream) -> (MessageHeader, Vec<u8>) {
        let mut header_buf = [0u8; HEADER_SIZE];
        stream.read_exact(&mut header_buf).unwrap();
        let header = MessageHeader::deserialize(&header_buf).unwrap();
        let mut payload = vec![0u8; header.length as usize];
        if header.length > 0 {
            stream.read_exact(&mut payload).unwrap();
        }
        (header, payload)
    }

    #[test]
    fn test_handshake_over_loopback() {
        let server = P2PServer::new(0);
        server.start().unwrap();
        let port = server.local_port();

        let mut peer = TcpStream::connect(("127.0.0.1", port)).unwrap();

        // Server speaks first with its version
        let (header, payload) = read_message(&mut peer);
        assert_eq!(header.magic, NET_MAGIC);
        assert_eq!(header.command_str(), "version");
        assert_eq!(header.checksum, payload_checksum(&payload));
        let version = VersionMessage::deserialize(&payload).unwrap();
        assert_eq!(version.version, 1);
        assert_eq!(version.services, 0);
        assert_eq!(version.start_height, 0);

        // Our version earns a verack
        let our_payload = VersionMessage::new(0, 7).serialize();
        let our_header = MessageHeader::new("version", &our_payload);
        peer.write_all(&our_header.serialize()).unwrap();
        peer.write_all(&our_payload).unwrap();

        let (verack, verack_payload) = read_message(&mut peer);
        assert_eq!(verack.command_str(), "verack");
        assert_eq!(verack.length, 0);
        assert!(verack_payload.is_empty());
        assert_eq!(verack.checksum, VERACK_CHECKSUM);

        // Completing the handshake keeps the connection open
        let our_verack = MessageHeader::new("verack", &[]);
        peer.write_all(&our_verack.serialize()).unwrap();

        server.stop();
    }

    #[test]
    fn test_invalid_magic_closes_connection() {
        let server = P2PServer::new(0);
        server.start().unwrap();
        let port = server.local_port();

        let mut peer = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let (_, _) = read_message(&mut peer); // server's version

        let mut bogus = MessageHeader::new("version", &[]);
        bogus.magic = 0xdead_beef;
        peer.write_all(&bogus.serialize()).unwrap();

        // Server drops the peer: the next read hits EOF
        let mut buf = [0u8; 1];
        assert_eq!(peer.read(&mut buf).unwrap_or(0), 0);

        server.stop();
    }
}
