// RPC transport: HTTP/1.1 over TCP, one thread per request
//
// The framing is deliberately minimal: a single read per request, body
// extraction from the first '{', a fixed CORS header set, and a closed
// connection after each response.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use serde_json::{json, Value};

use crate::chain::{BlockChain, Mempool};
use crate::rpc::handlers::{dispatch, RpcContext};

const MAX_REQUEST_BYTES: usize = 8192;

const OPTIONS_RESPONSE: &str = "HTTP/1.1 204 No Content\r\n\
    Access-Control-Allow-Origin: *\r\n\
    Access-Control-Allow-Methods: POST, GET, OPTIONS\r\n\
    Access-Control-Allow-Headers: Content-Type, Authorization, X-Requested-With\r\n\
    Access-Control-Max-Age: 86400\r\n\
    Connection: close\r\n\r\n";

/// JSON-RPC server over the chain and mempool
pub struct RpcServer {
    port: u16,
    ctx: Arc<RpcContext>,
    running: Arc<AtomicBool>,
    local_port: AtomicU16,
    listen_thread: Mutex<Option<JoinHandle<()>>>,
}

impl RpcServer {
    pub fn new(port: u16, chain: Arc<BlockChain>, mempool: Arc<Mempool>) -> Self {
        Self {
            port,
            ctx: Arc::new(RpcContext::new(chain, mempool)),
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
        log::info!("rpc server listening on port {}", local_port);

        let running = self.running.clone();
        let ctx = self.ctx.clone();
        let handle = thread::spawn(move || accept_loop(listener, ctx, running));
        *self.listen_thread.lock().unwrap() = Some(handle);
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        drop(self.listen_thread.lock().unwrap().take());
    }

    /// Port actually bound (differs from the configured one for port 0)
    pub fn local_port(&self) -> u16 {
        self.local_port.load(Ordering::SeqCst)
    }
}

fn accept_loop(listener: TcpListener, ctx: Arc<RpcContext>, running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _addr)) => {
                let ctx = ctx.clone();
                thread::spawn(move || handle_connection(stream, ctx));
            }
            Err(err) => {
                log::warn!("rpc: accept failed: {}", err);
                return;
            }
        }
    }
}

fn handle_connection(mut stream: TcpStream, ctx: Arc<RpcContext>) {
    let mut buffer = [0u8; MAX_REQUEST_BYTES];
    let read = match stream.read(&mut buffer) {
        Ok(0) | Err(_) => return,
        Ok(read) => read,
    };
    let request = String::from_utf8_lossy(&buffer[..read]).into_owned();

    let response = if request.starts_with("OPTIONS") {
        OPTIONS_RESPONSE.to_string()
    } else {
        // Body extraction: everything from the first '{'
        let body = request.find('{').map(|at| &request[at..]).unwrap_or("");
        let response_body = handle_request(&ctx, body);
        format!(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: application/json\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Access-Control-Allow-Methods: POST, GET, OPTIONS\r\n\
             Access-Control-Allow-Headers: Content-Type, Authorization\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n{}",
            response_body.len(),
            response_body
        )
    };

    if let Err(err) = stream.write_all(response.as_bytes()) {
        log::debug!("rpc: failed to write response: {}", err);
    }
    // Connection closes when the stream drops
}

/// Parse a JSON-RPC body, dispatch it, and wrap the result in the
/// response envelope
pub fn handle_request(ctx: &RpcContext, body: &str) -> String {
    if body.is_empty() {
        return json!({ "error": "Empty body", "id": null }).to_string();
    }

    let request: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(err) => {
            log::debug!("rpc: malformed request: {}", err);
            return json!({ "error": "Parse error" }).to_string();
        }
    };

    let method = request
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let params = request
        .get("params")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let result = dispatch(ctx, &method, &params);
    json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string()
}
