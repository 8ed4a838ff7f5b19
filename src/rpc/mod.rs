// JSON-RPC surface

pub mod handlers;
mod server;

pub use handlers::{dispatch, RpcContext};
pub use server::{handle_request, RpcServer};
