//! Sovereign Gateway — transport bindings over the shared tool catalog

pub mod resources;
pub mod rpc;
pub mod server;
pub mod stdio;

pub use rpc::ServerState;
pub use server::start_sse;
pub use stdio::run_stdio;
