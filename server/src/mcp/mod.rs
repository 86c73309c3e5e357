//! Model Context Protocol server.
//!
//! The editor launches the binary and talks JSON-RPC 2.0 over stdio, one
//! message per line.

pub mod protocol;
pub mod resources;
pub mod server;
pub mod tools;
pub mod transport;

pub use protocol::*;
pub use server::McpServer;
