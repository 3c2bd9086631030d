//! HTTP API module.
//!
//! Server, wire types and the log broadcaster shared by every layer.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{build_router, start_server, AppState};
pub use types::*;
