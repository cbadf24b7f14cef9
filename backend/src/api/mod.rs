//! HTTP API module.
//!
//! This module provides the HTTP server, its response types and the
//! log stream for the leaguegrid engine.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server};
pub use types::*;
