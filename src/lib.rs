//! Oracle Console - live monitoring client for the oracle device reachability server
//!
//! This library keeps an in-memory view of managed devices and their
//! reachability status consistent by merging periodic REST snapshots with
//! incremental events from WebSocket push channels, and guards every request
//! with the current session credential.

pub mod api;
pub mod channel;
pub mod cli;
pub mod config;
pub mod eventlog;
pub mod logging;
pub mod presenter;
pub mod session;
pub mod status;
