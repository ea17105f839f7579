//! # REST API client
//!
//! Typed access to the oracle server's REST resources. Every call goes
//! through the session [`RequestGuard`](crate::session::RequestGuard).
//!
//! ## Endpoints
//!
//! - `GET /api/devices` - Device list (snapshot)
//! - `POST /api/device` - Create a device (`id: 0`)
//! - `DELETE /api/device/{id}` - Remove a device
//! - `GET|POST /api/settings` - Global settings
//! - `POST /api/login`, `POST /api/logout` - Session management

mod client;
mod error;
mod types;

pub use client::{normalize_base_url, ConsoleClient};
pub use error::ApiError;
pub use types::*;
