//! Session authentication module.
//!
//! Holds the process-wide session credential and the request guard that
//! attaches it to every outgoing call and invalidates the session when the
//! server reports an authorization failure.

mod credential;
mod guard;

pub use credential::*;
pub use guard::*;
