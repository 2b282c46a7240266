//! Data layer of the retreat operations dashboard.
//!
//! DESIGN
//! ======
//! Feature data (action items, social posts, staff) lives in a browser-style
//! key/value store shared by every open context. Each context loads its own
//! in-memory model, writes collections wholesale, and runs a sync monitor
//! that mirrors the collections into a snapshot and re-captures it when the
//! store drifts or another context writes.

pub mod access;
pub mod collections;
pub mod config;
pub mod model;
pub mod services;
pub mod snapshot;
pub mod state;
pub mod storage;

/// Stable machine-readable code for an error, printed by the CLI.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// One-line rendering for the CLI: `error[CODE]: message`, flagged when a
/// retry may succeed.
#[must_use]
pub fn render_error(err: &dyn ErrorCode) -> String {
    if err.retryable() {
        format!("error[{}] (retryable): {err}", err.error_code())
    } else {
        format!("error[{}]: {err}", err.error_code())
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
