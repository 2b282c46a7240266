//! Domain services used by the CLI and by embedding applications.
//!
//! ARCHITECTURE
//! ============
//! `sync` keeps the stored snapshot aligned with live collections;
//! `collection` owns record writes and calls back into `sync` after each one.

pub mod collection;
pub mod sync;
