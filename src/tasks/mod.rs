//! Background Tasks Module
//!
//! # Tasks
//! - Store cleanup: drops namespace values whose store TTL has lapsed.
//!   Tracked keys themselves are only pruned when a namespace is touched.
//! - Session cleanup: drops sessions idle past the longest retention window.

mod cleanup;

pub use cleanup::spawn_cleanup_task;
