// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module:
//! - maps configured globs onto watch bindings ([`bindings`]),
//! - wires up a cross-platform filesystem watcher (`notify`),
//! - drops rewrites that leave a file's content unchanged ([`cache`]).
//!
//! It does not run anything; it only turns filesystem changes into
//! binding-level events for the engine.

pub mod bindings;
pub mod cache;
pub mod event_handler;
pub mod watcher;

pub use bindings::{build_bindings, matching, WatchBinding};
pub use cache::{content_hash, ContentCache};
pub use watcher::{spawn_watcher, WatcherHandle};
