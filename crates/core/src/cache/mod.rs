//! SQLite-backed versioned cache storage.
//!
//! This module provides named cache stores of captured responses, keyed by
//! request (method + URL), using SQLite with async access via tokio-rusqlite.
//! It supports:
//!
//! - One store per deployed version, identified by a version-tagged name
//! - Atomic multi-entry writes (all entries or none)
//! - Per-key upserts for opportunistic runtime caching
//! - Deleting whole stores, cascading to their entries
//! - Automatic schema migrations

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CacheEntry;
