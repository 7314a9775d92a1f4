//! Cache-related MCP tools.
//!
//! This module provides read access to the cache stores in SQLite.

pub mod keys;

pub use keys::{CacheKeysParams, keys_impl};
