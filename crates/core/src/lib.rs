//! Core types and shared functionality for shelter.
//!
//! This crate provides:
//! - Versioned cache storage with SQLite backend
//! - Request/response types captured by the cache
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CacheEntry};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{Request, RequestMode, Response, ResponseType};
