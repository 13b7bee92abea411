//! Core types and shared functionality for tether.
//!
//! This crate provides:
//! - The cache store capability with SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheStore, CachedEntry, Generation, MemoryCacheStore};
pub use config::AppConfig;
pub use error::Error;
