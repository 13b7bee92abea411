//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting the cache store.

pub mod generations;
pub mod get;

pub use generations::{CacheGenerationsParams, generations_impl};
pub use get::{CacheGetParams, get_impl};
