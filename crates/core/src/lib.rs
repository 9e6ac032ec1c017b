//! Core types and shared functionality for the offline cache agent.
//!
//! This crate provides:
//! - Named cache stores with a SQLite backend
//! - Request/response types shared by the agent and its host
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CacheHandle, CacheStorage, StoredEntry};
pub use config::AgentConfig;
pub use error::Error;
pub use http::{AgentRequest, AgentResponse, Destination, ResponseSource};
