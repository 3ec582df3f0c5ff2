//! Core types and shared functionality for flipcast.
//!
//! This crate provides:
//! - The in-app message cache with SQLite and in-memory backends
//! - The cached message entity and its row codec
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod message;

pub use cache::{CacheLimit, MessageAddress, MessageCache};
pub use config::AppConfig;
pub use error::Error;
pub use message::{InAppMessage, MessageUpdate};
