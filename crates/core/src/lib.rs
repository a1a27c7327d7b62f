//! Core functionality for the Lifeline emergency dispatch engine.
//!
//! This crate provides the configuration, error, logging, and time
//! utilities shared across the Lifeline crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use config::{AuditConfig, EngineConfig, MatchingConfig, TrailConfig};
pub use error::{CoreError, Result};
pub use time::current_timestamp_ms;
