//! SteadyStack Common Utilities
//!
//! Shared infrastructure for all SteadyStack crates:
//! - Error types, result aliases, and the session failure taxonomy
//! - Capture clock for timestamping frames and motion samples
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
