//! Kinetrack Common Utilities
//!
//! Shared infrastructure for all Kinetrack crates:
//! - Error types and result aliases
//! - Frame clock (frame number to wall-clock time)
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
