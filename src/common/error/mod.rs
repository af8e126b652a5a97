//! Unified error types for longan.
//!
//! This module provides the error type shared by the coordinate codec,
//! the worksheet model, the package layer and the stream writer.

// Submodule declarations
pub mod conversions;
pub mod types;

// Re-exports
pub use types::{Error, Result};
