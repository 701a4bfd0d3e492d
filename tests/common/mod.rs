//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - A scripted remote that records attempt order
//! - A harness wiring the database, engine, scheduler and controller
//! - Custom assertion macros

pub mod assertions;

// Re-export commonly used utilities
pub use assertions::*;
pub use fixtures::*;
pub use mock_remote::*;
