//! Shared Error Types
//!
//! Error types shared by every layer of the crate. These represent local,
//! caller-correctable failures; network failures never surface here.
//!
//! # Error Categories
//!
//! - `ValidationError` - Float plan field validation failures
//!
//! # Usage
//!
//! ```rust
//! use floatplan::shared::error::SharedError;
//!
//! let error = SharedError::validation("vessel_name", "Vessel name cannot be empty");
//! ```
use thiserror::Error;

/// Shared error types
#[derive(Debug, Error, Clone)]
pub enum SharedError {
    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },
}

impl SharedError {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}
