//! Remote Resource API
//!
//! The boundary between the sync engine and whatever backend holds the
//! authoritative float plans. Every call returns an explicit outcome from
//! the retry taxonomy; callers never inspect error text to decide what to do.
//!
//! - `Ok(())`: the server confirmed the mutation
//! - `RemoteError::Retryable`: a transient failure, keep the operation
//! - `RemoteError::Fatal`: the server rejected it; drop the operation

pub mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::offline::Operation;

pub use http::HttpRemote;

/// Remote failure classified for the retry taxonomy
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Transient failure; the operation stays queued
    #[error("retryable remote failure: {message}")]
    Retryable {
        /// Human-readable error message
        message: String,
    },

    /// Permanent rejection; the operation is dropped
    #[error("remote rejected request: {message}")]
    Fatal {
        /// HTTP status, when the failure came from a response
        status: Option<u16>,
        /// Human-readable error message
        message: String,
    },
}

impl RemoteError {
    /// Create a retryable error
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable {
            message: message.into(),
        }
    }

    /// Create a fatal error
    pub fn fatal(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Fatal {
            status,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

/// Resource collections the engine pulls during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    FloatPlans,
    EmergencyContacts,
}

impl ResourceKind {
    /// Collection path on the remote API
    pub fn path(&self) -> &'static str {
        match self {
            ResourceKind::FloatPlans => "/float_plans",
            ResourceKind::EmergencyContacts => "/emergency_contacts",
        }
    }
}

/// A backend that can apply operations and list resources
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Apply one queued mutation
    async fn apply(&self, operation: &Operation) -> Result<(), RemoteError>;

    /// Fetch the authoritative list of one resource kind
    async fn list(&self, kind: ResourceKind) -> Result<Vec<serde_json::Value>, RemoteError>;
}
