//! Shared Module
//!
//! Types shared by the sync engine, the lifecycle controller and the
//! persistence layer. All types here are plain data and serialize over the
//! float plan API and into the local database.

/// Float plan data structure
pub mod plan;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use plan::{is_overdue, CheckInReport, EmergencyContact, EscalationStage, FloatPlan, PlanEdit, PlanStatus};
pub use error::SharedError;
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
