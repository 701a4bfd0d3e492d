//! # Offline Mutation Log
//!
//! Keeps every local mutation until the remote API confirms it.
//!
//! ## Key Components
//!
//! - `queue.rs`: the durable, priority-ordered operation log and its drain pass
//! - `retry.rs`: retry ceiling and backoff strategies
//!
//! The log never talks to the network itself; the sync engine hands it an
//! `apply` function when it drains.

pub mod queue;
pub mod retry;

pub use queue::{
    DrainReport, DropReason, DroppedOperation, HttpVerb, Operation, OperationKind, OperationLog,
};
pub use retry::{BackoffStrategy, RetryDecision, RetryPolicy, MAX_RETRY_ATTEMPTS};
