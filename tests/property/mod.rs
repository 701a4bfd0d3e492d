//! Property-based tests

pub mod backoff_proptest;
pub mod priority_proptest;
