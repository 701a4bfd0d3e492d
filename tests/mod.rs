//! Test suite for floatplan
//!
//! This module organizes all tests

pub mod common;
pub mod integration;
pub mod property;
