//! Integration tests across the engine, log, scheduler and controller

pub mod lifecycle_scenario_test;
pub mod offline_checkin_test;
pub mod reconcile_test;
pub mod retry_exhaustion_test;
