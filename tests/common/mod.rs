//! Shared test utilities
//!
//! - Temporary project directories for session tests
//! - Helpers for writing rendered template trees

pub mod fixtures;
