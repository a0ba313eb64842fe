//! Integration tests for the runbooks server
//!
//! These tests drive sessions, script runs, and template reconciliation
//! through the public library API.

#[path = "../common/mod.rs"]
pub mod common;

pub mod cli;
pub mod manifest_render;
pub mod session_exec;
