//! HTTP request handlers for the runbooks API.

pub mod exec;
pub mod session;
