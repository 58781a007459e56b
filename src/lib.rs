//! NAVPOKE — ETF NAV on-chain price oracle updater
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod page;
pub mod extract;
pub mod validate;
pub mod decide;
pub mod chain;
pub mod submit;
pub mod pipeline;
