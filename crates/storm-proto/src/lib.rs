//! Shared types for the storm dashboard: daemon wire records, configuration
//! and platform paths.

pub mod config;
pub mod platform;
pub mod protocol;
