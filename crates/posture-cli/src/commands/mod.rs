//! Command handlers

pub mod config;
pub mod fallback;
pub mod watch;
