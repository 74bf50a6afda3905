//! Command implementations
//!
//! Each command module provides a clap-derived struct and execute method.

pub mod boards;
pub mod build;
pub mod clean;
pub mod init;
