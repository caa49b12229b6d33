//! I/O helpers for the launcher.

pub mod config;
pub mod env_file;
pub mod paths;
pub mod process;
pub mod strategy;
pub mod tee;
