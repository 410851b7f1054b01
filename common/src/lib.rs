//! Shared utilities for the starfield workspace.

pub mod file_utils;
pub mod log_setup;
pub mod parallel;
