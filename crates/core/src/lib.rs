//! Core utilities for the rtr rendering framework.
//!
//! This crate provides foundational types and utilities used across the
//! workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Timer utilities

mod error;
mod logging;
mod timer;

pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
