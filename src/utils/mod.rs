//! Utility modules for the smart clock server
//!
//! This module contains common utilities used across the codebase.

pub mod throttle;

pub use throttle::{Cooldown, LogThrottler};
