//! Shared utilities for the VEIL election engine.

pub mod logging;
pub mod time;

pub use logging::init_tracing;
pub use time::{format_countdown, format_duration};
