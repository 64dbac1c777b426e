//! Shared utilities for cosmtx binaries.

pub mod logging;

pub use logging::{init_logging, init_tracing, LogFormat};
