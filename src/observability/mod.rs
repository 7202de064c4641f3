//! Ambient logging and metrics setup, installed once per process.

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
