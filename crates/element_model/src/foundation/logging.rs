//! Logging utilities and structured logging support

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system, ignoring a logger that is already installed
///
/// Useful from tests and from hosts that may configure logging themselves.
pub fn try_init() {
    let _ = env_logger::builder().is_test(cfg!(test)).try_init();
}
