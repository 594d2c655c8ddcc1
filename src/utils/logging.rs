//! Per-tick logging for the sampling loop.
//!
//! The sampler fires several times a second, so its per-tick messages are
//! gated by a module-level `TICK_LOGS` flag on top of the usual log level:
//!
//! ```ignore
//! const TICK_LOGS: bool = false;
//! use crate::{tick_debug, tick_warn};
//!
//! tick_debug!("decoded {payload}");
//! ```

/// `log::debug!` when the calling module's `TICK_LOGS` is true.
#[macro_export]
macro_rules! tick_debug {
    ($($arg:tt)*) => {
        if TICK_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// `log::trace!` when the calling module's `TICK_LOGS` is true.
#[macro_export]
macro_rules! tick_trace {
    ($($arg:tt)*) => {
        if TICK_LOGS {
            log::trace!($($arg)*);
        }
    };
}

/// `log::warn!` when the calling module's `TICK_LOGS` is true.
#[macro_export]
macro_rules! tick_warn {
    ($($arg:tt)*) => {
        if TICK_LOGS {
            log::warn!($($arg)*);
        }
    };
}
