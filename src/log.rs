//! Logging macros for the scheduler core
//!
//! Forward to `defmt` when the `defmt` feature is enabled and to the `log`
//! facade when only the `log` feature is. With neither, the arguments are
//! type-checked and nothing is emitted. Kernel call sites only format
//! integers, string slices and `{:?}` of kernel enums, which every backend
//! accepts.

#[doc(hidden)]
#[cfg(feature = "defmt")]
pub use defmt as backend;

#[doc(hidden)]
#[cfg(all(feature = "log", not(feature = "defmt")))]
pub use log as backend;

#[doc(hidden)]
#[cfg(not(any(feature = "log", feature = "defmt")))]
pub mod backend {
    macro_rules! nop {
        ($($arg:tt)*) => {{
            let _ = ::core::format_args!($($arg)*);
        }};
    }

    pub(crate) use nop as debug;
    pub(crate) use nop as error;
    pub(crate) use nop as info;
    pub(crate) use nop as trace;
    pub(crate) use nop as warn;
}

/// Debug message
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => { $crate::log::backend::debug!($($arg)*) };
}

/// Info message
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => { $crate::log::backend::info!($($arg)*) };
}

/// Error message
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => { $crate::log::backend::error!($($arg)*) };
}

/// Trace message
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => { $crate::log::backend::trace!($($arg)*) };
}

/// Warning message
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => { $crate::log::backend::warn!($($arg)*) };
}
