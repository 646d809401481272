//! C-compatible status codes.
//!
//! [`ClassrefStatus`] is a `repr(i32)` enum covering every failure an FFI
//! call can report. Conversions from the Rust error types are provided.

use classref::{ConfigError, RefCountError};

/// C-compatible status code returned by all FFI functions.
///
/// `Ok` = 0, all errors are negative. Values are ABI-stable.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassrefStatus {
    /// Success.
    Ok = 0,
    /// Handle is invalid, stale, or belongs to a destroyed counter.
    InvalidHandle = -1,
    /// A pointer argument is null or a key is not valid UTF-8.
    InvalidArgument = -2,
    /// The class table could not grow.
    AllocationFailed = -3,
    /// The counter's class limit is reached.
    ClassLimitExceeded = -4,
    /// A balanced decrement found the global count already at zero.
    /// The decrement was not applied.
    GlobalUnderflow = -5,
    /// Configuration validation error.
    ///
    /// Reserved: every [`ClassrefConfig`](crate::ClassrefConfig) maps to a
    /// valid configuration because 0 means "unbounded", so no current call
    /// returns it. Kept so the code stays stable if a field with a
    /// rejectable value is added.
    ConfigError = -6,
    /// Internal error (e.g. poisoned mutex after a prior panic).
    InternalError = -7,
    /// A Rust panic was caught at the FFI boundary.
    Panicked = -128,
}

impl From<&RefCountError> for ClassrefStatus {
    fn from(e: &RefCountError) -> Self {
        match e {
            RefCountError::GlobalUnderflow { .. } => ClassrefStatus::GlobalUnderflow,
            RefCountError::ClassLimitExceeded { .. } => ClassrefStatus::ClassLimitExceeded,
            RefCountError::AllocationFailed { .. } => ClassrefStatus::AllocationFailed,
        }
    }
}

impl From<&ConfigError> for ClassrefStatus {
    fn from(_e: &ConfigError) -> Self {
        ClassrefStatus::ConfigError
    }
}
