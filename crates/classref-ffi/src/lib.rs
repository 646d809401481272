//! C ABI for class-attributed reference counting.
//!
//! Counters and classes are addressed by opaque `u64` handles. Every
//! function returns a [`ClassrefStatus`] code and writes results through
//! caller-provided out-pointers.
//!
//! Handles are slot+generation pairs, so a destroyed counter (or any
//! class handle obtained from it) fails with
//! [`ClassrefStatus::InvalidHandle`] instead of touching freed memory.
//! Panics never cross the boundary; they surface as
//! [`ClassrefStatus::Panicked`].
//!
//! Diagnostics go to the `log` facade under the `classref` target; the
//! host process decides whether a logger is installed.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

/// Run an FFI body, converting a panic into [`ClassrefStatus::Panicked`].
macro_rules! ffi_guard {
    ($body:block) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| -> i32 { $body })) {
            Ok(status) => status,
            Err(_) => $crate::status::ClassrefStatus::Panicked as i32,
        }
    };
}

/// Lock a mutex, returning `InternalError` from the enclosing FFI body if
/// it is poisoned.
macro_rules! ffi_lock {
    ($mutex:expr) => {
        match $mutex.lock() {
            Ok(guard) => guard,
            Err(_) => return $crate::status::ClassrefStatus::InternalError as i32,
        }
    };
}

/// Write `value` through `out`, returning `InvalidArgument` from the
/// enclosing FFI body if `out` is null.
macro_rules! ffi_write {
    ($out:expr, $value:expr) => {{
        if $out.is_null() {
            return $crate::status::ClassrefStatus::InvalidArgument as i32;
        }
        // SAFETY: non-null and valid for writes per caller contract.
        unsafe { *$out = $value };
    }};
}

pub mod class;
pub mod config;
pub mod counter;
mod handle;
pub mod status;

pub use config::ClassrefConfig;
pub use status::ClassrefStatus;
