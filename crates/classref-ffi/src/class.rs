//! Class FFI: lookup, counting, and reads.
//!
//! Class handles are issued once per (counter, class) pair: asking for the
//! same key twice returns the same handle. Every class handle of a counter
//! is invalidated by `classref_destroy`.

use std::sync::Mutex;

use classref::RefClass;

use crate::counter::{get_counter, CounterArc};
use crate::handle::HandleTable;
use crate::status::ClassrefStatus;

#[derive(Clone)]
pub(crate) struct ClassRef {
    entry: CounterArc,
    index: usize,
}

static CLASSES: Mutex<HandleTable<ClassRef>> = Mutex::new(HandleTable::new());

pub(crate) fn classes() -> &'static Mutex<HandleTable<ClassRef>> {
    &CLASSES
}

fn get_class(handle: u64) -> Option<ClassRef> {
    CLASSES.lock().ok()?.get(handle).cloned()
}

/// Resolve `class` and run `f` on it without holding any table lock.
fn with_class(class: u64, f: impl FnOnce(&RefClass<'_>) -> i32) -> i32 {
    let Some(cref) = get_class(class) else {
        return ClassrefStatus::InvalidHandle as i32;
    };
    match cref.entry.counter.class_at(cref.index) {
        Some(class) => f(&class),
        None => ClassrefStatus::InternalError as i32,
    }
}

/// Look up the class named by `key`, creating it on first use.
///
/// `key` points to `key_len` bytes of UTF-8 (no terminator needed). The
/// class handle is written to `class_out`; the same key on the same counter
/// always yields the same handle.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn classref_class_get(
    rc: u64,
    key: *const u8,
    key_len: usize,
    class_out: *mut u64,
) -> i32 {
    ffi_guard!({
        if key.is_null() || class_out.is_null() {
            return ClassrefStatus::InvalidArgument as i32;
        }
        // SAFETY: key is non-null and valid for key_len bytes per caller contract.
        let bytes = unsafe { std::slice::from_raw_parts(key, key_len) };
        let Ok(key) = std::str::from_utf8(bytes) else {
            return ClassrefStatus::InvalidArgument as i32;
        };
        let Some(entry) = get_counter(rc) else {
            return ClassrefStatus::InvalidHandle as i32;
        };
        let index = match entry.counter.get_or_create_class(key) {
            Ok(class) => class.index(),
            Err(e) => return ClassrefStatus::from(&e) as i32,
        };

        let mut issued = ffi_lock!(entry.issued);
        if issued.closed {
            return ClassrefStatus::InvalidHandle as i32;
        }
        if index >= issued.by_index.len() {
            issued.by_index.resize(index + 1, None);
        }
        let handle = match issued.by_index[index] {
            Some(handle) => handle,
            None => {
                let handle = ffi_lock!(CLASSES).insert(ClassRef {
                    entry: CounterArc::clone(&entry),
                    index,
                });
                issued.by_index[index] = Some(handle);
                handle
            }
        };
        ffi_write!(class_out, handle);
        ClassrefStatus::Ok as i32
    })
}

/// Write the current count of `class` to `count_out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn classref_class_read(class: u64, count_out: *mut i64) -> i32 {
    ffi_guard!({
        with_class(class, |c| {
            ffi_write!(count_out, c.read());
            ClassrefStatus::Ok as i32
        })
    })
}

/// Write the number of imbalanced decrements seen by `class` to `count_out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn classref_class_imbalances(class: u64, count_out: *mut u64) -> i32 {
    ffi_guard!({
        with_class(class, |c| {
            ffi_write!(count_out, c.imbalances());
            ClassrefStatus::Ok as i32
        })
    })
}

/// Take one reference on `class`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn classref_inc(class: u64) -> i32 {
    ffi_guard!({
        with_class(class, |c| {
            c.increment();
            ClassrefStatus::Ok as i32
        })
    })
}

/// Take `n` references on `class`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn classref_add(n: u32, class: u64) -> i32 {
    ffi_guard!({
        with_class(class, |c| {
            c.add(n);
            ClassrefStatus::Ok as i32
        })
    })
}

/// Release one reference on `class`.
///
/// An imbalanced release is logged and still returns `Ok`; the global count
/// is left unchanged. `GlobalUnderflow` means the release was refused.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn classref_dec(class: u64) -> i32 {
    ffi_guard!({
        with_class(class, |c| match c.try_decrement() {
            Ok(_) => ClassrefStatus::Ok as i32,
            Err(e) => ClassrefStatus::from(&e) as i32,
        })
    })
}

/// Release one reference on `class` and write 1 to `zero_out` if the
/// global count is now zero, 0 otherwise.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn classref_dec_and_test(class: u64, zero_out: *mut u8) -> i32 {
    ffi_guard!({
        if zero_out.is_null() {
            return ClassrefStatus::InvalidArgument as i32;
        }
        with_class(class, |c| match c.try_decrement_and_test() {
            Ok(zero) => {
                ffi_write!(zero_out, u8::from(zero));
                ClassrefStatus::Ok as i32
            }
            Err(e) => ClassrefStatus::from(&e) as i32,
        })
    })
}
