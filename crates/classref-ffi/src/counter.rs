//! Counter lifecycle FFI: create, destroy, read.
//!
//! Each counter lives behind an `Arc` so the global `COUNTERS` table lock
//! is only held for the handle lookup; counting on different counters
//! never contends on it.

use std::sync::{Arc, Mutex};

use classref::{LeakEvent, RefCount, RefCountConfig};

use crate::config::ClassrefConfig;
use crate::handle::HandleTable;
use crate::status::ClassrefStatus;

/// Class handles issued for one counter, indexed by class index.
pub(crate) struct IssuedClasses {
    pub(crate) by_index: Vec<Option<u64>>,
    /// Set by destroy; no further class handles may be issued.
    pub(crate) closed: bool,
}

pub(crate) struct CounterEntry {
    pub(crate) counter: RefCount,
    pub(crate) issued: Mutex<IssuedClasses>,
}

pub(crate) type CounterArc = Arc<CounterEntry>;

static COUNTERS: Mutex<HandleTable<CounterArc>> = Mutex::new(HandleTable::new());

/// Clone the Arc behind a counter handle, briefly locking the global table.
///
/// Returns `None` if the handle is invalid or the mutex is poisoned.
pub(crate) fn get_counter(handle: u64) -> Option<CounterArc> {
    COUNTERS.lock().ok()?.get(handle).cloned()
}

#[allow(unsafe_code)]
fn register(counter: RefCount, rc_out: *mut u64) -> i32 {
    let entry = Arc::new(CounterEntry {
        counter,
        issued: Mutex::new(IssuedClasses {
            by_index: Vec::new(),
            closed: false,
        }),
    });
    let handle = ffi_lock!(COUNTERS).insert(entry);
    ffi_write!(rc_out, handle);
    ClassrefStatus::Ok as i32
}

/// Create a counter at zero with the default configuration.
///
/// Writes the counter handle to `rc_out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn classref_create(rc_out: *mut u64) -> i32 {
    ffi_guard!({
        if rc_out.is_null() {
            return ClassrefStatus::InvalidArgument as i32;
        }
        register(RefCount::new(), rc_out)
    })
}

/// Create a counter with an explicit configuration.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn classref_create_with_config(
    config: *const ClassrefConfig,
    rc_out: *mut u64,
) -> i32 {
    ffi_guard!({
        if config.is_null() || rc_out.is_null() {
            return ClassrefStatus::InvalidArgument as i32;
        }
        // SAFETY: config is non-null and valid for reads per caller contract.
        let config = RefCountConfig::from(unsafe { &*config });
        match RefCount::with_config(config) {
            Ok(counter) => register(counter, rc_out),
            Err(e) => ClassrefStatus::from(&e) as i32,
        }
    })
}

/// Destroy a counter and every class handle obtained from it.
///
/// Classes still holding references are logged as leaks if the counter
/// was configured to. Destroying twice returns `InvalidHandle`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn classref_destroy(rc: u64) -> i32 {
    ffi_guard!({
        let entry = match ffi_lock!(COUNTERS).remove(rc) {
            Some(entry) => entry,
            None => return ClassrefStatus::InvalidHandle as i32,
        };
        {
            let mut issued = ffi_lock!(entry.issued);
            issued.closed = true;
            let mut classes = ffi_lock!(crate::class::classes());
            for handle in issued.by_index.drain(..).flatten() {
                classes.remove(handle);
            }
        }
        release(entry);
        ClassrefStatus::Ok as i32
    })
}

/// Tear down a counter already removed from `COUNTERS`.
///
/// A call that resolved the handle before removal may still hold the Arc.
/// Leaks are reported now either way; the memory goes with the last Arc.
fn release(entry: CounterArc) -> Vec<LeakEvent> {
    match Arc::try_unwrap(entry) {
        Ok(entry) => entry.counter.destroy().leaks,
        Err(shared) => shared.counter.report_leaks(),
    }
}

/// Write the global count of `rc` to `count_out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn classref_read(rc: u64, count_out: *mut i64) -> i32 {
    ffi_guard!({
        let entry = match get_counter(rc) {
            Some(entry) => entry,
            None => return ClassrefStatus::InvalidHandle as i32,
        };
        ffi_write!(count_out, entry.counter.read());
        ClassrefStatus::Ok as i32
    })
}

/// Write the number of classes created on `rc` to `count_out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn classref_class_count(rc: u64, count_out: *mut usize) -> i32 {
    ffi_guard!({
        let entry = match get_counter(rc) {
            Some(entry) => entry,
            None => return ClassrefStatus::InvalidHandle as i32,
        };
        ffi_write!(count_out, entry.counter.class_count());
        ClassrefStatus::Ok as i32
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create() -> u64 {
        let mut rc = 0u64;
        assert_eq!(classref_create(&mut rc), ClassrefStatus::Ok as i32);
        rc
    }

    /// Remove `rc` from the table the way `classref_destroy` does.
    fn take_counter(rc: u64) -> CounterArc {
        COUNTERS.lock().unwrap().remove(rc).unwrap()
    }

    #[test]
    fn create_read_destroy() {
        let rc = create();
        let mut count = -1i64;
        assert_eq!(classref_read(rc, &mut count), ClassrefStatus::Ok as i32);
        assert_eq!(count, 0);
        let mut classes = 99usize;
        assert_eq!(
            classref_class_count(rc, &mut classes),
            ClassrefStatus::Ok as i32
        );
        assert_eq!(classes, 0);
        assert_eq!(classref_destroy(rc), ClassrefStatus::Ok as i32);
    }

    #[test]
    fn destroyed_handle_is_invalid() {
        let rc = create();
        assert_eq!(classref_destroy(rc), ClassrefStatus::Ok as i32);
        let mut count = 0i64;
        assert_eq!(
            classref_read(rc, &mut count),
            ClassrefStatus::InvalidHandle as i32
        );
        assert_eq!(classref_destroy(rc), ClassrefStatus::InvalidHandle as i32);
    }

    #[test]
    fn null_out_pointers_rejected() {
        assert_eq!(
            classref_create(std::ptr::null_mut()),
            ClassrefStatus::InvalidArgument as i32
        );
        let rc = create();
        assert_eq!(
            classref_read(rc, std::ptr::null_mut()),
            ClassrefStatus::InvalidArgument as i32
        );
        classref_destroy(rc);
    }

    #[test]
    fn create_with_config() {
        let config = ClassrefConfig {
            key_limit: 20,
            max_classes: 4,
            report_leaks_on_destroy: 0,
        };
        let mut rc = 0u64;
        assert_eq!(
            classref_create_with_config(&config, &mut rc),
            ClassrefStatus::Ok as i32
        );
        let entry = get_counter(rc).unwrap();
        assert_eq!(entry.counter.config().key_limit, Some(20));
        assert_eq!(entry.counter.config().max_classes, Some(4));
        drop(entry);
        assert_eq!(classref_destroy(rc), ClassrefStatus::Ok as i32);
    }

    #[test]
    fn destroy_reports_leaks_while_counter_is_shared() {
        let rc = create();
        let held = get_counter(rc).unwrap();
        held.counter.get_or_create_class("A").unwrap().add(2);

        let entry = take_counter(rc);
        let leaks = release(entry);
        assert_eq!(leaks.len(), 1);
        assert_eq!(leaks[0].key.as_str(), "A");
        assert_eq!(leaks[0].outstanding, 2);
        // The straggler still reads a consistent counter.
        assert_eq!(held.counter.read(), 2);
        assert_eq!(classref_destroy(rc), ClassrefStatus::InvalidHandle as i32);
    }

    #[test]
    fn destroy_reports_leaks_when_sole_owner() {
        let rc = create();
        get_counter(rc)
            .unwrap()
            .counter
            .get_or_create_class("B")
            .unwrap()
            .increment();
        let leaks = release(take_counter(rc));
        assert_eq!(leaks.len(), 1);
        assert_eq!(leaks[0].key.as_str(), "B");
    }

    #[test]
    fn create_with_null_config_rejected() {
        let mut rc = 0u64;
        assert_eq!(
            classref_create_with_config(std::ptr::null(), &mut rc),
            ClassrefStatus::InvalidArgument as i32
        );
    }
}
