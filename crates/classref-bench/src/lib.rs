//! Benchmark profiles for class-attributed reference counting.
//!
//! - [`class_keys`]: deterministic key names shaped like call-site tags
//! - [`populated_counter`]: a counter with every key already created and
//!   holding one reference, so lookups in the benches always hit

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use classref::{RefCount, RefCountError};

/// Generate `n` distinct class keys of the form `module::fnNN`.
pub fn class_keys(n: usize) -> Vec<String> {
    const MODULES: [&str; 4] = ["net", "fs", "sched", "mm"];
    (0..n)
        .map(|i| format!("{}::fn{i:02}", MODULES[i % MODULES.len()]))
        .collect()
}

/// Build a counter with one class per key, each holding one reference.
pub fn populated_counter(keys: &[String]) -> Result<RefCount, RefCountError> {
    let rc = RefCount::new();
    for key in keys {
        rc.get_or_create_class(key)?.increment();
    }
    Ok(rc)
}
