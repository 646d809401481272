//! Reference counting with per-call-site attribution.
//!
//! A [`RefCount`] tracks the owners of one externally managed object.
//! Every code path that takes references does so through a [`RefClass`]
//! named by a stable key. Each class keeps its own sub-count and mirrors
//! every change into the global count, which lets the counter catch a
//! path that releases more than it acquired:
//!
//! - The class count drops below zero, an imbalance is reported through
//!   the counter's [`DiagnosticSink`], and the global count is left
//!   alone so the object is not freed under its remaining users.
//! - Classes still holding references at [`RefCount::destroy`] are
//!   reported as leaks.
//!
//! ```
//! use classref::RefCount;
//!
//! let rc = RefCount::new();
//! {
//!     let open = rc.get_or_create_class("open").unwrap();
//!     let mmap = rc.get_or_create_class("mmap").unwrap();
//!
//!     open.increment();
//!     mmap.add(2);
//!     assert_eq!(rc.read(), 3);
//!
//!     open.decrement();
//!     mmap.decrement();
//!     assert!(mmap.decrement_and_test());
//! }
//! // Class handles borrow the counter, so they must be gone by now.
//! assert!(rc.destroy().is_clean());
//! ```
//!
//! Destroying a counter while one of its classes is still in use does
//! not compile:
//!
//! ```compile_fail,E0505
//! use classref::RefCount;
//!
//! let rc = RefCount::new();
//! let open = rc.get_or_create_class("open").unwrap();
//! open.increment();
//! let report = rc.destroy();
//! open.decrement();
//! # drop(report);
//! ```
//!
//! # Consistency
//!
//! Each counter update is atomic, but the class update and the global
//! update are two separate steps. A concurrent reader can observe a
//! class that has moved while the global has not yet followed. Callers
//! that need both views to agree must serialise through their own lock.
//!
//! The class table is guarded internally; lookup-or-insert is a single
//! critical section and needs no caller-held lock.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod class;
pub mod config;
pub mod counter;
pub mod sink;
pub mod snapshot;
mod table;

// Public re-exports for the primary API surface.
pub use class::{Decrement, RefClass};
pub use config::RefCountConfig;
pub use counter::{DestroyReport, RefCount, RefCountBuilder};
pub use sink::{LogSink, NullSink};
pub use snapshot::{ClassSnapshot, RefCountSnapshot};

pub use classref_core::{
    ClassKey, ConfigError, Diagnostic, DiagnosticSink, FailFast, ImbalanceAction,
    ImbalanceCounter, ImbalanceEvent, LeakEvent, LogOnly, RefCountError,
};
