//! Core types and traits for class-attributed reference counting.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the counter implementation, the C ABI and
//! the test fixtures: class keys, error types, diagnostic events, and
//! the two injection points ([`DiagnosticSink`] and [`ImbalanceAction`]).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod action;
pub mod diagnostic;
pub mod error;
pub mod key;

pub use action::{FailFast, ImbalanceAction, ImbalanceCounter, LogOnly};
pub use diagnostic::{Diagnostic, DiagnosticSink, ImbalanceEvent, LeakEvent};
pub use error::{ConfigError, RefCountError};
pub use key::ClassKey;
