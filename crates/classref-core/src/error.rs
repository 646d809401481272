//! Error types for class-attributed reference counting.
//!
//! Class-level imbalance is deliberately absent: it is reported through
//! a [`DiagnosticSink`](crate::DiagnosticSink) and the operation
//! continues. Only conditions that stop an operation appear here.

use std::error::Error;
use std::fmt;

use crate::ClassKey;

/// Errors from counter and class operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefCountError {
    /// A balanced class decrement found the global count already at or
    /// below zero. The tracked object is logically freed while a
    /// reference is still being released.
    GlobalUnderflow {
        /// Class through which the decrement was attempted.
        key: ClassKey,
        /// Global count observed when the decrement was refused.
        global: i64,
    },
    /// Creating a new class would exceed the configured class limit.
    ClassLimitExceeded {
        /// The configured maximum number of classes.
        limit: usize,
    },
    /// The class table could not grow.
    AllocationFailed {
        /// Number of classes the table was asked to hold.
        requested: usize,
    },
}

impl fmt::Display for RefCountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GlobalUnderflow { key, global } => {
                write!(
                    f,
                    "global refcount underflow via key '{key}': global count is {global}"
                )
            }
            Self::ClassLimitExceeded { limit } => {
                write!(f, "class limit exceeded: at most {limit} classes")
            }
            Self::AllocationFailed { requested } => {
                write!(f, "class table allocation failed for {requested} classes")
            }
        }
    }
}

impl Error for RefCountError {}

/// Errors detected during `RefCountConfig::validate()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `key_limit` is `Some(0)`, which would alias every key to "".
    ZeroKeyLimit,
    /// `max_classes` is `Some(0)`, which would reject every class.
    ZeroClassLimit,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroKeyLimit => write!(f, "key_limit must be at least 1"),
            Self::ZeroClassLimit => write!(f, "max_classes must be at least 1"),
        }
    }
}

impl Error for ConfigError {}
