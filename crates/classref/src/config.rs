//! Counter configuration parameters.

use classref_core::{ClassKey, ConfigError};

/// Configuration for a [`RefCount`](crate::RefCount).
///
/// Validated at construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefCountConfig {
    /// Maximum key length in bytes, or `None` for unbounded keys.
    ///
    /// Default: `None`. With a limit, longer keys are cut at the nearest
    /// character boundary and keys sharing that prefix alias to the same
    /// class, as the fixed-width keys of the C header did.
    pub key_limit: Option<usize>,

    /// Maximum number of classes per counter, or `None` for no limit.
    ///
    /// Default: `None`. Classes are never reclaimed before the counter
    /// is destroyed, so a limit bounds the table of a counter whose keys
    /// are derived from untrusted input.
    pub max_classes: Option<usize>,

    /// Whether [`RefCount::destroy`](crate::RefCount::destroy) reports
    /// classes that still hold references.
    ///
    /// Default: `true`.
    pub report_leaks_on_destroy: bool,
}

impl RefCountConfig {
    /// Default leak reporting on destroy.
    pub const DEFAULT_REPORT_LEAKS: bool = true;

    /// Create a config with unbounded keys and classes.
    pub fn new() -> Self {
        Self {
            key_limit: None,
            max_classes: None,
            report_leaks_on_destroy: Self::DEFAULT_REPORT_LEAKS,
        }
    }

    /// Config reproducing the 20-byte key width of the C header.
    pub fn legacy() -> Self {
        Self {
            key_limit: Some(ClassKey::LEGACY_MAX_LEN),
            ..Self::new()
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_limit == Some(0) {
            return Err(ConfigError::ZeroKeyLimit);
        }
        if self.max_classes == Some(0) {
            return Err(ConfigError::ZeroClassLimit);
        }
        Ok(())
    }
}

impl Default for RefCountConfig {
    fn default() -> Self {
        Self::new()
    }
}
