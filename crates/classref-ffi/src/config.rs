//! C-compatible counter configuration.

use classref::RefCountConfig;

use crate::status::ClassrefStatus;

/// Counter configuration as seen from C.
///
/// Zero in a limit field means "unbounded". Fill with
/// [`classref_config_default`] and adjust before passing to
/// [`classref_create_with_config`](crate::counter::classref_create_with_config).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassrefConfig {
    /// Maximum key length in bytes; 0 keeps keys whole.
    /// Set to 20 for fixed-width legacy keys.
    pub key_limit: usize,
    /// Maximum number of classes per counter; 0 for no limit.
    pub max_classes: usize,
    /// Non-zero to log classes still holding references at destroy.
    pub report_leaks_on_destroy: u8,
}

impl Default for ClassrefConfig {
    fn default() -> Self {
        ClassrefConfig::from(&RefCountConfig::default())
    }
}

impl From<&RefCountConfig> for ClassrefConfig {
    fn from(c: &RefCountConfig) -> Self {
        Self {
            key_limit: c.key_limit.unwrap_or(0),
            max_classes: c.max_classes.unwrap_or(0),
            report_leaks_on_destroy: u8::from(c.report_leaks_on_destroy),
        }
    }
}

impl From<&ClassrefConfig> for RefCountConfig {
    fn from(c: &ClassrefConfig) -> Self {
        Self {
            key_limit: (c.key_limit != 0).then_some(c.key_limit),
            max_classes: (c.max_classes != 0).then_some(c.max_classes),
            report_leaks_on_destroy: c.report_leaks_on_destroy != 0,
        }
    }
}

/// Write the default configuration to `config_out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn classref_config_default(config_out: *mut ClassrefConfig) -> i32 {
    ffi_guard!({
        ffi_write!(config_out, ClassrefConfig::default());
        ClassrefStatus::Ok as i32
    })
}
