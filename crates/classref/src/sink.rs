//! Provided [`DiagnosticSink`] implementations.

use classref_core::{Diagnostic, DiagnosticSink};

/// Log target used by [`LogSink`].
pub const LOG_TARGET: &str = "classref";

/// Routes diagnostics to the `log` facade. The default sink.
///
/// Imbalances are logged at `error` level, leaks at `warn`. Nothing is
/// printed unless the embedding application installs a logger.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn record(&self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::Imbalance(e) => log::error!(target: LOG_TARGET, "BUG: {e}"),
            Diagnostic::Leak(e) => log::warn!(target: LOG_TARGET, "{e}"),
        }
    }
}

/// Discards every diagnostic.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&self, _diagnostic: &Diagnostic) {}
}
