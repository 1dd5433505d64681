use std::fmt;

/// Diagnostics scoped to one unit of work.
///
/// Obtained from [`UnitOfWork::diagnostics`](crate::UnitOfWork::diagnostics)
/// and borrowed from it, so every message carries the request id.
///
/// These are the pipeline's own diagnostics (why something was dropped or
/// gated), not audit records. Audit records only go to the log sink.
#[derive(Debug, Clone, Copy)]
pub struct UnitLog<'a> {
    request_id: &'a str,
}

impl<'a> UnitLog<'a> {
    pub(crate) fn new(request_id: &'a str) -> Self {
        Self { request_id }
    }

    /// Returns the request ID associated with this logger.
    pub fn request_id(&self) -> &str {
        self.request_id
    }

    /// Logs a trace-level message with request ID.
    pub fn trace(&self, args: fmt::Arguments<'_>) {
        tracing::trace!(request_id = %self.request_id, "{}", args);
    }

    /// Logs a debug-level message with request ID.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(request_id = %self.request_id, "{}", args);
    }

    /// Logs a warning-level message with request ID.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(request_id = %self.request_id, "{}", args);
    }
}
