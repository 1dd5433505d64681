use std::rc::Rc;

use crate::error::Error;
use crate::record::{LogEntry, LogRequest};
use crate::sink::LogSink;
use crate::unit::UnitOfWork;

/// Filters log requests by context and action, then forwards them.
///
/// The dispatcher is the only path to the sink. Filtering happens against
/// the policy snapshot of the unit of work the request belongs to, so a
/// deferred request committed at the end of a request sees the same rules
/// as an immediate one.
pub struct LogDispatcher {
    sink: Rc<dyn LogSink>,
}

impl LogDispatcher {
    /// Creates a dispatcher forwarding to `sink`.
    pub fn new(sink: Rc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// Filters `request` and forwards whatever survives.
    ///
    /// Context/action pairs where either side is excluded are removed. If no
    /// pair survives the request is dropped and `Ok(false)` is returned.
    /// Otherwise the request is stamped with the acting user (unless it
    /// names one), linked to the previous record of this unit of work, and
    /// handed to the sink.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sink`] if the sink fails. Nothing is retried.
    pub fn log(
        &self,
        uow: &mut UnitOfWork,
        connector: &str,
        mut request: LogRequest,
    ) -> Result<bool, Error> {
        let policy = uow.policy();
        request.contexts_mut().retain(|context, action| {
            policy.is_logging_enabled_for_context(context)
                && policy.is_logging_enabled_for_action(action)
        });

        if request.contexts().is_empty() {
            uow.diagnostics().debug(format_args!(
                "dropped '{}' from {}: every context or action is excluded",
                request.message(),
                connector
            ));
            return Ok(false);
        }

        request.set_user_if_missing(uow.actor_id());
        let entry = LogEntry::new(connector, uow.request_id(), request, uow.previous_record());

        match self.sink.log(&entry) {
            Ok(id) => {
                uow.diagnostics()
                    .trace(format_args!("forwarded {}", entry));
                uow.record_forwarded(id);
                Ok(true)
            }
            Err(e) => {
                let e = e.for_entry(&entry);
                uow.diagnostics().warn(format_args!("{}", e));
                Err(e.into())
            }
        }
    }
}

impl std::fmt::Debug for LogDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogDispatcher").finish_non_exhaustive()
    }
}
