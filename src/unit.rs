//! Per-request state.
//!
//! A [`UnitOfWork`] holds everything that lives exactly as long as one host
//! request: the identity being served, the exclusion policy snapshot, the
//! deferred commit buffer, and the id of the last record forwarded. Nothing
//! here is global; a new request starts from a fresh value.

use crate::buffer::DeferredCommitBuffer;
use crate::dispatcher::LogDispatcher;
use crate::error::Error;
use crate::logging::UnitLog;
use crate::policy::ExclusionPolicy;
use crate::record::{LogRequest, RecordId};
use crate::request::{Actor, RequestMeta};

/// Outcome of committing the deferred buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entries handed to the sink
    pub forwarded: usize,
    /// Entries dropped because every context or action was excluded
    pub dropped: usize,
}

/// State for one request.
///
/// # Examples
///
/// ```
/// use audit_pipeline::{
///     ExclusionPolicy, ExclusionSettings, LogDispatcher, LogRequest, RequestMeta, UnitOfWork,
///     VecSink,
/// };
/// use std::rc::Rc;
///
/// let sink = Rc::new(VecSink::new());
/// let dispatcher = LogDispatcher::new(sink.clone());
/// let mut uow = UnitOfWork::new(
///     RequestMeta::new("req-7"),
///     ExclusionPolicy::new(ExclusionSettings::new()),
/// );
///
/// uow.delayed_log("post-1", "posts", LogRequest::new("saved").context("posts", "updated"));
/// uow.delayed_log("post-1", "posts", LogRequest::new("published").context("posts", "published"));
/// assert!(sink.is_empty());
///
/// let report = uow.finish(&dispatcher).unwrap();
/// assert_eq!(report.forwarded, 1);
/// assert_eq!(sink.entries()[0].message(), "published");
/// ```
#[derive(Debug)]
pub struct UnitOfWork {
    meta: RequestMeta,
    policy: ExclusionPolicy,
    buffer: DeferredCommitBuffer,
    previous: Option<RecordId>,
}

impl UnitOfWork {
    /// Starts a unit of work for `meta` under `policy`.
    pub fn new(meta: RequestMeta, policy: ExclusionPolicy) -> Self {
        Self {
            meta,
            policy,
            buffer: DeferredCommitBuffer::new(),
            previous: None,
        }
    }

    /// Returns the request ID for this unit of work.
    pub fn request_id(&self) -> &str {
        &self.meta.request_id
    }

    /// Returns the acting user, if any.
    pub fn actor(&self) -> Option<&Actor> {
        self.meta.actor.as_ref()
    }

    /// Returns the remote address as the host reported it.
    pub fn remote_addr(&self) -> Option<&str> {
        self.meta.remote_addr.as_deref()
    }

    /// Returns the exclusion policy snapshot.
    pub fn policy(&self) -> &ExclusionPolicy {
        &self.policy
    }

    /// Returns the deferred commit buffer.
    pub fn buffer(&self) -> &DeferredCommitBuffer {
        &self.buffer
    }

    /// Returns the last record forwarded in this unit of work.
    pub fn previous_record(&self) -> Option<RecordId> {
        self.previous
    }

    /// Returns request-scoped diagnostics.
    pub fn diagnostics(&self) -> UnitLog<'_> {
        UnitLog::new(&self.meta.request_id)
    }

    /// Decides whether the acting user may be logged by `connector`.
    pub fn logging_enabled_for_user(&self, connector: &str) -> bool {
        self.policy
            .is_logging_enabled_for_user(self.actor(), connector)
    }

    /// Decides whether the request's address may be logged by `connector`.
    pub fn logging_enabled_for_ip(&self, connector: &str) -> bool {
        self.policy
            .is_logging_enabled_for_ip(self.remote_addr(), self.actor(), connector)
    }

    /// Stores a request for commit when this unit of work finishes.
    ///
    /// A later call with the same `handle` replaces this one.
    pub fn delayed_log(
        &mut self,
        handle: impl Into<String>,
        connector: impl Into<String>,
        request: LogRequest,
    ) {
        let handle = handle.into();
        if self.buffer.store(handle.clone(), connector, request) {
            self.diagnostics()
                .trace(format_args!("deferred entry '{}' replaced", handle));
        }
        if self.buffer.schedule_flush() {
            self.diagnostics()
                .trace(format_args!("deferred commit scheduled"));
        }
    }

    /// Commits every deferred request, then ends the unit of work.
    ///
    /// Taking `self` guarantees a single commit pass per request.
    ///
    /// # Errors
    ///
    /// Returns the first sink failure. Entries after it are discarded.
    pub fn finish(mut self, dispatcher: &LogDispatcher) -> Result<FlushReport, Error> {
        let mut report = FlushReport::default();
        if !self.buffer.is_flush_scheduled() {
            return Ok(report);
        }

        let pending = self.buffer.drain();
        self.diagnostics()
            .debug(format_args!("committing {} deferred entries", pending.len()));

        for entry in pending {
            let (connector, request) = entry.into_parts();
            if dispatcher.log(&mut self, &connector, request)? {
                report.forwarded += 1;
            } else {
                report.dropped += 1;
            }
        }
        Ok(report)
    }

    pub(crate) fn actor_id(&self) -> Option<u64> {
        self.actor()
            .filter(|actor| !actor.is_anonymous())
            .map(|actor| actor.id)
    }

    pub(crate) fn record_forwarded(&mut self, id: Option<RecordId>) {
        if id.is_some() {
            self.previous = id;
        }
    }
}
