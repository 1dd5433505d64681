use std::cell::{Cell, RefCell};
use std::fmt;

use crate::record::{LogEntry, RecordId};

/// Error returned by a log sink.
///
/// The pipeline never retries. Before the error reaches the caller the
/// dispatcher stamps it with the connector and request of the entry that
/// failed.
///
/// # Examples
///
/// ```
/// use audit_pipeline::{SinkError, SinkErrorKind};
///
/// let error = SinkError::new(SinkErrorKind::Io).because("connection reset");
/// assert_eq!(error.kind(), SinkErrorKind::Io);
/// assert_eq!(error.reason(), Some("connection reset"));
/// assert_eq!(error.connector(), None);
/// assert_eq!(error.to_string(), "entry not recorded: I/O error (connection reset)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkError {
    kind: SinkErrorKind,
    reason: Option<String>,
    origin: Option<(String, String)>,
}

impl SinkError {
    /// Creates an error of the given kind.
    pub fn new(kind: SinkErrorKind) -> Self {
        Self {
            kind,
            reason: None,
            origin: None,
        }
    }

    /// Attaches the sink's own explanation.
    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Records which connector and request produced the rejected entry.
    ///
    /// The first origin recorded wins.
    pub(crate) fn for_entry(mut self, entry: &LogEntry) -> Self {
        if self.origin.is_none() {
            self.origin = Some((entry.connector().to_string(), entry.request_id().to_string()));
        }
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> SinkErrorKind {
        self.kind
    }

    /// Returns the sink's explanation, if it gave one.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Returns the connector whose entry was rejected.
    pub fn connector(&self) -> Option<&str> {
        self.origin.as_ref().map(|(connector, _)| connector.as_str())
    }

    /// Returns the request the rejected entry belonged to.
    pub fn request_id(&self) -> Option<&str> {
        self.origin.as_ref().map(|(_, request_id)| request_id.as_str())
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some((connector, request_id)) => {
                write!(f, "{} entry in {} not recorded: {}", connector, request_id, self.kind)?
            }
            None => write!(f, "entry not recorded: {}", self.kind)?,
        }
        if let Some(reason) = &self.reason {
            write!(f, " ({})", reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for SinkError {}

/// Kind of sink error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkErrorKind {
    /// I/O error while persisting.
    Io,
    /// Sink is full or has reached capacity.
    Full,
    /// Sink refused the entry.
    Rejected,
}

impl fmt::Display for SinkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "I/O error"),
            Self::Full => write!(f, "sink full"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Terminal persistence for log entries.
///
/// Entries reaching a sink have already passed every exclusion check. A sink
/// may return the id it assigned so later entries in the same request can
/// link back to it.
pub trait LogSink {
    /// Persists one entry.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if the entry could not be stored.
    fn log(&self, entry: &LogEntry) -> Result<Option<RecordId>, SinkError>;
}

/// A sink that keeps entries in memory and numbers them from 1.
///
/// # Examples
///
/// ```
/// use audit_pipeline::{LogDispatcher, LogRequest, RequestMeta, UnitOfWork, VecSink};
/// use std::rc::Rc;
///
/// let sink = Rc::new(VecSink::new());
/// let dispatcher = LogDispatcher::new(sink.clone());
/// let mut uow = UnitOfWork::new(RequestMeta::new("req-1"), Default::default());
///
/// dispatcher
///     .log(&mut uow, "posts", LogRequest::new("updated").context("posts", "updated"))
///     .unwrap();
///
/// assert_eq!(sink.len(), 1);
/// sink.with_entries(|entries| assert_eq!(entries[0].connector(), "posts"));
/// ```
#[derive(Debug, Default)]
pub struct VecSink {
    entries: RefCell<Vec<LogEntry>>,
    next_id: Cell<u64>,
}

impl VecSink {
    /// Creates a new empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Provides borrowed access to entries via callback.
    pub fn with_entries<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[LogEntry]) -> R,
    {
        f(&self.entries.borrow())
    }

    /// Returns a snapshot of all stored entries.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.borrow().clone()
    }

    /// Removes all stored entries. Ids keep increasing.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl LogSink for VecSink {
    fn log(&self, entry: &LogEntry) -> Result<Option<RecordId>, SinkError> {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.entries.borrow_mut().push(entry.clone());
        Ok(Some(RecordId(id)))
    }
}

/// A sink that emits each entry as a structured `tracing` event.
///
/// Assigns no record ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    /// Creates a new tracing sink.
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for TracingSink {
    fn log(&self, entry: &LogEntry) -> Result<Option<RecordId>, SinkError> {
        tracing::info!(
            target: "audit_pipeline",
            request_id = %entry.request_id(),
            connector = %entry.connector(),
            contexts = %entry.contexts(),
            object_id = ?entry.object_id(),
            user_id = ?entry.user_id(),
            previous = ?entry.previous(),
            "{}",
            entry.render()
        );
        Ok(None)
    }
}
