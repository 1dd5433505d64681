//! Deferred log requests awaiting the end of a unit of work.
//!
//! Collaborators that each see part of one logical change store their
//! request under a shared handle. The last store wins, and the entry is
//! committed once when the unit of work finishes.

use crate::record::LogRequest;

/// A pending log request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredEntry {
    handle: String,
    connector: String,
    request: LogRequest,
}

impl DeferredEntry {
    /// Returns the shared handle.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Returns the connector that stored the current request.
    pub fn connector(&self) -> &str {
        &self.connector
    }

    /// Returns the pending request.
    pub fn request(&self) -> &LogRequest {
        &self.request
    }

    pub(crate) fn into_parts(self) -> (String, LogRequest) {
        (self.connector, self.request)
    }
}

/// Handle-keyed buffer of deferred requests.
///
/// Iteration follows the order in which each handle was first stored.
///
/// # Examples
///
/// ```
/// use audit_pipeline::{DeferredCommitBuffer, LogRequest};
///
/// let mut buffer = DeferredCommitBuffer::new();
/// buffer.store("post-12", "posts", LogRequest::new("draft saved"));
/// buffer.store("post-12", "posts", LogRequest::new("published"));
///
/// assert_eq!(buffer.len(), 1);
/// assert_eq!(buffer.get("post-12").unwrap().request().message(), "published");
///
/// assert!(buffer.schedule_flush());
/// assert!(!buffer.schedule_flush());
/// ```
#[derive(Debug, Default)]
pub struct DeferredCommitBuffer {
    entries: Vec<DeferredEntry>,
    flush_scheduled: bool,
}

impl DeferredCommitBuffer {
    /// Creates an empty buffer with no flush scheduled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `request` under `handle`.
    ///
    /// Returns `true` if an earlier request under the same handle was
    /// replaced.
    pub fn store(
        &mut self,
        handle: impl Into<String>,
        connector: impl Into<String>,
        request: LogRequest,
    ) -> bool {
        let handle = handle.into();
        let connector = connector.into();
        match self.entries.iter_mut().find(|e| e.handle == handle) {
            Some(existing) => {
                existing.connector = connector;
                existing.request = request;
                true
            }
            None => {
                self.entries.push(DeferredEntry {
                    handle,
                    connector,
                    request,
                });
                false
            }
        }
    }

    /// Marks the buffer for commit at the end of the unit of work.
    ///
    /// Returns `true` only for the call that actually scheduled it.
    pub fn schedule_flush(&mut self) -> bool {
        !std::mem::replace(&mut self.flush_scheduled, true)
    }

    /// Returns `true` if a flush has been scheduled.
    pub fn is_flush_scheduled(&self) -> bool {
        self.flush_scheduled
    }

    /// Returns the entry stored under `handle`.
    pub fn get(&self, handle: &str) -> Option<&DeferredEntry> {
        self.entries.iter().find(|e| e.handle == handle)
    }

    /// Iterates pending entries in commit order.
    pub fn iter(&self) -> impl Iterator<Item = &DeferredEntry> {
        self.entries.iter()
    }

    /// Returns the number of pending handles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Takes every pending entry and clears the schedule.
    pub fn drain(&mut self) -> Vec<DeferredEntry> {
        self.flush_scheduled = false;
        std::mem::take(&mut self.entries)
    }
}
