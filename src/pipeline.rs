//! Wiring for hosts that want one object to hold the whole pipeline.
//!
//! # Integration Flow
//!
//! ```text
//! startup:   AuditPipeline::new(settings source, sink) + register(connectors)
//!              ↓
//! request:   begin(meta)        snapshot settings, gate connectors
//!              ↓
//!            fire(event, args)  for every host event, any number of times
//!              ↓
//!            finish()           commit deferred entries once
//! ```

use std::rc::Rc;

use crate::connector::{Connector, EventArg};
use crate::dispatcher::LogDispatcher;
use crate::error::Error;
use crate::links::ActionLink;
use crate::policy::{ExclusionPolicy, RecordOverride};
use crate::record::{LogEntry, LogRequest};
use crate::registry::{Activation, ConnectorRegistry};
use crate::request::RequestMeta;
use crate::settings::{ExclusionSettings, ExclusionSource};
use crate::sink::LogSink;
use crate::unit::{FlushReport, UnitOfWork};

/// Registry, dispatcher and settings source in one place.
///
/// # Examples
///
/// ```
/// use audit_pipeline::{
///     AuditPipeline, Dimension, EventArg, EventConnector, ExclusionSettings, LogRequest,
///     RequestMeta, VecSink,
/// };
/// use std::rc::Rc;
///
/// let sink = Rc::new(VecSink::new());
/// let settings = ExclusionSettings::new().exclude(Dimension::Contexts, "comments");
/// let mut pipeline = AuditPipeline::new(settings, sink.clone());
///
/// pipeline
///     .register(EventConnector::new("comments").on("delete_comment", |scope, args| {
///         let id = args.first().and_then(EventArg::as_int).unwrap_or_default();
///         scope.log(
///             LogRequest::new("comment {id} deleted")
///                 .arg("id", id)
///                 .context("comments", "deleted")
///                 .context("posts", "updated"),
///         )?;
///         Ok(())
///     }))
///     .unwrap();
///
/// let mut session = pipeline.begin(RequestMeta::new("req-1"));
/// session.fire("delete_comment", &[EventArg::Int(4)]).unwrap();
/// session.finish().unwrap();
///
/// let entries = sink.entries();
/// assert_eq!(entries.len(), 1);
/// assert_eq!(entries[0].contexts().iter().collect::<Vec<_>>(), [("posts", "updated")]);
/// ```
pub struct AuditPipeline {
    registry: ConnectorRegistry,
    dispatcher: LogDispatcher,
    source: Box<dyn ExclusionSource>,
    override_hook: Option<RecordOverride>,
}

impl AuditPipeline {
    /// Creates a pipeline reading exclusions from `source` and writing to
    /// `sink`.
    pub fn new(source: impl ExclusionSource + 'static, sink: Rc<dyn LogSink>) -> Self {
        Self {
            registry: ConnectorRegistry::new(),
            dispatcher: LogDispatcher::new(sink),
            source: Box::new(source),
            override_hook: None,
        }
    }

    /// Installs the override hook for user and IP verdicts.
    pub fn with_override(mut self, hook: RecordOverride) -> Self {
        self.override_hook = Some(hook);
        self
    }

    /// Registers a connector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateConnector`] on a name clash.
    pub fn register(&mut self, connector: impl Connector + 'static) -> Result<(), Error> {
        self.registry.register(connector)
    }

    /// Returns the connector registry.
    pub fn registry(&self) -> &ConnectorRegistry {
        &self.registry
    }

    /// Returns the dispatcher.
    pub fn dispatcher(&self) -> &LogDispatcher {
        &self.dispatcher
    }

    /// Builds the policy for a new unit of work from the current settings.
    pub fn policy(&self) -> ExclusionPolicy {
        let policy = ExclusionPolicy::new(ExclusionSettings::snapshot(self.source.as_ref()));
        match &self.override_hook {
            Some(hook) => policy.with_override(hook.clone()),
            None => policy,
        }
    }

    /// Starts a request: snapshots settings and activates connectors.
    pub fn begin(&self, meta: RequestMeta) -> RequestSession<'_> {
        let uow = UnitOfWork::new(meta, self.policy());
        let activation = self.registry.activate(&uow);
        RequestSession {
            uow,
            activation,
            dispatcher: &self.dispatcher,
        }
    }
}

impl std::fmt::Debug for AuditPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditPipeline")
            .field("registry", &self.registry)
            .field("override_hook", &self.override_hook.is_some())
            .finish_non_exhaustive()
    }
}

/// One request in flight.
///
/// Owns the unit of work and the connector activation computed for it.
/// Dropping a session without calling [`finish`](Self::finish) discards
/// deferred entries.
pub struct RequestSession<'p> {
    uow: UnitOfWork,
    activation: Activation<'p>,
    dispatcher: &'p LogDispatcher,
}

impl<'p> RequestSession<'p> {
    /// Delivers a host event to the active connectors.
    ///
    /// # Errors
    ///
    /// Returns the first handler or sink error.
    pub fn fire(&mut self, event: &str, args: &[EventArg]) -> Result<usize, Error> {
        self.activation
            .fire(event, args, &mut self.uow, self.dispatcher)
    }

    /// Logs a request directly under `connector`, outside any handler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sink`] if the sink fails.
    pub fn log(&mut self, connector: &str, request: LogRequest) -> Result<bool, Error> {
        self.dispatcher.log(&mut self.uow, connector, request)
    }

    /// Defers a request under `connector` to the end of the session.
    pub fn delayed_log(
        &mut self,
        handle: impl Into<String>,
        connector: &str,
        request: LogRequest,
    ) {
        self.uow.delayed_log(handle, connector, request);
    }

    /// Runs the link extension point of `connector` for a record.
    pub fn action_links(
        &self,
        connector: &str,
        links: Vec<ActionLink>,
        entry: &LogEntry,
    ) -> Vec<ActionLink> {
        self.activation.action_links(connector, links, entry)
    }

    /// Returns the unit of work.
    pub fn unit(&self) -> &UnitOfWork {
        &self.uow
    }

    /// Returns the connector activation for this request.
    pub fn activation(&self) -> &Activation<'p> {
        &self.activation
    }

    /// Commits deferred entries and ends the request.
    ///
    /// # Errors
    ///
    /// Returns the first sink failure.
    pub fn finish(self) -> Result<FlushReport, Error> {
        self.uow.finish(self.dispatcher)
    }
}

impl std::fmt::Debug for RequestSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSession")
            .field("uow", &self.uow)
            .field("activation", &self.activation)
            .finish()
    }
}
