//! Event interception and audit filtering.
//!
//! This crate decides whether events raised by a host application may be
//! recorded, and buffers what may be recorded until the request ends:
//! - **Connectors**: Bind named host events to small handlers that build log requests
//! - **Exclusion policy**: Filters by acting user/role, network address, connector, context and action
//! - **Deferred commit**: Lets several handlers refine one record before it is persisted once
//!
//! # Core Types
//!
//! - [`ExclusionPolicy`]: Per-request exclusion decisions, fail-open on ambiguous input
//! - [`EventConnector`]: Table-driven [`Connector`] implementation
//! - [`ConnectorRegistry`]: Gates connectors per request and produces an [`Activation`]
//! - [`UnitOfWork`]: Per-request state holding the policy snapshot and deferred buffer
//! - [`LogDispatcher`]: Filters contexts/actions and forwards to a [`LogSink`]
//! - [`AuditPipeline`]: Wires the above together for a host
//!
//! # Examples
//!
//! ```
//! use audit_pipeline::{
//!     Actor, AuditPipeline, Dimension, EventConnector, ExclusionSettings, LogRequest,
//!     RequestMeta, VecSink,
//! };
//! use std::rc::Rc;
//!
//! let sink = Rc::new(VecSink::new());
//! let settings = ExclusionSettings::new().exclude(Dimension::AuthorsAndRoles, "editor");
//! let mut pipeline = AuditPipeline::new(settings, sink.clone());
//!
//! pipeline
//!     .register(EventConnector::new("posts").on("save_post", |scope, _| {
//!         scope.log(LogRequest::new("post saved").context("posts", "updated"))?;
//!         Ok(())
//!     }))
//!     .unwrap();
//!
//! // Authors are logged
//! let author = RequestMeta::new("req-1").with_actor(Actor::new(2).with_role("author"));
//! let mut session = pipeline.begin(author);
//! session.fire("save_post", &[]).unwrap();
//! session.finish().unwrap();
//!
//! // Editors are not: no connector even subscribes
//! let editor = RequestMeta::new("req-2").with_actor(Actor::new(3).with_role("editor"));
//! let mut session = pipeline.begin(editor);
//! assert_eq!(session.fire("save_post", &[]).unwrap(), 0);
//! session.finish().unwrap();
//!
//! assert_eq!(sink.len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod buffer;
mod connector;
mod dispatcher;
mod error;
mod links;
mod logging;
mod pipeline;
mod policy;
mod record;
mod registry;
mod request;
mod settings;
mod sink;
mod unit;

pub use buffer::{DeferredCommitBuffer, DeferredEntry};
pub use connector::{
    canonical_event_key, Connector, EventArg, EventConnector, Handler, HandlerTable, LinkHook,
    Scope,
};
pub use dispatcher::LogDispatcher;
pub use error::Error;
pub use links::{links_hook_name, ActionLink};
pub use logging::UnitLog;
pub use pipeline::{AuditPipeline, RequestSession};
pub use policy::{ExclusionPolicy, RecordOverride};
pub use record::{ContextMap, LogArgs, LogEntry, LogRequest, RecordId};
pub use registry::{Activation, ConnectorRegistry};
pub use request::{Actor, RequestMeta};
pub use settings::{Dimension, ExclusionSettings, ExclusionSource};
pub use sink::{LogSink, SinkError, SinkErrorKind, TracingSink, VecSink};
pub use unit::{FlushReport, UnitOfWork};
