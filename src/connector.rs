//! Connectors bind host events to log requests.
//!
//! A connector names the events it listens to and maps each one to a small
//! handler. Routing goes through an explicit [`HandlerTable`] keyed by the
//! canonical form of the event name, so `comment-post` and `comment_post`
//! reach the same handler.

use std::fmt;

use crate::dispatcher::LogDispatcher;
use crate::error::Error;
use crate::links::ActionLink;
use crate::record::{LogEntry, LogRequest};
use crate::unit::UnitOfWork;

/// A positional argument passed by the host with a fired event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventArg {
    /// No value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (ids, counts)
    Int(i64),
    /// Text value (slugs, titles, statuses)
    Text(String),
}

impl EventArg {
    /// Returns the text value, if this is `Text`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            EventArg::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value, if this is `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            EventArg::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the boolean value, if this is `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EventArg::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for EventArg {
    fn from(s: &str) -> Self {
        EventArg::Text(s.to_string())
    }
}

impl From<String> for EventArg {
    fn from(s: String) -> Self {
        EventArg::Text(s)
    }
}

impl From<i64> for EventArg {
    fn from(i: i64) -> Self {
        EventArg::Int(i)
    }
}

impl From<bool> for EventArg {
    fn from(b: bool) -> Self {
        EventArg::Bool(b)
    }
}

/// Returns the handler key for an event name.
///
/// Every character that is not ASCII alphanumeric or `_` becomes `_`.
///
/// ```
/// use audit_pipeline::canonical_event_key;
///
/// assert_eq!(canonical_event_key("comment-post"), "comment_post");
/// assert_eq!(canonical_event_key("wp.login"), "wp_login");
/// ```
pub fn canonical_event_key(event: &str) -> String {
    event
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Handler invoked for one event shape.
pub type Handler = Box<dyn Fn(&mut Scope<'_>, &[EventArg]) -> Result<(), Error>>;

/// Hook that augments the action links of a logged record.
pub type LinkHook = Box<dyn Fn(Vec<ActionLink>, &LogEntry) -> Vec<ActionLink>>;

/// Event-to-handler routing table.
#[derive(Default)]
pub struct HandlerTable {
    handlers: Vec<(String, Handler)>,
}

impl HandlerTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to `event`, replacing any handler already bound to
    /// the same canonical key.
    pub fn bind(&mut self, event: &str, handler: Handler) {
        let key = canonical_event_key(event);
        match self.handlers.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = handler,
            None => self.handlers.push((key, handler)),
        }
    }

    /// Returns the handler bound to `event`.
    pub fn get(&self, event: &str) -> Option<&Handler> {
        let key = canonical_event_key(event);
        self.handlers
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, handler)| handler)
    }

    /// Returns `true` if a handler is bound to `event`.
    pub fn contains(&self, event: &str) -> bool {
        self.get(event).is_some()
    }

    /// Returns the number of bound handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handler is bound.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|(key, _)| key))
            .finish()
    }
}

/// What a handler can do while an event is being dispatched.
///
/// Borrows the unit of work mutably for the duration of one handler call.
pub struct Scope<'a> {
    uow: &'a mut UnitOfWork,
    dispatcher: &'a LogDispatcher,
    connector: &'a str,
    event: &'a str,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(
        uow: &'a mut UnitOfWork,
        dispatcher: &'a LogDispatcher,
        connector: &'a str,
        event: &'a str,
    ) -> Self {
        Self {
            uow,
            dispatcher,
            connector,
            event,
        }
    }

    /// Returns the name of the connector handling the event.
    pub fn connector(&self) -> &str {
        self.connector
    }

    /// Returns the event name as fired by the host.
    pub fn event(&self) -> &str {
        self.event
    }

    /// Returns the unit of work the event belongs to.
    pub fn unit(&self) -> &UnitOfWork {
        &*self.uow
    }

    /// Logs `request` now under this connector's name.
    ///
    /// Returns `Ok(false)` if every context or action was excluded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sink`] if the sink fails.
    pub fn log(&mut self, request: LogRequest) -> Result<bool, Error> {
        self.dispatcher.log(self.uow, self.connector, request)
    }

    /// Defers `request` to the end of the unit of work under `handle`.
    pub fn delayed_log(&mut self, handle: impl Into<String>, request: LogRequest) {
        self.uow.delayed_log(handle, self.connector, request);
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("request_id", &self.uow.request_id())
            .field("connector", &self.connector)
            .field("event", &self.event)
            .finish()
    }
}

/// One event source bound to the logging pipeline.
pub trait Connector {
    /// Returns the connector's unique name.
    fn name(&self) -> &str;

    /// Returns the event names this connector subscribes to.
    fn events(&self) -> &[String];

    /// Routes a fired event to its handler.
    ///
    /// Returns `Ok(false)` when no handler is bound to `event`.
    ///
    /// # Errors
    ///
    /// Returns whatever error the handler returns.
    fn dispatch(
        &self,
        event: &str,
        args: &[EventArg],
        scope: &mut Scope<'_>,
    ) -> Result<bool, Error>;

    /// Adds connector-specific links for a logged record.
    ///
    /// Returns `links` unchanged by default.
    fn action_links(&self, links: Vec<ActionLink>, _entry: &LogEntry) -> Vec<ActionLink> {
        links
    }
}

/// Table-driven connector.
///
/// # Examples
///
/// ```
/// use audit_pipeline::{Connector, EventConnector, LogRequest};
///
/// let posts = EventConnector::new("posts")
///     .on("transition-post-status", |scope, args| {
///         let status = args.first().and_then(|a| a.as_str()).unwrap_or("unknown");
///         scope.log(LogRequest::new("status changed").context("posts", status))?;
///         Ok(())
///     })
///     .listen("deleted_post");
///
/// assert_eq!(posts.name(), "posts");
/// assert_eq!(posts.events(), ["transition-post-status", "deleted_post"]);
/// ```
pub struct EventConnector {
    name: String,
    events: Vec<String>,
    handlers: HandlerTable,
    links: Option<LinkHook>,
}

impl EventConnector {
    /// Creates a connector with no subscriptions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Vec::new(),
            handlers: HandlerTable::new(),
            links: None,
        }
    }

    /// Subscribes to `event` and binds `handler` to it.
    pub fn on<F>(mut self, event: &str, handler: F) -> Self
    where
        F: Fn(&mut Scope<'_>, &[EventArg]) -> Result<(), Error> + 'static,
    {
        self.subscribe(event);
        self.handlers.bind(event, Box::new(handler));
        self
    }

    /// Subscribes to `event` without binding a handler.
    ///
    /// Firing it is a no-op until a handler is bound under the same
    /// canonical key.
    pub fn listen(mut self, event: &str) -> Self {
        self.subscribe(event);
        self
    }

    /// Installs the action-link hook.
    pub fn with_links<F>(mut self, hook: F) -> Self
    where
        F: Fn(Vec<ActionLink>, &LogEntry) -> Vec<ActionLink> + 'static,
    {
        self.links = Some(Box::new(hook));
        self
    }

    /// Returns the routing table.
    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    fn subscribe(&mut self, event: &str) {
        if !self.events.iter().any(|e| e == event) {
            self.events.push(event.to_string());
        }
    }
}

impl Connector for EventConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn events(&self) -> &[String] {
        &self.events
    }

    fn dispatch(
        &self,
        event: &str,
        args: &[EventArg],
        scope: &mut Scope<'_>,
    ) -> Result<bool, Error> {
        match self.handlers.get(event) {
            Some(handler) => {
                handler(scope, args)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn action_links(&self, links: Vec<ActionLink>, entry: &LogEntry) -> Vec<ActionLink> {
        match &self.links {
            Some(hook) => hook(links, entry),
            None => links,
        }
    }
}

impl fmt::Debug for EventConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventConnector")
            .field("name", &self.name)
            .field("events", &self.events)
            .field("handlers", &self.handlers)
            .field("links", &self.links.is_some())
            .finish()
    }
}
