//! Log requests and the entries forwarded to the sink.

use std::fmt;

/// Ordered mapping from context to the action that occurred in it.
///
/// Keys are unique. Inserting an existing context replaces its action in
/// place, so iteration order is always first-insertion order.
///
/// # Examples
///
/// ```
/// use audit_pipeline::ContextMap;
///
/// let mut contexts = ContextMap::new();
/// contexts.insert("comments", "deleted");
/// contexts.insert("posts", "updated");
/// contexts.insert("comments", "trashed");
///
/// let pairs: Vec<_> = contexts.iter().collect();
/// assert_eq!(pairs, [("comments", "trashed"), ("posts", "updated")]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextMap {
    pairs: Vec<(String, String)>,
}

impl ContextMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the action for a context.
    pub fn insert(&mut self, context: impl Into<String>, action: impl Into<String>) {
        let context = context.into();
        let action = action.into();
        match self.pairs.iter_mut().find(|(c, _)| *c == context) {
            Some((_, existing)) => *existing = action,
            None => self.pairs.push((context, action)),
        }
    }

    /// Returns the action recorded for a context.
    pub fn get(&self, context: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(c, _)| c == context)
            .map(|(_, a)| a.as_str())
    }

    /// Keeps only the pairs for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
        self.pairs.retain(|(c, a)| keep(c, a));
    }

    /// Iterates `(context, action)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(c, a)| (c.as_str(), a.as_str()))
    }

    /// Returns the number of contexts.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns `true` if no context is attached.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<C: Into<String>, A: Into<String>> FromIterator<(C, A)> for ContextMap {
    fn from_iter<I: IntoIterator<Item = (C, A)>>(iter: I) -> Self {
        let mut map = ContextMap::new();
        for (context, action) in iter {
            map.insert(context, action);
        }
        map
    }
}

impl fmt::Display for ContextMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (context, action)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", context, action)?;
        }
        write!(f, "}}")
    }
}

/// Arguments for a message template.
///
/// Named arguments fill `{name}`; positional ones fill `{0}`, `{1}`, ... in
/// the order they were pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogArgs {
    pairs: Vec<(String, String)>,
    positional: usize,
}

impl LogArgs {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an argument, replacing any earlier value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        let name = name.into();
        let value = value.to_string();
        match self.pairs.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.pairs.push((name, value)),
        }
    }

    /// Binds `value` to the next positional slot and returns its index.
    pub fn push(&mut self, value: impl ToString) -> usize {
        let index = self.positional;
        self.insert(index.to_string(), value);
        self.positional += 1;
        index
    }

    /// Returns an argument value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns the number of arguments.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns `true` if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// A connector's request to record one event.
///
/// Built by a handler and consumed once by the dispatcher, either at once
/// or at the end of the unit of work.
///
/// # Examples
///
/// ```
/// use audit_pipeline::LogRequest;
///
/// let request = LogRequest::new("\"{title}\" updated")
///     .arg("title", "Hello world")
///     .object(12)
///     .context("posts", "updated");
///
/// assert_eq!(request.render(), "\"Hello world\" updated");
/// assert_eq!(request.contexts().get("posts"), Some("updated"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRequest {
    message: String,
    args: LogArgs,
    object_id: Option<u64>,
    contexts: ContextMap,
    user_id: Option<u64>,
}

impl LogRequest {
    /// Creates a request with a message template and nothing else.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            args: LogArgs::new(),
            object_id: None,
            contexts: ContextMap::new(),
            user_id: None,
        }
    }

    /// Adds a template argument.
    pub fn arg(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.args.insert(name, value);
        self
    }

    /// Adds the next positional argument, `{0}` first.
    pub fn positional(mut self, value: impl ToString) -> Self {
        self.args.push(value);
        self
    }

    /// Sets the target object id.
    pub fn object(mut self, object_id: u64) -> Self {
        self.object_id = Some(object_id);
        self
    }

    /// Attaches a context and the action taken in it.
    pub fn context(mut self, context: impl Into<String>, action: impl Into<String>) -> Self {
        self.contexts.insert(context, action);
        self
    }

    /// Replaces the whole context map.
    pub fn contexts_from(mut self, contexts: ContextMap) -> Self {
        self.contexts = contexts;
        self
    }

    /// Sets the responsible user. Defaults to the acting user.
    pub fn user(mut self, user_id: u64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Returns the message template.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the template arguments.
    pub fn args(&self) -> &LogArgs {
        &self.args
    }

    /// Returns the target object id, if set.
    pub fn object_id(&self) -> Option<u64> {
        self.object_id
    }

    /// Returns the context map.
    pub fn contexts(&self) -> &ContextMap {
        &self.contexts
    }

    /// Returns the responsible user, if set.
    pub fn user_id(&self) -> Option<u64> {
        self.user_id
    }

    pub(crate) fn contexts_mut(&mut self) -> &mut ContextMap {
        &mut self.contexts
    }

    pub(crate) fn set_user_if_missing(&mut self, user_id: Option<u64>) {
        if self.user_id.is_none() {
            self.user_id = user_id;
        }
    }

    /// Substitutes `{name}` and `{index}` placeholders with argument values.
    ///
    /// Placeholders without a matching argument are left as written.
    pub fn render(&self) -> String {
        render_template(&self.message, &self.args)
    }
}

fn render_template(template: &str, args: &LogArgs) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match args.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Identifier a sink assigns to a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A filtered log request as handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    connector: String,
    request_id: String,
    request: LogRequest,
    previous: Option<RecordId>,
}

impl LogEntry {
    pub(crate) fn new(
        connector: impl Into<String>,
        request_id: impl Into<String>,
        request: LogRequest,
        previous: Option<RecordId>,
    ) -> Self {
        Self {
            connector: connector.into(),
            request_id: request_id.into(),
            request,
            previous,
        }
    }

    /// Returns the name of the connector that produced the entry.
    pub fn connector(&self) -> &str {
        &self.connector
    }

    /// Returns the id of the request the entry belongs to.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the message template.
    pub fn message(&self) -> &str {
        self.request.message()
    }

    /// Returns the template arguments.
    pub fn args(&self) -> &LogArgs {
        self.request.args()
    }

    /// Returns the target object id, if any.
    pub fn object_id(&self) -> Option<u64> {
        self.request.object_id()
    }

    /// Returns the contexts that survived filtering.
    pub fn contexts(&self) -> &ContextMap {
        self.request.contexts()
    }

    /// Returns the responsible user, or `None` for anonymous actions.
    pub fn user_id(&self) -> Option<u64> {
        self.request.user_id()
    }

    /// Returns the record forwarded just before this one in the same request.
    pub fn previous(&self) -> Option<RecordId> {
        self.previous
    }

    /// Returns the message with arguments substituted.
    pub fn render(&self) -> String {
        self.request.render()
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LogEntry[connector={}, request_id={}, contexts={}",
            self.connector,
            self.request_id,
            self.contexts()
        )?;
        if let Some(object_id) = self.object_id() {
            write!(f, ", object_id={}", object_id)?;
        }
        if let Some(user_id) = self.user_id() {
            write!(f, ", user_id={}", user_id)?;
        }
        if let Some(previous) = self.previous {
            write!(f, ", previous={}", previous)?;
        }
        write!(f, "]")
    }
}
