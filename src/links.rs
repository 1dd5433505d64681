use std::fmt;

/// A contextual link shown next to a logged record, such as "View diff".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLink {
    /// Text shown to the reader
    pub label: String,
    /// Target of the link
    pub url: String,
}

impl ActionLink {
    /// Creates a link.
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

impl fmt::Display for ActionLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.label, self.url)
    }
}

/// Name of the extension point a connector's link hook is exposed under.
///
/// ```
/// assert_eq!(audit_pipeline::links_hook_name("posts"), "action_links_posts");
/// ```
pub fn links_hook_name(connector: &str) -> String {
    format!("action_links_{}", connector)
}
