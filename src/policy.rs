//! Exclusion decisions.
//!
//! Every check here answers "may this be logged?". Anything that cannot be
//! classified with confidence (no identity, malformed address, unknown
//! settings key) is allowed.

use std::fmt;
use std::net::IpAddr;
use std::rc::Rc;

use ipnetwork::IpNetwork;

use crate::request::Actor;
use crate::settings::{Dimension, ExclusionSettings};

/// Host-supplied override for the user and IP verdicts.
///
/// Called with the computed verdict, the acting user and the connector being
/// gated. Its return value replaces the verdict. Shared between the pipeline
/// and every policy it hands out, on the request's thread.
pub type RecordOverride = Rc<dyn Fn(bool, Option<&Actor>, &str) -> bool>;

#[derive(Debug, Clone)]
enum IpRule {
    Network(IpNetwork),
    Literal(String),
}

impl IpRule {
    fn parse(entry: &str) -> Self {
        match entry.trim().parse::<IpNetwork>() {
            Ok(network) => IpRule::Network(network),
            Err(_) => IpRule::Literal(entry.to_string()),
        }
    }

    fn matches(&self, raw: &str, ip: Option<IpAddr>) -> bool {
        match (self, ip) {
            (IpRule::Network(network), Some(ip)) => network.contains(ip),
            (IpRule::Network(_), None) => false,
            (IpRule::Literal(literal), _) => literal == raw,
        }
    }
}

/// Exclusion policy for one unit of work.
///
/// Holds an immutable copy of the settings plus the optional override hook.
///
/// # Examples
///
/// ```
/// use audit_pipeline::{Actor, Dimension, ExclusionPolicy, ExclusionSettings};
///
/// let policy = ExclusionPolicy::new(
///     ExclusionSettings::new()
///         .exclude(Dimension::AuthorsAndRoles, "editor")
///         .exclude(Dimension::IpAddresses, "192.168.0.0/16"),
/// );
///
/// let editor = Actor::new(7).with_role("editor");
/// assert!(!policy.is_logging_enabled_for_user(Some(&editor), "posts"));
/// assert!(policy.is_logging_enabled_for_user(None, "posts"));
///
/// assert!(!policy.is_logging_enabled_for_ip(Some("192.168.1.20"), None, "posts"));
/// assert!(policy.is_logging_enabled_for_ip(Some("not-an-ip"), None, "posts"));
/// ```
#[derive(Clone, Default)]
pub struct ExclusionPolicy {
    settings: ExclusionSettings,
    ip_rules: Vec<IpRule>,
    override_hook: Option<RecordOverride>,
}

impl ExclusionPolicy {
    /// Creates a policy over a settings snapshot.
    pub fn new(settings: ExclusionSettings) -> Self {
        let ip_rules = settings
            .values(Dimension::IpAddresses)
            .iter()
            .map(|entry| IpRule::parse(entry))
            .collect();
        Self {
            settings,
            ip_rules,
            override_hook: None,
        }
    }

    /// Installs the override hook for user and IP verdicts.
    pub fn with_override(mut self, hook: RecordOverride) -> Self {
        self.override_hook = Some(hook);
        self
    }

    /// Returns the settings this policy decides against.
    pub fn settings(&self) -> &ExclusionSettings {
        &self.settings
    }

    /// Returns `true` if `value` is listed under `dimension`.
    ///
    /// IP values also match CIDR entries that contain them.
    pub fn is_excluded(&self, dimension: Dimension, value: &str) -> bool {
        match dimension {
            Dimension::IpAddresses => {
                let ip = value.parse::<IpAddr>().ok();
                self.ip_rules.iter().any(|rule| rule.matches(value, ip))
            }
            _ => self.settings.values(dimension).iter().any(|v| v == value),
        }
    }

    /// Like [`is_excluded`](Self::is_excluded) but takes a settings key.
    ///
    /// An unknown key excludes nothing.
    pub fn is_excluded_key(&self, key: &str, value: &str) -> bool {
        match key.parse::<Dimension>() {
            Ok(dimension) => self.is_excluded(dimension, value),
            Err(_) => false,
        }
    }

    /// Decides whether actions by `actor` may be logged.
    ///
    /// Anonymous actors are always eligible. Otherwise the actor is excluded
    /// when any of its roles appears in the authors-and-roles list, or when a
    /// numeric entry there equals its id (`"42"`, `"042"` and `" 42"` all
    /// name user 42).
    pub fn is_logging_enabled_for_user(&self, actor: Option<&Actor>, connector: &str) -> bool {
        let verdict = match actor {
            None => true,
            Some(actor) if actor.is_anonymous() => true,
            Some(actor) => {
                let role_excluded = actor
                    .roles
                    .iter()
                    .any(|role| self.is_excluded(Dimension::AuthorsAndRoles, role));
                !role_excluded && !self.is_user_id_excluded(actor.id)
            }
        };
        self.apply_override(verdict, actor, connector)
    }

    /// Decides whether actions from `ip` may be logged.
    ///
    /// A missing or malformed address is always eligible.
    pub fn is_logging_enabled_for_ip(
        &self,
        ip: Option<&str>,
        actor: Option<&Actor>,
        connector: &str,
    ) -> bool {
        let verdict = match ip.filter(|ip| ip.parse::<IpAddr>().is_ok()) {
            Some(ip) => !self.is_excluded(Dimension::IpAddresses, ip),
            None => true,
        };
        self.apply_override(verdict, actor, connector)
    }

    /// Returns `true` unless `action` is excluded.
    pub fn is_logging_enabled_for_action(&self, action: &str) -> bool {
        !self.is_excluded(Dimension::Actions, action)
    }

    /// Returns `true` unless `context` is excluded.
    pub fn is_logging_enabled_for_context(&self, context: &str) -> bool {
        !self.is_excluded(Dimension::Contexts, context)
    }

    /// Returns `true` unless the connector itself is excluded.
    pub fn is_logging_enabled_for_connector(&self, connector: &str) -> bool {
        !self.is_excluded(Dimension::Connectors, connector)
    }

    fn is_user_id_excluded(&self, id: u64) -> bool {
        self.settings
            .values(Dimension::AuthorsAndRoles)
            .iter()
            .any(|entry| entry.trim().parse::<u64>() == Ok(id))
    }

    fn apply_override(&self, verdict: bool, actor: Option<&Actor>, connector: &str) -> bool {
        match &self.override_hook {
            Some(hook) => hook(verdict, actor, connector),
            None => verdict,
        }
    }
}

impl fmt::Debug for ExclusionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusionPolicy")
            .field("settings", &self.settings)
            .field("override_hook", &self.override_hook.is_some())
            .finish()
    }
}
