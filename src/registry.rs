use crate::connector::{Connector, EventArg, Scope};
use crate::dispatcher::LogDispatcher;
use crate::error::Error;
use crate::links::{links_hook_name, ActionLink};
use crate::record::LogEntry;
use crate::unit::UnitOfWork;

/// The set of known connectors.
///
/// Connectors are registered once, at startup, and live as long as the
/// registry. Which of them actually subscribe is decided per unit of work by
/// [`activate`](Self::activate).
///
/// # Examples
///
/// ```
/// use audit_pipeline::{
///     Actor, ConnectorRegistry, Dimension, EventConnector, ExclusionPolicy, ExclusionSettings,
///     RequestMeta, UnitOfWork,
/// };
///
/// let mut registry = ConnectorRegistry::new();
/// registry
///     .register(EventConnector::new("posts").listen("save_post"))
///     .unwrap();
///
/// let policy = ExclusionPolicy::new(
///     ExclusionSettings::new().exclude(Dimension::AuthorsAndRoles, "editor"),
/// );
/// let editor = RequestMeta::new("req-1").with_actor(Actor::new(3).with_role("editor"));
/// let uow = UnitOfWork::new(editor, policy);
///
/// let activation = registry.activate(&uow);
/// assert_eq!(activation.subscription_count(), 0);
/// ```
#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: Vec<Box<dyn Connector>>,
}

impl ConnectorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateConnector`] if a connector with the same
    /// name is already registered.
    pub fn register(&mut self, connector: impl Connector + 'static) -> Result<(), Error> {
        self.register_boxed(Box::new(connector))
    }

    /// Adds an already boxed connector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateConnector`] on a name clash.
    pub fn register_boxed(&mut self, connector: Box<dyn Connector>) -> Result<(), Error> {
        if self.get(connector.name()).is_some() {
            return Err(Error::DuplicateConnector(connector.name().to_string()));
        }
        tracing::debug!(
            connector = %connector.name(),
            events = connector.events().len(),
            "connector registered"
        );
        self.connectors.push(connector);
        Ok(())
    }

    /// Returns the connector registered under `name`.
    pub fn get(&self, name: &str) -> Option<&dyn Connector> {
        self.connectors
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.as_ref())
    }

    /// Returns the registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.connectors.iter().map(|c| c.name()).collect()
    }

    /// Returns the number of registered connectors.
    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Subscribes every eligible connector for one unit of work.
    ///
    /// A connector is skipped entirely (no subscriptions, no link hook) when
    /// its name is excluded, when the acting user is excluded, or when the
    /// request's address is excluded. The checks run once, here, against
    /// the identity of the unit of work rather than per event.
    pub fn activate(&self, uow: &UnitOfWork) -> Activation<'_> {
        let log = uow.diagnostics();
        let mut activation = Activation::default();

        for connector in &self.connectors {
            let name = connector.name();
            let policy = uow.policy();

            if !policy.is_logging_enabled_for_connector(name) {
                log.debug(format_args!("connector {} skipped: excluded by name", name));
                continue;
            }
            if !uow.logging_enabled_for_user(name) {
                log.debug(format_args!("connector {} skipped: user excluded", name));
                continue;
            }
            if !uow.logging_enabled_for_ip(name) {
                log.debug(format_args!("connector {} skipped: address excluded", name));
                continue;
            }

            for event in connector.events() {
                activation
                    .subscriptions
                    .push((event.clone(), connector.as_ref()));
            }
            activation
                .link_hooks
                .push((links_hook_name(name), connector.as_ref()));
        }

        log.trace(format_args!(
            "{} connectors active, {} subscriptions",
            activation.link_hooks.len(),
            activation.subscriptions.len()
        ));
        activation
    }
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("connectors", &self.names())
            .finish()
    }
}

/// Subscriptions in force for one unit of work.
///
/// Borrowed from the registry; the host event bus calls [`fire`](Self::fire)
/// for every event it raises during the request.
#[derive(Default)]
pub struct Activation<'r> {
    subscriptions: Vec<(String, &'r dyn Connector)>,
    link_hooks: Vec<(String, &'r dyn Connector)>,
}

impl<'r> Activation<'r> {
    /// Delivers a fired event to every subscribed connector, in
    /// registration order.
    ///
    /// Returns the number of handlers that ran. Connectors subscribed to
    /// the event without a matching handler are skipped silently.
    ///
    /// # Errors
    ///
    /// Returns the first handler error; later connectors do not run.
    pub fn fire(
        &self,
        event: &str,
        args: &[EventArg],
        uow: &mut UnitOfWork,
        dispatcher: &LogDispatcher,
    ) -> Result<usize, Error> {
        let mut handled = 0;
        for (subscribed, connector) in &self.subscriptions {
            if subscribed != event {
                continue;
            }
            let mut scope = Scope::new(uow, dispatcher, connector.name(), event);
            if connector.dispatch(event, args, &mut scope)? {
                handled += 1;
            }
        }
        Ok(handled)
    }

    /// Runs the link extension point of `connector`.
    ///
    /// Returns `links` unchanged if that connector is not active.
    pub fn action_links(
        &self,
        connector: &str,
        links: Vec<ActionLink>,
        entry: &LogEntry,
    ) -> Vec<ActionLink> {
        let hook = links_hook_name(connector);
        match self.link_hooks.iter().find(|(name, _)| *name == hook) {
            Some((_, connector)) => connector.action_links(links, entry),
            None => links,
        }
    }

    /// Returns the total number of event subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns `true` if any active connector listens to `event`.
    pub fn is_subscribed(&self, event: &str) -> bool {
        self.subscriptions.iter().any(|(e, _)| e == event)
    }

    /// Returns the names of active connectors in registration order.
    pub fn active_connectors(&self) -> Vec<&str> {
        self.link_hooks.iter().map(|(_, c)| c.name()).collect()
    }

    /// Returns the exposed link extension point names.
    pub fn link_hooks(&self) -> Vec<&str> {
        self.link_hooks.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl std::fmt::Debug for Activation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activation")
            .field(
                "subscriptions",
                &self
                    .subscriptions
                    .iter()
                    .map(|(event, c)| (event.as_str(), c.name()))
                    .collect::<Vec<_>>(),
            )
            .field("link_hooks", &self.link_hooks())
            .finish()
    }
}
