/// Metadata about the request that forms one unit of work.
///
/// Carries the acting identity and the originating network address as the
/// host saw them. Either may be missing.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    /// Unique identifier for this request
    pub request_id: String,
    /// Acting user, if any
    pub actor: Option<Actor>,
    /// Remote address as reported by the host, unvalidated
    pub remote_addr: Option<String>,
}

impl RequestMeta {
    /// Creates metadata for an anonymous request with no known address.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            actor: None,
            remote_addr: None,
        }
    }

    /// Sets the acting user.
    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Sets the remote address.
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }
}

/// A user acting on the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Numeric user id; `0` means no stable identity
    pub id: u64,
    /// Role slugs held by the user
    pub roles: Vec<String>,
}

impl Actor {
    /// Creates an actor with the given id and no roles.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            roles: Vec::new(),
        }
    }

    /// Adds a role slug.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Returns `true` if the actor has no stable identity.
    pub fn is_anonymous(&self) -> bool {
        self.id == 0
    }
}
