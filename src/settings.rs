//! Exclusion settings and the configuration source seam.
//!
//! Settings are owned by the host application and may change between
//! requests. A unit of work copies them once, at its start, into an
//! [`ExclusionPolicy`](crate::ExclusionPolicy) so every decision within one
//! request sees the same rules.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::Error;

/// One independent filter dimension of the exclusion settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Role slugs and raw user ids, checked against a single shared list
    AuthorsAndRoles,
    /// Single addresses or CIDR ranges
    IpAddresses,
    /// Action identifiers
    Actions,
    /// Context identifiers
    Contexts,
    /// Connector names
    Connectors,
}

impl Dimension {
    /// All dimensions, in settings order.
    pub const ALL: [Dimension; 5] = [
        Dimension::AuthorsAndRoles,
        Dimension::IpAddresses,
        Dimension::Actions,
        Dimension::Contexts,
        Dimension::Connectors,
    ];

    /// Returns the settings key for this dimension.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::AuthorsAndRoles => "authors_and_roles",
            Dimension::IpAddresses => "ip_addresses",
            Dimension::Actions => "actions",
            Dimension::Contexts => "contexts",
            Dimension::Connectors => "connectors",
        }
    }

    fn index(self) -> usize {
        match self {
            Dimension::AuthorsAndRoles => 0,
            Dimension::IpAddresses => 1,
            Dimension::Actions => 2,
            Dimension::Contexts => 3,
            Dimension::Connectors => 4,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authors_and_roles" => Ok(Dimension::AuthorsAndRoles),
            "ip_addresses" => Ok(Dimension::IpAddresses),
            "actions" => Ok(Dimension::Actions),
            "contexts" => Ok(Dimension::Contexts),
            "connectors" => Ok(Dimension::Connectors),
            other => Err(Error::UnknownDimension(other.to_string())),
        }
    }
}

/// Source of the configured exclusion lists.
///
/// Implemented by whatever owns the host's settings storage. The pipeline
/// reads every dimension once per unit of work.
pub trait ExclusionSource {
    /// Returns the excluded values for `dimension`.
    fn excluded_by_key(&self, dimension: Dimension) -> Vec<String>;
}

/// In-memory exclusion settings.
///
/// # Examples
///
/// ```
/// use audit_pipeline::{Dimension, ExclusionSettings};
///
/// let settings = ExclusionSettings::new()
///     .exclude(Dimension::AuthorsAndRoles, "editor")
///     .exclude(Dimension::IpAddresses, "10.0.0.0/8")
///     .exclude(Dimension::Contexts, "comments");
///
/// assert_eq!(settings.values(Dimension::Contexts), ["comments"]);
/// assert!(settings.values(Dimension::Actions).is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSettings {
    lists: [Vec<String>; 5],
}

impl ExclusionSettings {
    /// Creates settings with nothing excluded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value to a dimension, ignoring duplicates.
    pub fn exclude(mut self, dimension: Dimension, value: impl Into<String>) -> Self {
        self.insert(dimension, value);
        self
    }

    /// Adds a value to the dimension named by a settings key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDimension`] if `key` is not a settings key.
    pub fn exclude_key(self, key: &str, value: impl Into<String>) -> Result<Self, Error> {
        let dimension = key.parse()?;
        Ok(self.exclude(dimension, value))
    }

    /// Adds a value in place, ignoring duplicates.
    pub fn insert(&mut self, dimension: Dimension, value: impl Into<String>) {
        let value = value.into();
        let list = &mut self.lists[dimension.index()];
        if !list.contains(&value) {
            list.push(value);
        }
    }

    /// Removes a value from a dimension. Returns whether it was present.
    pub fn remove(&mut self, dimension: Dimension, value: &str) -> bool {
        let list = &mut self.lists[dimension.index()];
        let before = list.len();
        list.retain(|v| v != value);
        list.len() != before
    }

    /// Returns the excluded values of a dimension in insertion order.
    pub fn values(&self, dimension: Dimension) -> &[String] {
        &self.lists[dimension.index()]
    }

    /// Copies every dimension out of a configuration source.
    pub fn snapshot(source: &dyn ExclusionSource) -> Self {
        let mut settings = Self::new();
        for dimension in Dimension::ALL {
            for value in source.excluded_by_key(dimension) {
                settings.insert(dimension, value);
            }
        }
        settings
    }
}

impl ExclusionSource for ExclusionSettings {
    fn excluded_by_key(&self, dimension: Dimension) -> Vec<String> {
        self.values(dimension).to_vec()
    }
}

impl<T: ExclusionSource + ?Sized> ExclusionSource for Rc<T> {
    fn excluded_by_key(&self, dimension: Dimension) -> Vec<String> {
        (**self).excluded_by_key(dimension)
    }
}

impl<T: ExclusionSource + ?Sized> ExclusionSource for Arc<T> {
    fn excluded_by_key(&self, dimension: Dimension) -> Vec<String> {
        (**self).excluded_by_key(dimension)
    }
}
