use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Action that grants every action on a resource (e.g. `events: ["*"]`).
pub const WILDCARD_ACTION: &str = "*";

/// A named permission of the form `resource:action` (e.g. `events:read`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capability {
    resource: String,
    action: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid capability '{0}': expected 'resource:action'")]
pub struct CapabilityParseError(pub String);

impl Capability {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

impl FromStr for Capability {
    type Err = CapabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource, action) = s
            .split_once(':')
            .ok_or_else(|| CapabilityParseError(s.to_string()))?;
        if resource.is_empty() || action.is_empty() || action.contains(':') {
            return Err(CapabilityParseError(s.to_string()));
        }
        Ok(Self::new(resource, action))
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

/// Permissions held by a user: resource name → granted actions.
///
/// Serialized as a plain JSON object, e.g. `{"events": ["read", "create"]}`,
/// both on the user profile and inside access tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeMap<String, BTreeSet<String>>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style grant, handy for configuration and tests.
    pub fn with(mut self, resource: &str, actions: &[&str]) -> Self {
        for action in actions {
            self.grant(Capability::new(resource, *action));
        }
        self
    }

    pub fn grant(&mut self, capability: Capability) {
        self.0
            .entry(capability.resource)
            .or_default()
            .insert(capability.action);
    }

    /// Whether this set grants `required`, either explicitly or via the
    /// resource's wildcard action.
    pub fn grants(&self, required: &Capability) -> bool {
        self.0.get(required.resource()).is_some_and(|actions| {
            actions.contains(required.action()) || actions.contains(WILDCARD_ACTION)
        })
    }

    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().flat_map(|(resource, actions)| {
            actions.iter().map(move |a| Capability::new(resource.as_str(), a.as_str()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }
}
