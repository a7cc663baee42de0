//! Value types exchanged with the PDP

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// An order-irrelevant set of permission identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// True when every permission in `self` is also in `other`
    pub fn is_subset(&self, other: &PermissionSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Permissions of `self` that `granted` does not contain
    pub fn missing_from<'a>(&'a self, granted: &'a PermissionSet) -> Vec<&'a str> {
        self.0
            .difference(&granted.0)
            .map(String::as_str)
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for PermissionSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Decision returned by the PDP for one (user, application) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdpResponse {
    pub application_id: String,
    pub user_id: String,
    #[serde(default)]
    pub permissions: PermissionSet,
}

/// Longest accepted lifetime for a cached decision (one year)
pub const MAX_CACHE_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// PDP client options
#[derive(Debug, Clone)]
pub struct PdpOptions {
    /// Base URL of the PDP
    pub pdp_url: String,
    /// Absolute lifetime of a cached decision
    pub cache_duration: Duration,
    /// Include the application id in cache keys
    pub multi_application: bool,
    /// Upper bound on one PDP round trip
    pub timeout: Option<Duration>,
}

impl PdpOptions {
    pub fn new(pdp_url: impl Into<String>, cache_duration: Duration) -> Self {
        Self {
            pdp_url: pdp_url.into(),
            cache_duration,
            multi_application: false,
            timeout: None,
        }
    }

    /// Cache key for a user's decision
    pub fn cache_key(&self, user_id: &str, application_id: &str) -> String {
        if self.multi_application {
            format!("pdpResponse-{}-{}", application_id, user_id)
        } else {
            format!("pdpResponse-{}", user_id)
        }
    }
}
