//! Caller identity and claims
//!
//! A validated bearer token is turned into an [`Identity`]: a flat list of
//! typed claims. The enricher later attaches the caller's granted permissions
//! under [`claim_types::PERMISSIONS`], which is what the authorization handler
//! reads.

use serde_json::Value;

use crate::pdp::PermissionSet;

/// Well-known claim types
pub mod claim_types {
    /// Claim type carrying one granted permission per entry
    pub const PERMISSIONS: &str = "permissions";
    /// Standard subject claim, the default user identifier
    pub const SUBJECT: &str = "sub";
    /// Display name claim
    pub const NAME: &str = "name";
}

/// A single claim on an identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

/// An authenticated (or anonymous) caller and its claims
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    authentication_type: Option<String>,
    claims: Vec<Claim>,
}

impl Identity {
    /// Create an authenticated identity with no claims
    pub fn new(authentication_type: impl Into<String>) -> Self {
        Self {
            authentication_type: Some(authentication_type.into()),
            claims: Vec::new(),
        }
    }

    /// Create an unauthenticated identity
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Build a bearer identity from decoded JWT claims.
    ///
    /// Strings map to one claim, string arrays to one claim per element and
    /// other scalars to their JSON text. Nested objects and nulls are skipped.
    pub fn from_jwt_claims(claims: &serde_json::Map<String, Value>) -> Self {
        let mut identity = Self::new("Bearer");
        for (claim_type, value) in claims {
            match value {
                Value::String(s) => identity.add_claim(Claim::new(claim_type, s)),
                Value::Array(items) => {
                    for item in items {
                        match item {
                            Value::String(s) => identity.add_claim(Claim::new(claim_type, s)),
                            Value::Number(_) | Value::Bool(_) => {
                                identity.add_claim(Claim::new(claim_type, item.to_string()))
                            }
                            _ => {}
                        }
                    }
                }
                Value::Number(_) | Value::Bool(_) => {
                    identity.add_claim(Claim::new(claim_type, value.to_string()))
                }
                Value::Null | Value::Object(_) => {}
            }
        }
        identity
    }

    pub fn with_claim(mut self, claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_claim(Claim::new(claim_type, value));
        self
    }

    pub fn add_claim(&mut self, claim: Claim) {
        self.claims.push(claim);
    }

    pub fn is_authenticated(&self) -> bool {
        self.authentication_type.is_some()
    }

    pub fn authentication_type(&self) -> Option<&str> {
        self.authentication_type.as_deref()
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Value of the first claim of the given type
    pub fn find_first(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    /// Values of every claim of the given type, in insertion order
    pub fn find_all<'a>(&'a self, claim_type: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.claims
            .iter()
            .filter(move |c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        self.claims
            .iter()
            .any(|c| c.claim_type == claim_type && c.value == value)
    }

    /// Remove every claim of `claim_type` and add one claim per value
    pub fn replace_claims<I, S>(&mut self, claim_type: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.claims.retain(|c| c.claim_type != claim_type);
        self.claims
            .extend(values.into_iter().map(|v| Claim::new(claim_type, v)));
    }

    /// Permissions granted to this identity
    pub fn permissions(&self) -> PermissionSet {
        self.find_all(claim_types::PERMISSIONS).collect()
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.has_claim(claim_types::PERMISSIONS, permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jwt_claims(value: Value) -> serde_json::Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected a JSON object"),
        }
    }

    #[test]
    fn test_from_jwt_claims_flattens_values() {
        let claims = jwt_claims(json!({
            "sub": "user123",
            "aud": ["api", "admin"],
            "exp": 9999999999u64,
            "email_verified": true,
            "address": { "country": "BE" },
            "nickname": null
        }));

        let identity = Identity::from_jwt_claims(&claims);

        assert!(identity.is_authenticated());
        assert_eq!(identity.authentication_type(), Some("Bearer"));
        assert_eq!(identity.find_first("sub"), Some("user123"));
        assert_eq!(identity.find_all("aud").collect::<Vec<_>>(), vec!["api", "admin"]);
        assert_eq!(identity.find_first("exp"), Some("9999999999"));
        assert_eq!(identity.find_first("email_verified"), Some("true"));
        assert_eq!(identity.find_first("address"), None);
        assert_eq!(identity.find_first("nickname"), None);
    }

    #[test]
    fn test_anonymous_is_not_authenticated() {
        let identity = Identity::anonymous();
        assert!(!identity.is_authenticated());
        assert!(identity.claims().is_empty());
    }

    #[test]
    fn test_replace_claims_drops_previous_values() {
        let mut identity = Identity::new("Bearer")
            .with_claim("sub", "user123")
            .with_claim(claim_types::PERMISSIONS, "old");

        identity.replace_claims(claim_types::PERMISSIONS, ["a", "b"]);

        assert!(!identity.has_permission("old"));
        assert!(identity.has_permission("a"));
        assert!(identity.has_permission("b"));
        assert_eq!(identity.find_first("sub"), Some("user123"));
        assert_eq!(identity.claims().len(), 3);
    }

    #[test]
    fn test_permissions_are_case_sensitive() {
        let identity = Identity::new("Bearer").with_claim(claim_types::PERMISSIONS, "Orders.Read");

        assert!(identity.has_permission("Orders.Read"));
        assert!(!identity.has_permission("orders.read"));
        assert!(identity.permissions().contains("Orders.Read"));
    }

    #[test]
    fn test_has_claim_requires_matching_type() {
        let identity = Identity::new("Bearer").with_claim("role", "admin");
        assert!(identity.has_claim("role", "admin"));
        assert!(!identity.has_permission("admin"));
    }
}
