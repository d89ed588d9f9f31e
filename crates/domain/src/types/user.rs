//! User identity types
//!
//! A `UserIdentity` is a projection of the current credential set, derived
//! from ID token claims or the user-info endpoint. It is never persisted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Authenticated user's identity claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserIdentity {
    /// Subject identifier
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Remaining claims, kept verbatim
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

impl UserIdentity {
    pub fn new(sub: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            email: String::new(),
            email_verified: None,
            name: None,
            given_name: None,
            family_name: None,
            preferred_username: None,
            picture: None,
            claims: Map::new(),
        }
    }

    /// Best label for display: name, preferred username, email, then subject.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.preferred_username.as_deref())
            .filter(|value| !value.is_empty())
            .or(Some(self.email.as_str()).filter(|value| !value.is_empty()))
            .unwrap_or(&self.sub)
    }

    /// Roles from the `roles` claim; a single string is treated as one role.
    pub fn roles(&self) -> Vec<&str> {
        match self.claims.get("roles") {
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(role)) => vec![role.as_str()],
            _ => Vec::new(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles().contains(&role)
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        let held = self.roles();
        roles.iter().any(|role| held.contains(role))
    }

    /// True when every listed role is held; an empty list is trivially held.
    pub fn has_all_roles(&self, roles: &[&str]) -> bool {
        let held = self.roles();
        roles.iter().all(|role| held.contains(role))
    }
}
