use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Opaque user identifier assigned by the authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A permission category requested from the authenticator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Username,
    Payments,
}

impl Scope {
    /// Scopes requested on every login.
    pub const LOGIN: [Scope; 2] = [Scope::Username, Scope::Payments];
}

/// The authenticated user. Immutable once created; replaced wholesale on re-login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub uid: UserId,
    pub username: String,
    pub scopes: BTreeSet<Scope>,
}

impl UserIdentity {
    pub fn new(
        uid: impl Into<String>,
        username: impl Into<String>,
        scopes: impl IntoIterator<Item = Scope>,
    ) -> Self {
        Self {
            uid: UserId(uid.into()),
            username: username.into(),
            scopes: scopes.into_iter().collect(),
        }
    }

    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }

    /// Handle shown on the profile view, e.g. `@alice`.
    pub fn handle(&self) -> String {
        format!("@{}", self.username)
    }
}
