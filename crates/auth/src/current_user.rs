use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifier stamped when no authenticated principal is acting
/// (background work, unauthenticated requests).
pub const SYSTEM_USER: &str = "system";

/// Supplies the acting principal's identifier.
///
/// Non-blocking and infallible: providers fall back to [`SYSTEM_USER`]
/// rather than failing a commit.
pub trait CurrentUser: Send + Sync {
    fn user_id(&self) -> String;
}

impl<U> CurrentUser for Arc<U>
where
    U: CurrentUser + ?Sized,
{
    fn user_id(&self) -> String {
        (**self).user_id()
    }
}

/// A principal resolved once per request and then held fixed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticCurrentUser(String);

impl StaticCurrentUser {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self(user_id.into())
    }

    pub fn system() -> Self {
        Self(SYSTEM_USER.to_string())
    }

    /// Build from an optional identity claim; missing or blank claims map to
    /// [`SYSTEM_USER`].
    pub fn from_claim(subject: Option<&str>) -> Self {
        match subject.map(str::trim) {
            Some(sub) if !sub.is_empty() => Self::new(sub),
            _ => Self::system(),
        }
    }
}

impl CurrentUser for StaticCurrentUser {
    fn user_id(&self) -> String {
        self.0.clone()
    }
}
