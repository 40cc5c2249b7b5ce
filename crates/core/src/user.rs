//! Author references.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The author a script is stored under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Uuid,
    /// Display name, used as the first install-name segment.
    pub name: String,
    /// Repository-host username, used to match push notifications.
    pub github_username: Option<String>,
}

impl UserRef {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            github_username: None,
        }
    }

    pub fn with_github_username(mut self, username: impl Into<String>) -> Self {
        self.github_username = Some(username.into());
        self
    }
}
