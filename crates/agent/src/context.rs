use onboard_core::domain::permission::{PermissionLevel, PermissionSet};

/// The authenticated employee a message is handled for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserContext {
    pub username: String,
    pub email: String,
    pub level: PermissionLevel,
}

impl UserContext {
    pub fn new(username: impl Into<String>, email: impl Into<String>, level: PermissionLevel) -> Self {
        Self { username: username.into(), email: email.into(), level }
    }

    pub fn permissions(&self) -> PermissionSet {
        self.level.capabilities()
    }
}
