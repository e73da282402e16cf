use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Calendar access level chosen by the employee at login.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    Readonly,
    ReadUpdate,
    ReadCreateUpdate,
    #[default]
    FullAccess,
}

impl PermissionLevel {
    pub const ALL: [PermissionLevel; 4] =
        [Self::Readonly, Self::ReadUpdate, Self::ReadCreateUpdate, Self::FullAccess];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Readonly => "readonly",
            Self::ReadUpdate => "read_update",
            Self::ReadCreateUpdate => "read_create_update",
            Self::FullAccess => "full_access",
        }
    }

    pub fn capabilities(&self) -> PermissionSet {
        match self {
            Self::Readonly => PermissionSet {
                can_read: true,
                can_create: false,
                can_update: false,
                can_delete: false,
            },
            Self::ReadUpdate => PermissionSet {
                can_read: true,
                can_create: false,
                can_update: true,
                can_delete: false,
            },
            Self::ReadCreateUpdate => PermissionSet {
                can_read: true,
                can_create: true,
                can_update: true,
                can_delete: false,
            },
            Self::FullAccess => PermissionSet {
                can_read: true,
                can_create: true,
                can_update: true,
                can_delete: true,
            },
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "readonly" => Ok(Self::Readonly),
            "read_update" => Ok(Self::ReadUpdate),
            "read_create_update" => Ok(Self::ReadCreateUpdate),
            "full_access" => Ok(Self::FullAccess),
            other => Err(DomainError::InvalidPermissionLevel(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    pub can_read: bool,
    pub can_create: bool,
    pub can_update: bool,
    pub can_delete: bool,
}

impl PermissionSet {
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::Read => self.can_read,
            Capability::Create => self.can_create,
            Capability::Update => self.can_update,
            Capability::Delete => self.can_delete,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Read,
    Create,
    Update,
    Delete,
}

impl Capability {
    pub const ALL: [Capability; 4] = [Self::Read, Self::Create, Self::Update, Self::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}
