use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::model::item::{ParseEnumError, WireId};

/// Authorization roles, least privileged first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Guest,
    #[default]
    User,
    HallAdmin,
    OrgAdmin,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Self; 6] = [
        Self::Guest,
        Self::User,
        Self::HallAdmin,
        Self::OrgAdmin,
        Self::Admin,
        Self::SuperAdmin,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::User => "user",
            Self::HallAdmin => "hallAdmin",
            Self::OrgAdmin => "orgAdmin",
            Self::Admin => "admin",
            Self::SuperAdmin => "superAdmin",
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(
            self,
            Self::HallAdmin | Self::OrgAdmin | Self::Admin | Self::SuperAdmin
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    /// Case-, underscore- and hyphen-insensitive: `hall_admin`, `HallAdmin`
    /// and `hall-admin` all parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match folded.as_str() {
            "guest" => Ok(Self::Guest),
            "user" => Ok(Self::User),
            "halladmin" => Ok(Self::HallAdmin),
            "orgadmin" => Ok(Self::OrgAdmin),
            "admin" => Ok(Self::Admin),
            "superadmin" => Ok(Self::SuperAdmin),
            _ => Err(ParseEnumError {
                expected: "role",
                got: s.to_string(),
            }),
        }
    }
}

/// A user as the identity provider describes it.
///
/// `role` stays raw here; it only becomes a [`Role`] after
/// [`crate::role::normalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UserWire")]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserWire {
    id: Option<WireId>,
    #[serde(rename = "_id")]
    underscore_id: Option<WireId>,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    role: Option<String>,
}

impl From<UserWire> for User {
    fn from(wire: UserWire) -> Self {
        Self {
            id: wire
                .id
                .and_then(WireId::into_identity)
                .or_else(|| wire.underscore_id.and_then(WireId::into_identity)),
            name: wire.name.unwrap_or_default(),
            email: wire.email.unwrap_or_default(),
            phone: wire.phone,
            role: wire.role,
        }
    }
}
