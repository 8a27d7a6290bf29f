use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two user categories. Messaging is only permitted across categories,
/// never within one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Fan,
    Player,
}

impl Role {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "fan" => Some(Role::Fan),
            "player" => Some(Role::Player),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Role::Fan => "fan",
            Role::Player => "player",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db())
    }
}

/// Account record as referenced by the session layer. The password hash
/// lives in `AccountCredentials`, never here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}
