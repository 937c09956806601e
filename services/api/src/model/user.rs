use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tyr_authz::Role;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Blocked,
    Deleted,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Blocked => "blocked",
            UserStatus::Deleted => "deleted",
        }
    }
}

impl std::str::FromStr for UserStatus {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(UserStatus::Active),
            "blocked" => Ok(UserStatus::Blocked),
            "deleted" => Ok(UserStatus::Deleted),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[schema(value_type = String, example = "user")]
    pub role: Role,
    pub status: UserStatus,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn is_blocked(&self) -> bool {
        self.status == UserStatus::Blocked
    }

    /// Case-insensitive match over first name, last name and email.
    pub fn matches_search(&self, term: &str) -> bool {
        [&self.first_name, &self.last_name, &self.email]
            .iter()
            .any(|field| field.to_lowercase().contains(term))
    }
}
