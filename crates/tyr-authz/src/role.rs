use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Superadmin,
    Admin,
    User,
}

impl Role {
    /// Roles accepted on user records.
    pub const VALID: [Role; 3] = [Role::Superadmin, Role::Admin, Role::User];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = crate::AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::VALID
            .into_iter()
            .find(|role| role.as_str() == value)
            .ok_or_else(|| crate::AuthzError::InvalidRole(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::Role;

    #[test]
    fn role_from_str() {
        assert_eq!("admin".parse::<Role>().ok(), Some(Role::Admin));
        assert!("root".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err());
    }
}
