use serde::{Deserialize, Serialize};

/// Resource kind a policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Object {
    #[serde(rename = "*")]
    Any,
    User,
    Session,
    Document,
    Plaid,
}

impl Object {
    pub const ALL: [Object; 5] = [
        Object::Any,
        Object::User,
        Object::Session,
        Object::Document,
        Object::Plaid,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Object::Any => "*",
            Object::User => "user",
            Object::Session => "session",
            Object::Document => "document",
            Object::Plaid => "plaid",
        }
    }

    pub fn covers(self, requested: Object) -> bool {
        self == Object::Any || self == requested
    }
}

impl std::fmt::Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Object {
    type Err = crate::AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Object::ALL
            .into_iter()
            .find(|object| object.as_str() == value)
            .ok_or_else(|| crate::AuthzError::InvalidObject(value.to_string()))
    }
}
