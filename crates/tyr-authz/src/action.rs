use serde::{Deserialize, Serialize};

/// Operation a role may perform on an [`crate::Object`].
///
/// The `*_all` variants grant the operation across every owner, while the bare
/// variants are scoped to the caller's own records by the service layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[serde(rename = "*")]
    Any,
    ReadAll,
    Read,
    CreateAll,
    Create,
    UpdateAll,
    Update,
    DeleteAll,
    Delete,
    Analyze,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::Any,
        Action::ReadAll,
        Action::Read,
        Action::CreateAll,
        Action::Create,
        Action::UpdateAll,
        Action::Update,
        Action::DeleteAll,
        Action::Delete,
        Action::Analyze,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Any => "*",
            Action::ReadAll => "read_all",
            Action::Read => "read",
            Action::CreateAll => "create_all",
            Action::Create => "create",
            Action::UpdateAll => "update_all",
            Action::Update => "update",
            Action::DeleteAll => "delete_all",
            Action::Delete => "delete",
            Action::Analyze => "analyze",
        }
    }

    /// True when a policy granting `self` covers a request for `requested`.
    ///
    /// Only the `*` sentinel widens a grant; everything else is exact.
    pub fn covers(self, requested: Action) -> bool {
        self == Action::Any || self == requested
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = crate::AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| crate::AuthzError::InvalidAction(value.to_string()))
    }
}
