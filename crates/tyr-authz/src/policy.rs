//! Policy data model and the standard seed set.
//!
//! # Notes
//! - A [`Grouping`] reads "`role` inherits everything `inherits` may do".
//! - The seed set is the only policy source; it is built once at startup.
use crate::{Action, Object, Role};
use serde::{Deserialize, Serialize};

/// "`role` may perform `action` on `object`".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Policy {
    pub role: Role,
    pub object: Object,
    pub action: Action,
}

impl Policy {
    pub const fn new(role: Role, object: Object, action: Action) -> Self {
        Self {
            role,
            object,
            action,
        }
    }

    pub fn matches(&self, object: Object, action: Action) -> bool {
        self.object.covers(object) && self.action.covers(action)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grouping {
    pub role: Role,
    pub inherits: Role,
}

impl Grouping {
    pub const fn new(role: Role, inherits: Role) -> Self {
        Self { role, inherits }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySet {
    pub policies: Vec<Policy>,
    pub groupings: Vec<Grouping>,
}

impl PolicySet {
    pub fn new(policies: Vec<Policy>, groupings: Vec<Grouping>) -> Self {
        Self {
            policies,
            groupings,
        }
    }

    /// Policies every deployment starts with.
    ///
    /// `user` owns its documents and may list users; `admin` manages users,
    /// sessions and documents; `superadmin` may do anything.
    pub fn seed() -> Self {
        use Action::*;

        let mut policies = vec![Policy::new(Role::User, Object::User, ReadAll)];
        for action in [Create, Read, Update, Delete] {
            policies.push(Policy::new(Role::User, Object::Document, action));
        }
        policies.push(Policy::new(Role::User, Object::Plaid, Create));
        for object in [Object::User, Object::Session, Object::Document] {
            policies.push(Policy::new(Role::Admin, object, Any));
        }
        policies.push(Policy::new(Role::Superadmin, Object::Any, Any));

        let groupings = vec![
            Grouping::new(Role::Admin, Role::User),
            Grouping::new(Role::Superadmin, Role::Admin),
        ];
        Self::new(policies, groupings)
    }

    pub fn direct_policies(&self, role: Role) -> impl Iterator<Item = &Policy> {
        self.policies.iter().filter(move |policy| policy.role == role)
    }
}
