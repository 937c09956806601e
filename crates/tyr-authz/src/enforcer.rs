//! Role-inheritance graph and permission enforcement.
//!
//! # Purpose
//! Answers "can `role` do `action` on `object`" from a [`PolicySet`].
//!
//! # Notes
//! - The graph is immutable once built and cheap to share behind an `Arc`.
//! - Each role's reachable set includes the role itself.
//! - Matching is exact apart from the `*` sentinels; there is no prefix or
//!   hierarchical object matching.
use crate::{Action, AuthzError, AuthzResult, Grouping, Object, Policy, PolicySet, Role};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct RoleGraph {
    reachable: HashMap<Role, BTreeSet<Role>>,
}

impl RoleGraph {
    /// Build the transitive closure of every role.
    ///
    /// # Errors
    /// - [`AuthzError::InheritanceCycle`] when a role can reach itself through
    ///   one or more groupings.
    pub fn build(groupings: &[Grouping]) -> AuthzResult<Self> {
        let mut edges: HashMap<Role, Vec<Role>> = HashMap::new();
        for grouping in groupings {
            edges.entry(grouping.role).or_default().push(grouping.inherits);
        }

        let mut reachable = HashMap::new();
        for role in Role::VALID {
            let mut seen = BTreeSet::new();
            let mut stack = edges.get(&role).cloned().unwrap_or_default();
            while let Some(next) = stack.pop() {
                if next == role {
                    return Err(AuthzError::InheritanceCycle(role));
                }
                if seen.insert(next)
                    && let Some(children) = edges.get(&next)
                {
                    stack.extend(children.iter().copied());
                }
            }
            seen.insert(role);
            reachable.insert(role, seen);
        }
        Ok(Self { reachable })
    }

    /// Roles whose permissions `role` holds, including itself.
    pub fn reachable(&self, role: Role) -> impl Iterator<Item = Role> + '_ {
        self.reachable
            .get(&role)
            .into_iter()
            .flat_map(|roles| roles.iter().copied())
    }

    pub fn inherits(&self, role: Role, other: Role) -> bool {
        self.reachable
            .get(&role)
            .is_some_and(|roles| roles.contains(&other))
    }
}

#[derive(Debug, Clone)]
pub struct Enforcer {
    graph: RoleGraph,
    policies: HashMap<Role, Vec<Policy>>,
}

impl Enforcer {
    pub fn new(policy_set: &PolicySet) -> AuthzResult<Self> {
        let graph = RoleGraph::build(&policy_set.groupings)?;
        let mut policies: HashMap<Role, Vec<Policy>> = HashMap::new();
        for policy in &policy_set.policies {
            policies.entry(policy.role).or_default().push(*policy);
        }
        Ok(Self { graph, policies })
    }

    /// Enforcer over [`PolicySet::seed`].
    pub fn seeded() -> AuthzResult<Self> {
        Self::new(&PolicySet::seed())
    }

    pub fn enforce(&self, role: Role, object: Object, action: Action) -> bool {
        self.graph.reachable(role).any(|reachable| {
            self.policies
                .get(&reachable)
                .is_some_and(|policies| policies.iter().any(|p| p.matches(object, action)))
        })
    }

    /// Variant for callers holding raw names, e.g. from a token claim.
    ///
    /// Unknown names never match.
    pub fn enforce_str(&self, role: &str, object: &str, action: &str) -> bool {
        match (role.parse::<Role>(), object.parse(), action.parse()) {
            (Ok(role), Ok(object), Ok(action)) => self.enforce(role, object, action),
            _ => false,
        }
    }

    pub fn graph(&self) -> &RoleGraph {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Enforcer {
        Enforcer::seeded().expect("seed enforcer")
    }

    #[test]
    fn superadmin_can_do_anything() {
        let enforcer = seeded();
        for object in Object::ALL {
            for action in Action::ALL {
                assert!(enforcer.enforce(Role::Superadmin, object, action));
            }
        }
    }

    #[test]
    fn user_document_crud_allowed() {
        let enforcer = seeded();
        for action in [Action::Create, Action::Read, Action::Update, Action::Delete] {
            assert!(enforcer.enforce(Role::User, Object::Document, action));
        }
        assert!(!enforcer.enforce(Role::User, Object::User, Action::Delete));
        assert!(!enforcer.enforce(Role::User, Object::Session, Action::Read));
        assert!(!enforcer.enforce(Role::User, Object::Document, Action::Analyze));
    }

    #[test]
    fn inherited_grants_flow_upwards() {
        let enforcer = seeded();
        assert!(enforcer.enforce(Role::Admin, Object::Plaid, Action::Create));
        assert!(enforcer.enforce(Role::Superadmin, Object::Plaid, Action::Create));
        assert!(!enforcer.enforce(Role::Admin, Object::Plaid, Action::Delete));
        assert!(enforcer.graph().inherits(Role::Superadmin, Role::User));
        assert!(!enforcer.graph().inherits(Role::User, Role::Admin));
    }

    #[test]
    fn wildcard_object_requests_need_explicit_wildcard_policy() {
        let enforcer = seeded();
        assert!(!enforcer.enforce(Role::User, Object::Any, Action::Read));
        assert!(!enforcer.enforce(Role::Admin, Object::Any, Action::Read));
        assert!(enforcer.enforce(Role::Superadmin, Object::Any, Action::Read));
    }

    #[test]
    fn transitive_chain_without_seed() {
        let set = PolicySet::new(
            vec![Policy::new(Role::User, Object::Session, Action::Read)],
            vec![
                Grouping::new(Role::Superadmin, Role::Admin),
                Grouping::new(Role::Admin, Role::User),
            ],
        );
        let enforcer = Enforcer::new(&set).expect("enforcer");
        for role in Role::VALID {
            assert!(enforcer.enforce(role, Object::Session, Action::Read));
        }
    }

    #[test]
    fn cycle_is_rejected() {
        let groupings = vec![
            Grouping::new(Role::Admin, Role::User),
            Grouping::new(Role::User, Role::Admin),
        ];
        let err = RoleGraph::build(&groupings).expect_err("cycle");
        assert!(matches!(err, AuthzError::InheritanceCycle(_)));
    }

    #[test]
    fn enforce_str_fails_closed_on_unknown_names() {
        let enforcer = seeded();
        assert!(enforcer.enforce_str("user", "document", "read"));
        assert!(!enforcer.enforce_str("", "document", "read"));
        assert!(!enforcer.enforce_str("user", "docs", "read"));
        assert!(!enforcer.enforce_str("superadmin", "invoice", "read"));
    }
}
