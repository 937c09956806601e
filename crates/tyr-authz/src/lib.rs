//! Role-based authorization for the tyr API.
//!
//! # Purpose
//! Decides whether a role may perform an action on an object kind, using a
//! static policy table plus role inheritance.
//!
//! # Key invariants
//! - Roles, objects and actions are closed enumerations; `*` exists only as
//!   [`Object::Any`] and [`Action::Any`].
//! - A policy matches when its object equals the request or is `*`, and its
//!   action equals the request or is `*`.
//! - A role holds its own policies and those of every role it inherits,
//!   transitively.
//!
//! # Examples
//! ```rust
//! use tyr_authz::{Action, Enforcer, Object, Role};
//!
//! let enforcer = Enforcer::seeded().expect("seed policies are acyclic");
//! assert!(enforcer.enforce(Role::User, Object::Document, Action::Read));
//! assert!(!enforcer.enforce(Role::User, Object::User, Action::Delete));
//! ```
//!
//! # Common pitfalls
//! - Requesting [`Object::Any`] only succeeds for roles that hold an explicit
//!   `*` object policy; it is not "any object the role can touch".

mod action;
mod casbin_model;
mod enforcer;
mod errors;
mod object;
mod policy;
mod role;

pub use action::Action;
pub use casbin_model::{casbin_enforcer, casbin_model, casbin_model_string};
pub use enforcer::{Enforcer, RoleGraph};
pub use errors::{AuthzError, AuthzResult};
pub use object::Object;
pub use policy::{Grouping, Policy, PolicySet};
pub use role::Role;
