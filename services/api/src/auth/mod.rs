//! Authentication building blocks.
//!
//! # Purpose
//! Password hashing, token minting and verification, and the per-request
//! caller identity extractor. Authorization decisions live in `tyr_authz`.
pub mod context;
pub mod password;
pub mod token;

pub use context::{AuthUser, ClientInfo};
pub use token::{TokenError, TokenService};
