use crate::Role;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("invalid role: {0}")]
    InvalidRole(String),
    #[error("invalid object: {0}")]
    InvalidObject(String),
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("role inheritance cycle through {0}")]
    InheritanceCycle(Role),
    #[error("casbin error: {0}")]
    Casbin(#[from] casbin::Error),
}

pub type AuthzResult<T> = Result<T, AuthzError>;
