//! HTTP API request/response types.
//!
//! # Purpose
//! Payload shapes for the REST API that are not domain records themselves,
//! plus their OpenAPI schemas.
use crate::model::ListQuery;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema, Clone)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    /// Used when `email` is empty, for OAuth2 password-flow clients.
    #[serde(default)]
    pub username: String,
    pub password: String,
    /// `app` or `portal`.
    pub grant_type: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct UserCreateRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub password: String,
    /// `superadmin`, `admin` or `user`.
    pub role: String,
    /// `active`, `blocked` or `deleted`; defaults to `active`.
    pub status: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema, Clone)]
pub struct UserUpdateRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SessionUpdateRequest {
    pub is_blocked: bool,
}

/// Pagination parameters plus an optional owner filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub sort: Option<String>,
    pub user_id: Option<String>,
}

impl SessionListQuery {
    pub fn list_query(&self) -> ListQuery {
        ListQuery {
            page: self.page,
            per_page: self.per_page,
            sort: self.sort.clone(),
            search: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct UploadResponse {
    pub apim_request_id: String,
}
