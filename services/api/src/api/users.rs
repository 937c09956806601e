//! User administration and current-user handlers.
//!
//! # Notes
//! - Admin routes are gated on object `user` with the `*_all` actions.
//! - `/me` routes need only a valid token.
//! - Deletes are soft; deleted users disappear from every read.
use crate::api::authorize;
use crate::api::error::{
    ApiError, api_incorrect_password, api_internal, api_internal_message, api_store_error,
    api_user_not_found, api_validation_error,
};
use crate::api::types::{ChangePasswordRequest, UserCreateRequest, UserUpdateRequest};
use crate::app::AppState;
use crate::auth::AuthUser;
use crate::auth::password::{MIN_CHANGED_PASSWORD_LEN, hash_password, verify_password};
use crate::model::{ListQuery, User, UserPage, UserStatus, new_id};
use crate::store::{StoreError, UserStore};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use tyr_authz::{Action, Object, Role};

const EMAIL_EXISTED: &str = "Email already existed";

fn parse_role(value: &str) -> Result<Role, ApiError> {
    value
        .trim()
        .parse::<Role>()
        .map_err(|_| api_validation_error("role must be one of: superadmin, admin, user"))
}

fn parse_status(value: &str) -> Result<UserStatus, ApiError> {
    value
        .trim()
        .parse::<UserStatus>()
        .map_err(|_| api_validation_error("status must be one of: active, blocked, deleted"))
}

fn normalize_email(value: &str) -> Result<String, ApiError> {
    let email = value.trim().to_lowercase();
    if !email.contains('@') {
        return Err(api_validation_error("email is invalid"));
    }
    Ok(email)
}

fn conflict_as_email_existed(err: StoreError) -> ApiError {
    match err {
        StoreError::Conflict(_) => api_validation_error(EMAIL_EXISTED),
        err => api_store_error(err, api_user_not_found),
    }
}

#[utoipa::path(
    post,
    path = "/v1/admin/users",
    tag = "users",
    request_body = UserCreateRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input or email already registered", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(body): Json<UserCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &caller, Object::User, Action::CreateAll)?;
    if body.first_name.trim().is_empty() || body.last_name.trim().is_empty() {
        return Err(api_validation_error("first_name and last_name are required"));
    }
    let email = normalize_email(&body.email)?;
    if body.password.chars().count() < MIN_CHANGED_PASSWORD_LEN {
        return Err(api_validation_error("password must be at least 8 characters"));
    }
    let role = parse_role(&body.role)?;
    let status = match body.status.as_deref() {
        Some(status) => parse_status(status)?,
        None => UserStatus::Active,
    };
    let password_hash =
        hash_password(&body.password).map_err(|_| api_internal_message("failed to hash password"))?;

    let now = Utc::now();
    let user = User {
        id: new_id(),
        first_name: body.first_name.trim().to_string(),
        last_name: body.last_name.trim().to_string(),
        email,
        phone: body.phone.trim().to_string(),
        role,
        status,
        password_hash,
        last_login: None,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };
    let created = state
        .store
        .create_user(user)
        .await
        .map_err(conflict_as_email_existed)?;
    tracing::info!(user_id = %created.id, created_by = %caller.id, "user created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/v1/admin/users",
    tag = "users",
    params(ListQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Page of users", body = UserPage),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn list_users(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<UserPage>, ApiError> {
    authorize(&state, &caller, Object::User, Action::ReadAll)?;
    let page = state
        .store
        .list_users(&query)
        .await
        .map_err(|err| api_internal("failed to list users", &err))?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/v1/admin/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User identifier")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User", body = User),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    authorize(&state, &caller, Object::User, Action::ReadAll)?;
    let user = state
        .store
        .get_user(&id)
        .await
        .map_err(|err| api_store_error(err, api_user_not_found))?;
    Ok(Json(user))
}

#[utoipa::path(
    patch,
    path = "/v1/admin/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User identifier")),
    request_body = UserUpdateRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Invalid input", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn update_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UserUpdateRequest>,
) -> Result<Json<User>, ApiError> {
    authorize(&state, &caller, Object::User, Action::UpdateAll)?;
    let mut user = state
        .store
        .get_user(&id)
        .await
        .map_err(|err| api_store_error(err, api_user_not_found))?;

    if let Some(first_name) = body.first_name {
        user.first_name = first_name.trim().to_string();
    }
    if let Some(last_name) = body.last_name {
        user.last_name = last_name.trim().to_string();
    }
    if let Some(email) = body.email {
        user.email = normalize_email(&email)?;
    }
    if let Some(phone) = body.phone {
        user.phone = phone.trim().to_string();
    }
    if let Some(role) = body.role {
        user.role = parse_role(&role)?;
    }
    if let Some(status) = body.status {
        user.status = parse_status(&status)?;
    }
    user.updated_at = Utc::now();

    let updated = state
        .store
        .update_user(user)
        .await
        .map_err(conflict_as_email_existed)?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/v1/admin/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User identifier")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &caller, Object::User, Action::DeleteAll)?;
    state
        .store
        .delete_user(&id)
        .await
        .map_err(|err| api_store_error(err, api_user_not_found))?;
    tracing::info!(user_id = %id, deleted_by = %caller.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/admin/users/me",
    tag = "users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The caller's account", body = User),
        (status = 401, description = "Unauthenticated", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn me(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<User>, ApiError> {
    let user = state
        .store
        .get_user(&caller.id)
        .await
        .map_err(|err| api_store_error(err, api_user_not_found))?;
    Ok(Json(user))
}

#[utoipa::path(
    patch,
    path = "/v1/admin/users/me/password",
    tag = "users",
    request_body = ChangePasswordRequest,
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Invalid new password or incorrect old password", body = crate::api::types::ErrorResponse),
        (status = 401, description = "Unauthenticated", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn change_password(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    if body.new_password.chars().count() < MIN_CHANGED_PASSWORD_LEN {
        return Err(api_validation_error("new_password must be at least 8 characters"));
    }
    if body.new_password != body.new_password_confirm {
        return Err(api_validation_error("new_password_confirm does not match"));
    }
    let mut user = state
        .store
        .get_user(&caller.id)
        .await
        .map_err(|err| api_store_error(err, api_user_not_found))?;
    if !verify_password(&body.old_password, &user.password_hash) {
        return Err(api_incorrect_password());
    }
    user.password_hash = hash_password(&body.new_password)
        .map_err(|_| api_internal_message("failed to hash password"))?;
    user.updated_at = Utc::now();
    state
        .store
        .update_user(user)
        .await
        .map_err(|err| api_store_error(err, api_user_not_found))?;
    tracing::info!(user_id = %caller.id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}
