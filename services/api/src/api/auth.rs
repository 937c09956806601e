//! Authentication handlers: login, signup and refresh-token rotation.
//!
//! # Notes
//! - Unknown emails and wrong passwords produce the same error.
//! - Each login or signup opens a session row that backs the refresh token.
//! - Refreshing rotates the session's refresh token; presenting an older one
//!   afterwards is rejected.
use crate::api::error::{
    ApiError, api_internal, api_internal_message, api_invalid_credentials,
    api_invalid_grant_type, api_invalid_refresh_token, api_token_expired, api_user_blocked,
    api_validation_error,
};
use crate::api::types::{LoginRequest, RefreshTokenRequest, SignupRequest};
use crate::app::AppState;
use crate::auth::password::{MIN_SIGNUP_PASSWORD_LEN, hash_password, verify_password};
use crate::auth::{ClientInfo, TokenError};
use crate::model::{AuthToken, Session, User, UserStatus, new_id};
use crate::store::{SessionStore, StoreError, UserStore};
use axum::Json;
use axum::extract::State;
use chrono::Utc;
use tyr_authz::Role;

const GRANT_TYPES: [&str; 2] = ["app", "portal"];
const MAX_PHONE_LEN: usize = 10;
const TOKEN_TYPE: &str = "bearer";

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Tokens issued", body = AuthToken),
        (status = 400, description = "Malformed request or grant type", body = crate::api::types::ErrorResponse),
        (status = 401, description = "Bad credentials or blocked account", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthToken>, ApiError> {
    let email = if body.email.trim().is_empty() {
        &body.username
    } else {
        &body.email
    };
    let email = email.trim().to_lowercase();
    if email.is_empty() || body.password.is_empty() {
        return Err(api_validation_error("email and password are required"));
    }
    if !GRANT_TYPES.contains(&body.grant_type.as_str()) {
        return Err(api_invalid_grant_type());
    }

    let user = state
        .store
        .find_user_by_email(&email)
        .await
        .map_err(|err| api_internal("failed to load user", &err))?;
    let Some(mut user) =
        user.filter(|user| verify_password(&body.password, &user.password_hash))
    else {
        metrics::counter!("tyr_auth_logins_total", "outcome" => "rejected").increment(1);
        return Err(api_invalid_credentials());
    };
    if user.is_blocked() {
        metrics::counter!("tyr_auth_logins_total", "outcome" => "blocked").increment(1);
        return Err(api_user_blocked());
    }

    let token = open_session(&state, &user, &client).await?;
    let now = Utc::now();
    user.last_login = Some(now);
    user.updated_at = now;
    state
        .store
        .update_user(user)
        .await
        .map_err(|err| api_internal("failed to record login", &err))?;
    metrics::counter!("tyr_auth_logins_total", "outcome" => "ok").increment(1);
    Ok(Json(token))
}

#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Account created and tokens issued", body = AuthToken),
        (status = 400, description = "Invalid input or email already registered", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn signup(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(body): Json<SignupRequest>,
) -> Result<Json<AuthToken>, ApiError> {
    let email = body.email.trim().to_lowercase();
    validate_signup(&body, &email)?;
    let password_hash =
        hash_password(&body.password).map_err(|_| api_internal_message("failed to hash password"))?;

    let now = Utc::now();
    let user = User {
        id: new_id(),
        first_name: body.first_name.trim().to_string(),
        last_name: body.last_name.trim().to_string(),
        email,
        phone: body.phone.trim().to_string(),
        role: Role::User,
        status: UserStatus::Active,
        password_hash,
        last_login: Some(now),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };
    let user = match state.store.create_user(user).await {
        Ok(user) => user,
        Err(StoreError::Conflict(_)) => return Err(api_validation_error("User already existed")),
        Err(err) => return Err(api_internal("failed to create user", &err)),
    };
    tracing::info!(user_id = %user.id, "user signed up");
    Ok(Json(open_session(&state, &user, &client).await?))
}

fn validate_signup(body: &SignupRequest, email: &str) -> Result<(), ApiError> {
    if body.first_name.trim().is_empty() || body.last_name.trim().is_empty() {
        return Err(api_validation_error("first_name and last_name are required"));
    }
    if !email.contains('@') {
        return Err(api_validation_error("email is invalid"));
    }
    let phone = body.phone.trim();
    if phone.is_empty() || phone.chars().count() > MAX_PHONE_LEN {
        return Err(api_validation_error("phone is required and at most 10 characters"));
    }
    if body.password.chars().count() < MIN_SIGNUP_PASSWORD_LEN {
        return Err(api_validation_error("password must be at least 6 characters"));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/auth/refresh-token",
    tag = "auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New access token, rotated refresh token", body = AuthToken),
        (status = 401, description = "Refresh token invalid, expired or revoked", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<AuthToken>, ApiError> {
    let claims = state
        .tokens
        .verify_refresh(body.refresh_token.trim())
        .map_err(|err| match err {
            TokenError::Expired => api_token_expired(),
            _ => api_invalid_refresh_token(),
        })?;

    let mut session = match state.store.get_session(&claims.id).await {
        Ok(session) => session,
        Err(StoreError::NotFound(_)) => return Err(api_invalid_refresh_token()),
        Err(err) => return Err(api_internal("failed to load session", &err)),
    };
    let now = Utc::now();
    if session.is_blocked
        || session.is_expired(now)
        || session.user_id != claims.uid
        || session.refresh_token != body.refresh_token.trim()
    {
        tracing::info!(session_id = %session.id, "refresh token rejected");
        return Err(api_invalid_refresh_token());
    }

    let user = match state.store.get_user(&session.user_id).await {
        Ok(user) => user,
        Err(StoreError::NotFound(_)) => return Err(api_invalid_refresh_token()),
        Err(err) => return Err(api_internal("failed to load user", &err)),
    };
    if user.is_blocked() {
        return Err(api_user_blocked());
    }

    let access = issue_access(&state, &user)?;
    let refresh = state
        .tokens
        .issue_refresh(&session.id, &user.id)
        .map_err(|_| api_internal_message("failed to issue token"))?;
    session.refresh_token = refresh.token.clone();
    session.expires_at = refresh.expires_at;
    session.updated_at = now;
    state
        .store
        .update_session(session)
        .await
        .map_err(|err| api_internal("failed to rotate session", &err))?;

    Ok(Json(AuthToken {
        access_token: access,
        token_type: TOKEN_TYPE.to_string(),
        expires_in: state.tokens.access_ttl_seconds(),
        refresh_token: refresh.token,
    }))
}

fn issue_access(state: &AppState, user: &User) -> Result<String, ApiError> {
    state
        .tokens
        .issue_access(&user.id, &user.email, &user.full_name(), user.role.as_str())
        .map(|issued| issued.token)
        .map_err(|_| api_internal_message("failed to issue token"))
}

/// Create a session for `user` and issue its token pair.
async fn open_session(
    state: &AppState,
    user: &User,
    client: &ClientInfo,
) -> Result<AuthToken, ApiError> {
    let session_id = new_id();
    let refresh = state
        .tokens
        .issue_refresh(&session_id, &user.id)
        .map_err(|_| api_internal_message("failed to issue token"))?;
    let now = Utc::now();
    let session = Session {
        id: session_id,
        user_id: user.id.clone(),
        is_blocked: false,
        expires_at: refresh.expires_at,
        ip_address: client.ip_address.clone(),
        user_agent: client.user_agent.clone(),
        refresh_token: refresh.token.clone(),
        created_at: now,
        updated_at: now,
    };
    state
        .store
        .create_session(session)
        .await
        .map_err(|err| api_internal("failed to create session", &err))?;

    Ok(AuthToken {
        access_token: issue_access(state, user)?,
        token_type: TOKEN_TYPE.to_string(),
        expires_in: state.tokens.access_ttl_seconds(),
        refresh_token: refresh.token,
    })
}
