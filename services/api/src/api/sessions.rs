//! Session administration handlers.
//!
//! Blocking a session revokes its refresh token without touching the user.
use crate::api::authorize;
use crate::api::error::{ApiError, api_internal, api_session_not_found, api_store_error};
use crate::api::types::{SessionListQuery, SessionUpdateRequest};
use crate::app::AppState;
use crate::auth::AuthUser;
use crate::model::{Session, SessionPage};
use crate::store::SessionStore;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use tyr_authz::{Action, Object};

#[utoipa::path(
    get,
    path = "/v1/admin/sessions",
    tag = "sessions",
    params(SessionListQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Page of sessions", body = SessionPage),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn list_sessions(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<SessionListQuery>,
) -> Result<Json<SessionPage>, ApiError> {
    authorize(&state, &caller, Object::Session, Action::ReadAll)?;
    let user_id = query
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());
    let page = state
        .store
        .list_sessions(&query.list_query(), user_id)
        .await
        .map_err(|err| api_internal("failed to list sessions", &err))?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/v1/admin/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Session identifier")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Session", body = Session),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Session not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_session(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    authorize(&state, &caller, Object::Session, Action::ReadAll)?;
    let session = state
        .store
        .get_session(&id)
        .await
        .map_err(|err| api_store_error(err, api_session_not_found))?;
    Ok(Json(session))
}

#[utoipa::path(
    patch,
    path = "/v1/admin/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Session identifier")),
    request_body = SessionUpdateRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Session updated", body = Session),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Session not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn update_session(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<SessionUpdateRequest>,
) -> Result<Json<Session>, ApiError> {
    authorize(&state, &caller, Object::Session, Action::UpdateAll)?;
    let mut session = state
        .store
        .get_session(&id)
        .await
        .map_err(|err| api_store_error(err, api_session_not_found))?;
    session.is_blocked = body.is_blocked;
    session.updated_at = Utc::now();
    let updated = state
        .store
        .update_session(session)
        .await
        .map_err(|err| api_store_error(err, api_session_not_found))?;
    tracing::info!(session_id = %id, blocked = updated.is_blocked, updated_by = %caller.id, "session updated");
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/v1/admin/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Session identifier")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Session not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_session(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &caller, Object::Session, Action::DeleteAll)?;
    state
        .store
        .delete_session(&id)
        .await
        .map_err(|err| api_store_error(err, api_session_not_found))?;
    Ok(StatusCode::NO_CONTENT)
}
