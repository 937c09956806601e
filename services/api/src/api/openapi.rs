//! OpenAPI document for the REST API.
//!
//! # Purpose
//! Collects every route and schema into one document served next to the
//! Swagger UI.
use crate::api::types::{
    ChangePasswordRequest, ErrorResponse, HealthStatus, LoginRequest, RefreshTokenRequest,
    SessionListQuery, SessionUpdateRequest, SignupRequest, UploadResponse, UserCreateRequest,
    UserUpdateRequest,
};
use crate::api::{auth, documents, sessions, system, users};
use crate::model::{
    AuthToken, Document, DocumentItem, DocumentPage, DocumentPatch, ListQuery, Session,
    SessionPage, User, UserPage, UserStatus,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "tyr-api",
        version = "v1",
        description = "Receipt analysis and account administration API"
    ),
    paths(
        system::root,
        system::system_health,
        auth::login,
        auth::signup,
        auth::refresh_token,
        users::create_user,
        users::list_users,
        users::get_user,
        users::update_user,
        users::delete_user,
        users::me,
        users::change_password,
        sessions::list_sessions,
        sessions::get_session,
        sessions::update_session,
        sessions::delete_session,
        documents::upload_document,
        documents::analyze_result,
        documents::list_documents,
        documents::get_document,
        documents::update_document,
        documents::delete_document
    ),
    components(schemas(
        HealthStatus,
        ErrorResponse,
        LoginRequest,
        SignupRequest,
        RefreshTokenRequest,
        ChangePasswordRequest,
        UserCreateRequest,
        UserUpdateRequest,
        SessionUpdateRequest,
        SessionListQuery,
        UploadResponse,
        AuthToken,
        User,
        UserStatus,
        UserPage,
        Session,
        SessionPage,
        Document,
        DocumentItem,
        DocumentPatch,
        DocumentPage,
        ListQuery
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "system", description = "Liveness and health"),
        (name = "auth", description = "Login, signup and token refresh"),
        (name = "users", description = "User administration and the current account"),
        (name = "sessions", description = "Session administration"),
        (name = "documents", description = "Receipt upload, analysis and management")
    )
)]
pub struct ApiDoc;
