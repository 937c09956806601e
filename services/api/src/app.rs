//! HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::auth::TokenService;
use crate::ocr::{DocumentAnalyzer, DocumentPipeline};
use crate::store::Store;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tyr_authz::Enforcer;
use utoipa::OpenApi;

/// Largest accepted receipt upload.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store + Send + Sync>,
    pub enforcer: Arc<Enforcer>,
    pub tokens: TokenService,
    pub analyzer: Arc<dyn DocumentAnalyzer>,
    pub pipeline: DocumentPipeline,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store + Send + Sync>,
        enforcer: Enforcer,
        tokens: TokenService,
        analyzer: Arc<dyn DocumentAnalyzer>,
    ) -> Self {
        let pipeline = DocumentPipeline::new(store.clone(), analyzer.clone());
        Self {
            store,
            enforcer: Arc::new(enforcer),
            tokens,
            analyzer,
            pipeline,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                request_id = %crate::model::new_id(),
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            )
        });

    Router::new()
        .route("/", get(api::system::root))
        .route("/v1/system/health", get(api::system::system_health))
        .route("/v1/auth/login", post(api::auth::login))
        .route("/v1/auth/signup", post(api::auth::signup))
        .route("/v1/auth/refresh-token", post(api::auth::refresh_token))
        .route(
            "/v1/admin/users",
            get(api::users::list_users).post(api::users::create_user),
        )
        .route("/v1/admin/users/me", get(api::users::me))
        .route(
            "/v1/admin/users/me/password",
            patch(api::users::change_password),
        )
        .route(
            "/v1/admin/users/:id",
            get(api::users::get_user)
                .patch(api::users::update_user)
                .delete(api::users::delete_user),
        )
        .route("/v1/admin/sessions", get(api::sessions::list_sessions))
        .route(
            "/v1/admin/sessions/:id",
            get(api::sessions::get_session)
                .patch(api::sessions::update_session)
                .delete(api::sessions::delete_session),
        )
        .route(
            "/v1/app/documents/analyze/upload",
            post(api::documents::upload_document).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/v1/app/documents/analyze/get/:id",
            get(api::documents::analyze_result),
        )
        .route("/v1/app/documents", get(api::documents::list_documents))
        .route(
            "/v1/app/documents/:id",
            get(api::documents::get_document)
                .patch(api::documents::update_document)
                .delete(api::documents::delete_document),
        )
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs").url("/v1/openapi.json", ApiDoc::openapi()),
        )
        .layer(trace_layer)
        .with_state(state)
}
