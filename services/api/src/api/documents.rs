//! Receipt document handlers.
//!
//! # Purpose
//! Upload receipts for analysis, resolve analysis results and manage the
//! caller's documents.
//!
//! # Key invariants
//! - Every route is gated on object `document` and scoped to the caller;
//!   another user's document is indistinguishable from a missing one.
//! - Uploads are submitted to the provider before the document row exists,
//!   so a failed submission leaves nothing behind except its activity log.
use crate::api::authorize;
use crate::api::error::{
    ApiError, api_document_not_found, api_internal, api_store_error, api_validation_error,
};
use crate::api::types::UploadResponse;
use crate::app::AppState;
use crate::auth::{AuthUser, ClientInfo};
use crate::model::{Document, DocumentPage, DocumentPatch, ListQuery, NewDocument};
use crate::ocr::{CallContext, RECEIPT_API_VERSION, RECEIPT_MODEL_ID};
use crate::store::DocumentStore;
use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_DISPOSITION;
use chrono::Utc;
use tyr_authz::{Action, Object};

pub const UPLOAD_FIELD: &str = "document";

struct UploadedFile {
    file_name: String,
    content_disposition: String,
    bytes: Vec<u8>,
}

async fn read_upload(multipart: &mut Multipart) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| api_validation_error(&format!("invalid multipart body: {err}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_disposition = field
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| api_validation_error(&format!("failed to read upload: {err}")))?;
        if bytes.is_empty() {
            return Err(api_validation_error("document is empty"));
        }
        return Ok(UploadedFile {
            file_name,
            content_disposition,
            bytes: bytes.to_vec(),
        });
    }
    Err(api_validation_error("document file is required"))
}

#[utoipa::path(
    post,
    path = "/v1/app/documents/analyze/upload",
    tag = "documents",
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "Receipt image or PDF in the `document` field"),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Submitted for analysis", body = UploadResponse),
        (status = 400, description = "Missing or empty file", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse),
        (status = 502, description = "Provider rejected the document", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn upload_document(
    State(state): State<AppState>,
    caller: AuthUser,
    client: ClientInfo,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    authorize(&state, &caller, Object::Document, Action::Create)?;
    let upload = read_upload(&mut multipart).await?;
    let ctx = CallContext {
        ip_address: client.ip_address,
    };
    let submission = state
        .analyzer
        .submit(&ctx, RECEIPT_MODEL_ID, RECEIPT_API_VERSION, &upload.bytes)
        .await?;

    let (document, item) = Document::submitted(NewDocument {
        user_id: caller.id.clone(),
        original_file_name: upload.file_name,
        file_path: upload.content_disposition,
        model_id: RECEIPT_MODEL_ID.to_string(),
        api_version: RECEIPT_API_VERSION.to_string(),
        apim_request_id: submission.apim_request_id.clone(),
        operation_location: submission.operation_location,
    });
    let created = state
        .store
        .create_document(document, item)
        .await
        .map_err(|err| api_internal("failed to create document", &err))?;
    tracing::info!(
        document_id = %created.id,
        user_id = %caller.id,
        apim_request_id = %created.apim_request_id,
        bytes = upload.bytes.len(),
        "document uploaded"
    );
    Ok(Json(UploadResponse {
        apim_request_id: submission.apim_request_id,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/app/documents/analyze/get/{id}",
    tag = "documents",
    params(("id" = String, Path, description = "Correlation id returned by the upload")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Normalized document", body = Document),
        (status = 400, description = "Provider found no document", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Document not found", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Analysis still running", body = crate::api::types::ErrorResponse),
        (status = 502, description = "Provider failure", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn analyze_result(
    State(state): State<AppState>,
    caller: AuthUser,
    client: ClientInfo,
    Path(apim_request_id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    authorize(&state, &caller, Object::Document, Action::Read)?;
    let ctx = CallContext {
        ip_address: client.ip_address,
    };
    let document = state
        .pipeline
        .resolve(&caller.id, apim_request_id.trim(), &ctx)
        .await?;
    Ok(Json(document))
}

#[utoipa::path(
    get,
    path = "/v1/app/documents",
    tag = "documents",
    params(ListQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Page of the caller's documents", body = DocumentPage),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn list_documents(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<DocumentPage>, ApiError> {
    authorize(&state, &caller, Object::Document, Action::Read)?;
    let page = state
        .store
        .list_documents(&caller.id, &query)
        .await
        .map_err(|err| api_internal("failed to list documents", &err))?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/v1/app/documents/{id}",
    tag = "documents",
    params(("id" = String, Path, description = "Document identifier")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Document with its items", body = Document),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Document not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_document(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    authorize(&state, &caller, Object::Document, Action::Read)?;
    let document = state
        .store
        .get_document(&id, Some(&caller.id))
        .await
        .map_err(|err| api_store_error(err, api_document_not_found))?;
    Ok(Json(document))
}

#[utoipa::path(
    patch,
    path = "/v1/app/documents/{id}",
    tag = "documents",
    params(("id" = String, Path, description = "Document identifier")),
    request_body = DocumentPatch,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Document updated", body = Document),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Document not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn update_document(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(patch): Json<DocumentPatch>,
) -> Result<Json<Document>, ApiError> {
    authorize(&state, &caller, Object::Document, Action::Update)?;
    let mut document = state
        .store
        .get_document(&id, Some(&caller.id))
        .await
        .map_err(|err| api_store_error(err, api_document_not_found))?;
    patch.apply(&mut document);
    document.updated_at = Utc::now();
    let updated = state
        .store
        .update_document(document)
        .await
        .map_err(|err| api_store_error(err, api_document_not_found))?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/v1/app/documents/{id}",
    tag = "documents",
    params(("id" = String, Path, description = "Document identifier")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Document not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_document(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &caller, Object::Document, Action::Delete)?;
    state
        .store
        .get_document(&id, Some(&caller.id))
        .await
        .map_err(|err| api_store_error(err, api_document_not_found))?;
    state
        .store
        .delete_document(&id)
        .await
        .map_err(|err| api_store_error(err, api_document_not_found))?;
    tracing::info!(document_id = %id, user_id = %caller.id, "document deleted");
    Ok(StatusCode::NO_CONTENT)
}
