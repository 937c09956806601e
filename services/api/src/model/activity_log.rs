use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Append-only record of one outbound call to the OCR provider.
///
/// Rows carrying an `apim_request_id` hold a successful result body and act
/// as the cache for later result lookups.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivityLog {
    pub id: String,
    pub request_url: String,
    pub request_method: String,
    /// JSON object of header name to value.
    pub request_headers: String,
    pub request_body: String,
    pub response_code: i32,
    pub response_headers: String,
    pub response_body: String,
    pub duration_ms: i64,
    pub ip_address: String,
    pub apim_request_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
