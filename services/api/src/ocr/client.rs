//! Document analysis provider client.
//!
//! # Purpose
//! Submits receipt payloads to Azure Document Intelligence and fetches
//! analysis results. Every outbound call, successful or not, is written to
//! the activity log before the outcome is returned.
//!
//! # Security
//! - The subscription key never reaches the activity log; its header value is
//!   redacted before the request headers are serialized.
//! - Upload payloads are not stored in the activity log.
use crate::config::AzureConfig;
use crate::model::{ActivityLog, new_id};
use crate::ocr::types::{AnalyzeOperation, provider_error_message};
use crate::store::{ActivityLogStore, Store, StoreError};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

pub const RECEIPT_MODEL_ID: &str = "prebuilt-receipt";
pub const RECEIPT_API_VERSION: &str = "2023-07-31";
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
pub const OPERATION_LOCATION_HEADER: &str = "Operation-Location";
pub const APIM_REQUEST_ID_HEADER: &str = "Apim-Request-Id";
const REDACTED: &str = "[redacted]";

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("provider returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("provider response missing {0} header")]
    MissingHeader(&'static str),
    #[error("provider response could not be decoded: {0}")]
    Decode(String),
    #[error("failed to record provider call: {0}")]
    Audit(#[from] StoreError),
}

impl From<reqwest::Error> for OcrError {
    fn from(err: reqwest::Error) -> Self {
        OcrError::Transport(err.to_string())
    }
}

/// Handle for an accepted analysis job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub operation_location: String,
    pub apim_request_id: String,
}

/// Caller details recorded alongside each provider call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub ip_address: String,
}

/// Outbound port to the document analysis provider.
///
/// Implementations append an activity log row for every call they make.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    async fn submit(
        &self,
        ctx: &CallContext,
        model_id: &str,
        api_version: &str,
        payload: &[u8],
    ) -> Result<Submission, OcrError>;

    /// Fetch the current state of an analysis job.
    ///
    /// A `200` carrying a finished (`succeeded`) result is logged with the
    /// job's correlation id so later lookups can be served from the log.
    async fn fetch_result(
        &self,
        ctx: &CallContext,
        operation_location: &str,
    ) -> Result<AnalyzeOperation, OcrError>;
}

#[derive(Clone)]
pub struct AzureClient {
    client: reqwest::Client,
    endpoint: String,
    secret: String,
    store: Arc<dyn Store + Send + Sync>,
}

impl std::fmt::Debug for AzureClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl AzureClient {
    pub fn new(
        config: &AzureConfig,
        store: Arc<dyn Store + Send + Sync>,
    ) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            secret: config.secret.clone(),
            store,
        })
    }

    pub fn analyze_url(&self, model_id: &str, api_version: &str) -> String {
        format!(
            "{}/formrecognizer/documentModels/{model_id}:analyze?api-version={api_version}",
            self.endpoint
        )
    }

    fn request_headers(&self) -> Result<HeaderMap, OcrError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.secret)
            .map_err(|err| OcrError::Transport(format!("invalid subscription key: {err}")))?;
        headers.insert(SUBSCRIPTION_KEY_HEADER, key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn record(&self, log: ActivityLog) -> Result<(), OcrError> {
        let status = log.response_code.to_string();
        self.store.append_activity_log(log).await?;
        metrics::counter!("tyr_ocr_calls_total", "status" => status).increment(1);
        Ok(())
    }

    /// Send `request` and read its whole body.
    ///
    /// A failed send or body read is recorded on the activity log before the
    /// transport error is returned; a send failure keeps `response_code` 0.
    async fn exchange(
        &self,
        request: reqwest::RequestBuilder,
        log: &mut ActivityLog,
    ) -> Result<(reqwest::StatusCode, HeaderMap, String), OcrError> {
        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return Err(self.record_transport_failure(log, started, err).await),
        };
        let status = response.status();
        let headers = response.headers().clone();
        log.finish(status.as_u16(), &headers, started);
        match response.text().await {
            Ok(body) => Ok((status, headers, body)),
            Err(err) => Err(self.record_transport_failure(log, started, err).await),
        }
    }

    async fn record_transport_failure(
        &self,
        log: &mut ActivityLog,
        started: Instant,
        err: reqwest::Error,
    ) -> OcrError {
        tracing::warn!(url = %log.request_url, error = %err, "document analysis request failed");
        log.duration_ms = elapsed_ms(started);
        log.response_body = err.to_string();
        match self.record(log.clone()).await {
            Ok(()) => err.into(),
            Err(audit) => audit,
        }
    }
}

#[async_trait]
impl DocumentAnalyzer for AzureClient {
    async fn submit(
        &self,
        ctx: &CallContext,
        model_id: &str,
        api_version: &str,
        payload: &[u8],
    ) -> Result<Submission, OcrError> {
        let url = self.analyze_url(model_id, api_version);
        let headers = self.request_headers()?;
        let body = serde_json::json!({ "base64Source": STANDARD.encode(payload) });
        let mut log = ActivityLog::outbound(&url, "POST", &headers, &ctx.ip_address);

        let request = self.client.post(&url).headers(headers).json(&body);
        let (status, response_headers, response_body) = self.exchange(request, &mut log).await?;

        if status != reqwest::StatusCode::ACCEPTED {
            log.response_body = response_body.clone();
            self.record(log).await?;
            return Err(OcrError::Upstream {
                status: status.as_u16(),
                message: provider_error_message(&response_body),
            });
        }
        self.record(log).await?;

        let operation_location = header_string(&response_headers, OPERATION_LOCATION_HEADER)
            .ok_or(OcrError::MissingHeader(OPERATION_LOCATION_HEADER))?;
        let apim_request_id = header_string(&response_headers, APIM_REQUEST_ID_HEADER)
            .or_else(|| correlation_id(&operation_location))
            .ok_or(OcrError::MissingHeader(APIM_REQUEST_ID_HEADER))?;
        tracing::info!(%apim_request_id, model_id, "document submitted for analysis");
        Ok(Submission {
            operation_location,
            apim_request_id,
        })
    }

    async fn fetch_result(
        &self,
        ctx: &CallContext,
        operation_location: &str,
    ) -> Result<AnalyzeOperation, OcrError> {
        let headers = self.request_headers()?;
        let mut log = ActivityLog::outbound(operation_location, "GET", &headers, &ctx.ip_address);

        let request = self.client.get(operation_location).headers(headers);
        let (status, _, response_body) = self.exchange(request, &mut log).await?;
        log.response_body = response_body.clone();

        if status != reqwest::StatusCode::OK {
            self.record(log).await?;
            return Err(OcrError::Upstream {
                status: status.as_u16(),
                message: provider_error_message(&response_body),
            });
        }

        let operation = match serde_json::from_str::<AnalyzeOperation>(&response_body) {
            Ok(operation) => operation,
            Err(err) => {
                self.record(log).await?;
                return Err(OcrError::Decode(err.to_string()));
            }
        };
        if operation.is_succeeded() {
            log.apim_request_id = correlation_id(operation_location);
        }
        self.record(log).await?;
        Ok(operation)
    }
}

impl ActivityLog {
    fn outbound(url: &str, method: &str, headers: &HeaderMap, ip_address: &str) -> Self {
        Self {
            id: new_id(),
            request_url: url.to_string(),
            request_method: method.to_string(),
            request_headers: headers_json(headers),
            request_body: String::new(),
            response_code: 0,
            response_headers: String::new(),
            response_body: String::new(),
            duration_ms: 0,
            ip_address: ip_address.to_string(),
            apim_request_id: None,
            created_at: Utc::now(),
        }
    }

    fn finish(&mut self, status: u16, headers: &HeaderMap, started: Instant) {
        self.response_code = i32::from(status);
        self.response_headers = headers_json(headers);
        self.duration_ms = elapsed_ms(started);
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

/// Serialize headers as `{name: [values...]}` with the subscription key hidden.
fn headers_json(headers: &HeaderMap) -> String {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        let value = if name.as_str().eq_ignore_ascii_case(SUBSCRIPTION_KEY_HEADER) {
            REDACTED.to_string()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        map.entry(name.as_str().to_string()).or_default().push(value);
    }
    serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string())
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Last path segment of an operation-location URL, which is the job's
/// `Apim-Request-Id`.
pub fn correlation_id(operation_location: &str) -> Option<String> {
    let without_query = operation_location.split(['?', '#']).next()?;
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
        .map(str::to_string)
}
