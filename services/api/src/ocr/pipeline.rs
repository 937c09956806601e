//! Document normalization pipeline.
//!
//! # Purpose
//! Resolves an uploaded receipt's analysis result and reconciles it onto the
//! stored document and its line items.
//!
//! # Flow
//! 1. Look up the caller's document by correlation id.
//! 2. Reuse the cached provider body from the activity log, or fetch it.
//! 3. Normalize the first analyzed document and persist the fields and items
//!    in one write.
//!
//! # Concurrency
//! Resolutions for the same correlation id are serialized by an async mutex,
//! so concurrent callers see at most one provider fetch. The lock entry is
//! dropped once no caller holds it.
use crate::model::Document;
use crate::ocr::client::{CallContext, DocumentAnalyzer, OcrError};
use crate::ocr::normalize::normalize;
use crate::ocr::types::AnalyzeOperation;
use crate::store::{ActivityLogStore, DocumentStore, Store, StoreError};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("analysis result contains no documents")]
    Empty,
    #[error("analysis is not finished: {0}")]
    Pending(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ocr(#[from] OcrError),
    #[error("analysis failed: {0}")]
    Failed(String),
    #[error("malformed analysis result: {0}")]
    Malformed(String),
}

/// Shared handle on a per-id lock; the map entry goes away with the last
/// lease, including when the owning future is dropped mid-resolution.
struct LockLease<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: &'a str,
    lock: Arc<Mutex<()>>,
}

impl<'a> LockLease<'a> {
    fn acquire(locks: &'a DashMap<String, Arc<Mutex<()>>>, key: &'a str) -> Self {
        let lock = locks.entry(key.to_string()).or_default().clone();
        Self { locks, key, lock }
    }
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        drop(std::mem::take(&mut self.lock));
        self.locks
            .remove_if(self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[derive(Clone)]
pub struct DocumentPipeline {
    store: Arc<dyn Store + Send + Sync>,
    analyzer: Arc<dyn DocumentAnalyzer>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl DocumentPipeline {
    pub fn new(store: Arc<dyn Store + Send + Sync>, analyzer: Arc<dyn DocumentAnalyzer>) -> Self {
        Self {
            store,
            analyzer,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Resolve and persist the analysis of `apim_request_id` for `user_id`.
    pub async fn resolve(
        &self,
        user_id: &str,
        apim_request_id: &str,
        ctx: &CallContext,
    ) -> Result<Document, PipelineError> {
        let lease = LockLease::acquire(&self.locks, apim_request_id);
        let _guard = lease.lock.lock().await;
        self.resolve_locked(user_id, apim_request_id, ctx).await
    }

    async fn resolve_locked(
        &self,
        user_id: &str,
        apim_request_id: &str,
        ctx: &CallContext,
    ) -> Result<Document, PipelineError> {
        let mut document = self
            .store
            .find_document_by_apim_request_id(apim_request_id, Some(user_id))
            .await?;

        let operation = match self.store.find_activity_log(apim_request_id).await? {
            Some(log) => {
                metrics::counter!("tyr_ocr_result_cache_total", "outcome" => "hit").increment(1);
                serde_json::from_str::<AnalyzeOperation>(&log.response_body)
                    .map_err(|err| PipelineError::Malformed(err.to_string()))?
            }
            None => {
                metrics::counter!("tyr_ocr_result_cache_total", "outcome" => "miss").increment(1);
                self.analyzer
                    .fetch_result(ctx, &document.operation_location)
                    .await?
            }
        };

        let result = match operation.status.as_str() {
            AnalyzeOperation::SUCCEEDED => operation.analyze_result.ok_or_else(|| {
                PipelineError::Malformed("succeeded without analyzeResult".to_string())
            })?,
            AnalyzeOperation::FAILED => {
                let message = operation
                    .error
                    .map(|detail| detail.best_message())
                    .unwrap_or_default();
                return Err(PipelineError::Failed(message));
            }
            other => return Err(PipelineError::Pending(other.to_string())),
        };

        let normalized = normalize(&result)?;
        normalized.apply_to(&mut document);
        let item_count = normalized.items.len();
        let saved = self
            .store
            .save_normalized_document(document, normalized.items)
            .await?;
        tracing::info!(
            document_id = %saved.id,
            apim_request_id,
            items = item_count,
            "document normalized"
        );
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActivityLog, Document, NewDocument, new_id};
    use crate::ocr::client::Submission;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves a canned body and logs the way a real analyzer does.
    struct FakeAnalyzer {
        store: InMemoryStore,
        body: serde_json::Value,
        fetches: AtomicUsize,
        delay: Duration,
    }

    impl FakeAnalyzer {
        fn new(store: &InMemoryStore, body: serde_json::Value) -> Arc<Self> {
            Arc::new(Self {
                store: store.clone(),
                body,
                fetches: AtomicUsize::new(0),
                delay: Duration::ZERO,
            })
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentAnalyzer for FakeAnalyzer {
        async fn submit(
            &self,
            _ctx: &CallContext,
            _model_id: &str,
            _api_version: &str,
            _payload: &[u8],
        ) -> Result<Submission, OcrError> {
            Err(OcrError::Transport("submit not used".to_string()))
        }

        async fn fetch_result(
            &self,
            ctx: &CallContext,
            operation_location: &str,
        ) -> Result<AnalyzeOperation, OcrError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let operation: AnalyzeOperation = serde_json::from_value(self.body.clone())
                .map_err(|err| OcrError::Decode(err.to_string()))?;
            let apim_request_id = operation
                .is_succeeded()
                .then(|| operation_location.rsplit('/').next().unwrap_or_default().to_string());
            self.store
                .append_activity_log(ActivityLog {
                    id: new_id(),
                    request_url: operation_location.to_string(),
                    request_method: "GET".to_string(),
                    request_headers: "{}".to_string(),
                    request_body: String::new(),
                    response_code: 200,
                    response_headers: "{}".to_string(),
                    response_body: self.body.to_string(),
                    duration_ms: 1,
                    ip_address: ctx.ip_address.clone(),
                    apim_request_id,
                    created_at: Utc::now(),
                })
                .await?;
            Ok(operation)
        }
    }

    fn succeeded() -> serde_json::Value {
        json!({
            "status": "succeeded",
            "analyzeResult": {
                "pages": [{"pageNumber": 1}],
                "documents": [{"fields": {
                    "MerchantName": {"type": "string", "content": "Contoso"},
                    "TransactionDate": {"type": "date", "content": "03/15/2024"},
                    "Total": {"type": "number", "valueNumber": 12.5},
                    "Items": {"type": "array", "valueArray": [
                        {"type": "object", "valueObject": {
                            "Description": {"type": "string", "content": "Tea"},
                            "TotalPrice": {"type": "number", "content": "12.50"}
                        }}
                    ]}
                }}]
            }
        })
    }

    async fn seed(store: &InMemoryStore, owner: &str, apim_request_id: &str) -> Document {
        let (document, item) = Document::submitted(NewDocument {
            user_id: owner.to_string(),
            original_file_name: "receipt.png".to_string(),
            file_path: String::new(),
            model_id: "prebuilt-receipt".to_string(),
            api_version: "2023-07-31".to_string(),
            apim_request_id: apim_request_id.to_string(),
            operation_location: format!("https://ocr.test/analyzeResults/{apim_request_id}"),
        });
        store.create_document(document, item).await.unwrap()
    }

    fn pipeline(store: &InMemoryStore, analyzer: Arc<FakeAnalyzer>) -> DocumentPipeline {
        DocumentPipeline::new(Arc::new(store.clone()), analyzer)
    }

    #[tokio::test]
    async fn second_resolution_is_served_from_activity_log() {
        let store = InMemoryStore::default();
        let analyzer = FakeAnalyzer::new(&store, succeeded());
        let pipeline = pipeline(&store, analyzer.clone());
        seed(&store, "user-1", "apim-1").await;
        let ctx = CallContext::default();

        let first = pipeline.resolve("user-1", "apim-1", &ctx).await.unwrap();
        assert_eq!(first.merchant_name, "Contoso");
        assert_eq!(first.transaction_date, "2024-03-15");
        assert_eq!(first.total, 12.5);
        let items = &first.document_item.as_ref().unwrap().data;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["total_price"], "12.50");

        let second = pipeline.resolve("user-1", "apim-1", &ctx).await.unwrap();
        assert_eq!(second.merchant_name, "Contoso");
        assert_eq!(analyzer.fetches(), 1);
        assert_eq!(store.activity_logs().await.len(), 1);
    }

    #[tokio::test]
    async fn empty_result_writes_nothing() {
        let store = InMemoryStore::default();
        let analyzer = FakeAnalyzer::new(
            &store,
            json!({"status": "succeeded", "analyzeResult": {"documents": []}}),
        );
        let pipeline = pipeline(&store, analyzer);
        let seeded = seed(&store, "user-1", "apim-2").await;

        let err = pipeline
            .resolve("user-1", "apim-2", &CallContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Empty));

        let stored = store.get_document(&seeded.id, Some("user-1")).await.unwrap();
        assert_eq!(stored.merchant_name, "");
        assert_eq!(stored.updated_at, seeded.updated_at);
        assert!(stored.document_item.unwrap().data.is_empty());
    }

    #[tokio::test]
    async fn unfinished_analysis_is_pending_and_not_cached() {
        let store = InMemoryStore::default();
        let analyzer = FakeAnalyzer::new(&store, json!({"status": "running"}));
        let pipeline = pipeline(&store, analyzer.clone());
        seed(&store, "user-1", "apim-3").await;
        let ctx = CallContext::default();

        for _ in 0..2 {
            let err = pipeline.resolve("user-1", "apim-3", &ctx).await.unwrap_err();
            assert!(matches!(err, PipelineError::Pending(ref status) if status == "running"));
        }
        assert_eq!(analyzer.fetches(), 2);
    }

    #[tokio::test]
    async fn failed_analysis_surfaces_provider_message() {
        let store = InMemoryStore::default();
        let analyzer = FakeAnalyzer::new(
            &store,
            json!({"status": "failed", "error": {"code": "InvalidRequest", "message": "Invalid request.",
                "innererror": {"code": "InvalidContent", "message": "The file is corrupted."}}}),
        );
        let pipeline = pipeline(&store, analyzer);
        seed(&store, "user-1", "apim-4").await;

        let err = pipeline
            .resolve("user-1", "apim-4", &CallContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Failed(ref message) if message == "The file is corrupted."));
    }

    #[tokio::test]
    async fn other_users_documents_are_not_found() {
        let store = InMemoryStore::default();
        let analyzer = FakeAnalyzer::new(&store, succeeded());
        let pipeline = pipeline(&store, analyzer.clone());
        seed(&store, "owner", "apim-5").await;

        let err = pipeline
            .resolve("intruder", "apim-5", &CallContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Store(StoreError::NotFound(_))));
        assert_eq!(analyzer.fetches(), 0);
    }

    #[tokio::test]
    async fn concurrent_resolutions_fetch_once() {
        let store = InMemoryStore::default();
        let analyzer = Arc::new(FakeAnalyzer {
            store: store.clone(),
            body: succeeded(),
            fetches: AtomicUsize::new(0),
            delay: Duration::from_millis(50),
        });
        let pipeline = pipeline(&store, analyzer.clone());
        seed(&store, "user-1", "apim-6").await;

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    pipeline
                        .resolve("user-1", "apim-6", &CallContext::default())
                        .await
                })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().merchant_name, "Contoso");
        }
        assert_eq!(analyzer.fetches(), 1);
        assert!(pipeline.locks.is_empty());
    }

    #[tokio::test]
    async fn cancelled_resolution_releases_its_lock() {
        let store = InMemoryStore::default();
        let analyzer = Arc::new(FakeAnalyzer {
            store: store.clone(),
            body: succeeded(),
            fetches: AtomicUsize::new(0),
            delay: Duration::from_millis(500),
        });
        let pipeline = pipeline(&store, analyzer.clone());
        seed(&store, "user-1", "apim-7").await;

        let task = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                pipeline
                    .resolve("user-1", "apim-7", &CallContext::default())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pipeline.locks.len(), 1);
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(pipeline.locks.is_empty());

        let document = pipeline
            .resolve("user-1", "apim-7", &CallContext::default())
            .await
            .unwrap();
        assert_eq!(document.merchant_name, "Contoso");
        assert!(pipeline.locks.is_empty());
    }
}
