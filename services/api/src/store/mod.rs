//! Persistence traits and backends.
//!
//! # Purpose
//! Handlers and the OCR pipeline talk to storage only through [`Store`], so the
//! in-memory backend used by tests and the Postgres backend are interchangeable.
//!
//! # Notes
//! - Soft-deleted rows are invisible to every read and list.
//! - Owner-scoped lookups return `NotFound` for rows owned by someone else.
use crate::model::{ActivityLog, Document, DocumentItem, LineItem, ListQuery, Page, Session, User};
use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub const USER_SORT_FIELDS: [&str; 5] =
    ["created_at", "first_name", "last_name", "email", "last_login"];
pub const SESSION_SORT_FIELDS: [&str; 2] = ["created_at", "expires_at"];
pub const DOCUMENT_SORT_FIELDS: [&str; 4] =
    ["created_at", "transaction_date", "total", "merchant_name"];

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, user: User) -> StoreResult<User>;
    async fn get_user(&self, id: &str) -> StoreResult<User>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self, query: &ListQuery) -> StoreResult<Page<User>>;
    async fn update_user(&self, user: User) -> StoreResult<User>;
    async fn delete_user(&self, id: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: Session) -> StoreResult<Session>;
    async fn get_session(&self, id: &str) -> StoreResult<Session>;
    async fn list_sessions(
        &self,
        query: &ListQuery,
        user_id: Option<&str>,
    ) -> StoreResult<Page<Session>>;
    async fn update_session(&self, session: Session) -> StoreResult<Session>;
    async fn delete_session(&self, id: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document together with its item row.
    async fn create_document(
        &self,
        document: Document,
        item: DocumentItem,
    ) -> StoreResult<Document>;
    async fn get_document(&self, id: &str, owner: Option<&str>) -> StoreResult<Document>;
    async fn find_document_by_apim_request_id(
        &self,
        apim_request_id: &str,
        owner: Option<&str>,
    ) -> StoreResult<Document>;
    async fn list_documents(&self, owner: &str, query: &ListQuery)
    -> StoreResult<Page<Document>>;
    async fn update_document(&self, document: Document) -> StoreResult<Document>;
    /// Replace the item data and the document fields atomically.
    async fn save_normalized_document(
        &self,
        document: Document,
        items: Vec<LineItem>,
    ) -> StoreResult<Document>;
    /// Remove the item row, then soft-delete the document.
    async fn delete_document(&self, id: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait ActivityLogStore: Send + Sync {
    async fn append_activity_log(&self, log: ActivityLog) -> StoreResult<ActivityLog>;
    /// Most recent log tagged with `apim_request_id`, if any.
    async fn find_activity_log(&self, apim_request_id: &str) -> StoreResult<Option<ActivityLog>>;
}

#[async_trait]
pub trait Store: UserStore + SessionStore + DocumentStore + ActivityLogStore {
    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
