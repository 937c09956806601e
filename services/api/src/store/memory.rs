//! In-memory implementation of the API store.
//!
//! # Purpose
//! Backs local development and tests without a database. All state lives in
//! `HashMap`s behind `tokio::sync::RwLock` and is lost on restart.
//!
//! # Notes
//! - Document items live in their own map keyed by document id, mirroring the
//!   one-to-one table layout of the Postgres backend.
//! - Multi-map mutations take every write lock they touch before changing
//!   anything, in the fixed order documents then items.
use super::{
    ActivityLogStore, DOCUMENT_SORT_FIELDS, DocumentStore, SESSION_SORT_FIELDS, SessionStore,
    Store, StoreError, StoreResult, USER_SORT_FIELDS, UserStore,
};
use crate::model::{
    ActivityLog, Document, DocumentItem, LineItem, ListQuery, Page, Session, User,
};
use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    users: Arc<RwLock<HashMap<String, User>>>,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    documents: Arc<RwLock<HashMap<String, Document>>>,
    items: Arc<RwLock<HashMap<String, DocumentItem>>>,
    activity_logs: Arc<RwLock<Vec<ActivityLog>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every audit row written so far, oldest first.
    pub async fn activity_logs(&self) -> Vec<ActivityLog> {
        self.activity_logs.read().await.clone()
    }
}

fn ordered(ordering: Ordering, descending: bool) -> Ordering {
    if descending { ordering.reverse() } else { ordering }
}

fn compare_users(a: &User, b: &User, field: &str) -> Ordering {
    match field {
        "first_name" => a.first_name.cmp(&b.first_name),
        "last_name" => a.last_name.cmp(&b.last_name),
        "email" => a.email.cmp(&b.email),
        "last_login" => a.last_login.cmp(&b.last_login),
        _ => a.created_at.cmp(&b.created_at),
    }
    .then_with(|| a.id.cmp(&b.id))
}

fn compare_sessions(a: &Session, b: &Session, field: &str) -> Ordering {
    match field {
        "expires_at" => a.expires_at.cmp(&b.expires_at),
        _ => a.created_at.cmp(&b.created_at),
    }
    .then_with(|| a.id.cmp(&b.id))
}

fn compare_documents(a: &Document, b: &Document, field: &str) -> Ordering {
    match field {
        "transaction_date" => a.transaction_date.cmp(&b.transaction_date),
        "total" => a.total.total_cmp(&b.total),
        "merchant_name" => a.merchant_name.cmp(&b.merchant_name),
        _ => a.created_at.cmp(&b.created_at),
    }
    .then_with(|| a.id.cmp(&b.id))
}

fn with_item(mut document: Document, items: &HashMap<String, DocumentItem>) -> Document {
    document.document_item = items.get(&document.id).cloned();
    document
}

fn owned_by(document: &Document, owner: Option<&str>) -> bool {
    owner.is_none_or(|owner| document.user_id == owner)
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(&self, user: User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|existing| existing.deleted_at.is_none() && existing.email == user.email)
        {
            return Err(StoreError::Conflict("user email exists".into()));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: &str) -> StoreResult<User> {
        self.users
            .read()
            .await
            .get(id)
            .filter(|user| user.deleted_at.is_none())
            .cloned()
            .ok_or_else(|| StoreError::NotFound("user".into()))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.deleted_at.is_none() && user.email == email)
            .cloned())
    }

    async fn list_users(&self, query: &ListQuery) -> StoreResult<Page<User>> {
        let (field, descending) = query.sort_by(&USER_SORT_FIELDS, ("created_at", true));
        let search = query.search_term();
        let mut users: Vec<User> = self
            .users
            .read()
            .await
            .values()
            .filter(|user| user.deleted_at.is_none())
            .filter(|user| search.as_deref().is_none_or(|term| user.matches_search(term)))
            .cloned()
            .collect();
        users.sort_by(|a, b| ordered(compare_users(a, b, field), descending));
        Ok(Page::from_sorted(users, query))
    }

    async fn update_user(&self, user: User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|existing| {
            existing.id != user.id && existing.deleted_at.is_none() && existing.email == user.email
        }) {
            return Err(StoreError::Conflict("user email exists".into()));
        }
        match users.get_mut(&user.id) {
            Some(existing) if existing.deleted_at.is_none() => {
                *existing = user.clone();
                Ok(user)
            }
            _ => Err(StoreError::NotFound("user".into())),
        }
    }

    async fn delete_user(&self, id: &str) -> StoreResult<()> {
        let mut users = self.users.write().await;
        match users.get_mut(id) {
            Some(user) if user.deleted_at.is_none() => {
                let now = Utc::now();
                user.deleted_at = Some(now);
                user.updated_at = now;
                Ok(())
            }
            _ => Err(StoreError::NotFound("user".into())),
        }
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn create_session(&self, session: Session) -> StoreResult<Session> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(StoreError::Conflict("session exists".into()));
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: &str) -> StoreResult<Session> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("session".into()))
    }

    async fn list_sessions(
        &self,
        query: &ListQuery,
        user_id: Option<&str>,
    ) -> StoreResult<Page<Session>> {
        let (field, descending) = query.sort_by(&SESSION_SORT_FIELDS, ("created_at", true));
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|session| user_id.is_none_or(|user_id| session.user_id == user_id))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| ordered(compare_sessions(a, b, field), descending));
        Ok(Page::from_sorted(sessions, query))
    }

    async fn update_session(&self, session: Session) -> StoreResult<Session> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.id) {
            Some(existing) => {
                *existing = session.clone();
                Ok(session)
            }
            None => Err(StoreError::NotFound("session".into())),
        }
    }

    async fn delete_session(&self, id: &str) -> StoreResult<()> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound("session".into()))
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create_document(
        &self,
        document: Document,
        item: DocumentItem,
    ) -> StoreResult<Document> {
        let mut documents = self.documents.write().await;
        let mut items = self.items.write().await;
        if documents.contains_key(&document.id) {
            return Err(StoreError::Conflict("document exists".into()));
        }
        if documents.values().any(|existing| {
            existing.deleted_at.is_none() && existing.apim_request_id == document.apim_request_id
        }) {
            return Err(StoreError::Conflict("apim request id exists".into()));
        }
        let mut stored = document;
        stored.document_item = None;
        documents.insert(stored.id.clone(), stored.clone());
        items.insert(stored.id.clone(), item);
        Ok(with_item(stored, &items))
    }

    async fn get_document(&self, id: &str, owner: Option<&str>) -> StoreResult<Document> {
        let documents = self.documents.read().await;
        let items = self.items.read().await;
        documents
            .get(id)
            .filter(|document| document.deleted_at.is_none() && owned_by(document, owner))
            .cloned()
            .map(|document| with_item(document, &items))
            .ok_or_else(|| StoreError::NotFound("document".into()))
    }

    async fn find_document_by_apim_request_id(
        &self,
        apim_request_id: &str,
        owner: Option<&str>,
    ) -> StoreResult<Document> {
        let documents = self.documents.read().await;
        let items = self.items.read().await;
        documents
            .values()
            .find(|document| {
                document.deleted_at.is_none()
                    && document.apim_request_id == apim_request_id
                    && owned_by(document, owner)
            })
            .cloned()
            .map(|document| with_item(document, &items))
            .ok_or_else(|| StoreError::NotFound("document".into()))
    }

    async fn list_documents(
        &self,
        owner: &str,
        query: &ListQuery,
    ) -> StoreResult<Page<Document>> {
        let (field, descending) = query.sort_by(&DOCUMENT_SORT_FIELDS, ("created_at", true));
        let search = query.search_term();
        let documents = self.documents.read().await;
        let items = self.items.read().await;
        let mut owned: Vec<Document> = documents
            .values()
            .filter(|document| document.deleted_at.is_none() && document.user_id == owner)
            .filter(|document| {
                search
                    .as_deref()
                    .is_none_or(|term| document.merchant_name.to_lowercase().contains(term))
            })
            .cloned()
            .map(|document| with_item(document, &items))
            .collect();
        owned.sort_by(|a, b| ordered(compare_documents(a, b, field), descending));
        Ok(Page::from_sorted(owned, query))
    }

    async fn update_document(&self, document: Document) -> StoreResult<Document> {
        let mut documents = self.documents.write().await;
        let items = self.items.read().await;
        match documents.get_mut(&document.id) {
            Some(existing) if existing.deleted_at.is_none() => {
                let mut stored = document;
                stored.document_item = None;
                *existing = stored.clone();
                Ok(with_item(stored, &items))
            }
            _ => Err(StoreError::NotFound("document".into())),
        }
    }

    async fn save_normalized_document(
        &self,
        document: Document,
        data: Vec<LineItem>,
    ) -> StoreResult<Document> {
        let mut documents = self.documents.write().await;
        let mut items = self.items.write().await;
        let Some(existing) = documents
            .get_mut(&document.id)
            .filter(|existing| existing.deleted_at.is_none())
        else {
            return Err(StoreError::NotFound("document".into()));
        };
        let Some(item) = items.get_mut(&document.id) else {
            return Err(StoreError::NotFound("document item".into()));
        };
        let now = Utc::now();
        item.data = data;
        item.updated_at = now;

        let mut stored = document;
        stored.document_item = None;
        stored.updated_at = now;
        *existing = stored.clone();
        Ok(with_item(stored, &items))
    }

    async fn delete_document(&self, id: &str) -> StoreResult<()> {
        let mut documents = self.documents.write().await;
        let mut items = self.items.write().await;
        let Some(document) = documents
            .get_mut(id)
            .filter(|document| document.deleted_at.is_none())
        else {
            return Err(StoreError::NotFound("document".into()));
        };
        items.remove(id);
        let now = Utc::now();
        document.deleted_at = Some(now);
        document.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl ActivityLogStore for InMemoryStore {
    async fn append_activity_log(&self, log: ActivityLog) -> StoreResult<ActivityLog> {
        self.activity_logs.write().await.push(log.clone());
        Ok(log)
    }

    async fn find_activity_log(&self, apim_request_id: &str) -> StoreResult<Option<ActivityLog>> {
        Ok(self
            .activity_logs
            .read()
            .await
            .iter()
            .rev()
            .find(|log| log.apim_request_id.as_deref() == Some(apim_request_id))
            .cloned())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
