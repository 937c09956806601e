//! Postgres-backed implementation of the API store.
//!
//! # Purpose
//! Durable storage for users, sessions, documents and the OCR activity log,
//! using `sqlx` with a bounded connection pool.
//!
//! # Key invariants
//! - Migrations under `./migrations` run before the store is handed out.
//! - Soft deletes set `deleted_at`; every read filters on `deleted_at IS NULL`.
//! - Document plus item writes share one transaction.
//! - `ORDER BY` columns come only from the `*_SORT_FIELDS` allowlists.
//!
//! # Security notes
//! - The database URL may contain credentials and is never logged.
use super::{
    ActivityLogStore, DOCUMENT_SORT_FIELDS, DocumentStore, SESSION_SORT_FIELDS, SessionStore,
    Store, StoreError, StoreResult, USER_SORT_FIELDS, UserStore,
};
use crate::config::DatabaseConfig;
use crate::model::{
    ActivityLog, Document, DocumentItem, LineItem, ListQuery, Page, Session, User, UserStatus,
};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unexpected(err.into())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Unexpected(err.into())
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbUser {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    role: String,
    status: String,
    password_hash: String,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
struct DbSession {
    id: String,
    user_id: String,
    is_blocked: bool,
    expires_at: DateTime<Utc>,
    ip_address: String,
    user_agent: String,
    refresh_token: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbDocument {
    id: String,
    user_id: String,
    original_file_name: String,
    file_name: String,
    file_path: String,
    apim_request_id: String,
    operation_location: String,
    model_id: String,
    api_version: String,
    merchant_name: String,
    merchant_address: String,
    merchant_phone_number: String,
    transaction_date: String,
    transaction_time: String,
    currency: String,
    sub_total: f64,
    total: f64,
    total_tax: f64,
    tax_details: String,
    total_page: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    item_id: Option<String>,
    item_data: Option<Json<Vec<LineItem>>>,
    item_created_at: Option<DateTime<Utc>>,
    item_updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
struct DbActivityLog {
    id: String,
    request_url: String,
    request_method: String,
    request_headers: String,
    request_body: String,
    response_code: i32,
    response_headers: String,
    response_body: String,
    duration_ms: i64,
    ip_address: String,
    apim_request_id: Option<String>,
    created_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "id, first_name, last_name, email, phone, role, status, password_hash, \
     last_login, created_at, updated_at, deleted_at";

const SESSION_COLUMNS: &str =
    "id, user_id, is_blocked, expires_at, ip_address, user_agent, refresh_token, created_at, updated_at";

const DOCUMENT_SELECT: &str = r#"SELECT d.id, d.user_id, d.original_file_name, d.file_name, d.file_path,
       d.apim_request_id, d.operation_location, d.model_id, d.api_version, d.merchant_name,
       d.merchant_address, d.merchant_phone_number, d.transaction_date, d.transaction_time,
       d.currency, d.sub_total, d.total, d.total_tax, d.tax_details, d.total_page,
       d.created_at, d.updated_at, d.deleted_at,
       i.id AS item_id, i.data AS item_data, i.created_at AS item_created_at,
       i.updated_at AS item_updated_at
  FROM documents d
  LEFT JOIN document_items i ON i.document_id = d.id"#;

impl PostgresStore {
    /// Open a pool and apply migrations.
    ///
    /// # Errors
    /// - Invalid URL, unreachable database, or a failed migration.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let connect_options = PgConnectOptions::from_str(&config.url)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    async fn load_document(
        &self,
        filter: &str,
        key: &str,
        owner: Option<&str>,
    ) -> StoreResult<Document> {
        let query = format!(
            "{DOCUMENT_SELECT} WHERE {filter} = $1 AND d.deleted_at IS NULL \
             AND ($2::text IS NULL OR d.user_id = $2)"
        );
        let row = sqlx::query_as::<_, DbDocument>(&query)
            .bind(key)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(document_from_db(row)),
            None => Err(StoreError::NotFound("document".into())),
        }
    }

    async fn load_document_in(
        tx: &mut Transaction<'_, Postgres>,
        id: &str,
    ) -> StoreResult<Document> {
        let query = format!("{DOCUMENT_SELECT} WHERE d.id = $1");
        let row = sqlx::query_as::<_, DbDocument>(&query)
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(document_from_db(row))
    }

    async fn write_document_fields(
        tx: &mut Transaction<'_, Postgres>,
        document: &Document,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"UPDATE documents SET merchant_name = $2, merchant_address = $3,
                 merchant_phone_number = $4, transaction_date = $5, transaction_time = $6,
                 currency = $7, sub_total = $8, total = $9, total_tax = $10, tax_details = $11,
                 total_page = $12, user_id = $13, updated_at = $14
               WHERE id = $1 AND deleted_at IS NULL"#,
        )
        .bind(&document.id)
        .bind(&document.merchant_name)
        .bind(&document.merchant_address)
        .bind(&document.merchant_phone_number)
        .bind(&document.transaction_date)
        .bind(&document.transaction_time)
        .bind(&document.currency)
        .bind(document.sub_total)
        .bind(document.total)
        .bind(document.total_tax)
        .bind(&document.tax_details)
        .bind(document.total_page)
        .bind(&document.user_id)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("document".into()));
        }
        Ok(())
    }
}

fn order_clause(field: &str, descending: bool) -> String {
    let direction = if descending { "DESC" } else { "ASC" };
    format!("ORDER BY {field} {direction}, id {direction}")
}

fn like_pattern(term: Option<String>) -> Option<String> {
    term.map(|term| format!("%{term}%"))
}

fn user_from_db(row: DbUser) -> StoreResult<User> {
    let role = row
        .role
        .parse()
        .map_err(|_| StoreError::Unexpected(anyhow!("invalid role in users row: {}", row.role)))?;
    let status = UserStatus::from_str(&row.status)
        .map_err(|_| StoreError::Unexpected(anyhow!("invalid status in users row: {}", row.status)))?;
    Ok(User {
        id: row.id,
        first_name: row.first_name,
        last_name: row.last_name,
        email: row.email,
        phone: row.phone,
        role,
        status,
        password_hash: row.password_hash,
        last_login: row.last_login,
        created_at: row.created_at,
        updated_at: row.updated_at,
        deleted_at: row.deleted_at,
    })
}

fn session_from_db(row: DbSession) -> Session {
    Session {
        id: row.id,
        user_id: row.user_id,
        is_blocked: row.is_blocked,
        expires_at: row.expires_at,
        ip_address: row.ip_address,
        user_agent: row.user_agent,
        refresh_token: row.refresh_token,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn document_from_db(row: DbDocument) -> Document {
    let document_item = match (row.item_id, row.item_created_at, row.item_updated_at) {
        (Some(item_id), Some(created_at), Some(updated_at)) => Some(DocumentItem {
            id: item_id,
            document_id: row.id.clone(),
            data: row.item_data.map(|data| data.0).unwrap_or_default(),
            created_at,
            updated_at,
        }),
        _ => None,
    };
    Document {
        id: row.id,
        user_id: row.user_id,
        original_file_name: row.original_file_name,
        file_name: row.file_name,
        file_path: row.file_path,
        apim_request_id: row.apim_request_id,
        operation_location: row.operation_location,
        model_id: row.model_id,
        api_version: row.api_version,
        merchant_name: row.merchant_name,
        merchant_address: row.merchant_address,
        merchant_phone_number: row.merchant_phone_number,
        transaction_date: row.transaction_date,
        transaction_time: row.transaction_time,
        currency: row.currency,
        sub_total: row.sub_total,
        total: row.total,
        total_tax: row.total_tax,
        tax_details: row.tax_details,
        total_page: row.total_page,
        created_at: row.created_at,
        updated_at: row.updated_at,
        deleted_at: row.deleted_at,
        document_item,
    }
}

fn activity_log_from_db(row: DbActivityLog) -> ActivityLog {
    ActivityLog {
        id: row.id,
        request_url: row.request_url,
        request_method: row.request_method,
        request_headers: row.request_headers,
        request_body: row.request_body,
        response_code: row.response_code,
        response_headers: row.response_headers,
        response_body: row.response_body,
        duration_ms: row.duration_ms,
        ip_address: row.ip_address,
        apim_request_id: row.apim_request_id,
        created_at: row.created_at,
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|code| code == "23505").unwrap_or(false);
    }
    false
}

fn conflict_or_unexpected(err: sqlx::Error, what: &str) -> StoreError {
    if is_unique_violation(&err) {
        return StoreError::Conflict(what.to_string());
    }
    StoreError::Unexpected(err.into())
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn create_user(&self, user: User) -> StoreResult<User> {
        sqlx::query(
            r#"INSERT INTO users (id, first_name, last_name, email, phone, role, status, password_hash,
                                  last_login, created_at, updated_at, deleted_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"#,
        )
        .bind(&user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(&user.password_hash)
        .bind(user.last_login)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_or_unexpected(err, "user email exists"))?;
        Ok(user)
    }

    async fn get_user(&self, id: &str) -> StoreResult<User> {
        let row = sqlx::query_as::<_, DbUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => user_from_db(row),
            None => Err(StoreError::NotFound("user".into())),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, DbUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(user_from_db).transpose()
    }

    async fn list_users(&self, query: &ListQuery) -> StoreResult<Page<User>> {
        let (field, descending) = query.sort_by(&USER_SORT_FIELDS, ("created_at", true));
        let pattern = like_pattern(query.search_term());
        let filter = "deleted_at IS NULL AND ($1::text IS NULL OR LOWER(first_name) LIKE $1 \
                      OR LOWER(last_name) LIKE $1 OR LOWER(email) LIKE $1)";

        let total_count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users WHERE {filter}"))
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await?;
        let rows = sqlx::query_as::<_, DbUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {filter} {} LIMIT $2 OFFSET $3",
            order_clause(field, descending)
        ))
        .bind(&pattern)
        .bind(i64::from(query.per_page()))
        .bind(query.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(Page {
            data: rows
                .into_iter()
                .map(user_from_db)
                .collect::<StoreResult<Vec<_>>>()?,
            total_count: total_count as u64,
        })
    }

    async fn update_user(&self, user: User) -> StoreResult<User> {
        let result = sqlx::query(
            r#"UPDATE users SET first_name = $2, last_name = $3, email = $4, phone = $5, role = $6,
                 status = $7, password_hash = $8, last_login = $9, updated_at = $10
               WHERE id = $1 AND deleted_at IS NULL"#,
        )
        .bind(&user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(&user.password_hash)
        .bind(user.last_login)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_or_unexpected(err, "user email exists"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user".into()));
        }
        Ok(user)
    }

    async fn delete_user(&self, id: &str) -> StoreResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE users SET deleted_at = $2, updated_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for PostgresStore {
    async fn create_session(&self, session: Session) -> StoreResult<Session> {
        sqlx::query(
            r#"INSERT INTO sessions (id, user_id, is_blocked, expires_at, ip_address, user_agent,
                                     refresh_token, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(session.is_blocked)
        .bind(session.expires_at)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(&session.refresh_token)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_or_unexpected(err, "session exists"))?;
        Ok(session)
    }

    async fn get_session(&self, id: &str) -> StoreResult<Session> {
        let row = sqlx::query_as::<_, DbSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(session_from_db)
            .ok_or_else(|| StoreError::NotFound("session".into()))
    }

    async fn list_sessions(
        &self,
        query: &ListQuery,
        user_id: Option<&str>,
    ) -> StoreResult<Page<Session>> {
        let (field, descending) = query.sort_by(&SESSION_SORT_FIELDS, ("created_at", true));
        let filter = "($1::text IS NULL OR user_id = $1)";
        let total_count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM sessions WHERE {filter}"))
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        let rows = sqlx::query_as::<_, DbSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE {filter} {} LIMIT $2 OFFSET $3",
            order_clause(field, descending)
        ))
        .bind(user_id)
        .bind(i64::from(query.per_page()))
        .bind(query.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(Page {
            data: rows.into_iter().map(session_from_db).collect(),
            total_count: total_count as u64,
        })
    }

    async fn update_session(&self, session: Session) -> StoreResult<Session> {
        let result = sqlx::query(
            r#"UPDATE sessions SET is_blocked = $2, expires_at = $3, refresh_token = $4, updated_at = $5
               WHERE id = $1"#,
        )
        .bind(&session.id)
        .bind(session.is_blocked)
        .bind(session.expires_at)
        .bind(&session.refresh_token)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("session".into()));
        }
        Ok(session)
    }

    async fn delete_session(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("session".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn create_document(
        &self,
        document: Document,
        item: DocumentItem,
    ) -> StoreResult<Document> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO documents (id, user_id, original_file_name, file_name, file_path,
                 apim_request_id, operation_location, model_id, api_version, merchant_name,
                 merchant_address, merchant_phone_number, transaction_date, transaction_time,
                 currency, sub_total, total, total_tax, tax_details, total_page, created_at,
                 updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                       $17, $18, $19, $20, $21, $22)"#,
        )
        .bind(&document.id)
        .bind(&document.user_id)
        .bind(&document.original_file_name)
        .bind(&document.file_name)
        .bind(&document.file_path)
        .bind(&document.apim_request_id)
        .bind(&document.operation_location)
        .bind(&document.model_id)
        .bind(&document.api_version)
        .bind(&document.merchant_name)
        .bind(&document.merchant_address)
        .bind(&document.merchant_phone_number)
        .bind(&document.transaction_date)
        .bind(&document.transaction_time)
        .bind(&document.currency)
        .bind(document.sub_total)
        .bind(document.total)
        .bind(document.total_tax)
        .bind(&document.tax_details)
        .bind(document.total_page)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| conflict_or_unexpected(err, "apim request id exists"))?;

        sqlx::query(
            r#"INSERT INTO document_items (id, document_id, data, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(&item.id)
        .bind(&document.id)
        .bind(Json(&item.data))
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await?;

        let stored = Self::load_document_in(&mut tx, &document.id).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn get_document(&self, id: &str, owner: Option<&str>) -> StoreResult<Document> {
        self.load_document("d.id", id, owner).await
    }

    async fn find_document_by_apim_request_id(
        &self,
        apim_request_id: &str,
        owner: Option<&str>,
    ) -> StoreResult<Document> {
        self.load_document("d.apim_request_id", apim_request_id, owner)
            .await
    }

    async fn list_documents(
        &self,
        owner: &str,
        query: &ListQuery,
    ) -> StoreResult<Page<Document>> {
        let (field, descending) = query.sort_by(&DOCUMENT_SORT_FIELDS, ("created_at", true));
        let pattern = like_pattern(query.search_term());
        let filter = "d.deleted_at IS NULL AND d.user_id = $1 \
                      AND ($2::text IS NULL OR LOWER(d.merchant_name) LIKE $2)";
        let total_count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM documents d WHERE {filter}"))
                .bind(owner)
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await?;
        let direction = if descending { "DESC" } else { "ASC" };
        let rows = sqlx::query_as::<_, DbDocument>(&format!(
            "{DOCUMENT_SELECT} WHERE {filter} ORDER BY d.{field} {direction}, d.id {direction} \
             LIMIT $3 OFFSET $4"
        ))
        .bind(owner)
        .bind(&pattern)
        .bind(i64::from(query.per_page()))
        .bind(query.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(Page {
            data: rows.into_iter().map(document_from_db).collect(),
            total_count: total_count as u64,
        })
    }

    async fn update_document(&self, document: Document) -> StoreResult<Document> {
        let mut tx = self.pool.begin().await?;
        Self::write_document_fields(&mut tx, &document, document.updated_at).await?;
        let stored = Self::load_document_in(&mut tx, &document.id).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn save_normalized_document(
        &self,
        document: Document,
        items: Vec<LineItem>,
    ) -> StoreResult<Document> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE document_items SET data = $2, updated_at = $3 WHERE document_id = $1",
        )
        .bind(&document.id)
        .bind(Json(&items))
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("document item".into()));
        }
        Self::write_document_fields(&mut tx, &document, now).await?;
        let stored = Self::load_document_in(&mut tx, &document.id).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn delete_document(&self, id: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if !exists {
            return Err(StoreError::NotFound("document".into()));
        }
        sqlx::query("DELETE FROM document_items WHERE document_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let now = Utc::now();
        sqlx::query("UPDATE documents SET deleted_at = $2, updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ActivityLogStore for PostgresStore {
    async fn append_activity_log(&self, log: ActivityLog) -> StoreResult<ActivityLog> {
        sqlx::query(
            r#"INSERT INTO activity_logs (id, request_url, request_method, request_headers,
                 request_body, response_code, response_headers, response_body, duration_ms,
                 ip_address, apim_request_id, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"#,
        )
        .bind(&log.id)
        .bind(&log.request_url)
        .bind(&log.request_method)
        .bind(&log.request_headers)
        .bind(&log.request_body)
        .bind(log.response_code)
        .bind(&log.response_headers)
        .bind(&log.response_body)
        .bind(log.duration_ms)
        .bind(&log.ip_address)
        .bind(&log.apim_request_id)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;
        Ok(log)
    }

    async fn find_activity_log(&self, apim_request_id: &str) -> StoreResult<Option<ActivityLog>> {
        let row = sqlx::query_as::<_, DbActivityLog>(
            r#"SELECT id, request_url, request_method, request_headers, request_body, response_code,
                      response_headers, response_body, duration_ms, ip_address, apim_request_id,
                      created_at
                 FROM activity_logs WHERE apim_request_id = $1
                 ORDER BY created_at DESC LIMIT 1"#,
        )
        .bind(apim_request_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(activity_log_from_db))
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
