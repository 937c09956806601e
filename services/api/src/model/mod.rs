//! Domain records persisted by the API.
//!
//! # Purpose
//! Shared shapes used by handlers, the store implementations and the OCR
//! pipeline, plus pagination primitives.
mod activity_log;
mod document;
mod session;
mod user;

pub use activity_log::ActivityLog;
pub use document::{Document, DocumentItem, DocumentPatch, LineItem, NewDocument};
pub use session::{AuthToken, Session};
pub use user::{User, UserStatus};

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Fresh sortable identifier for a new row.
pub fn new_id() -> String {
    ulid::Ulid::new().to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// 1-based page number.
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Field name, prefixed with `-` for descending order.
    pub sort: Option<String>,
    pub search: Option<String>,
}

impl ListQuery {
    pub fn page(&self) -> u32 {
        self.page.filter(|page| *page > 0).unwrap_or(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.per_page())
    }

    /// Resolve the sort field against `allowed`, returning `(field, descending)`.
    ///
    /// Unknown fields fall back to `default` so callers never build ordering
    /// from unchecked input.
    pub fn sort_by<'a>(&self, allowed: &[&'a str], default: (&'a str, bool)) -> (&'a str, bool) {
        let Some(raw) = self.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return default;
        };
        let (name, descending) = match raw.strip_prefix('-') {
            Some(name) => (name, true),
            None => (raw, false),
        };
        allowed
            .iter()
            .find(|field| **field == name)
            .map(|field| (*field, descending))
            .unwrap_or(default)
    }

    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[aliases(UserPage = Page<User>, SessionPage = Page<Session>, DocumentPage = Page<Document>)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_count: u64,
}

impl<T> Page<T> {
    /// Slice an already filtered and ordered collection.
    pub fn from_sorted(items: Vec<T>, query: &ListQuery) -> Self {
        let total_count = items.len() as u64;
        let data = items
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.per_page() as usize)
            .collect();
        Self { data, total_count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_defaults_and_clamps() {
        let query = ListQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), DEFAULT_PAGE_SIZE);
        assert_eq!(query.offset(), 0);

        let query = ListQuery {
            page: Some(3),
            per_page: Some(1000),
            ..ListQuery::default()
        };
        assert_eq!(query.per_page(), MAX_PAGE_SIZE);
        assert_eq!(query.offset(), 200);
    }

    #[test]
    fn sort_by_rejects_unknown_fields() {
        let allowed = ["created_at", "email"];
        let query = ListQuery {
            sort: Some("-email".to_string()),
            ..ListQuery::default()
        };
        assert_eq!(query.sort_by(&allowed, ("created_at", true)), ("email", true));

        let query = ListQuery {
            sort: Some("password; drop table users".to_string()),
            ..ListQuery::default()
        };
        assert_eq!(
            query.sort_by(&allowed, ("created_at", true)),
            ("created_at", true)
        );
    }

    #[test]
    fn page_slices_after_total() {
        let query = ListQuery {
            page: Some(2),
            per_page: Some(2),
            ..ListQuery::default()
        };
        let page = Page::from_sorted(vec![1, 2, 3, 4, 5], &query);
        assert_eq!(page.data, vec![3, 4]);
        assert_eq!(page.total_count, 5);
    }
}
