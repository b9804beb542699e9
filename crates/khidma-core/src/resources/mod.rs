//! Typed operations over the backend's record endpoints.

pub mod notes;
pub mod retreats;
pub mod servantees;
pub mod servants;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{ApiClient, ApiError, RequestOptions};
use crate::models::Page;

/// Page size used when every record of a collection is needed.
pub const FETCH_ALL_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Paging and search parameters of a list call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            search: None,
        }
    }
}

impl ListQuery {
    pub fn page(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
            search: None,
        }
    }

    /// Set the search term; blank terms clear it.
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        let trimmed = term.trim();
        self.search = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn to_query_string(&self) -> String {
        let mut query = format!("page={}&limit={}", self.page, self.limit);
        if let Some(search) = &self.search {
            query.push_str("&search=");
            query.push_str(&urlencoding::encode(search));
        }
        query
    }
}

pub(crate) async fn list_page<T: DeserializeOwned>(
    client: &ApiClient,
    collection: &str,
    query: &ListQuery,
) -> Result<Page<T>, ApiError> {
    let path = format!("/{collection}?{}", query.to_query_string());
    client.request_json(&path, RequestOptions::get()).await
}

/// Walk every page of `collection`. Stops at an empty page, at the reported page count,
/// or after the first page when the response carries no page count.
pub(crate) async fn fetch_all<T: DeserializeOwned>(
    client: &ApiClient,
    collection: &str,
) -> Result<Vec<T>, ApiError> {
    let mut items = Vec::new();
    let mut query = ListQuery::page(1, FETCH_ALL_PAGE_SIZE);

    loop {
        let page: Page<T> = list_page(client, collection, &query).await?;
        let has_more = page.has_more(query.page);
        let rows = page.into_items();
        if rows.is_empty() {
            break;
        }
        items.extend(rows);
        if !has_more {
            break;
        }
        query.page += 1;
    }

    debug!(collection, count = items.len(), "fetched complete collection");
    Ok(items)
}

pub(crate) fn require_id<'a>(kind: &str, id: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Invalid(format!("{kind} id must not be empty")));
    }
    Ok(trimmed)
}

/// A non-empty id, percent-encoded for use as one path segment.
pub(crate) fn path_id(kind: &str, id: &str) -> Result<String, ApiError> {
    require_id(kind, id).map(|id| urlencoding::encode(id).into_owned())
}
