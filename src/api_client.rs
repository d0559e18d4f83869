//! HTTP client for the list API: the production callback-mode fetcher
//! plus the identity-fetch and bulk-action collaborators.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::data::selection::{BulkActionFn, IdentityFetchFn, ItemId};
use crate::data::source::{FetchFn, FetchParams, FetchResult, PageInfo};
use crate::error::FetchError;

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<Value>,
    pagination: Option<WirePagination>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePagination {
    page: u32,
    limit: u32,
    total_pages: u32,
    total_items: u64,
}

#[derive(Debug, Deserialize)]
struct ItemsEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AckEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    collection: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, collection: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            client,
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("{}/{}", self.base_url, self.collection)
        } else {
            format!("{}/{}/{}", self.base_url, self.collection, suffix)
        }
    }

    /// Fetch one page. Only active inputs reach the wire: empty search and
    /// date bounds, an inactive sort and an empty filter list all stay off
    /// the query string.
    pub async fn fetch_page(&self, params: &FetchParams) -> Result<FetchResult, FetchError> {
        let url = self.collection_url("");
        let query = build_query(params);
        debug!(target: "api", "GET {} {:?}", url, query);

        let response = self.client.get(&url).query(&query).send().await?;
        let envelope: ListEnvelope = checked(response).await?.json().await?;
        if !envelope.success {
            return Err(rejected(envelope.message));
        }
        let pagination = match envelope.pagination {
            Some(p) => PageInfo {
                page: p.page,
                limit: p.limit,
                total_pages: p.total_pages,
                total_items: p.total_items,
            },
            None => PageInfo::for_total(params.page, params.limit, envelope.data.len() as u64),
        };
        Ok(FetchResult {
            items: envelope.data,
            pagination,
        })
    }

    /// Fetch full items for a set of identities, used to resolve off-page
    /// selections.
    pub async fn fetch_by_ids(&self, ids: &[ItemId]) -> Result<Vec<Value>, FetchError> {
        let url = self.collection_url("by-ids");
        debug!(target: "api", "POST {} ({} ids)", url, ids.len());

        let body = json!({ "ids": id_strings(ids) });
        let response = self.client.post(&url).json(&body).send().await?;
        let envelope: ItemsEnvelope = checked(response).await?.json().await?;
        if !envelope.success {
            return Err(rejected(envelope.message));
        }
        Ok(envelope.data)
    }

    pub async fn delete(&self, ids: &[ItemId]) -> Result<(), FetchError> {
        self.bulk_action("bulk-delete", json!({ "ids": id_strings(ids) }))
            .await
    }

    pub async fn assign(&self, ids: &[ItemId], assignee_id: &str) -> Result<(), FetchError> {
        self.bulk_action(
            "bulk-assign",
            json!({ "ids": id_strings(ids), "assigneeId": assignee_id }),
        )
        .await
    }

    async fn bulk_action(&self, suffix: &str, body: Value) -> Result<(), FetchError> {
        let url = self.collection_url(suffix);
        debug!(target: "api", "POST {}", url);

        let response = self.client.post(&url).json(&body).send().await?;
        let envelope: AckEnvelope = checked(response).await?.json().await?;
        if !envelope.success {
            return Err(rejected(envelope.message));
        }
        Ok(())
    }

    pub fn fetch_fn(&self) -> FetchFn {
        let client = self.clone();
        Arc::new(move |params| {
            let client = client.clone();
            Box::pin(async move { client.fetch_page(&params).await })
        })
    }

    pub fn identity_fetch_fn(&self) -> IdentityFetchFn {
        let client = self.clone();
        Arc::new(move |ids| {
            let client = client.clone();
            Box::pin(async move { client.fetch_by_ids(&ids).await })
        })
    }

    pub fn delete_fn(&self) -> BulkActionFn {
        let client = self.clone();
        Arc::new(move |ids| {
            let client = client.clone();
            Box::pin(async move { client.delete(&ids).await })
        })
    }

    pub fn assign_fn(&self, assignee_id: &str) -> BulkActionFn {
        let client = self.clone();
        let assignee_id = assignee_id.to_string();
        Arc::new(move |ids| {
            let client = client.clone();
            let assignee_id = assignee_id.clone();
            Box::pin(async move { client.assign(&ids, &assignee_id).await })
        })
    }
}

fn build_query(params: &FetchParams) -> Vec<(&'static str, String)> {
    use crate::sync::keys::StateValue;

    let mut query = vec![
        ("page", params.page.to_string()),
        ("limit", params.limit.to_string()),
    ];
    if !params.search.is_empty() {
        query.push(("search", params.search.clone()));
    }
    if !params.from_date.is_empty() {
        query.push(("from_date", params.from_date.clone()));
    }
    if !params.to_date.is_empty() {
        query.push(("to_date", params.to_date.clone()));
    }
    if let Some(field) = &params.sort_by {
        query.push(("sort_by", field.clone()));
    }
    if let Some(order) = params.sort_order {
        query.push(("sort_order", order.encode()));
    }
    if !params.column_filters.is_empty() {
        query.push((
            "filters",
            serde_json::to_string(&params.column_filters).unwrap_or_default(),
        ));
    }
    query
}

fn id_strings(ids: &[ItemId]) -> Vec<&str> {
    ids.iter().map(|id| id.as_str()).collect()
}

async fn checked(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(FetchError::Rejected {
        status: status.as_u16(),
        message,
    })
}

fn rejected(message: Option<String>) -> FetchError {
    FetchError::Rejected {
        status: 200,
        message: message.unwrap_or_else(|| "request reported failure".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::keys::{ColumnFilter, SortOrder};

    #[test]
    fn test_query_carries_only_active_inputs() {
        let params = FetchParams {
            page: 2,
            limit: 25,
            ..FetchParams::default()
        };
        let query = build_query(&params);
        assert_eq!(
            query,
            vec![("page", "2".to_string()), ("limit", "25".to_string())]
        );

        let params = FetchParams {
            page: 1,
            limit: 10,
            search: "bio".to_string(),
            sort_by: Some("name".to_string()),
            sort_order: Some(SortOrder::Asc),
            column_filters: vec![ColumnFilter::new("status", "active")],
            ..FetchParams::default()
        };
        let query = build_query(&params);
        assert!(query.contains(&("search", "bio".to_string())));
        assert!(query.contains(&("sort_by", "name".to_string())));
        assert!(query.contains(&("sort_order", "asc".to_string())));
        assert!(query
            .iter()
            .any(|(k, v)| *k == "filters" && v.contains("status")));
    }

    #[test]
    fn test_wire_pagination_is_camel_case() {
        let envelope: ListEnvelope = serde_json::from_str(
            r#"{
                "success": true,
                "data": [{"id": 1}],
                "pagination": {"page": 1, "limit": 10, "totalPages": 4, "totalItems": 37}
            }"#,
        )
        .unwrap();
        assert!(envelope.success);
        let pagination = envelope.pagination.unwrap();
        assert_eq!(pagination.total_pages, 4);
        assert_eq!(pagination.total_items, 37);
    }
}
