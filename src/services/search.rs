use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::ServiceError;
use crate::clients::AdLibraryApi;
use crate::db::Store;
use crate::models::page::pages_from_search_response;

/// Advertiser search. Always goes upstream; returned pages are persisted
/// as one batch when a store is configured.
pub struct SearchService {
    api: Arc<dyn AdLibraryApi>,
    store: Option<Store>,
}

impl SearchService {
    #[must_use]
    pub fn new(api: Arc<dyn AdLibraryApi>, store: Option<Store>) -> Self {
        Self { api, store }
    }

    pub async fn search_advertisers(
        &self,
        query: &str,
        country_code: Option<&str>,
    ) -> Result<Value, ServiceError> {
        if query.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Query parameter is required".to_string(),
            ));
        }

        let raw = self.api.search_pages(query, country_code).await?;

        if let Some(store) = &self.store {
            let pages = pages_from_search_response(&raw, Utc::now());
            if pages.is_empty() {
                debug!(query, "Search returned no pages to persist");
            } else {
                store.upsert_pages(&pages).await?;
                info!(query, count = pages.len(), "Persisted searched pages");
            }
        }

        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{reject_inserts, temp_store};
    use crate::services::testing::FakeAdLibrary;
    use serde_json::json;

    fn search_response() -> Value {
        json!({
            "searchResults": [
                {"page_id": "111", "name": "Acme", "category": "Retail", "likes": 10},
                {"page_id": "222", "name": "Globex", "ig_followers": 7}
            ]
        })
    }

    #[tokio::test]
    async fn test_search_returns_raw_and_upserts_pages() {
        let fake = Arc::new(FakeAdLibrary::new(search_response(), json!({})));
        let store = temp_store().await;
        let service = SearchService::new(fake.clone(), Some(store.clone()));

        let raw = service.search_advertisers("acme", None).await.unwrap();

        assert_eq!(raw, search_response());
        assert_eq!(fake.search_calls(), 1);
        let acme = store.get_page("111").await.unwrap().unwrap();
        assert_eq!(acme.name, "Acme");
        assert_eq!(acme.likes, 10);
        assert_eq!(
            store.get_page("222").await.unwrap().unwrap().ig_followers,
            Some(7)
        );
    }

    #[tokio::test]
    async fn test_search_has_no_freshness_gate() {
        let fake = Arc::new(FakeAdLibrary::new(search_response(), json!({})));
        let service = SearchService::new(fake.clone(), Some(temp_store().await));

        service.search_advertisers("acme", None).await.unwrap();
        service.search_advertisers("acme", None).await.unwrap();

        assert_eq!(fake.search_calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_query_makes_no_call() {
        let fake = Arc::new(FakeAdLibrary::new(search_response(), json!({})));
        let service = SearchService::new(fake.clone(), None);

        let err = service.search_advertisers("", None).await.unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(err.to_string(), "Query parameter is required");
        assert_eq!(fake.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_page_aborts_whole_batch() {
        let fake = Arc::new(FakeAdLibrary::new(search_response(), json!({})));
        let store = temp_store().await;
        reject_inserts(&store, "pages", "id", "222").await;
        let service = SearchService::new(fake.clone(), Some(store.clone()));

        let err = service.search_advertisers("acme", None).await.unwrap_err();

        assert!(matches!(err, ServiceError::Storage(_)));
        assert_eq!(fake.search_calls(), 1);
        assert!(store.get_page("111").await.unwrap().is_none());
        assert!(store.get_page("222").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upstream_error_skips_store() {
        let fake = Arc::new(FakeAdLibrary::new(search_response(), json!({})));
        fake.set_search(Err(500));
        let store = temp_store().await;
        let service = SearchService::new(fake.clone(), Some(store.clone()));

        let err = service.search_advertisers("acme", Some("DE")).await.unwrap_err();

        assert!(matches!(err, ServiceError::Upstream(_)));
        assert!(store.get_page("111").await.unwrap().is_none());
    }
}
