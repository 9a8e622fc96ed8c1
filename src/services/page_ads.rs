//! Get-or-populate lookup for a page's ads.
//!
//! Stored rows younger than the freshness TTL are served directly. Otherwise
//! the ads are fetched upstream and the page's stored ads are replaced in one
//! transaction before the raw upstream payload is returned.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{FreshnessPolicy, KeyedLocks, ServiceError};
use crate::clients::AdLibraryApi;
use crate::db::Store;
use crate::models::Ad;
use crate::models::ad::ads_from_page_response;

#[derive(Debug, Clone, PartialEq)]
pub enum PageAdsOutcome {
    /// Rows read from the store, no upstream call made.
    Cached(Vec<Ad>),
    /// Raw upstream payload, already persisted when a store is configured.
    Fetched(Value),
}

pub struct PageAdsService {
    api: Arc<dyn AdLibraryApi>,
    store: Option<Store>,
    policy: FreshnessPolicy,
    refresh_locks: KeyedLocks,
}

impl PageAdsService {
    #[must_use]
    pub fn new(api: Arc<dyn AdLibraryApi>, store: Option<Store>, policy: FreshnessPolicy) -> Self {
        Self {
            api,
            store,
            policy,
            refresh_locks: KeyedLocks::new(),
        }
    }

    pub async fn get_page_ads(
        &self,
        page_id: &str,
        country_code: Option<&str>,
    ) -> Result<PageAdsOutcome, ServiceError> {
        if page_id.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Page id parameter is required".to_string(),
            ));
        }

        let Some(store) = &self.store else {
            metrics::counter!("page_ads_lookups_total", "outcome" => "proxy").increment(1);
            let raw = self.api.fetch_page_ads(page_id, country_code).await?;
            return Ok(PageAdsOutcome::Fetched(raw));
        };

        if let Some(ads) = self.cached(store, page_id).await? {
            return Ok(PageAdsOutcome::Cached(ads));
        }

        let _guard = self.refresh_locks.lock(page_id).await;

        // A concurrent refresh of the same page may have finished while we waited.
        if let Some(ads) = self.cached(store, page_id).await? {
            return Ok(PageAdsOutcome::Cached(ads));
        }

        self.refresh(store, page_id, country_code).await
    }

    async fn cached(&self, store: &Store, page_id: &str) -> Result<Option<Vec<Ad>>, ServiceError> {
        let ads = store.fresh_ads_for_page(page_id, self.policy.ttl()).await?;

        if self.policy.is_fresh(&ads, Utc::now()) {
            debug!(page_id, count = ads.len(), "Serving page ads from cache");
            metrics::counter!("page_ads_lookups_total", "outcome" => "hit").increment(1);
            Ok(Some(ads))
        } else {
            Ok(None)
        }
    }

    async fn refresh(
        &self,
        store: &Store,
        page_id: &str,
        country_code: Option<&str>,
    ) -> Result<PageAdsOutcome, ServiceError> {
        metrics::counter!("page_ads_lookups_total", "outcome" => "miss").increment(1);

        let raw = match self.api.fetch_page_ads(page_id, country_code).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(page_id, error = %e, "Upstream page ads fetch failed");
                return Err(e.into());
            }
        };

        let ads = ads_from_page_response(&raw, page_id, Utc::now());
        store.replace_ads_for_page(page_id, &ads).await?;

        info!(page_id, count = ads.len(), "Refreshed page ads from upstream");
        Ok(PageAdsOutcome::Fetched(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{reject_inserts, temp_store};
    use crate::services::testing::FakeAdLibrary;
    use chrono::{DateTime, Duration};
    use serde_json::json;

    fn upstream_ads(ids: &[&str]) -> Value {
        let ads: Vec<Value> = ids
            .iter()
            .map(|id| {
                json!({
                    "adArchiveID": id,
                    "startDate": 1000,
                    "endDate": 2000,
                    "snapshot": {"title": format!("ad {id}")}
                })
            })
            .collect();
        json!({ "results": [ads] })
    }

    async fn service(fake: &Arc<FakeAdLibrary>) -> (PageAdsService, Store) {
        let store = temp_store().await;
        let api: Arc<dyn AdLibraryApi> = fake.clone();
        let service = PageAdsService::new(api, Some(store.clone()), FreshnessPolicy::page_ads());
        (service, store)
    }

    fn stored_ids(ads: &[Ad]) -> Vec<&str> {
        ads.iter().map(|a| a.ad_archive_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_miss_fetches_once_and_stores() {
        let fake = Arc::new(FakeAdLibrary::new(json!([]), upstream_ads(&["A1"])));
        let (service, store) = service(&fake).await;

        let outcome = service.get_page_ads("123", None).await.unwrap();

        assert_eq!(outcome, PageAdsOutcome::Fetched(upstream_ads(&["A1"])));
        assert_eq!(fake.ads_calls(), 1);

        let stored = store.ads_for_page("123").await.unwrap();
        assert_eq!(stored_ids(&stored), vec!["A1"]);
        assert_eq!(stored[0].page_id, "123");
        assert_eq!(stored[0].start_date, DateTime::from_timestamp(1000, 0));
        assert_eq!(stored[0].end_date, DateTime::from_timestamp(2000, 0));
    }

    #[tokio::test]
    async fn test_hit_skips_upstream() {
        let fake = Arc::new(FakeAdLibrary::new(json!([]), upstream_ads(&["A1", "A2"])));
        let (service, _store) = service(&fake).await;

        service.get_page_ads("123", None).await.unwrap();
        let outcome = service.get_page_ads("123", Some("US")).await.unwrap();

        assert_eq!(fake.ads_calls(), 1);
        match outcome {
            PageAdsOutcome::Cached(ads) => assert_eq!(stored_ids(&ads), vec!["A1", "A2"]),
            PageAdsOutcome::Fetched(_) => panic!("expected a cache hit"),
        }
    }

    #[tokio::test]
    async fn test_stale_rows_are_fully_replaced() {
        let fake = Arc::new(FakeAdLibrary::new(json!([]), upstream_ads(&["NEW"])));
        let (service, store) = service(&fake).await;

        let stale = Ad {
            ad_archive_id: "OLD".to_string(),
            page_id: "123".to_string(),
            snapshot: json!({}),
            start_date: None,
            end_date: None,
            last_updated: Utc::now() - Duration::hours(30),
        };
        store.replace_ads_for_page("123", &[stale]).await.unwrap();

        let outcome = service.get_page_ads("123", None).await.unwrap();

        assert!(matches!(outcome, PageAdsOutcome::Fetched(_)));
        assert_eq!(fake.ads_calls(), 1);
        assert_eq!(
            stored_ids(&store.ads_for_page("123").await.unwrap()),
            vec!["NEW"]
        );
    }

    #[tokio::test]
    async fn test_upstream_failure_leaves_store_untouched() {
        let fake = Arc::new(FakeAdLibrary::new(json!([]), upstream_ads(&[])));
        fake.set_ads(Err(503));
        let (service, store) = service(&fake).await;

        let stale = Ad {
            ad_archive_id: "OLD".to_string(),
            page_id: "123".to_string(),
            snapshot: json!({}),
            start_date: None,
            end_date: None,
            last_updated: Utc::now() - Duration::hours(30),
        };
        store.replace_ads_for_page("123", &[stale]).await.unwrap();

        let err = service.get_page_ads("123", None).await.unwrap_err();

        assert!(matches!(err, ServiceError::Upstream(_)));
        assert_eq!(err.to_string(), "API responded with status: 503");
        assert_eq!(
            stored_ids(&store.ads_for_page("123").await.unwrap()),
            vec!["OLD"]
        );
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back() {
        let fake = Arc::new(FakeAdLibrary::new(json!([]), upstream_ads(&["A1"])));
        let (service, store) = service(&fake).await;
        service.get_page_ads("123", None).await.unwrap();

        // Age the stored rows so the next lookup refreshes.
        let mut aged = store.ads_for_page("123").await.unwrap();
        for ad in &mut aged {
            ad.last_updated = Utc::now() - Duration::hours(48);
        }
        store.replace_ads_for_page("123", &aged).await.unwrap();

        reject_inserts(&store, "ads", "ad_archive_id", "POISON").await;
        fake.set_ads(Ok(upstream_ads(&["B1", "POISON", "B2"])));
        let err = service.get_page_ads("123", None).await.unwrap_err();

        assert!(matches!(err, ServiceError::Storage(_)));
        let after = store.ads_for_page("123").await.unwrap();
        assert_eq!(stored_ids(&after), vec!["A1"]);
        assert_eq!(after[0].snapshot, aged[0].snapshot);
    }

    #[tokio::test]
    async fn test_ad_shared_by_two_pages_moves_to_latest() {
        let fake = Arc::new(FakeAdLibrary::new(json!([]), upstream_ads(&["A1"])));
        let (service, store) = service(&fake).await;

        service.get_page_ads("p1", None).await.unwrap();
        let outcome = service.get_page_ads("p2", None).await.unwrap();

        assert!(matches!(outcome, PageAdsOutcome::Fetched(_)));
        assert_eq!(fake.ads_calls(), 2);
        assert!(store.ads_for_page("p1").await.unwrap().is_empty());
        assert_eq!(
            stored_ids(&store.ads_for_page("p2").await.unwrap()),
            vec!["A1"]
        );
    }

    #[tokio::test]
    async fn test_repeated_id_in_one_response_is_stored_once() {
        let repeated = json!({
            "results": [
                [{"adArchiveID": "A1", "snapshot": {"v": 1}}],
                [{"adArchiveID": "A1", "snapshot": {"v": 2}}]
            ]
        });
        let fake = Arc::new(FakeAdLibrary::new(json!([]), repeated));
        let (service, store) = service(&fake).await;

        service.get_page_ads("123", None).await.unwrap();
        let second = service.get_page_ads("123", None).await.unwrap();

        assert_eq!(fake.ads_calls(), 1);
        match second {
            PageAdsOutcome::Cached(ads) => {
                assert_eq!(stored_ids(&ads), vec!["A1"]);
                assert_eq!(ads[0].snapshot, json!({"v": 2}));
            }
            PageAdsOutcome::Fetched(_) => panic!("expected a cache hit"),
        }
        assert_eq!(store.ads_for_page("123").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let fake = Arc::new(FakeAdLibrary::new(json!([]), upstream_ads(&["A1", "A2"])));
        let (service, store) = service(&fake).await;

        service.refresh(&store, "123", None).await.unwrap();
        let once = store.ads_for_page("123").await.unwrap();
        service.refresh(&store, "123", None).await.unwrap();
        let twice = store.ads_for_page("123").await.unwrap();

        assert_eq!(stored_ids(&once), stored_ids(&twice));
        assert_eq!(
            once.iter().map(|a| &a.snapshot).collect::<Vec<_>>(),
            twice.iter().map(|a| &a.snapshot).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_one_refresh() {
        let mut fake = FakeAdLibrary::new(json!([]), upstream_ads(&["A1"]));
        fake.delay = std::time::Duration::from_millis(100);
        let fake = Arc::new(fake);
        let (service, _store) = service(&fake).await;
        let service = Arc::new(service);

        let first = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.get_page_ads("123", None).await })
        };
        let second = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.get_page_ads("123", None).await })
        };

        let outcomes = [first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];

        assert_eq!(fake.ads_calls(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| matches!(o, PageAdsOutcome::Cached(_)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_without_store_always_proxies() {
        let fake = Arc::new(FakeAdLibrary::new(json!([]), upstream_ads(&["A1"])));
        let api: Arc<dyn AdLibraryApi> = fake.clone();
        let service = PageAdsService::new(api, None, FreshnessPolicy::page_ads());

        service.get_page_ads("123", None).await.unwrap();
        service.get_page_ads("123", None).await.unwrap();

        assert_eq!(fake.ads_calls(), 2);
    }

    #[test]
    fn test_proxy_lookups_are_counted() {
        use metrics_exporter_prometheus::PrometheusBuilder;

        let fake = Arc::new(FakeAdLibrary::new(json!([]), upstream_ads(&["A1"])));
        let api: Arc<dyn AdLibraryApi> = fake.clone();
        let service = PageAdsService::new(api, None, FreshnessPolicy::page_ads());

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                service.get_page_ads("123", None).await.unwrap();
                service.get_page_ads("123", None).await.unwrap();
            });
        });

        assert!(
            handle
                .render()
                .contains(r#"page_ads_lookups_total{outcome="proxy"} 2"#)
        );
    }

    #[tokio::test]
    async fn test_blank_page_id_rejected() {
        let fake = Arc::new(FakeAdLibrary::new(json!([]), upstream_ads(&["A1"])));
        let (service, _store) = service(&fake).await;

        let err = service.get_page_ads(" ", None).await.unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(fake.ads_calls(), 0);
    }
}
