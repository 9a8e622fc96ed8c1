use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::clients::{AdLibraryApi, AdLibraryError};

/// Scripted upstream that counts calls.
pub struct FakeAdLibrary {
    pub search_response: Mutex<Result<Value, u16>>,
    pub ads_response: Mutex<Result<Value, u16>>,
    pub delay: Duration,
    pub search_calls: AtomicUsize,
    pub ads_calls: AtomicUsize,
}

impl FakeAdLibrary {
    pub fn new(search: Value, ads: Value) -> Self {
        Self {
            search_response: Mutex::new(Ok(search)),
            ads_response: Mutex::new(Ok(ads)),
            delay: Duration::ZERO,
            search_calls: AtomicUsize::new(0),
            ads_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_ads(&self, response: Result<Value, u16>) {
        *self.ads_response.lock().unwrap() = response;
    }

    pub fn set_search(&self, response: Result<Value, u16>) {
        *self.search_response.lock().unwrap() = response;
    }

    pub fn ads_calls(&self) -> usize {
        self.ads_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    fn respond(scripted: &Mutex<Result<Value, u16>>) -> Result<Value, AdLibraryError> {
        scripted
            .lock()
            .unwrap()
            .clone()
            .map_err(|status| AdLibraryError::Upstream {
                status,
                body: "scripted failure".to_string(),
            })
    }
}

#[async_trait]
impl AdLibraryApi for FakeAdLibrary {
    async fn search_pages(
        &self,
        query: &str,
        _country_code: Option<&str>,
    ) -> Result<Value, AdLibraryError> {
        if query.is_empty() {
            return Err(AdLibraryError::InvalidArgument("query"));
        }
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Self::respond(&self.search_response)
    }

    async fn fetch_page_ads(
        &self,
        page_id: &str,
        _country_code: Option<&str>,
    ) -> Result<Value, AdLibraryError> {
        if page_id.is_empty() {
            return Err(AdLibraryError::InvalidArgument("page_id"));
        }
        self.ads_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Self::respond(&self.ads_response)
    }
}
