use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{ApiError, AppState};
use crate::services::PageAdsOutcome;

#[derive(Debug, Deserialize)]
pub struct PageAdsQuery {
    pub country_code: Option<String>,
}

/// `GET /api/page-ads/{page_id}?country_code=`
///
/// Cache hits respond with `{"results": [row, ...]}`; misses respond with the
/// raw upstream payload.
pub async fn get_page_ads(
    State(state): State<Arc<AppState>>,
    Path(page_id): Path<String>,
    Query(params): Query<PageAdsQuery>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state
        .page_ads_service
        .get_page_ads(&page_id, params.country_code.as_deref())
        .await
        .map_err(|e| {
            ApiError::from(e).with_details(json!({
                "page_id": page_id,
                "country_code": params.country_code,
            }))
        })?;

    match outcome {
        PageAdsOutcome::Cached(ads) => Ok(Json(json!({ "results": ads }))),
        PageAdsOutcome::Fetched(raw) => Ok(Json(raw)),
    }
}
