use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct SearchAdvertisersQuery {
    pub query: Option<String>,
    pub country_code: Option<String>,
}

/// `GET /api/search-advertisers?query=&country_code=`
///
/// Responds with the upstream search payload unchanged.
pub async fn search_advertisers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchAdvertisersQuery>,
) -> Result<Json<Value>, ApiError> {
    let Some(query) = params.query.as_deref().filter(|q| !q.is_empty()) else {
        return Err(ApiError::validation("Query parameter is required"));
    };

    let raw = state
        .search_service
        .search_advertisers(query, params.country_code.as_deref())
        .await
        .map_err(|e| {
            ApiError::from(e).with_details(json!({
                "query": query,
                "country_code": params.country_code,
            }))
        })?;

    Ok(Json(raw))
}
