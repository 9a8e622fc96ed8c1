use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{int_field, string_field};

/// An advertiser page as returned by the upstream search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub likes: i64,
    pub ig_followers: Option<i64>,
    pub last_updated: DateTime<Utc>,
    /// The full search entry, kept verbatim.
    pub search_result: Option<Value>,
}

impl Page {
    /// Placeholder row for a page whose ads are fetched before it was ever searched.
    #[must_use]
    pub fn stub(id: &str, name: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            name: name.unwrap_or_default(),
            category: None,
            likes: 0,
            ig_followers: None,
            last_updated: now,
            search_result: None,
        }
    }

    /// Builds a page from one search entry. Entries without an id are skipped.
    #[must_use]
    pub fn from_search_entry(entry: &Value, now: DateTime<Utc>) -> Option<Self> {
        let id = string_field(entry, &["page_id", "pageID", "pageId", "id"])?;

        Some(Self {
            id,
            name: string_field(entry, &["name", "page_name", "pageName"]).unwrap_or_default(),
            category: string_field(entry, &["category"]).or_else(|| {
                entry
                    .get("categories")
                    .and_then(Value::as_array)
                    .and_then(|c| c.first())
                    .and_then(Value::as_str)
                    .map(str::to_string)
            }),
            likes: int_field(entry, &["likes", "page_like_count", "likeCount"]).unwrap_or(0),
            ig_followers: int_field(entry, &["ig_followers", "igFollowers"]),
            last_updated: now,
            search_result: Some(entry.clone()),
        })
    }
}

/// Extracts pages from a search response, which is either a bare array or an
/// object wrapping one.
#[must_use]
pub fn pages_from_search_response(raw: &Value, now: DateTime<Utc>) -> Vec<Page> {
    let entries = match raw {
        Value::Array(items) => Some(items),
        Value::Object(_) => ["searchResults", "results", "data", "pages"]
            .iter()
            .find_map(|key| raw.get(key).and_then(Value::as_array)),
        _ => None,
    };

    entries
        .into_iter()
        .flatten()
        .filter_map(|entry| Page::from_search_entry(entry, now))
        .collect()
}
