use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use super::{int_field, string_field};

/// A stored advertisement. Serializes with the column names of the `ads` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ad {
    pub ad_archive_id: String,
    pub page_id: String,
    pub snapshot: Value,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

impl Ad {
    /// Builds an ad owned by `page_id` from one upstream entry.
    ///
    /// `startDate`/`endDate` arrive as epoch seconds. When the entry carries no
    /// `snapshot` object the whole entry is kept instead.
    #[must_use]
    pub fn from_upstream(entry: &Value, page_id: &str, now: DateTime<Utc>) -> Option<Self> {
        let ad_archive_id = string_field(entry, &["adArchiveID", "ad_archive_id", "adArchiveId"])?;

        let snapshot = entry
            .get("snapshot")
            .filter(|s| !s.is_null())
            .cloned()
            .unwrap_or_else(|| entry.clone());

        Some(Self {
            ad_archive_id,
            page_id: page_id.to_string(),
            snapshot,
            start_date: epoch_field(entry, &["startDate", "start_date"]),
            end_date: epoch_field(entry, &["endDate", "end_date"]),
            last_updated: now,
        })
    }

    /// Page name carried in the snapshot, if upstream sent one.
    #[must_use]
    pub fn page_name(&self) -> Option<String> {
        string_field(&self.snapshot, &["page_name", "pageName"])
    }
}

fn epoch_field(entry: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    int_field(entry, keys).and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Flattens an ads response. Upstream groups collated ads as
/// `{"results": [[ad, ad], [ad]]}`; a flat list is accepted as well.
///
/// An id repeated across groups is kept once, at its first position, with the
/// data of its last occurrence.
#[must_use]
pub fn ads_from_page_response(raw: &Value, page_id: &str, now: DateTime<Utc>) -> Vec<Ad> {
    let groups = match raw {
        Value::Array(items) => Some(items),
        Value::Object(_) => raw.get("results").and_then(Value::as_array),
        _ => None,
    };

    let entries = groups
        .into_iter()
        .flatten()
        .flat_map(|group| match group {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .filter_map(|entry| Ad::from_upstream(entry, page_id, now));

    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut ads: Vec<Ad> = Vec::new();
    for ad in entries {
        if let Some(&index) = positions.get(&ad.ad_archive_id) {
            ads[index] = ad;
        } else {
            positions.insert(ad.ad_archive_id.clone(), ads.len());
            ads.push(ad);
        }
    }
    ads
}
