pub mod error;
pub mod freshness;
pub mod key_lock;
pub mod page_ads;
pub mod search;

pub use error::ServiceError;
pub use freshness::FreshnessPolicy;
pub use key_lock::KeyedLocks;
pub use page_ads::{PageAdsOutcome, PageAdsService};
pub use search::SearchService;

#[cfg(test)]
pub(crate) mod testing;
