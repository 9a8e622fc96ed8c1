use crate::db::repositories::pages::PageRepository;
use crate::entities::{ads, prelude::*};
use crate::models::{Ad, Page};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict, Order};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info};

/// Keeps each multi-row insert well below `SQLite`'s bound-parameter limit.
const INSERT_CHUNK_SIZE: usize = 500;

pub struct AdRepository {
    conn: DatabaseConnection,
}

impl AdRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model_to_ad(model: ads::Model) -> Ad {
        Ad {
            ad_archive_id: model.ad_archive_id,
            page_id: model.page_id,
            snapshot: model.snapshot,
            start_date: model.start_date,
            end_date: model.end_date,
            last_updated: model.last_updated,
        }
    }

    fn active_model(ad: &Ad) -> ads::ActiveModel {
        ads::ActiveModel {
            ad_archive_id: Set(ad.ad_archive_id.clone()),
            page_id: Set(ad.page_id.clone()),
            snapshot: Set(ad.snapshot.clone()),
            start_date: Set(ad.start_date),
            end_date: Set(ad.end_date),
            last_updated: Set(ad.last_updated),
        }
    }

    /// Replaces every ad of `page_id` with `ads` in one transaction.
    ///
    /// A parent page row is created first when none exists. `ads` must not
    /// repeat an id. Any failure drops the transaction uncommitted, which rolls
    /// it back and leaves the previous ads in place.
    pub async fn replace_for_page(&self, page_id: &str, ads: &[Ad]) -> anyhow::Result<()> {
        let now = Utc::now();
        let parent_name = ads.iter().find_map(Ad::page_name);

        let txn = self.conn.begin().await?;

        if PageRepository::insert_if_missing(&txn, &Page::stub(page_id, parent_name, now)).await? {
            debug!(page_id, "Created placeholder page for ads");
        }

        let removed = Ads::delete_many()
            .filter(ads::Column::PageId.eq(page_id))
            .exec(&txn)
            .await?;

        // An id stored under another page moves to this one.
        for chunk in ads.chunks(INSERT_CHUNK_SIZE) {
            Ads::insert_many(chunk.iter().map(Self::active_model))
                .on_conflict(
                    OnConflict::column(ads::Column::AdArchiveId)
                        .update_columns([
                            ads::Column::PageId,
                            ads::Column::Snapshot,
                            ads::Column::StartDate,
                            ads::Column::EndDate,
                            ads::Column::LastUpdated,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;

        info!(
            page_id,
            removed = removed.rows_affected,
            inserted = ads.len(),
            "Replaced ads for page"
        );
        Ok(())
    }

    /// Ads of `page_id` refreshed at or after `since`, in upstream order.
    pub async fn refreshed_since(
        &self,
        page_id: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Ad>> {
        let rows = Ads::find()
            .filter(ads::Column::PageId.eq(page_id))
            .filter(ads::Column::LastUpdated.gte(since))
            .order_by(Expr::cust("rowid"), Order::Asc)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model_to_ad).collect())
    }

    /// Every stored ad of `page_id` regardless of age, in upstream order.
    pub async fn list_for_page(&self, page_id: &str) -> anyhow::Result<Vec<Ad>> {
        let rows = Ads::find()
            .filter(ads::Column::PageId.eq(page_id))
            .order_by(Expr::cust("rowid"), Order::Asc)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model_to_ad).collect())
    }
}
