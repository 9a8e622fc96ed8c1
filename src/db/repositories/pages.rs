use crate::entities::{pages, prelude::*};
use crate::models::Page;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait};
use tracing::debug;

pub struct PageRepository {
    conn: DatabaseConnection,
}

impl PageRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub(crate) fn map_model_to_page(model: pages::Model) -> Page {
        Page {
            id: model.id,
            name: model.name,
            category: model.category,
            likes: model.likes,
            ig_followers: model.ig_followers,
            last_updated: model.last_updated,
            search_result: model.search_result,
        }
    }

    fn active_model(page: &Page) -> pages::ActiveModel {
        pages::ActiveModel {
            id: Set(page.id.clone()),
            name: Set(page.name.clone()),
            category: Set(page.category.clone()),
            likes: Set(page.likes),
            ig_followers: Set(page.ig_followers),
            last_updated: Set(page.last_updated),
            search_result: Set(page.search_result.clone()),
        }
    }

    /// Inserts or fully overwrites one page row. Never deletes, so the page's
    /// ads are untouched.
    pub(crate) async fn upsert_with<C: ConnectionTrait>(conn: &C, page: &Page) -> anyhow::Result<()> {
        Pages::insert(Self::active_model(page))
            .on_conflict(
                OnConflict::column(pages::Column::Id)
                    .update_columns([
                        pages::Column::Name,
                        pages::Column::Category,
                        pages::Column::Likes,
                        pages::Column::IgFollowers,
                        pages::Column::LastUpdated,
                        pages::Column::SearchResult,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    /// Inserts `page` only when no row with its id exists yet.
    pub(crate) async fn insert_if_missing<C: ConnectionTrait>(
        conn: &C,
        page: &Page,
    ) -> anyhow::Result<bool> {
        let inserted = Pages::insert(Self::active_model(page))
            .on_conflict(OnConflict::column(pages::Column::Id).do_nothing().to_owned())
            .exec_without_returning(conn)
            .await?;
        Ok(inserted > 0)
    }

    pub async fn upsert(&self, page: &Page) -> anyhow::Result<()> {
        Self::upsert_with(&self.conn, page).await
    }

    /// Applies every upsert in one transaction. A failure on any record rolls
    /// the whole batch back.
    pub async fn upsert_many(&self, pages: &[Page]) -> anyhow::Result<()> {
        if pages.is_empty() {
            return Ok(());
        }

        let txn = self.conn.begin().await?;

        for page in pages {
            Self::upsert_with(&txn, page).await?;
        }

        txn.commit().await?;
        debug!("Upserted {} pages", pages.len());
        Ok(())
    }

    pub async fn get(&self, id: &str) -> anyhow::Result<Option<Page>> {
        let row = Pages::find_by_id(id.to_string()).one(&self.conn).await?;
        Ok(row.map(Self::map_model_to_page))
    }
}
