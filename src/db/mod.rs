use crate::models::{Ad, Page};
use anyhow::Result;
use chrono::{Duration, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use tracing::info;

pub mod migrator;
pub mod repositories;

/// Handle to the result store. Cloning shares the underlying pool.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");

        if !in_memory {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        // Every pooled connection to `:memory:` would get its own empty database.
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(std::time::Duration::from_secs(10))
            .acquire_timeout(std::time::Duration::from_secs(10))
            .idle_timeout(std::time::Duration::from_secs(300))
            .max_lifetime(std::time::Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    /// Closes the pool. Other clones of this store become unusable.
    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        info!("Database connection closed");
        Ok(())
    }

    fn page_repo(&self) -> repositories::pages::PageRepository {
        repositories::pages::PageRepository::new(self.conn.clone())
    }

    fn ad_repo(&self) -> repositories::ads::AdRepository {
        repositories::ads::AdRepository::new(self.conn.clone())
    }

    pub async fn upsert_page(&self, page: &Page) -> Result<()> {
        self.page_repo().upsert(page).await
    }

    pub async fn upsert_pages(&self, pages: &[Page]) -> Result<()> {
        self.page_repo().upsert_many(pages).await
    }

    pub async fn get_page(&self, id: &str) -> Result<Option<Page>> {
        self.page_repo().get(id).await
    }

    pub async fn replace_ads_for_page(&self, page_id: &str, ads: &[Ad]) -> Result<()> {
        self.ad_repo().replace_for_page(page_id, ads).await
    }

    /// Ads of `page_id` whose last refresh is within `max_age` of now. Empty
    /// when none qualify.
    pub async fn fresh_ads_for_page(&self, page_id: &str, max_age: Duration) -> Result<Vec<Ad>> {
        let since = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        self.ad_repo().refreshed_since(page_id, since).await
    }

    pub async fn ads_for_page(&self, page_id: &str) -> Result<Vec<Ad>> {
        self.ad_repo().list_for_page(page_id).await
    }
}
