mod catalog;
mod filter;
mod ledger;
mod shared;
mod user;

use catalog::{InMemoryCatalogRepo, PostgresCatalogRepo};
use filter::{InMemoryUserFilterRepo, PostgresUserFilterRepo};
use ledger::{InMemoryLedgerRepo, PostgresLedgerRepo};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use user::{InMemoryUserRepo, PostgresUserRepo};

pub use catalog::ICatalogRepo;
pub use filter::IUserFilterRepo;
pub use ledger::ILedgerRepo;
pub use shared::repo::DeleteResult;
pub use user::IUserRepo;

#[derive(Clone)]
pub struct Repos {
    pub users: Arc<dyn IUserRepo>,
    pub filters: Arc<dyn IUserFilterRepo>,
    pub ledger: Arc<dyn ILedgerRepo>,
    pub catalog: Arc<dyn ICatalogRepo>,
}

impl Repos {
    pub async fn create_postgres(
        connection_string: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(connection_string)
            .await?;

        Ok(Self {
            users: Arc::new(PostgresUserRepo::new(pool.clone())),
            filters: Arc::new(PostgresUserFilterRepo::new(pool.clone())),
            ledger: Arc::new(PostgresLedgerRepo::new(pool.clone())),
            catalog: Arc::new(PostgresCatalogRepo::new(pool)),
        })
    }

    pub fn create_inmemory() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepo::new()),
            filters: Arc::new(InMemoryUserFilterRepo::new()),
            ledger: Arc::new(InMemoryLedgerRepo::new()),
            catalog: Arc::new(InMemoryCatalogRepo::new()),
        }
    }
}
