mod inmemory;
mod postgres;

use classwatch_domain::{CatalogDimension, CatalogSnapshot};
pub use inmemory::InMemoryCatalogRepo;
pub use postgres::PostgresCatalogRepo;

/// Persisted cache of the enumerable filter dimensions. `find` always serves
/// the last successfully saved snapshot; there is no expiry, staleness is
/// only observable through `CatalogSnapshot::refreshed_at`.
#[async_trait::async_trait]
pub trait ICatalogRepo: Send + Sync {
    async fn save(&self, snapshot: &CatalogSnapshot) -> anyhow::Result<()>;
    async fn find(&self, dimension: CatalogDimension) -> Option<CatalogSnapshot>;
}
