mod inmemory;
mod postgres;

use classwatch_domain::{UserFilter, ID};
pub use inmemory::InMemoryUserFilterRepo;
pub use postgres::PostgresUserFilterRepo;

/// Filters are written by the external command interface; the monitoring
/// core only ever reads the active set at the start of a user's matching
/// phase.
#[async_trait::async_trait]
pub trait IUserFilterRepo: Send + Sync {
    async fn insert(&self, filter: &UserFilter) -> anyhow::Result<()>;
    async fn find(&self, filter_id: &ID) -> Option<UserFilter>;
    async fn find_by_user(&self, user_id: &ID) -> Vec<UserFilter>;
    async fn delete(&self, filter_id: &ID) -> Option<UserFilter>;
}
