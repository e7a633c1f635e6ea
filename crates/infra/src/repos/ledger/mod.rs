mod inmemory;
mod postgres;

use crate::repos::shared::repo::DeleteResult;
use classwatch_domain::{LedgerEntry, ID};
pub use inmemory::InMemoryLedgerRepo;
pub use postgres::PostgresLedgerRepo;

/// The durable at-most-once record. `commit` is an atomic insert-if-absent
/// against the (user, instance key) pair: even two racing cycles can only
/// ever write the entry once, and the loser learns it lost.
#[async_trait::async_trait]
pub trait ILedgerRepo: Send + Sync {
    /// Whether no notification has been recorded yet for this pair
    async fn is_new(&self, user_id: &ID, instance_key: &str) -> anyhow::Result<bool>;
    /// Insert-if-absent. Returns true when this call created the entry and
    /// false when another commit got there first.
    async fn commit(&self, entry: &LedgerEntry) -> anyhow::Result<bool>;
    /// Escape hatch for the external command surface: forget one pair so it
    /// may notify again
    async fn clear(&self, user_id: &ID, instance_key: &str) -> Option<LedgerEntry>;
    /// Forget everything recorded for a user, e.g. on logout
    async fn clear_user(&self, user_id: &ID) -> anyhow::Result<DeleteResult>;
    /// Retention pass: remove entries whose class started at or before the
    /// given timestamp
    async fn delete_all_before(&self, instance_start_before: i64) -> Vec<LedgerEntry>;
}
