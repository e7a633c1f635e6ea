use crate::shared::usecase::UseCase;
use classwatch_infra::ClasswatchContext;
use tracing::info;

/// Retention pass over the notification ledger: entries whose class started
/// longer ago than the configured retention window are removed. Keyed on the
/// class start, so an entry can never expire while its class is upcoming.
#[derive(Debug)]
pub struct CleanupLedgerUseCase;

#[derive(Debug)]
pub enum UseCaseError {}

#[async_trait::async_trait(?Send)]
impl UseCase for CleanupLedgerUseCase {
    type Response = usize;

    type Error = UseCaseError;

    const NAME: &'static str = "CleanupLedger";

    async fn execute(&mut self, ctx: &ClasswatchContext) -> Result<Self::Response, Self::Error> {
        let cutoff =
            ctx.sys.get_timestamp_millis() - ctx.config.ledger_retention.as_millis() as i64;
        let removed = ctx.repos.ledger.delete_all_before(cutoff).await;
        if !removed.is_empty() {
            info!(
                "Ledger cleanup removed {} entries for classes started before {}",
                removed.len(),
                cutoff
            );
        }
        Ok(removed.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::shared::usecase::execute;
    use classwatch_domain::{LedgerEntry, ID};
    use classwatch_infra::{
        ClasswatchContext, FixedTimeSys, InMemoryDeliveryChannel, InMemoryUpstreamProvider,
    };
    use std::sync::Arc;

    #[actix_rt::test]
    async fn removes_only_entries_past_the_retention_window() {
        let mut ctx = ClasswatchContext::create_inmemory(
            Arc::new(InMemoryUpstreamProvider::new()),
            Arc::new(InMemoryDeliveryChannel::new()),
        );
        let retention = ctx.config.ledger_retention.as_millis() as i64;
        let now = retention * 2;
        ctx.sys = Arc::new(FixedTimeSys(now));

        let user = ID::new();
        let entry = |key: &str, instance_start_ts: i64| LedgerEntry {
            user_id: user.clone(),
            instance_key: key.into(),
            sent_at: 0,
            instance_start_ts,
        };
        ctx.repos
            .ledger
            .commit(&entry("expired", now - retention - 1))
            .await
            .unwrap();
        ctx.repos
            .ledger
            .commit(&entry("recent", now - retention + 1000))
            .await
            .unwrap();

        let removed = execute(CleanupLedgerUseCase, &ctx).await.unwrap();
        assert_eq!(removed, 1);
        assert!(ctx.repos.ledger.is_new(&user, "expired").await.unwrap());
        assert!(!ctx.repos.ledger.is_new(&user, "recent").await.unwrap());
    }
}
