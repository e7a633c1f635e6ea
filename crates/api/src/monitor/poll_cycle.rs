use super::check_user::{CheckUserUseCase, SliceOutcome};
use crate::shared::stop_signal::StopSignal;
use crate::shared::usecase::{execute, UseCase};
use classwatch_domain::{CatalogDimension, NameDirectory, TimeSpan};
use classwatch_infra::ClasswatchContext;
use futures::future::join_all;
use serde::Serialize;
use tracing::info;

/// One full poll cycle: read the active users, then run every user's slice
/// (fetch, match, dispatch, commit) concurrently. Per-user failures stay in
/// their slice; this use case only fails when the user set itself cannot be
/// read. Overlap protection lives in the `CycleCoordinator`, not here.
#[derive(Debug)]
pub struct PollCycleUseCase {
    pub stop: StopSignal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub started_at: i64,
    pub finished_at: i64,
    pub users_checked: usize,
    pub users_aborted: usize,
    pub cancelled: bool,
    pub matched: usize,
    pub obligations: usize,
    pub dispatched: usize,
    pub rejected: usize,
    pub deferred: usize,
}

#[derive(Debug)]
pub enum UseCaseError {
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for PollCycleUseCase {
    type Response = CycleSummary;

    type Error = UseCaseError;

    const NAME: &'static str = "PollCycle";

    async fn execute(&mut self, ctx: &ClasswatchContext) -> Result<Self::Response, Self::Error> {
        let started_at = ctx.sys.get_timestamp_millis();
        let users = ctx
            .repos
            .users
            .find_all()
            .await
            .map_err(|_| UseCaseError::StorageError)?;
        let window = TimeSpan::new(
            started_at,
            started_at + ctx.config.lookahead.as_millis() as i64,
        );
        let names = load_name_directory(ctx).await;
        info!("Starting poll cycle for {} users", users.len());

        let slices = users.into_iter().map(|user| {
            execute(
                CheckUserUseCase {
                    user,
                    window: window.clone(),
                    names: names.clone(),
                    stop: self.stop.clone(),
                },
                ctx,
            )
        });
        let reports = join_all(slices).await;

        let mut summary = CycleSummary {
            started_at,
            finished_at: 0,
            users_checked: 0,
            users_aborted: 0,
            cancelled: false,
            matched: 0,
            obligations: 0,
            dispatched: 0,
            rejected: 0,
            deferred: 0,
        };
        for report in reports.into_iter().filter_map(Result::ok) {
            match report.outcome {
                SliceOutcome::Completed => summary.users_checked += 1,
                SliceOutcome::Cancelled => summary.cancelled = true,
                SliceOutcome::AbortedAuth | SliceOutcome::AbortedFetch => {
                    summary.users_aborted += 1
                }
            }
            summary.matched += report.matched;
            summary.obligations += report.obligations;
            summary.dispatched += report.dispatched;
            summary.rejected += report.rejected;
            summary.deferred += report.deferred;
        }
        summary.finished_at = ctx.sys.get_timestamp_millis();

        info!(
            "Poll cycle done: {} users checked, {} aborted, {} dispatched, {} owed for next cycle",
            summary.users_checked,
            summary.users_aborted,
            summary.dispatched,
            summary.rejected + summary.deferred
        );
        Ok(summary)
    }
}

/// Display names from the cached catalog snapshots, for rendering and for
/// planning club-unrestricted fetches. Missing snapshots just mean fewer
/// resolvable names.
async fn load_name_directory(ctx: &ClasswatchContext) -> NameDirectory {
    let mut names = NameDirectory::new();
    for dimension in &CatalogDimension::ALL {
        if let Some(snapshot) = ctx.repos.catalog.find(*dimension).await {
            names.add(&snapshot);
        }
    }
    names
}
