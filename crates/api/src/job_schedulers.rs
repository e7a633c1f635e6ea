use crate::monitor::{CleanupLedgerUseCase, CycleCoordinator, RefreshCatalogUseCase};
use crate::shared::usecase::execute;
use actix_web::rt::time::{interval, sleep_until, Instant};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use classwatch_infra::ClasswatchContext;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

const LEDGER_CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Seconds until the next clock minute starts, always in 1..=60
pub fn secs_to_next_minute(now_ts: i64) -> u64 {
    60 - ((now_ts / 1000) % 60) as u64
}

/// Whether a tick of the schedule falls within the clock minute containing
/// `now`
pub fn poll_due(schedule: &Schedule, now: DateTime<Utc>) -> bool {
    let minute_start = Utc.timestamp(now.timestamp() - now.timestamp() % 60, 0);
    match schedule
        .after(&(minute_start - ChronoDuration::seconds(1)))
        .next()
    {
        Some(next_tick) => next_tick <= minute_start + ChronoDuration::seconds(59),
        None => false,
    }
}

/// Wake at every minute boundary and run a cycle whenever the configured
/// cron schedule selects that minute. Overlap protection is inside the
/// coordinator: a tick landing on a running cycle is dropped.
pub fn start_poll_job(ctx: ClasswatchContext, coordinator: Arc<CycleCoordinator>) {
    actix_web::rt::spawn(async move {
        let schedule = match Schedule::from_str(&ctx.config.poll_schedule) {
            Ok(schedule) => schedule,
            Err(e) => {
                error!(
                    "Poll job cannot start, invalid schedule {}: {}",
                    ctx.config.poll_schedule, e
                );
                return;
            }
        };

        let now = ctx.sys.get_timestamp_millis();
        let start = Instant::now() + Duration::from_secs(secs_to_next_minute(now));
        sleep_until(start).await;
        let mut minutely_interval = interval(Duration::from_secs(60));
        loop {
            minutely_interval.tick().await;
            let now = Utc.timestamp_millis(ctx.sys.get_timestamp_millis());
            if !poll_due(&schedule, now) {
                continue;
            }
            let _ = coordinator.run_cycle(&ctx).await;
        }
    });
}

/// Refresh the filter catalog on its configured slow cadence. The first tick
/// fires immediately so the catalog is populated at startup.
pub fn start_catalog_refresh_job(ctx: ClasswatchContext) {
    actix_web::rt::spawn(async move {
        let mut refresh_interval = interval(ctx.config.catalog_refresh_interval);
        loop {
            refresh_interval.tick().await;
            let _ = execute(RefreshCatalogUseCase, &ctx).await;
        }
    });
}

/// Daily retention pass over the notification ledger
pub fn start_ledger_cleanup_job(ctx: ClasswatchContext) {
    actix_web::rt::spawn(async move {
        let mut cleanup_interval = interval(LEDGER_CLEANUP_INTERVAL);
        loop {
            cleanup_interval.tick().await;
            let _ = execute(CleanupLedgerUseCase, &ctx).await;
        }
    });
}
