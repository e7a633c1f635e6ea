use crate::retry::RetryPolicy;
use chrono::Utc;
use chrono_tz::Tz;
use classwatch_utils::create_random_secret;
use cron::Schedule;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_POLL_SCHEDULE: &str = "0 * * * *";

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the application to run on
    pub port: usize,
    /// Normalized (six field) cron expression selecting the clock minutes at
    /// which a poll cycle starts
    pub poll_schedule: String,
    /// How far past now each availability snapshot looks
    pub lookahead: Duration,
    /// Cadence of the catalog refresh job. Always slower than the poll
    /// cadence; stretched with a warning if configured otherwise.
    pub catalog_refresh_interval: Duration,
    /// Ledger entries whose class started longer ago than this are removed
    /// by the cleanup job
    pub ledger_retention: Duration,
    /// Per-call timeout for upstream fetches
    pub fetch_timeout: Duration,
    /// Per-call timeout for delivery webhook posts
    pub dispatch_timeout: Duration,
    pub retry: RetryPolicy,
    pub upstream_base_url: String,
    /// Zone the upstream publishes wall-clock times in
    pub upstream_timezone: Tz,
    /// Where accepted notifications are POSTed. Only required when the
    /// webhook delivery channel is constructed.
    pub delivery_webhook_url: Option<String>,
    /// Shared secret sent with every webhook post
    pub delivery_webhook_key: String,
}

impl Config {
    pub fn new() -> Self {
        let port = parse_env("PORT", 5000usize);

        let poll_schedule = std::env::var("POLL_SCHEDULE")
            .map(|expr| normalize_cron(&expr))
            .unwrap_or_else(|_| normalize_cron(DEFAULT_POLL_SCHEDULE));
        let (poll_schedule, schedule) = match Schedule::from_str(&poll_schedule) {
            Ok(schedule) => (poll_schedule, schedule),
            Err(_) => {
                warn!(
                    "The given POLL_SCHEDULE: {} is not a valid cron expression, falling back to the default schedule: {}.",
                    poll_schedule, DEFAULT_POLL_SCHEDULE
                );
                let fallback = normalize_cron(DEFAULT_POLL_SCHEDULE);
                let schedule = Schedule::from_str(&fallback)
                    .expect("Default poll schedule to be a valid cron expression");
                (fallback, schedule)
            }
        };

        let lookahead = Duration::from_secs(parse_env("LOOKAHEAD_HOURS", 48u64) * 60 * 60);
        let requested_refresh =
            Duration::from_secs(parse_env("CATALOG_REFRESH_MINUTES", 24 * 60u64) * 60);
        let poll_period = poll_period_secs(&schedule);
        let catalog_refresh_interval = bounded_catalog_refresh(requested_refresh, poll_period);
        if catalog_refresh_interval != requested_refresh {
            warn!(
                "CATALOG_REFRESH_MINUTES must be slower than the poll cadence ({}s), stretching to {}s.",
                poll_period,
                catalog_refresh_interval.as_secs()
            );
        }

        let ledger_retention =
            Duration::from_secs(parse_env("LEDGER_RETENTION_DAYS", 30u64) * 24 * 60 * 60);
        let fetch_timeout = Duration::from_secs(parse_env("FETCH_TIMEOUT_SECS", 10u64));
        let dispatch_timeout = Duration::from_secs(parse_env("DISPATCH_TIMEOUT_SECS", 10u64));
        let retry = RetryPolicy::new(
            parse_env("RETRY_MAX_ATTEMPTS", 3u32),
            Duration::from_secs(parse_env("RETRY_BASE_DELAY_SECS", 2u64)),
        );

        let upstream_base_url = std::env::var("UPSTREAM_BASE_URL")
            .unwrap_or_else(|_| "https://zdrofit.perfectgym.pl".into());
        let default_timezone = chrono_tz::Europe::Warsaw;
        let upstream_timezone = match std::env::var("UPSTREAM_TIMEZONE") {
            Ok(tz) => match tz.parse::<Tz>() {
                Ok(tz) => tz,
                Err(_) => {
                    warn!(
                        "The given UPSTREAM_TIMEZONE: {} is not a valid timezone, falling back to the default timezone: {}.",
                        tz, default_timezone
                    );
                    default_timezone
                }
            },
            Err(_) => default_timezone,
        };

        let delivery_webhook_url = std::env::var("DELIVERY_WEBHOOK_URL").ok();
        let delivery_webhook_key = match std::env::var("DELIVERY_WEBHOOK_KEY") {
            Ok(key) => key,
            Err(_) => {
                info!("Did not find DELIVERY_WEBHOOK_KEY environment variable. Going to create one.");
                let key = create_random_secret(16);
                info!(
                    "Webhook key for the delivery channel was generated and set to: {}",
                    key
                );
                key
            }
        };

        Self {
            port,
            poll_schedule,
            lookahead,
            catalog_refresh_interval,
            ledger_retention,
            fetch_timeout,
            dispatch_timeout,
            retry,
            upstream_base_url,
            upstream_timezone,
            delivery_webhook_url,
            delivery_webhook_key,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_env<T: FromStr + Display>(name: &str, default: T) -> T {
    let value = match std::env::var(name) {
        Ok(value) => value,
        Err(_) => return default,
    };
    match value.parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(
                "The given {}: {} is not valid, falling back to the default value: {}.",
                name, value, default
            );
            default
        }
    }
}

/// Normalize a 5-field cron expression to the 6-field form the `cron` crate
/// expects by prepending a seconds field. Expressions that already carry six
/// or more fields pass through untouched.
pub fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// The gap between the next two scheduled ticks, in seconds. Used as the
/// poll period when validating the catalog refresh cadence.
fn poll_period_secs(schedule: &Schedule) -> u64 {
    let mut upcoming = schedule.upcoming(Utc);
    match (upcoming.next(), upcoming.next()) {
        (Some(first), Some(second)) => (second - first).num_seconds().max(60) as u64,
        _ => 60 * 60,
    }
}

/// The catalog must refresh strictly slower than availability polls; a
/// too-fast request is stretched to twice the poll period.
fn bounded_catalog_refresh(requested: Duration, poll_period_secs: u64) -> Duration {
    if requested.as_secs() > poll_period_secs {
        requested
    } else {
        Duration::from_secs(poll_period_secs * 2)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn normalizes_five_field_cron_expressions() {
        assert_eq!(normalize_cron("0 * * * *"), "0 0 * * * *");
        assert_eq!(normalize_cron("*/15 * * * *"), "0 */15 * * * *");
        assert_eq!(normalize_cron(" 30 7 * * 1 "), "0 30 7 * * 1");
        // Already six fields: untouched
        assert_eq!(normalize_cron("0 0 * * * *"), "0 0 * * * *");
    }

    #[test]
    fn poll_period_follows_the_schedule() {
        let hourly = Schedule::from_str(&normalize_cron("0 * * * *")).unwrap();
        assert_eq!(poll_period_secs(&hourly), 60 * 60);

        let quarterly = Schedule::from_str(&normalize_cron("*/15 * * * *")).unwrap();
        assert_eq!(poll_period_secs(&quarterly), 15 * 60);
    }

    #[test]
    fn catalog_refresh_is_stretched_past_the_poll_period() {
        let poll_period = 60 * 60;
        let slow = Duration::from_secs(24 * 60 * 60);
        assert_eq!(bounded_catalog_refresh(slow, poll_period), slow);

        let too_fast = Duration::from_secs(10 * 60);
        assert_eq!(
            bounded_catalog_refresh(too_fast, poll_period),
            Duration::from_secs(2 * 60 * 60)
        );

        let equal = Duration::from_secs(poll_period);
        assert_eq!(
            bounded_catalog_refresh(equal, poll_period),
            Duration::from_secs(2 * 60 * 60)
        );
    }
}
