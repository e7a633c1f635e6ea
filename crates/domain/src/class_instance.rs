use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// One concrete, time-bound occurrence of a class at a club, normalized from
/// the upstream calendar. Instances are re-fetched fresh every poll cycle and
/// are never persisted; only their natural key survives in the notification
/// ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInstance {
    /// Stable upstream identifier. This is the natural key used for
    /// deduplication within a snapshot and in the notification ledger.
    pub external_id: String,
    pub club_id: String,
    pub zone_id: String,
    pub class_type_id: String,
    pub trainer_id: Option<String>,
    pub name: String,
    /// Start timestamp in millis since the epoch (UTC)
    pub start_ts: i64,
    /// Duration in millis
    pub duration: i64,
    pub capacity: u32,
    pub free_spots: u32,
    /// The club's local time zone. Weekday and time-of-day filters are
    /// evaluated against the start time in this zone, never in UTC.
    pub timezone: Tz,
}

impl ClassInstance {
    /// Start time expressed in the club's local time zone
    pub fn local_start(&self) -> DateTime<Tz> {
        self.timezone.timestamp_millis(self.start_ts)
    }

    pub fn end_ts(&self) -> i64 {
        self.start_ts + self.duration
    }
}
