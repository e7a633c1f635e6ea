use crate::class_instance::ClassInstance;
use crate::shared::entity::{Entity, ID};
use chrono::{Datelike, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// A single filter dimension. `Any` means the dimension is unspecified and
/// vacuously matches every value, which keeps "absent means match all"
/// explicit instead of relying on empty strings or nulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Predicate<T> {
    Any,
    Exactly(T),
    OneOf(Vec<T>),
}

impl<T: PartialEq> Predicate<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Predicate::Any => true,
            Predicate::Exactly(expected) => expected == value,
            Predicate::OneOf(expected) => expected.contains(value),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Predicate::Any)
    }
}

impl<T> Default for Predicate<T> {
    fn default() -> Self {
        Predicate::Any
    }
}

/// Wall-clock time of day with minute precision
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hours: u32,
    pub minutes: u32,
}

impl TimeOfDay {
    pub fn new(hours: u32, minutes: u32) -> Self {
        Self { hours, minutes }
    }
}

impl std::cmp::PartialOrd for TimeOfDay {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match self.hours.cmp(&other.hours) {
            std::cmp::Ordering::Equal => Some(self.minutes.cmp(&other.minutes)),
            ord => Some(ord),
        }
    }
}

impl Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hours, self.minutes)
    }
}

#[derive(Error, Debug)]
pub enum InvalidTimeOfDayError {
    #[error("Time of day: {0} is malformed, expected `HH:MM`")]
    Malformed(String),
}

impl FromStr for TimeOfDay {
    type Err = InvalidTimeOfDayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || InvalidTimeOfDayError::Malformed(s.to_string());
        let parts = s.split(':').collect::<Vec<_>>();
        if parts.len() != 2 {
            return Err(malformed());
        }
        let hours = parts[0].parse::<u32>().map_err(|_| malformed())?;
        let minutes = parts[1].parse::<u32>().map_err(|_| malformed())?;
        if hours > 23 || minutes > 59 {
            return Err(malformed());
        }
        Ok(Self { hours, minutes })
    }
}

/// Inclusive time-of-day interval, evaluated against the class start time in
/// the club's local time zone
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeOfDayRange {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeOfDayRange {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: TimeOfDay) -> bool {
        self.start <= time && time <= self.end
    }
}

/// Display names captured when the filter was created, used only for
/// rendering notifications and filter listings, never for matching
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterLabels {
    pub club: Option<String>,
    pub zone: Option<String>,
    pub class_type: Option<String>,
    pub trainer: Option<String>,
}

/// A saved search belonging to one user. A class instance satisfies the
/// filter iff every specified dimension accepts it; a user with several
/// filters is notified when any one of them matches.
///
/// Filters are created and edited by the external command interface and are
/// read-only to the monitoring core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFilter {
    pub id: ID,
    pub user_id: ID,
    pub club: Predicate<String>,
    pub zone: Predicate<String>,
    pub class_type: Predicate<String>,
    pub trainer: Predicate<String>,
    pub weekdays: Predicate<Weekday>,
    pub time_of_day: Option<TimeOfDayRange>,
    #[serde(default)]
    pub labels: FilterLabels,
}

impl UserFilter {
    pub fn new(user_id: ID) -> Self {
        Self {
            id: Default::default(),
            user_id,
            club: Predicate::Any,
            zone: Predicate::Any,
            class_type: Predicate::Any,
            trainer: Predicate::Any,
            weekdays: Predicate::Any,
            time_of_day: None,
            labels: Default::default(),
        }
    }

    /// Whether the given instance satisfies every specified dimension of
    /// this filter. A full class never matches, regardless of the other
    /// dimensions. Weekday and time-of-day are taken from the start time in
    /// the club's local zone.
    pub fn matches(&self, instance: &ClassInstance) -> bool {
        if instance.free_spots == 0 {
            return false;
        }
        if !self.club.matches(&instance.club_id) {
            return false;
        }
        if !self.zone.matches(&instance.zone_id) {
            return false;
        }
        if !self.class_type.matches(&instance.class_type_id) {
            return false;
        }
        match (&self.trainer, &instance.trainer_id) {
            (Predicate::Any, _) => {}
            (predicate, Some(trainer_id)) if predicate.matches(trainer_id) => {}
            _ => return false,
        }

        let local_start = instance.local_start();
        if !self.weekdays.matches(&local_start.weekday()) {
            return false;
        }
        if let Some(range) = &self.time_of_day {
            let start = TimeOfDay::new(local_start.hour(), local_start.minute());
            if !range.contains(start) {
                return false;
            }
        }
        true
    }

    /// The club ids this filter can possibly match, or `None` when the club
    /// dimension is unrestricted. Used to plan which clubs to fetch.
    pub fn club_ids(&self) -> Option<Vec<&str>> {
        match &self.club {
            Predicate::Any => None,
            Predicate::Exactly(club) => Some(vec![club.as_str()]),
            Predicate::OneOf(clubs) => Some(clubs.iter().map(String::as_str).collect()),
        }
    }
}

impl Entity for UserFilter {
    fn id(&self) -> &ID {
        &self.id
    }
}

/// The subset of `instances` satisfying `filter`. Pure: same inputs always
/// produce the same output, in input order.
pub fn matching_instances(instances: &[ClassInstance], filter: &UserFilter) -> Vec<ClassInstance> {
    instances
        .iter()
        .filter(|instance| filter.matches(instance))
        .cloned()
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Tz;

    fn instance_at(timezone: Tz, y: i32, m: u32, d: u32, h: u32, min: u32) -> ClassInstance {
        ClassInstance {
            external_id: "cls-1".into(),
            club_id: "7".into(),
            zone_id: "10".into(),
            class_type_id: "104".into(),
            trainer_id: Some("185".into()),
            name: "Mobility".into(),
            start_ts: timezone.ymd(y, m, d).and_hms(h, min, 0).timestamp_millis(),
            duration: 55 * 60 * 1000,
            capacity: 20,
            free_spots: 2,
            timezone,
        }
    }

    // Monday in the reference week used below
    fn monday_evening() -> ClassInstance {
        instance_at(chrono_tz::Europe::Warsaw, 2021, 6, 7, 19, 0)
    }

    #[test]
    fn unspecified_filter_matches_everything_with_free_spots() {
        let filter = UserFilter::new(ID::new());
        assert!(filter.matches(&monday_evening()));
    }

    #[test]
    fn full_class_never_matches() {
        let filter = UserFilter::new(ID::new());
        let mut instance = monday_evening();
        instance.free_spots = 0;
        assert!(!filter.matches(&instance));
    }

    #[test]
    fn matches_on_every_specified_dimension() {
        let mut filter = UserFilter::new(ID::new());
        filter.club = Predicate::Exactly("7".into());
        filter.zone = Predicate::OneOf(vec!["9".into(), "10".into()]);
        filter.class_type = Predicate::Exactly("104".into());
        filter.trainer = Predicate::Exactly("185".into());
        filter.weekdays = Predicate::OneOf(vec![Weekday::Mon, Weekday::Wed]);
        filter.time_of_day = Some(TimeOfDayRange::new(
            "18:00".parse().unwrap(),
            "20:00".parse().unwrap(),
        ));
        assert!(filter.matches(&monday_evening()));

        filter.club = Predicate::Exactly("75".into());
        assert!(!filter.matches(&monday_evening()));
    }

    #[test]
    fn specified_trainer_fails_when_instance_has_none() {
        let mut filter = UserFilter::new(ID::new());
        filter.trainer = Predicate::Exactly("185".into());
        let mut instance = monday_evening();
        instance.trainer_id = None;
        assert!(!filter.matches(&instance));

        filter.trainer = Predicate::Any;
        assert!(filter.matches(&instance));
    }

    #[test]
    fn weekday_is_evaluated_in_club_local_time() {
        // Monday 00:30 in Warsaw is still Sunday 22:30 in UTC
        let instance = instance_at(chrono_tz::Europe::Warsaw, 2021, 6, 7, 0, 30);
        let mut filter = UserFilter::new(ID::new());
        filter.weekdays = Predicate::Exactly(Weekday::Mon);
        assert!(filter.matches(&instance));

        filter.weekdays = Predicate::Exactly(Weekday::Sun);
        assert!(!filter.matches(&instance));
    }

    #[test]
    fn time_of_day_is_evaluated_in_club_local_time() {
        // 23:30 local in a zone behind UTC: the UTC timestamp is already past
        // midnight the next day, but a before-midnight filter must match
        let instance = instance_at(chrono_tz::America::Noronha, 2021, 6, 7, 23, 30);
        let mut filter = UserFilter::new(ID::new());
        filter.weekdays = Predicate::Exactly(Weekday::Mon);
        filter.time_of_day = Some(TimeOfDayRange::new(
            "18:00".parse().unwrap(),
            "23:59".parse().unwrap(),
        ));
        assert!(filter.matches(&instance));
    }

    #[test]
    fn clubs_in_different_zones_match_in_their_own_local_time() {
        let mut filter = UserFilter::new(ID::new());
        filter.time_of_day = Some(TimeOfDayRange::new(
            "19:00".parse().unwrap(),
            "19:30".parse().unwrap(),
        ));
        // Same UTC instant, different local wall clocks
        let warsaw = instance_at(chrono_tz::Europe::Warsaw, 2021, 6, 7, 19, 0);
        let mut lisbon = warsaw.clone();
        lisbon.timezone = chrono_tz::Europe::Lisbon;
        assert!(filter.matches(&warsaw));
        assert!(!filter.matches(&lisbon));
    }

    #[test]
    fn time_of_day_range_is_inclusive() {
        let range = TimeOfDayRange::new("18:00".parse().unwrap(), "20:00".parse().unwrap());
        assert!(range.contains(TimeOfDay::new(18, 0)));
        assert!(range.contains(TimeOfDay::new(20, 0)));
        assert!(!range.contains(TimeOfDay::new(20, 1)));
        assert!(!range.contains(TimeOfDay::new(17, 59)));
    }

    #[test]
    fn time_of_day_parsing() {
        assert_eq!("07:00".parse::<TimeOfDay>().unwrap(), TimeOfDay::new(7, 0));
        assert_eq!("23:59".parse::<TimeOfDay>().unwrap(), TimeOfDay::new(23, 59));
        for bad in &["24:00", "12:60", "12", "ab:cd", "12:00:00"] {
            assert!(bad.parse::<TimeOfDay>().is_err());
        }
    }

    #[test]
    fn matching_is_referentially_transparent() {
        let instances = vec![
            monday_evening(),
            instance_at(chrono_tz::Europe::Warsaw, 2021, 6, 8, 19, 0),
        ];
        let mut filter = UserFilter::new(ID::new());
        filter.weekdays = Predicate::Exactly(Weekday::Mon);

        let first = matching_instances(&instances, &filter);
        let second = matching_instances(&instances, &filter);
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].external_id, "cls-1");
    }

    #[test]
    fn club_ids_reflect_the_club_predicate() {
        let mut filter = UserFilter::new(ID::new());
        assert_eq!(filter.club_ids(), None);
        filter.club = Predicate::Exactly("7".into());
        assert_eq!(filter.club_ids(), Some(vec!["7"]));
        filter.club = Predicate::OneOf(vec!["7".into(), "75".into()]);
        assert_eq!(filter.club_ids(), Some(vec!["7", "75"]));
    }
}
