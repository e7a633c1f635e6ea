use super::{
    AuthError, FetchError, ICredentialSource, IUpstreamProvider, UpstreamCredentials,
    UpstreamSession,
};
use crate::retry::RetryPolicy;
use chrono::{NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use classwatch_domain::{CatalogDimension, CatalogEntry, ClassInstance, TimeSpan, User};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const LOGIN_PATH: &str = "/ClientPortal2/Auth/Login";
const DAILY_CLASSES_PATH: &str = "/ClientPortal2/Classes/ClassCalendar/DailyClasses";
const CALENDAR_FILTERS_PATH: &str = "/ClientPortal2/Classes/ClassCalendar/GetCalendarFilters";
const BOOKABLE_STATUS: &str = "Bookable";

/// Client for PerfectGym-style "ClientPortal2" portals. Sessions are cookie
/// based: the login response cookies are replayed on every later call.
pub struct PerfectGymProvider {
    base_url: String,
    timezone: Tz,
    credentials: Arc<dyn ICredentialSource>,
    retry: RetryPolicy,
    timeout: Duration,
    http: reqwest::Client,
}

impl PerfectGymProvider {
    pub fn new(
        base_url: String,
        timezone: Tz,
        credentials: Arc<dyn ICredentialSource>,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url,
            timezone,
            credentials,
            retry,
            timeout,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, retrying 5xx responses and transport timeouts per the
    /// retry policy. 4xx responses are returned to the caller untouched.
    async fn send_with_retry<F>(&self, make_request: F, context: &str) -> Result<reqwest::Response, FetchError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let sent = make_request().timeout(self.timeout).send().await;
            let retryable = match sent {
                Ok(response) if response.status().is_server_error() => {
                    format!("{} returned {}", context, response.status())
                }
                Ok(response) => return Ok(response),
                Err(err) if err.is_timeout() || err.is_connect() => {
                    format!("{} failed: {}", context, err)
                }
                Err(err) => return Err(FetchError::Transient(err.to_string())),
            };
            if self.retry.is_last(attempt) {
                return Err(FetchError::Transient(format!(
                    "{} after {} attempts",
                    retryable,
                    attempt + 1
                )));
            }
            warn!("{}, retrying", retryable);
            tokio::time::sleep(self.retry.delay_for(attempt)).await;
            attempt += 1;
        }
    }

    async fn login(&self, credentials: &UpstreamCredentials) -> Result<(String, Option<i64>), AuthError> {
        let payload = LoginRequest {
            remember_me: true,
            login: credentials.login.clone(),
            password: credentials.password.clone(),
        };
        let response = self
            .send_with_retry(|| self.http.post(self.url(LOGIN_PATH)).json(&payload), "login")
            .await
            .map_err(|e| AuthError::Transient(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let auth_token = session_cookies(&response);
                if auth_token.is_empty() {
                    return Err(AuthError::Transient(
                        "login response carried no session cookie".into(),
                    ));
                }
                let body = response
                    .json::<LoginResponse>()
                    .await
                    .map_err(|e| AuthError::Transient(e.to_string()))?;
                let home_club_id = body.user.and_then(|u| u.member).and_then(|m| m.home_club_id);
                Ok((auth_token, home_club_id))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AuthError::InvalidCredentials(credentials.login.clone()))
            }
            status => Err(AuthError::Transient(format!("login returned {}", status))),
        }
    }

    async fn daily_classes(
        &self,
        session: &UpstreamSession,
        club_id: i64,
        date: &str,
    ) -> Result<Vec<UpstreamClass>, FetchError> {
        let payload = DailyClassesRequest {
            club_id,
            date: date.to_string(),
            category_id: None,
            time_table_id: None,
            trainer_id: None,
            zone_id: None,
        };
        let response = self
            .send_with_retry(
                || {
                    self.http
                        .post(self.url(DAILY_CLASSES_PATH))
                        .header(COOKIE, &session.auth_token)
                        .json(&payload)
                },
                "daily classes",
            )
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .json::<DailyClassesResponse>()
                    .await
                    .map_err(|e| FetchError::Transient(e.to_string()))?;
                Ok(body
                    .calendar_data
                    .into_iter()
                    .flat_map(|hour| hour.classes)
                    .collect())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FetchError::AuthExpired),
            status => Err(FetchError::Transient(format!(
                "daily classes returned {}",
                status
            ))),
        }
    }

    fn normalize(&self, raw: UpstreamClass, club_id: &str) -> Option<ClassInstance> {
        let naive = NaiveDateTime::parse_from_str(&raw.start_time, "%Y-%m-%dT%H:%M:%S")
            .map_err(|e| {
                warn!(
                    "Skipping class {} with unparsable start time {}: {}",
                    raw.id, raw.start_time, e
                );
                e
            })
            .ok()?;
        let start = match self.timezone.from_local_datetime(&naive) {
            chrono::LocalResult::Single(dt) => dt,
            chrono::LocalResult::Ambiguous(dt, _) => dt,
            chrono::LocalResult::None => {
                warn!(
                    "Skipping class {} starting in a nonexistent local time: {}",
                    raw.id, raw.start_time
                );
                return None;
            }
        };
        let booking = raw.booking_indicator.unwrap_or_default();
        Some(ClassInstance {
            external_id: raw.id.to_string(),
            club_id: club_id.to_string(),
            zone_id: value_to_id(raw.zone_id.as_ref()).unwrap_or_default(),
            class_type_id: value_to_id(raw.timetable_id.as_ref()).unwrap_or_default(),
            trainer_id: value_to_id(raw.trainer_id.as_ref()),
            name: raw.name,
            start_ts: start.timestamp_millis(),
            duration: parse_iso_duration_millis(raw.duration.as_deref()),
            capacity: booking.capacity.unwrap_or(booking.available),
            free_spots: booking.available,
            timezone: self.timezone,
        })
    }
}

#[async_trait::async_trait]
impl IUpstreamProvider for PerfectGymProvider {
    async fn get_session(&self, user: &User) -> Result<UpstreamSession, AuthError> {
        let credentials = self
            .credentials
            .credentials(&user.upstream_login)
            .ok_or_else(|| AuthError::MissingCredentials(user.upstream_login.clone()))?;
        let (auth_token, home_club_id) = self.login(&credentials).await?;
        let mut session = UpstreamSession::new(user.id.clone(), &auth_token);
        session.home_club_id = home_club_id;
        Ok(session)
    }

    async fn fetch_classes(
        &self,
        session: &UpstreamSession,
        clubs: &[String],
        window: &TimeSpan,
    ) -> Result<Vec<ClassInstance>, FetchError> {
        let mut instances = Vec::new();

        for club in clubs {
            let club_id = match club.parse::<i64>() {
                Ok(id) => id,
                Err(_) => {
                    warn!("Skipping club with non-numeric id: {}", club);
                    continue;
                }
            };
            // The calendar endpoint is per day; walk the window one local
            // date at a time
            let mut date = self.timezone.timestamp_millis(window.start()).date();
            let last_date = self.timezone.timestamp_millis(window.end()).date();
            while date <= last_date {
                let raw_classes = self
                    .daily_classes(session, club_id, &date.format("%Y-%m-%d").to_string())
                    .await?;
                for raw in raw_classes {
                    if raw.status != BOOKABLE_STATUS {
                        continue;
                    }
                    if let Some(instance) = self.normalize(raw, club) {
                        if window.contains(instance.start_ts) {
                            instances.push(instance);
                        }
                    }
                }
                date = date.succ();
            }
        }

        Ok(dedup_by_natural_key(instances))
    }

    async fn fetch_catalog(
        &self,
        session: &UpstreamSession,
    ) -> Result<Vec<(CatalogDimension, Vec<CatalogEntry>)>, FetchError> {
        let payload = CalendarFiltersRequest {
            club_id: session.home_club_id,
        };
        let response = self
            .send_with_retry(
                || {
                    self.http
                        .post(self.url(CALENDAR_FILTERS_PATH))
                        .header(COOKIE, &session.auth_token)
                        .json(&payload)
                },
                "calendar filters",
            )
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .json::<CalendarFiltersResponse>()
                    .await
                    .map_err(|e| FetchError::Transient(e.to_string()))?;
                Ok(vec![
                    (CatalogDimension::Clubs, entries_of(body.club_filters)),
                    (CatalogDimension::Zones, entries_of(body.zone_filters)),
                    (
                        CatalogDimension::ClassTypes,
                        entries_of(body.time_table_filters),
                    ),
                    (CatalogDimension::Trainers, entries_of(body.trainer_filters)),
                ])
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FetchError::AuthExpired),
            status => Err(FetchError::Transient(format!(
                "calendar filters returned {}",
                status
            ))),
        }
    }
}

/// Collapse duplicate natural keys within one snapshot, first occurrence
/// winning. Duplicates are an upstream anomaly worth a log line, not an
/// error.
fn dedup_by_natural_key(instances: Vec<ClassInstance>) -> Vec<ClassInstance> {
    let mut seen: HashMap<String, ()> = HashMap::new();
    let mut deduped = Vec::with_capacity(instances.len());
    for instance in instances {
        if seen.insert(instance.external_id.clone(), ()).is_some() {
            warn!(
                "Duplicate class instance {} in one snapshot, keeping the first occurrence",
                instance.external_id
            );
            continue;
        }
        deduped.push(instance);
    }
    deduped
}

/// The session cookies of a response, rendered ready for a `Cookie` header
fn session_cookies(response: &reqwest::Response) -> String {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Upstream ids arrive as numbers or strings depending on the endpoint
fn value_to_id(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// ISO-8601 durations as the portal sends them, e.g. "PT55M" or "PT1H30M".
/// Unknown shapes resolve to zero rather than failing a whole snapshot.
fn parse_iso_duration_millis(duration: Option<&str>) -> i64 {
    let duration = match duration {
        Some(d) => d,
        None => return 0,
    };
    let mut millis = 0i64;
    let mut digits = String::new();
    for c in duration.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let n = digits.parse::<i64>().unwrap_or(0);
        digits.clear();
        match c {
            'H' => millis += n * 60 * 60 * 1000,
            'M' => millis += n * 60 * 1000,
            'S' => millis += n * 1000,
            _ => {}
        }
    }
    millis
}

fn entries_of(filters: Vec<UpstreamFilterEntry>) -> Vec<CatalogEntry> {
    filters
        .into_iter()
        .filter_map(|f| {
            let id = value_to_id(Some(&f.id))?;
            Some(CatalogEntry { id, name: f.name })
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct LoginRequest {
    remember_me: bool,
    login: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoginResponse {
    user: Option<LoginUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoginUser {
    member: Option<LoginMember>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoginMember {
    home_club_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DailyClassesRequest {
    club_id: i64,
    date: String,
    category_id: Option<String>,
    time_table_id: Option<String>,
    trainer_id: Option<String>,
    zone_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DailyClassesResponse {
    #[serde(default)]
    calendar_data: Vec<CalendarHour>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CalendarHour {
    #[serde(default)]
    classes: Vec<UpstreamClass>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UpstreamClass {
    id: i64,
    name: String,
    status: String,
    start_time: String,
    duration: Option<String>,
    #[serde(default)]
    zone_id: Option<serde_json::Value>,
    #[serde(default)]
    trainer_id: Option<serde_json::Value>,
    #[serde(default)]
    timetable_id: Option<serde_json::Value>,
    booking_indicator: Option<BookingIndicator>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BookingIndicator {
    #[serde(default)]
    available: u32,
    capacity: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CalendarFiltersRequest {
    club_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CalendarFiltersResponse {
    #[serde(default)]
    club_filters: Vec<UpstreamFilterEntry>,
    #[serde(default)]
    zone_filters: Vec<UpstreamFilterEntry>,
    #[serde(default)]
    time_table_filters: Vec<UpstreamFilterEntry>,
    #[serde(default)]
    trainer_filters: Vec<UpstreamFilterEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UpstreamFilterEntry {
    id: serde_json::Value,
    name: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn duplicate_keys_collapse_to_the_first_occurrence() {
        let timezone = chrono_tz::Europe::Warsaw;
        let instance = |external_id: &str, free_spots: u32| ClassInstance {
            external_id: external_id.into(),
            club_id: "7".into(),
            zone_id: "10".into(),
            class_type_id: "104".into(),
            trainer_id: None,
            name: "Mobility".into(),
            start_ts: timezone
                .ymd(2021, 6, 7)
                .and_hms(19, 0, 0)
                .timestamp_millis(),
            duration: 0,
            capacity: 20,
            free_spots,
            timezone,
        };

        let deduped = dedup_by_natural_key(vec![
            instance("a", 1),
            instance("b", 2),
            instance("a", 5),
        ]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].external_id, "a");
        assert_eq!(deduped[0].free_spots, 1);
        assert_eq!(deduped[1].external_id, "b");
    }

    #[test]
    fn parses_iso_durations() {
        assert_eq!(parse_iso_duration_millis(Some("PT55M")), 55 * 60 * 1000);
        assert_eq!(
            parse_iso_duration_millis(Some("PT1H30M")),
            90 * 60 * 1000
        );
        assert_eq!(parse_iso_duration_millis(Some("PT45S")), 45 * 1000);
        assert_eq!(parse_iso_duration_millis(Some("bogus")), 0);
        assert_eq!(parse_iso_duration_millis(None), 0);
    }

    #[test]
    fn ids_normalize_from_numbers_and_strings() {
        assert_eq!(
            value_to_id(Some(&serde_json::json!(185))),
            Some("185".to_string())
        );
        assert_eq!(
            value_to_id(Some(&serde_json::json!("10"))),
            Some("10".to_string())
        );
        assert_eq!(value_to_id(Some(&serde_json::json!(""))), None);
        assert_eq!(value_to_id(Some(&serde_json::json!(null))), None);
        assert_eq!(value_to_id(None), None);
    }
}
