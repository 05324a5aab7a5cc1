//! services/api/src/adapters/firefly.rs
//!
//! This module contains the adapter for the Firefly Cloud school-management API.
//! It implements the `FireflyApi` port from the `firefly_core` crate.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use firefly_core::{Event, FireflyApi, FireflyError, FireflyResult, Task};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

const TIMEOUT_SECONDS: u64 = 30;
const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_BASE_SECONDS: u64 = 2;
const TASK_PAGE_SIZE: u32 = 100;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `FireflyApi` port against a Firefly Cloud host.
///
/// Authentication is the pre-established device pairing: every request carries the
/// `ffauth_device_id` / `ffauth_secret` query pair issued during the browser handshake.
#[derive(Clone)]
pub struct FireflyClient {
    http: reqwest::Client,
    host: String,
    device_id: String,
    secret: String,
    app_id: String,
}

impl FireflyClient {
    /// Creates a new `FireflyClient` for the given host and device credentials.
    pub fn new(
        host: String,
        device_id: String,
        secret: String,
        app_id: String,
    ) -> FireflyResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECONDS))
            .build()
            .map_err(|e| FireflyError::Connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            host: host.trim_end_matches('/').to_string(),
            device_id,
            secret,
            app_id,
        })
    }

    /// Mints a device id for a fresh browser pairing handshake.
    pub fn generate_device_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Builds the browser URL a user must visit to pair a new device id with
    /// their Firefly account. Returns the URL together with the freshly minted
    /// device id the caller must keep for the token exchange.
    pub fn auth_url(&self) -> (String, String) {
        let device_id = Self::generate_device_id();
        let url = format!(
            "{}/login/api/gettoken?ffauth_device_id={}&ffauth_secret=&device_id={}&app_id={}",
            self.host,
            device_id,
            device_id,
            urlencode(&self.app_id),
        );
        (url, device_id)
    }

    /// Checks whether the stored device credentials are still accepted by the host.
    pub async fn verify_credentials(&self) -> FireflyResult<bool> {
        let url = format!("{}/Login/api/verifytoken", self.host);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("ffauth_device_id", self.device_id.as_str()),
                ("ffauth_secret", self.secret.as_str()),
            ])
            .send()
            .await
            .map_err(map_transport_error)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(false);
        }
        let body: VerifyTokenResponse = check_status(response)?
            .json()
            .await
            .map_err(|e| FireflyError::DataFormat(format!("invalid verifytoken response: {e}")))?;
        Ok(body.valid)
    }

    /// Sends a request, retrying transient connection failures with exponential backoff.
    ///
    /// Only `Connection` failures are retried; authentication, rate-limit and decode
    /// failures are reported to the caller on the first attempt.
    async fn send_with_retry<F>(&self, build: F) -> FireflyResult<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            let result = match build().send().await {
                Ok(response) => check_status(response),
                Err(e) => Err(map_transport_error(e)),
            };
            match result {
                Err(FireflyError::Connection(msg)) if attempt + 1 < MAX_RETRIES => {
                    attempt += 1;
                    let delay = RETRY_DELAY_BASE_SECONDS.pow(attempt);
                    warn!(attempt, delay_seconds = delay, error = %msg, "Firefly request failed, retrying");
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                }
                other => return other,
            }
        }
    }
}

//=========================================================================================
// `FireflyApi` Trait Implementation
//=========================================================================================

#[async_trait]
impl FireflyApi for FireflyClient {
    /// Fetches calendar events for a child over the given window.
    ///
    /// Firefly exposes the timetable anchored at a datetime with a `day` or `week`
    /// granularity; windows longer than a day use the `week` form.
    async fn fetch_events(
        &self,
        child_guid: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> FireflyResult<Vec<Event>> {
        let period = if (end - start).num_days() <= 1 { "day" } else { "week" };
        let url = format!("{}/api/v3/timetable/{}/{}", self.host, child_guid, period);
        let datetime = start.format("%Y-%m-%dT%H:%M").to_string();

        let response = self
            .send_with_retry(|| {
                self.http.get(&url).query(&[
                    ("ffauth_device_id", self.device_id.as_str()),
                    ("ffauth_secret", self.secret.as_str()),
                    ("datetime", datetime.as_str()),
                ])
            })
            .await?;

        let wire: Vec<WireEvent> = response
            .json()
            .await
            .map_err(|e| FireflyError::DataFormat(format!("invalid timetable response: {e}")))?;

        let mut events = Vec::with_capacity(wire.len());
        for item in wire {
            match item.into_event(child_guid) {
                Some(event) => events.push(event),
                None => warn!(child_guid, "dropping timetable entry with missing or inverted times"),
            }
        }
        Ok(events)
    }

    /// Fetches the task listing for a child.
    async fn fetch_tasks(&self, child_guid: &str) -> FireflyResult<Vec<Task>> {
        let url = format!(
            "{}/api/v2/taskListing/view/student/tasks/all/filterBy",
            self.host
        );
        let mut payload = json!({
            "ownerType": "OnlySetters",
            "page": 0,
            "pageSize": TASK_PAGE_SIZE,
            "archiveStatus": "All",
            "completionStatus": "All",
            "readStatus": "All",
            "markingStatus": "All",
            "sortingCriteria": [{ "column": "DueDate", "order": "Ascending" }],
        });
        if !child_guid.is_empty() {
            payload["forStudentGuid"] = json!(child_guid);
        }

        let response = self
            .send_with_retry(|| {
                self.http
                    .post(&url)
                    .query(&[
                        ("ffauth_device_id", self.device_id.as_str()),
                        ("ffauth_secret", self.secret.as_str()),
                    ])
                    .json(&payload)
            })
            .await?;

        let wire: TaskListingResponse = response
            .json()
            .await
            .map_err(|e| FireflyError::DataFormat(format!("invalid task listing response: {e}")))?;

        Ok(wire
            .items
            .into_iter()
            .map(|item| item.into_task(child_guid))
            .collect())
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn map_transport_error(e: reqwest::Error) -> FireflyError {
    if e.is_timeout() {
        FireflyError::Connection(format!("request timed out: {e}"))
    } else if e.is_connect() {
        FireflyError::Connection(format!("connection failed: {e}"))
    } else if e.is_decode() {
        FireflyError::DataFormat(format!("response decode failed: {e}"))
    } else {
        FireflyError::Connection(e.to_string())
    }
}

fn check_status(response: reqwest::Response) -> FireflyResult<reqwest::Response> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(FireflyError::Authentication(
            "device credentials rejected (HTTP 401)".to_string(),
        )),
        StatusCode::TOO_MANY_REQUESTS => Err(FireflyError::RateLimit(
            "rate limited by Firefly host (HTTP 429)".to_string(),
        )),
        status if status.is_success() => Ok(response),
        status => Err(FireflyError::Connection(format!(
            "unexpected HTTP status {status}"
        ))),
    }
}

fn urlencode(value: &str) -> String {
    value.replace(' ', "%20")
}

//=========================================================================================
// Wire Formats
//=========================================================================================

#[derive(Debug, Deserialize)]
struct VerifyTokenResponse {
    #[serde(default)]
    valid: bool,
}

/// A timetable entry as Firefly serves it. Hosts differ in which start field they
/// populate, so both spellings are accepted and all fields are optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    #[serde(default, alias = "startZoned")]
    start_utc: Option<String>,
    #[serde(default, alias = "endZoned")]
    end_utc: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl WireEvent {
    /// Converts a wire entry into a domain event, or `None` when the times are
    /// missing, unparseable, or inverted.
    fn into_event(self, child_guid: &str) -> Option<Event> {
        let start = parse_instant(self.start_utc.as_deref()?)?;
        let end = parse_instant(self.end_utc.as_deref()?)?;
        if start >= end {
            return None;
        }
        Some(Event {
            start,
            end,
            subject: self
                .subject
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "Unknown Subject".to_string()),
            location: self.location.filter(|s| !s.is_empty()),
            description: self.description.filter(|s| !s.is_empty()),
            child_guid: child_guid.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TaskListingResponse {
    #[serde(default)]
    items: Vec<WireTask>,
}

/// A task as the listing endpoint serves it. Parsing is deliberately lenient:
/// a malformed date becomes `None` rather than failing the whole listing, and
/// subject/setter may arrive as either an object or a bare string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTask {
    #[serde(default)]
    guid: Option<String>,
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    set_date: Option<String>,
    #[serde(default)]
    subject: Option<NamedField>,
    #[serde(default)]
    task_type: Option<String>,
    #[serde(default)]
    completion_status: Option<String>,
    #[serde(default)]
    setter: Option<NamedField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NamedField {
    Object {
        #[serde(default)]
        name: Option<String>,
    },
    Text(String),
}

impl NamedField {
    fn into_name(self) -> Option<String> {
        match self {
            NamedField::Object { name } => name,
            NamedField::Text(text) => Some(text),
        }
    }
}

impl WireTask {
    fn into_task(self, child_guid: &str) -> Task {
        let id = self
            .guid
            .or_else(|| match self.id {
                Some(serde_json::Value::String(s)) => Some(s),
                Some(serde_json::Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| "unknown".to_string());
        let completed = self
            .completion_status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("Done") || s.eq_ignore_ascii_case("Completed"))
            .unwrap_or(false);
        Task {
            id,
            title: self.title.unwrap_or_else(|| "Untitled Task".to_string()),
            description: self.description.unwrap_or_default(),
            due: self.due_date.as_deref().and_then(parse_instant),
            set: self.set_date.as_deref().and_then(parse_instant),
            subject: self
                .subject
                .and_then(NamedField::into_name)
                .unwrap_or_else(|| "General".to_string()),
            task_type: self.task_type,
            setter: self
                .setter
                .and_then(NamedField::into_name)
                .unwrap_or_default(),
            child_guid: child_guid.to_string(),
            completed,
        }
    }
}

/// Parses the date formats Firefly hosts emit: RFC 3339, a bare local datetime
/// (taken as UTC), or a bare date (taken as UTC midnight).
fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn wire_event_parses_rfc3339_times() {
        let wire: WireEvent = serde_json::from_str(
            r#"{
                "startUtc": "2024-03-04T09:00:00Z",
                "endUtc": "2024-03-04T10:05:00Z",
                "subject": "Maths",
                "location": "Room 12"
            }"#,
        )
        .unwrap();
        let event = wire.into_event("child-1").unwrap();
        assert_eq!(event.start, Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap());
        assert_eq!(event.subject, "Maths");
        assert_eq!(event.location.as_deref(), Some("Room 12"));
        assert_eq!(event.child_guid, "child-1");
    }

    #[test]
    fn wire_event_accepts_zoned_field_names() {
        let wire: WireEvent = serde_json::from_str(
            r#"{
                "startZoned": "2024-03-04T09:00:00",
                "endZoned": "2024-03-04T10:00:00"
            }"#,
        )
        .unwrap();
        let event = wire.into_event("c").unwrap();
        assert_eq!(event.subject, "Unknown Subject");
        assert_eq!(event.end - event.start, chrono::Duration::hours(1));
    }

    #[test]
    fn wire_event_with_inverted_times_is_dropped() {
        let wire: WireEvent = serde_json::from_str(
            r#"{
                "startUtc": "2024-03-04T11:00:00Z",
                "endUtc": "2024-03-04T09:00:00Z",
                "subject": "Backwards"
            }"#,
        )
        .unwrap();
        assert!(wire.into_event("c").is_none());
    }

    #[test]
    fn wire_event_with_unparseable_start_is_dropped() {
        let wire: WireEvent = serde_json::from_str(
            r#"{ "startUtc": "not a date", "endUtc": "2024-03-04T09:00:00Z" }"#,
        )
        .unwrap();
        assert!(wire.into_event("c").is_none());
    }

    #[test]
    fn wire_task_parses_object_subject_and_setter() {
        let wire: WireTask = serde_json::from_str(
            r#"{
                "guid": "t-1",
                "title": "Algebra worksheet",
                "dueDate": "2024-03-08",
                "subject": { "name": "Maths" },
                "setter": { "name": "Mr Jones" },
                "completionStatus": "Todo"
            }"#,
        )
        .unwrap();
        let task = wire.into_task("child-1");
        assert_eq!(task.id, "t-1");
        assert_eq!(task.subject, "Maths");
        assert_eq!(task.setter, "Mr Jones");
        assert_eq!(
            task.due,
            Some(Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap())
        );
        assert!(!task.completed);
    }

    #[test]
    fn wire_task_accepts_string_subject_and_numeric_id() {
        let wire: WireTask = serde_json::from_str(
            r#"{ "id": 4712, "title": "Read chapter 3", "subject": "English" }"#,
        )
        .unwrap();
        let task = wire.into_task("c");
        assert_eq!(task.id, "4712");
        assert_eq!(task.subject, "English");
        assert!(task.due.is_none());
    }

    #[test]
    fn wire_task_with_bad_due_date_keeps_task_without_due() {
        let wire: WireTask = serde_json::from_str(
            r#"{ "guid": "t-2", "title": "Essay", "dueDate": "soonish" }"#,
        )
        .unwrap();
        let task = wire.into_task("c");
        assert_eq!(task.id, "t-2");
        assert!(task.due.is_none());
    }

    #[test]
    fn completion_status_mapping_is_case_insensitive() {
        for status in ["Done", "done", "COMPLETED", "Completed"] {
            let wire: WireTask = serde_json::from_str(&format!(
                r#"{{ "guid": "t", "title": "x", "completionStatus": "{status}" }}"#
            ))
            .unwrap();
            assert!(wire.into_task("c").completed, "status {status}");
        }
        let wire: WireTask =
            serde_json::from_str(r#"{ "guid": "t", "title": "x", "completionStatus": "Todo" }"#)
                .unwrap();
        assert!(!wire.into_task("c").completed);
    }

    #[test]
    fn task_listing_tolerates_missing_items() {
        let listing: TaskListingResponse = serde_json::from_str("{}").unwrap();
        assert!(listing.items.is_empty());
    }

    #[test]
    fn parse_instant_handles_all_shapes() {
        assert!(parse_instant("2024-03-04T09:00:00Z").is_some());
        assert!(parse_instant("2024-03-04T09:00:00+01:00").is_some());
        assert!(parse_instant("2024-03-04T09:00:00").is_some());
        assert!(parse_instant("2024-03-04").is_some());
        assert!(parse_instant("").is_none());
    }
}
