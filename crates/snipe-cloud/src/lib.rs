//! Backend boundary: membership tiers feeding the rate caps, and
//! fire-and-forget lifecycle events.
//!
//! The scheduler consumes exactly two integers from this crate (the rate
//! caps) and emits one event per successful registration plus run start/end
//! notices. Event delivery is best-effort; a dead backend never blocks or
//! fails a run.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use snipe_core::CourseSection;
use snipe_scheduler::{RateCaps, StatsSummary};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Subscription tier. Decides how hard the site may be polled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipLevel {
    #[default]
    Free,
    Full,
}

impl MembershipLevel {
    pub fn rate_caps(self) -> RateCaps {
        match self {
            Self::Free => RateCaps::new(6, 6),
            Self::Full => RateCaps::new(30, 99),
        }
    }
}

impl FromStr for MembershipLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "full" | "premium" => Ok(Self::Full),
            other => Err(format!("'{other}' is not a membership level")),
        }
    }
}

/// How a run ended, as reported to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
    Interrupted,
}

/// Final report attached to the termination event.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub reason: String,
    pub registered: u32,
    pub remaining: u32,
    #[serde(flatten)]
    pub timings: StatsSummary,
}

/// Fire-and-forget event client.
pub struct CloudClient {
    client: reqwest::Client,
    base_url: String,
    license_key: String,
    run_id: String,
    enabled: bool,
}

impl CloudClient {
    pub fn new(base_url: impl Into<String>, license_key: impl Into<String>, enabled: bool) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            license_key: license_key.into(),
            run_id: format!("run-{}", Utc::now().timestamp_millis()),
            enabled,
        }
    }

    /// Disabled client that drops every event.
    pub fn disabled() -> Self {
        Self::new("", "", false)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub async fn send_run_started(&self, targets: &[CourseSection], planner: bool) {
        self.post(
            "events/run-started",
            json!({
                "targets": targets.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "planner": planner,
            }),
        )
        .await;
    }

    pub async fn send_course_registered(&self, course: &CourseSection, planner: bool) {
        self.post(
            "events/course-registered",
            json!({
                "course": course.to_string(),
                "semester_key": course.semester.semester_key(),
                "planner": planner,
            }),
        )
        .await;
    }

    pub async fn send_run_terminated(&self, report: &RunReport) {
        self.post(
            "events/run-terminated",
            serde_json::to_value(report).unwrap_or_default(),
        )
        .await;
    }

    async fn post(&self, path: &str, mut body: serde_json::Value) {
        if !self.enabled {
            return;
        }
        if let Some(object) = body.as_object_mut() {
            object.insert("license_key".into(), json!(self.license_key));
            object.insert("run_id".into(), json!(self.run_id));
            object.insert("at".into(), json!(Utc::now().to_rfc3339()));
        }
        let url = format!("{}/{path}", self.base_url.trim_end_matches('/'));
        match self.client.post(&url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(%url, "event delivered");
            }
            Ok(response) => {
                warn!(%url, status = %response.status(), "event rejected by the backend");
            }
            Err(err) => {
                warn!(%url, "event delivery failed: {err}");
            }
        }
    }
}
