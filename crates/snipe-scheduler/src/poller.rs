//! Concurrent availability checks.
//!
//! A check is one stateless GET of the course's schedule listing using the
//! session's captured cookies, classified into open/closed/fault. Checks
//! never mutate shared session state except for clearing the authenticated
//! flag when the site answers with a login page.

use crate::tracker::ErrorTracker;
use async_trait::async_trait;
use snipe_browser::dom::Document;
use snipe_browser::{Cookie, PageFetcher};
use snipe_core::{CourseSection, SharedFlag, site};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Delay inserted after a fault so a struggling upstream is not hammered.
const FAULT_DAMPER: Duration = Duration::from_secs(2);

/// Availability of one course section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeatStatus {
    /// The listing carries an active select control; registration can be
    /// attempted right now.
    Open,
    /// Listed without a select control, or intentionally tolerated absence.
    Closed,
    /// Unexpected page, transport failure, or unexplained absence.
    Fault,
}

/// Classification policy knobs.
#[derive(Clone, Copy, Debug, Default)]
pub struct PollPolicy {
    pub planner: bool,
    /// Treat a section missing from its listing as closed instead of as a
    /// fault. Off by default so target-list typos trip the breaker.
    pub ignore_missing_sections: bool,
}

/// Availability lookup, shared across pool workers.
#[async_trait]
pub trait SeatProbe: Send + Sync {
    async fn check(&self, course: &CourseSection) -> SeatStatus;

    /// Replace captured auth cookies after a (re)login. No-op by default.
    fn refresh_cookies(&self, _cookies: &[Cookie]) {}
}

/// Production probe over the live listing.
pub struct ListingProbe<F: PageFetcher> {
    fetcher: F,
    authenticated: SharedFlag,
    policy: PollPolicy,
}

impl<F: PageFetcher> ListingProbe<F> {
    pub fn new(fetcher: F, authenticated: SharedFlag, policy: PollPolicy) -> Self {
        Self {
            fetcher,
            authenticated,
            policy,
        }
    }
}

#[async_trait]
impl<F: PageFetcher> SeatProbe for ListingProbe<F> {
    async fn check(&self, course: &CourseSection) -> SeatStatus {
        let params = site::browse_params(course, self.policy.planner);
        let body = match self.fetcher.fetch(&params).await {
            Ok(body) => body,
            Err(err) => {
                error!(%course, "availability check failed: {err}");
                tokio::time::sleep(FAULT_DAMPER).await;
                return SeatStatus::Fault;
            }
        };

        match classify_listing(&body, course, self.policy.ignore_missing_sections) {
            Classification::Open => SeatStatus::Open,
            Classification::Closed => SeatStatus::Closed,
            Classification::AuthLost => {
                // Expected from time to time; the owning task re-logs-in on
                // the next validity check. Not a fault of this course.
                warn!(%course, "availability check hit the login page; session is stale");
                self.authenticated.set(false);
                SeatStatus::Closed
            }
            Classification::Missing { tolerated: true } => {
                debug!(%course, "section not in the listing (yet?)");
                SeatStatus::Closed
            }
            Classification::Missing { tolerated: false } => {
                warn!(%course, "section not in the listing; is the target list correct?");
                SeatStatus::Fault
            }
            Classification::Malformed { title } => {
                error!(%course, title, "unexpected page instead of the schedule listing");
                tokio::time::sleep(FAULT_DAMPER).await;
                SeatStatus::Fault
            }
        }
    }

    fn refresh_cookies(&self, cookies: &[Cookie]) {
        self.fetcher.refresh_cookies(cookies);
    }
}

enum Classification {
    Open,
    Closed,
    AuthLost,
    Missing { tolerated: bool },
    Malformed { title: String },
}

/// Pure classification of a fetched listing body.
fn classify_listing(body: &str, course: &CourseSection, ignore_missing: bool) -> Classification {
    let doc = Document::parse(body);
    let title = doc.title().unwrap_or_default();

    if title == site::LOGIN_PAGE_TITLE || title == site::SECURITY_ERROR_TITLE {
        return Classification::AuthLost;
    }
    if title != site::LISTING_TITLE {
        return Classification::Malformed { title };
    }

    let rows = doc.schedule_rows();
    if rows.is_empty() {
        // A well-formed listing always has rows; treat as a bad page.
        return Classification::Malformed { title };
    }

    let label = course.listing_label();
    match rows.iter().find(|row| row.label == label) {
        Some(row) if row.select_value.is_some() => Classification::Open,
        Some(_) => Classification::Closed,
        None => Classification::Missing {
            tolerated: ignore_missing,
        },
    }
}

/// Feed a batch of outcomes into the failure tracker and return the courses
/// that can be attempted right now, preserving input order.
pub fn collect_registrable(
    tracker: &ErrorTracker,
    outcomes: &[(CourseSection, SeatStatus)],
) -> Vec<CourseSection> {
    let mut open = Vec::new();
    for (course, status) in outcomes {
        tracker.record_outcome(course, *status);
        if *status == SeatStatus::Open {
            open.push(course.clone());
        }
    }
    open
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod poller_tests;
