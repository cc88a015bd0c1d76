//! One registration attempt, executed on the session-owning task.

use crate::tracker::ErrorTracker;
use snipe_browser::dom::Document;
use snipe_browser::{BrowserDriver, BrowserError};
use snipe_core::{CourseSection, RegistrarError, site};
use snipe_session::SessionManager;
use std::time::Duration;
use tracing::{error, info, warn};

/// Delay inserted after an unexplained attempt failure.
const FAULT_DAMPER: Duration = Duration::from_secs(2);

/// Result of one attempt. Anything unrecoverable surfaces as an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The seat is ours (including the idempotent already-registered case).
    Registered,
    /// Not this time; poll again next cycle.
    Failed,
}

fn browser_err(err: BrowserError) -> RegistrarError {
    RegistrarError::Browser(err.to_string())
}

/// Try to register one course. Must only be called from the task that owns
/// the session; it drives the interactive browser.
pub async fn attempt<D: BrowserDriver>(
    session: &mut SessionManager<D>,
    tracker: &ErrorTracker,
    course: &CourseSection,
    planner: bool,
) -> Result<AttemptOutcome, RegistrarError> {
    if session.ensure_valid().await.is_err() {
        error!("re-login failed; we cannot continue");
        return Err(RegistrarError::ReloginFailed);
    }

    match drive_attempt(session, tracker, course, planner).await {
        Ok(outcome) => Ok(outcome),
        Err(err @ RegistrarError::UnknownConfirmation(_)) => Err(err),
        Err(err) => recover_from_fault(session, tracker, course, err).await,
    }
}

async fn drive_attempt<D: BrowserDriver>(
    session: &mut SessionManager<D>,
    tracker: &ErrorTracker,
    course: &CourseSection,
    planner: bool,
) -> Result<AttemptOutcome, RegistrarError> {
    // The site refuses registrations that did not pass through the module
    // chooser for the right semester first.
    let wanted_key = course.semester.semester_key();
    if session.current_semester_key().await?.as_deref() != Some(wanted_key.as_str()) {
        session
            .open_registration_module(&course.semester, planner)
            .await?;
    }

    let driver = session.driver_mut();
    driver
        .goto(&site::browse_url(course, planner))
        .await
        .map_err(browser_err)?;
    let body = driver.page_source().await.map_err(browser_err)?;

    let select_value = match lookup_row(&body, course) {
        RowLookup::Missing => {
            error!(%course, "course does not exist; have you entered the correct course?");
            return Ok(AttemptOutcome::Failed);
        }
        RowLookup::Locked => {
            warn!(%course, "cannot register yet; registration is blocked (full class?)");
            tracker.reset(course);
            return Ok(AttemptOutcome::Failed);
        }
        RowLookup::Open(value) => value,
    };

    info!(%course, "registration is open! attempting to register now");
    let select_css = format!("input[name='SelectIt'][value='{select_value}']");
    match driver.click(&select_css).await {
        Ok(()) => {}
        // The control vanished between the page load and the click.
        Err(BrowserError::NoSuchElement(_)) => {
            warn!(%course, "select control disappeared before it could be clicked");
            tracker.reset(course);
            return Ok(AttemptOutcome::Failed);
        }
        Err(other) => return Err(browser_err(other)),
    }
    driver
        .click("input[type='button']")
        .await
        .map_err(browser_err)?;
    if !planner {
        // Real registrations pop a confirmation alert.
        driver.accept_alert().await.map_err(browser_err)?;
    }

    let title = driver.title().await.map_err(browser_err)?;
    if title == site::CONFIRMATION_TITLE {
        let confirmation = driver.page_source().await.map_err(browser_err)?;
        return classify_confirmation(&confirmation, tracker, course);
    }
    if title == site::ERROR_PAGE_TITLE {
        warn!(%course, "cannot register yet");
        tracker.reset(course);
        return Ok(AttemptOutcome::Failed);
    }
    if planner {
        // The planner has no confirmation page of its own.
        info!(%course, "successfully added to the planner");
        return Ok(AttemptOutcome::Registered);
    }
    Err(RegistrarError::UnknownConfirmation(Box::new(course.clone())))
}

fn classify_confirmation(
    body: &str,
    tracker: &ErrorTracker,
    course: &CourseSection,
) -> Result<AttemptOutcome, RegistrarError> {
    let doc = Document::parse(body);
    match doc.confirmation_icon().as_deref() {
        Some(site::SUCCESS_ICON) => {
            info!(%course, "successfully registered");
            Ok(AttemptOutcome::Registered)
        }
        Some(site::FAILURE_ICON) => {
            let reason = doc.confirmation_reason().unwrap_or_default();
            warn!(%course, reason, "failed to register");
            if reason == site::ALREADY_REGISTERED_REASON {
                // The seat is already ours; call it a success.
                return Ok(AttemptOutcome::Registered);
            }
            tracker.reset(course);
            Ok(AttemptOutcome::Failed)
        }
        other => {
            error!(%course, icon = ?other, "unknown registration state; this should never happen");
            Err(RegistrarError::UnknownConfirmation(Box::new(course.clone())))
        }
    }
}

enum RowLookup {
    Open(String),
    Locked,
    Missing,
}

fn lookup_row(body: &str, course: &CourseSection) -> RowLookup {
    let doc = Document::parse(body);
    let label = course.listing_label();
    match doc
        .schedule_rows()
        .into_iter()
        .find(|row| row.label == label)
    {
        Some(row) => match row.select_value {
            Some(value) => RowLookup::Open(value),
            None => RowLookup::Locked,
        },
        None => RowLookup::Missing,
    }
}

/// Mid-attempt faults: a logout is recoverable (clear the flag, re-login,
/// try again next cycle); anything else counts against the error budget.
async fn recover_from_fault<D: BrowserDriver>(
    session: &mut SessionManager<D>,
    tracker: &ErrorTracker,
    course: &CourseSection,
    fault: RegistrarError,
) -> Result<AttemptOutcome, RegistrarError> {
    let title = session.driver_mut().title().await.unwrap_or_default();
    if title == site::LOGIN_PAGE_TITLE {
        warn!(%course, "could not attempt registration because we are logged out");
        session.authenticated_flag().set(false);
        if session.ensure_valid().await.is_err() {
            error!("re-login failed; we cannot continue");
            return Err(RegistrarError::ReloginFailed);
        }
        tracker.record_fault(course);
        return Ok(AttemptOutcome::Failed);
    }

    tracker.record_fault(course);
    error!(%course, "registration attempt hit an unexpected page: {fault}");
    tokio::time::sleep(FAULT_DAMPER).await;
    Ok(AttemptOutcome::Failed)
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod action_tests;
