//! The poll-commit-sleep loop.
//!
//! One cycle fans availability checks out over a bounded worker pool, waits
//! for the whole batch, then serially attempts registration for everything
//! found open, all while honoring the rate budget and the failure breakers.

use crate::action::{self, AttemptOutcome};
use crate::poller::{SeatProbe, SeatStatus, collect_registrable};
use crate::rate::{RateCaps, cycle_floor, effective_rate};
use crate::stats::CycleStats;
use crate::tracker::{AbortSignal, ErrorTracker};
use async_trait::async_trait;
use snipe_browser::{BrowserDriver, Cookie};
use snipe_core::{CourseSection, RegistrarError};
use snipe_session::SessionManager;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Fixed worker-pool width for availability checks.
const POLL_WORKERS: usize = 4;

/// Gap between poll submissions, to avoid bursty request patterns.
const POLL_STAGGER: Duration = Duration::from_millis(300);

/// Knobs for one run of the cycle loop.
#[derive(Clone, Copy, Debug)]
pub struct CycleOptions {
    pub caps: RateCaps,
    pub keep_trying: bool,
    pub planner: bool,
    pub workers: usize,
    pub poll_stagger: Duration,
}

impl CycleOptions {
    pub fn new(caps: RateCaps, keep_trying: bool, planner: bool) -> Self {
        Self {
            caps,
            keep_trying,
            planner,
            workers: POLL_WORKERS,
            poll_stagger: POLL_STAGGER,
        }
    }
}

/// The serialized commit side of the cycle. Exactly one exists per run; it
/// wraps whatever owns the interactive session.
#[async_trait]
pub trait Committer: Send {
    async fn ensure_valid(&mut self) -> Result<(), RegistrarError>;

    async fn attempt(&mut self, course: &CourseSection)
    -> Result<AttemptOutcome, RegistrarError>;

    /// Snapshot of the session cookies, for refreshing the pool readers.
    async fn cookies(&self) -> Vec<Cookie>;
}

/// Production committer over the owning session.
pub struct SessionCommitter<D: BrowserDriver> {
    session: SessionManager<D>,
    tracker: Arc<ErrorTracker>,
    planner: bool,
}

impl<D: BrowserDriver> SessionCommitter<D> {
    pub fn new(session: SessionManager<D>, tracker: Arc<ErrorTracker>, planner: bool) -> Self {
        Self {
            session,
            tracker,
            planner,
        }
    }

    pub fn session_mut(&mut self) -> &mut SessionManager<D> {
        &mut self.session
    }

    pub fn into_session(self) -> SessionManager<D> {
        self.session
    }
}

#[async_trait]
impl<D: BrowserDriver + Sync> Committer for SessionCommitter<D> {
    async fn ensure_valid(&mut self) -> Result<(), RegistrarError> {
        self.session.ensure_valid().await
    }

    async fn attempt(
        &mut self,
        course: &CourseSection,
    ) -> Result<AttemptOutcome, RegistrarError> {
        action::attempt(&mut self.session, &self.tracker, course, self.planner).await
    }

    async fn cookies(&self) -> Vec<Cookie> {
        self.session.cookies().await.unwrap_or_default()
    }
}

/// The scheduling loop over a target set.
pub struct RegistrationCycle<C: Committer> {
    committer: C,
    probe: Arc<dyn SeatProbe>,
    tracker: Arc<ErrorTracker>,
    options: CycleOptions,
    remaining: Vec<CourseSection>,
    registered: Vec<CourseSection>,
    stats: CycleStats,
    on_registered: Option<UnboundedSender<CourseSection>>,
}

impl<C: Committer> RegistrationCycle<C> {
    pub fn new(
        committer: C,
        probe: Arc<dyn SeatProbe>,
        tracker: Arc<ErrorTracker>,
        targets: Vec<CourseSection>,
        options: CycleOptions,
    ) -> Self {
        let mut remaining = targets;
        // Chronological semester order; insertion order within a semester.
        remaining.sort_by_key(|course| course.semester.sort_key());
        Self {
            committer,
            probe,
            tracker,
            options,
            remaining,
            registered: Vec::new(),
            stats: CycleStats::default(),
            on_registered: None,
        }
    }

    /// Send every successfully registered course to this channel as it
    /// happens (used for backend notifications).
    pub fn with_registration_notifier(mut self, sender: UnboundedSender<CourseSection>) -> Self {
        self.on_registered = Some(sender);
        self
    }

    pub fn remaining(&self) -> &[CourseSection] {
        &self.remaining
    }

    pub fn registered(&self) -> &[CourseSection] {
        &self.registered
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn into_committer(self) -> C {
        self.committer
    }

    /// Run cycles until the target set drains or a fatal condition stops
    /// the run.
    pub async fn run(&mut self) -> Result<(), RegistrarError> {
        let run_started = Instant::now();
        let total = self.remaining.len() + self.registered.len();

        while !self.remaining.is_empty() {
            let cycle_started = Instant::now();
            // Computed up front so mid-cycle removals do not change the
            // pacing of this cycle.
            let floor = cycle_floor(self.remaining.len(), self.options.caps);

            if let Err(err) = self.committer.ensure_valid().await {
                error!("re-login failed; we cannot continue: {err}");
                return Err(err);
            }
            self.probe.refresh_cookies(&self.committer.cookies().await);

            let outcomes = self.poll_remaining().await;

            // A poll may have invalidated the session.
            if let Err(err) = self.committer.ensure_valid().await {
                error!("re-login failed; we cannot continue: {err}");
                return Err(err);
            }

            let registrable = collect_registrable(&self.tracker, &outcomes);
            if registrable.is_empty() {
                info!("found no registrable courses");
            } else {
                info!(count = registrable.len(), "found registrable course(s)!");
            }

            for course in registrable {
                info!(%course, "attempting to register");
                match self.committer.attempt(&course).await {
                    Ok(AttemptOutcome::Registered) => {
                        self.remaining.retain(|c| c != &course);
                        self.registered.push(course.clone());
                        if let Some(sender) = &self.on_registered {
                            let _ = sender.send(course);
                        }
                    }
                    Ok(AttemptOutcome::Failed) => {}
                    Err(err) => {
                        error!("irrecoverable error during registration; exiting");
                        return Err(err);
                    }
                }
            }

            if let Some(signal) = self.tracker.should_abort(self.options.keep_trying) {
                match signal {
                    AbortSignal::Abort => {
                        error!("consecutive failures reached the threshold; we can no longer continue");
                        return Err(RegistrarError::ErrorBudgetExhausted {
                            count: self.tracker.global_count(),
                        });
                    }
                    AbortSignal::SleepFor(penalty) => {
                        warn!(
                            seconds = penalty.as_secs(),
                            "consecutive failures reached a critical threshold; backing off"
                        );
                        tokio::time::sleep(penalty).await;
                        info!("awake again; resuming requests");
                    }
                }
            }
            if self
                .tracker
                .all_exhausted(&self.remaining, self.options.keep_trying)
            {
                error!("every remaining course exceeded its failure threshold; we can no longer continue");
                return Err(RegistrarError::AllCoursesExhausted);
            }

            let elapsed = cycle_started.elapsed();
            let to_sleep = floor.saturating_sub(elapsed);
            self.stats.record(elapsed, to_sleep);
            self.log_progress(run_started, total, elapsed, to_sleep);
            if !self.remaining.is_empty() && !to_sleep.is_zero() {
                tokio::time::sleep(to_sleep).await;
            }
        }

        info!("all target courses registered");
        Ok(())
    }

    /// Fan the availability checks out and wait for the whole batch.
    async fn poll_remaining(&self) -> Vec<(CourseSection, SeatStatus)> {
        let slots = Arc::new(Semaphore::new(self.options.workers));
        let mut join_set = JoinSet::new();

        for (index, course) in self.remaining.iter().enumerate() {
            if self
                .tracker
                .should_skip(course, self.options.keep_trying)
            {
                warn!(%course, "skipping course lookup after too many consecutive failures");
                continue;
            }
            let probe = Arc::clone(&self.probe);
            let slots = Arc::clone(&slots);
            let course = course.clone();
            join_set.spawn(async move {
                let _permit = slots.acquire_owned().await.expect("semaphore closed");
                let status = probe.check(&course).await;
                (index, course, status)
            });
            tokio::time::sleep(self.options.poll_stagger).await;
        }

        let mut indexed = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => indexed.push(outcome),
                Err(err) => error!("poll task join error: {err}"),
            }
        }
        indexed.sort_by_key(|(index, _, _)| *index);
        indexed
            .into_iter()
            .map(|(_, course, status)| (course, status))
            .collect()
    }

    fn log_progress(
        &self,
        run_started: Instant,
        total: usize,
        elapsed: Duration,
        slept: Duration,
    ) {
        info!("----------------------------------");
        info!(
            "Running time: {:.2} hours",
            run_started.elapsed().as_secs_f64() / 3600.0
        );
        info!(
            "Registration mode: {}",
            if self.options.planner { "PLANNER" } else { "REAL" }
        );
        info!(
            "Course status: {}/{} courses registered",
            self.registered.len(),
            total
        );
        info!("  Unregistered:");
        for course in &self.remaining {
            info!("   - {course}");
        }
        if self.registered.is_empty() {
            info!("  Registered: none");
        } else {
            info!("  Registered:");
            for course in &self.registered {
                info!("   - {course}");
            }
        }
        let cycle_secs = (elapsed + slept).as_secs_f64();
        if cycle_secs > 0.0 {
            info!(
                "Request rate: {:.1} req/min (budget {}/min)",
                60.0 * self.remaining.len() as f64 / cycle_secs,
                effective_rate(self.remaining.len(), self.options.caps),
            );
        }
        if let (Some(mean_cycle), Some(mean_sleep)) = (
            self.stats.cycle_window().mean(),
            self.stats.sleep_window().mean(),
        ) {
            debug!(
                "Cycle time {:.3}s (avg {:.3}s over {}), sleep {:.3}s (avg {:.3}s)",
                elapsed.as_secs_f64(),
                mean_cycle,
                self.stats.cycle_window().len(),
                slept.as_secs_f64(),
                mean_sleep,
            );
        }
        info!("----------------------------------");
    }
}

#[cfg(test)]
#[path = "cycle_tests.rs"]
mod cycle_tests;
