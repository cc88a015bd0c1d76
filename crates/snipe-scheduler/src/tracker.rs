//! Consecutive-failure accounting and circuit breaking.
//!
//! One lock guards both the per-course map and the global counter so that
//! increment-and-compare stays consistent when poll workers report
//! concurrently.

use crate::poller::SeatStatus;
use snipe_core::CourseSection;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Consecutive faults tolerated for a single course before it is skipped.
pub const PER_COURSE_RETRY_LIMIT: u32 = 12;

/// Consecutive faults tolerated across all courses before the run aborts
/// (or backs off, with `keep_trying`). Should stay at least one above the
/// poll worker count so one bad cycle cannot trip it on its own.
pub const TOTAL_RETRY_LIMIT: u32 = 9;

/// Ceiling on the keep-trying backoff penalty.
const BACKOFF_CAP: Duration = Duration::from_secs(600);

/// What the cycle should do about the global failure budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortSignal {
    /// Stop the run with an error.
    Abort,
    /// Sleep this long, then continue polling.
    SleepFor(Duration),
}

#[derive(Default)]
struct TrackerState {
    per_course: HashMap<CourseSection, u32>,
    global: u32,
}

/// Shared failure counters. Cheap to share behind an `Arc`.
#[derive(Default)]
pub struct ErrorTracker {
    state: Mutex<TrackerState>,
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one availability outcome: faults increment both counters, any
    /// clean result resets them.
    pub fn record_outcome(&self, course: &CourseSection, outcome: SeatStatus) {
        match outcome {
            SeatStatus::Fault => self.record_fault(course),
            SeatStatus::Open | SeatStatus::Closed => self.reset(course),
        }
    }

    pub fn record_fault(&self, course: &CourseSection) {
        let mut state = self.state.lock().expect("tracker lock poisoned");
        let count = state.per_course.entry(course.clone()).or_insert(0);
        *count += 1;
        let count = *count;
        state.global += 1;
        debug!(
            %course,
            course_errors = format!("{count}/{PER_COURSE_RETRY_LIMIT}"),
            global_errors = format!("{}/{TOTAL_RETRY_LIMIT}", state.global),
            "consecutive error counters incremented"
        );
    }

    /// Reset the course's counter, and the global counter if it moved.
    pub fn reset(&self, course: &CourseSection) {
        let mut state = self.state.lock().expect("tracker lock poisoned");
        if state.global > 0 {
            debug!(from = state.global, "global error counter reset");
            state.global = 0;
        }
        if let Some(count) = state.per_course.get_mut(course) {
            if *count != 0 {
                debug!(%course, from = *count, "course error counter reset");
                *count = 0;
            }
        }
    }

    pub fn course_count(&self, course: &CourseSection) -> u32 {
        let state = self.state.lock().expect("tracker lock poisoned");
        state.per_course.get(course).copied().unwrap_or(0)
    }

    pub fn global_count(&self) -> u32 {
        self.state.lock().expect("tracker lock poisoned").global
    }

    /// Whether the course should be left out of poll batches.
    pub fn should_skip(&self, course: &CourseSection, keep_trying: bool) -> bool {
        !keep_trying && self.course_count(course) > PER_COURSE_RETRY_LIMIT
    }

    /// Consult the global failure budget. `None` while under the ceiling.
    ///
    /// Past it, `keep_trying` converts the hard abort into an exponential
    /// sleep penalty: 2^(count/ceiling) seconds, capped at ten minutes.
    pub fn should_abort(&self, keep_trying: bool) -> Option<AbortSignal> {
        let global = self.global_count();
        if global <= TOTAL_RETRY_LIMIT {
            return None;
        }
        if !keep_trying {
            return Some(AbortSignal::Abort);
        }
        let exponent = f64::from(global) / f64::from(TOTAL_RETRY_LIMIT);
        let penalty = Duration::from_secs_f64(2f64.powf(exponent)).min(BACKOFF_CAP);
        Some(AbortSignal::SleepFor(penalty))
    }

    /// Degenerate terminal condition: every remaining course is past its
    /// ceiling and retries are not forced.
    pub fn all_exhausted(&self, remaining: &[CourseSection], keep_trying: bool) -> bool {
        if keep_trying || remaining.is_empty() {
            return false;
        }
        let state = self.state.lock().expect("tracker lock poisoned");
        remaining.iter().all(|course| {
            state.per_course.get(course).copied().unwrap_or(0) > PER_COURSE_RETRY_LIMIT
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snipe_core::{Season, Semester};
    use std::sync::Arc;
    use std::thread;

    fn course(code: &str) -> CourseSection {
        CourseSection::new(Semester::new(Season::Fall, 2025), "CAS", "CS", code, "A1")
    }

    #[test]
    fn test_concurrent_faults_are_not_lost() {
        let tracker = Arc::new(ErrorTracker::new());
        let target = course("585");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                let target = target.clone();
                thread::spawn(move || tracker.record_fault(&target))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.course_count(&target), 8);
        assert_eq!(tracker.global_count(), 8);
    }

    #[test]
    fn test_clean_outcome_resets_both_counters() {
        let tracker = ErrorTracker::new();
        let a = course("585");
        let b = course("460");
        tracker.record_fault(&a);
        tracker.record_fault(&b);
        assert_eq!(tracker.global_count(), 2);

        tracker.record_outcome(&a, SeatStatus::Closed);
        assert_eq!(tracker.course_count(&a), 0);
        assert_eq!(tracker.global_count(), 0);
        // The other course's own counter is untouched.
        assert_eq!(tracker.course_count(&b), 1);

        tracker.record_outcome(&b, SeatStatus::Open);
        assert_eq!(tracker.course_count(&b), 0);
    }

    #[test]
    fn test_should_skip_past_the_course_ceiling() {
        let tracker = ErrorTracker::new();
        let target = course("585");
        for _ in 0..PER_COURSE_RETRY_LIMIT {
            tracker.record_fault(&target);
        }
        assert!(!tracker.should_skip(&target, false));
        tracker.record_fault(&target);
        assert!(tracker.should_skip(&target, false));
        // keep_trying overrides the breaker.
        assert!(!tracker.should_skip(&target, true));
    }

    #[test]
    fn test_should_abort_under_the_ceiling_is_none() {
        let tracker = ErrorTracker::new();
        let target = course("585");
        for _ in 0..TOTAL_RETRY_LIMIT {
            tracker.record_fault(&target);
        }
        assert_eq!(tracker.should_abort(false), None);
        assert_eq!(tracker.should_abort(true), None);
    }

    #[test]
    fn test_should_abort_hard_without_keep_trying() {
        let tracker = ErrorTracker::new();
        let target = course("585");
        for _ in 0..=TOTAL_RETRY_LIMIT {
            tracker.record_fault(&target);
        }
        assert_eq!(tracker.should_abort(false), Some(AbortSignal::Abort));
    }

    #[test]
    fn test_backoff_penalty_at_twice_the_ceiling() {
        let tracker = ErrorTracker::new();
        let target = course("585");
        for _ in 0..TOTAL_RETRY_LIMIT * 2 {
            tracker.record_fault(&target);
        }
        // 2^(18/9) = 4 seconds, well under the cap.
        assert_eq!(
            tracker.should_abort(true),
            Some(AbortSignal::SleepFor(Duration::from_secs(4)))
        );
    }

    #[test]
    fn test_backoff_penalty_is_capped_at_ten_minutes() {
        let tracker = ErrorTracker::new();
        let target = course("585");
        for _ in 0..TOTAL_RETRY_LIMIT * 12 {
            tracker.record_fault(&target);
        }
        assert_eq!(
            tracker.should_abort(true),
            Some(AbortSignal::SleepFor(Duration::from_secs(600)))
        );
    }

    #[test]
    fn test_all_exhausted() {
        let tracker = ErrorTracker::new();
        let a = course("585");
        let b = course("460");
        for _ in 0..=PER_COURSE_RETRY_LIMIT {
            tracker.record_fault(&a);
        }
        assert!(!tracker.all_exhausted(&[a.clone(), b.clone()], false));
        for _ in 0..=PER_COURSE_RETRY_LIMIT {
            tracker.record_fault(&b);
        }
        assert!(tracker.all_exhausted(&[a.clone(), b.clone()], false));
        assert!(!tracker.all_exhausted(&[a.clone(), b.clone()], true));
        assert!(!tracker.all_exhausted(&[], false));
    }
}
