//! Dual-cap rate budget.
//!
//! Two ceilings apply at once: a per-course cap so one hot section cannot be
//! starved by many cold ones, and a total cap so the site is never hammered
//! regardless of how many targets remain.

use std::time::Duration;

/// Requests-per-minute ceilings, fixed by the membership tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateCaps {
    pub per_course_per_minute: u32,
    pub total_per_minute: u32,
}

impl RateCaps {
    pub fn new(per_course_per_minute: u32, total_per_minute: u32) -> Self {
        Self {
            per_course_per_minute,
            total_per_minute,
        }
    }
}

/// The request rate (per minute) a cycle may actually use.
pub fn effective_rate(remaining: usize, caps: RateCaps) -> u32 {
    if remaining == 0 {
        return 0;
    }
    (remaining as u32)
        .saturating_mul(caps.per_course_per_minute)
        .min(caps.total_per_minute)
}

/// Minimum wall-clock duration of one cycle over `remaining` courses.
pub fn cycle_floor(remaining: usize, caps: RateCaps) -> Duration {
    let rate = effective_rate(remaining, caps);
    if rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(remaining as f64 / f64::from(rate) * 60.0)
}
