//! The polling/registration scheduler: rate budgets, failure tracking with
//! circuit breaking, concurrent availability polling, and the cycle loop
//! that serializes registration attempts on the session-owning task.

pub mod action;
pub mod cycle;
pub mod poller;
pub mod rate;
pub mod stats;
pub mod tracker;

pub use action::{AttemptOutcome, attempt};
pub use cycle::{Committer, CycleOptions, RegistrationCycle, SessionCommitter};
pub use poller::{ListingProbe, PollPolicy, SeatProbe, SeatStatus};
pub use rate::{RateCaps, cycle_floor, effective_rate};
pub use stats::{CycleStats, RollingWindow, StatsSummary};
pub use tracker::{AbortSignal, ErrorTracker, PER_COURSE_RETRY_LIMIT, TOTAL_RETRY_LIMIT};
