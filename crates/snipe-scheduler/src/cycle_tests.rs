use super::*;
use snipe_core::{Season, Semester};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::time::timeout;

fn course(code: &str) -> CourseSection {
    CourseSection::new(Semester::new(Season::Fall, 2025), "CAS", "CS", code, "A1")
}

fn options(keep_trying: bool) -> CycleOptions {
    CycleOptions::new(RateCaps::new(6, 99), keep_trying, false)
}

struct ScriptedProbe {
    responses: Mutex<HashMap<CourseSection, VecDeque<SeatStatus>>>,
    calls: Mutex<Vec<CourseSection>>,
}

impl ScriptedProbe {
    fn new(scripts: Vec<(CourseSection, Vec<SeatStatus>)>) -> Self {
        let responses = scripts
            .into_iter()
            .map(|(course, statuses)| (course, VecDeque::from(statuses)))
            .collect();
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls_for(&self, course: &CourseSection) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == course).count()
    }

    fn call_order(&self) -> Vec<CourseSection> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SeatProbe for ScriptedProbe {
    async fn check(&self, course: &CourseSection) -> SeatStatus {
        self.calls.lock().unwrap().push(course.clone());
        let mut responses = self.responses.lock().unwrap();
        let queue = responses
            .get_mut(course)
            .unwrap_or_else(|| panic!("no script for {course}"));
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue[0]
        }
    }
}

#[derive(Default)]
struct StubCommitter {
    attempts: Vec<CourseSection>,
    fail_validity: bool,
    fatal_attempts: bool,
    rejected: Vec<CourseSection>,
}

#[async_trait]
impl Committer for StubCommitter {
    async fn ensure_valid(&mut self) -> Result<(), RegistrarError> {
        if self.fail_validity {
            Err(RegistrarError::ReloginFailed)
        } else {
            Ok(())
        }
    }

    async fn attempt(
        &mut self,
        course: &CourseSection,
    ) -> Result<AttemptOutcome, RegistrarError> {
        self.attempts.push(course.clone());
        if self.fatal_attempts {
            return Err(RegistrarError::UnknownConfirmation(Box::new(course.clone())));
        }
        if self.rejected.contains(course) {
            return Ok(AttemptOutcome::Failed);
        }
        Ok(AttemptOutcome::Registered)
    }

    async fn cookies(&self) -> Vec<Cookie> {
        Vec::new()
    }
}

fn cycle_with(
    probe: Arc<ScriptedProbe>,
    committer: StubCommitter,
    targets: Vec<CourseSection>,
    opts: CycleOptions,
) -> RegistrationCycle<StubCommitter> {
    let probe_dyn: Arc<dyn SeatProbe> = probe;
    RegistrationCycle::new(
        committer,
        probe_dyn,
        Arc::new(ErrorTracker::new()),
        targets,
        opts,
    )
}

#[tokio::test(start_paused = true)]
async fn test_drains_the_target_set_as_seats_open() {
    let a = course("585");
    let b = course("460");
    let probe = Arc::new(ScriptedProbe::new(vec![
        (a.clone(), vec![SeatStatus::Open]),
        (b.clone(), vec![SeatStatus::Closed, SeatStatus::Open]),
    ]));
    let mut cycle = cycle_with(
        Arc::clone(&probe),
        StubCommitter::default(),
        vec![a.clone(), b.clone()],
        options(false),
    );

    cycle.run().await.unwrap();

    assert!(cycle.remaining().is_empty());
    assert_eq!(cycle.registered(), &[a.clone(), b.clone()]);
    // A left the poll set the moment it was registered; B kept being polled.
    assert_eq!(probe.calls_for(&a), 1);
    assert_eq!(probe.calls_for(&b), 2);
    assert_eq!(cycle.into_committer().attempts, vec![a, b]);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_attempts_stay_in_the_target_set() {
    let a = course("585");
    let probe = Arc::new(ScriptedProbe::new(vec![(
        a.clone(),
        vec![SeatStatus::Open],
    )]));
    let committer = StubCommitter {
        rejected: vec![a.clone()],
        ..Default::default()
    };
    let mut cycle = cycle_with(Arc::clone(&probe), committer, vec![a.clone()], options(false));

    // The seat stays contended forever; the loop never finishes on its own.
    let result = timeout(Duration::from_secs(120), cycle.run()).await;
    assert!(result.is_err(), "run should still be retrying");
    assert!(cycle.registered().is_empty());
    assert_eq!(cycle.remaining(), &[a.clone()]);
    assert!(probe.calls_for(&a) >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_targets_are_polled_in_semester_order() {
    let later = CourseSection::new(Semester::new(Season::Spring, 2026), "CAS", "CS", "210", "A1");
    let sooner = course("585");
    let probe = Arc::new(ScriptedProbe::new(vec![
        (later.clone(), vec![SeatStatus::Open]),
        (sooner.clone(), vec![SeatStatus::Open]),
    ]));
    let mut cycle = cycle_with(
        Arc::clone(&probe),
        StubCommitter::default(),
        vec![later.clone(), sooner.clone()],
        options(false),
    );
    cycle.run().await.unwrap();

    // Fall 2025 sorts before Spring 2026 regardless of input order.
    assert_eq!(probe.call_order()[..2], [sooner.clone(), later.clone()]);
    assert_eq!(cycle.registered(), &[sooner, later]);
}

#[tokio::test(start_paused = true)]
async fn test_faulting_course_is_excluded_after_its_ceiling() {
    let bad = course("999");
    let good = course("460");
    let mut good_script = vec![SeatStatus::Closed; 14];
    good_script.push(SeatStatus::Open);
    let probe = Arc::new(ScriptedProbe::new(vec![
        (bad.clone(), vec![SeatStatus::Fault]),
        (good.clone(), good_script),
    ]));
    let mut cycle = cycle_with(
        Arc::clone(&probe),
        StubCommitter::default(),
        vec![bad.clone(), good.clone()],
        options(false),
    );

    let err = cycle.run().await.unwrap_err();
    // The good course registered; only the broken one remained, and it was
    // past its ceiling, which ends the run.
    assert!(matches!(err, RegistrarError::AllCoursesExhausted));
    assert_eq!(cycle.registered(), &[good.clone()]);
    assert_eq!(cycle.remaining(), &[bad.clone()]);
    // Polled up to the ceiling (12) plus the tripping call, then skipped.
    assert_eq!(probe.calls_for(&bad), 13);
    assert_eq!(probe.calls_for(&good), 15);
}

#[tokio::test(start_paused = true)]
async fn test_keep_trying_polls_through_the_ceilings() {
    let bad = course("999");
    let probe = Arc::new(ScriptedProbe::new(vec![(
        bad.clone(),
        vec![SeatStatus::Fault],
    )]));
    let mut cycle = cycle_with(
        Arc::clone(&probe),
        StubCommitter::default(),
        vec![bad.clone()],
        CycleOptions::new(RateCaps::new(6, 99), true, false),
    );

    let result = timeout(Duration::from_secs(2 * 3600), cycle.run()).await;
    assert!(result.is_err(), "keep_trying must not abort");
    // Well past both ceilings and still being polled.
    assert!(probe.calls_for(&bad) > 13);
}

#[tokio::test(start_paused = true)]
async fn test_global_budget_aborts_without_keep_trying() {
    // Two courses faulting together push the global counter past its
    // ceiling (9) before either course reaches its own (12).
    let bad1 = course("998");
    let bad2 = course("999");
    let probe = Arc::new(ScriptedProbe::new(vec![
        (bad1.clone(), vec![SeatStatus::Fault]),
        (bad2.clone(), vec![SeatStatus::Fault]),
    ]));
    let mut cycle = cycle_with(
        Arc::clone(&probe),
        StubCommitter::default(),
        vec![bad1.clone(), bad2.clone()],
        options(false),
    );

    let err = cycle.run().await.unwrap_err();
    match err {
        RegistrarError::ErrorBudgetExhausted { count } => assert!(count > 9),
        other => panic!("expected ErrorBudgetExhausted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_relogin_failure_aborts_the_run() {
    let a = course("585");
    let probe = Arc::new(ScriptedProbe::new(vec![(
        a.clone(),
        vec![SeatStatus::Open],
    )]));
    let committer = StubCommitter {
        fail_validity: true,
        ..Default::default()
    };
    let mut cycle = cycle_with(probe, committer, vec![a], options(false));
    let err = cycle.run().await.unwrap_err();
    assert!(matches!(err, RegistrarError::ReloginFailed));
}

#[tokio::test(start_paused = true)]
async fn test_fatal_attempt_aborts_the_run() {
    let a = course("585");
    let probe = Arc::new(ScriptedProbe::new(vec![(
        a.clone(),
        vec![SeatStatus::Open],
    )]));
    let committer = StubCommitter {
        fatal_attempts: true,
        ..Default::default()
    };
    let mut cycle = cycle_with(probe, committer, vec![a], options(false));
    let err = cycle.run().await.unwrap_err();
    assert!(matches!(err, RegistrarError::UnknownConfirmation(_)));
}

#[tokio::test(start_paused = true)]
async fn test_registered_courses_are_sent_to_the_notifier() {
    let a = course("585");
    let probe = Arc::new(ScriptedProbe::new(vec![(
        a.clone(),
        vec![SeatStatus::Open],
    )]));
    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
    let mut cycle = cycle_with(probe, StubCommitter::default(), vec![a.clone()], options(false))
        .with_registration_notifier(sender);
    cycle.run().await.unwrap();
    assert_eq!(receiver.try_recv().unwrap(), a);
}

#[tokio::test(start_paused = true)]
async fn test_cycle_pacing_honors_the_rate_floor() {
    let a = course("585");
    let probe = Arc::new(ScriptedProbe::new(vec![(
        a.clone(),
        vec![SeatStatus::Closed, SeatStatus::Open],
    )]));
    let mut cycle = cycle_with(probe, StubCommitter::default(), vec![a], options(false));

    // One course at 6/min per-course cap: each non-final cycle must span at
    // least 10 seconds.
    let started = tokio::time::Instant::now();
    cycle.run().await.unwrap();
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(10), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(20), "elapsed {elapsed:?}");

    let summary = cycle.stats().summary();
    assert!(summary.avg_sleep_secs > 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_target_set_finishes_immediately() {
    let probe = Arc::new(ScriptedProbe::new(vec![]));
    let mut cycle = cycle_with(probe, StubCommitter::default(), vec![], options(false));
    cycle.run().await.unwrap();
    assert!(cycle.registered().is_empty());
}
