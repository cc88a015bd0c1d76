//! Rolling per-cycle timing windows, for progress reporting only.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Bounded window over the most recent samples.
#[derive(Clone, Debug)]
pub struct RollingWindow {
    cap: usize,
    samples: VecDeque<f64>,
}

impl RollingWindow {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            samples: VecDeque::with_capacity(cap),
        }
    }

    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.cap {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    /// Sample standard deviation; `None` below two samples.
    pub fn std_dev(&self) -> Option<f64> {
        if self.samples.len() < 2 {
            return None;
        }
        let mean = self.mean()?;
        let variance = self
            .samples
            .iter()
            .map(|s| (s - mean).powi(2))
            .sum::<f64>()
            / (self.samples.len() - 1) as f64;
        Some(variance.sqrt())
    }
}

/// Execution/sleep timings over the last 25 cycles.
#[derive(Clone, Debug)]
pub struct CycleStats {
    cycle_secs: RollingWindow,
    sleep_secs: RollingWindow,
}

const WINDOW: usize = 25;

impl Default for CycleStats {
    fn default() -> Self {
        Self {
            cycle_secs: RollingWindow::new(WINDOW),
            sleep_secs: RollingWindow::new(WINDOW),
        }
    }
}

impl CycleStats {
    pub fn record(&mut self, cycle: Duration, sleep: Duration) {
        self.cycle_secs.push(cycle.as_secs_f64());
        self.sleep_secs.push(sleep.as_secs_f64());
    }

    pub fn cycle_window(&self) -> &RollingWindow {
        &self.cycle_secs
    }

    pub fn sleep_window(&self) -> &RollingWindow {
        &self.sleep_secs
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            avg_cycle_secs: self.cycle_secs.mean().unwrap_or(0.0),
            std_cycle_secs: self.cycle_secs.std_dev().unwrap_or(0.0),
            avg_sleep_secs: self.sleep_secs.mean().unwrap_or(0.0),
            std_sleep_secs: self.sleep_secs.std_dev().unwrap_or(0.0),
        }
    }
}

/// Flattened timing summary attached to run-termination reports.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct StatsSummary {
    pub avg_cycle_secs: f64,
    pub std_cycle_secs: f64,
    pub avg_sleep_secs: f64,
    pub std_sleep_secs: f64,
}
