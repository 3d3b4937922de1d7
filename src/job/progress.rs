use std::time::{Duration, Instant};

/// One progress report.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressSnapshot {
    /// Monotonically non-decreasing, `0..=100`.
    pub percent: f32,
    pub status: String,
    /// Estimated remaining seconds, once enough work was observed.
    pub eta_secs: Option<f64>,
}

/// Progress callback. Receives every emitted snapshot.
pub type ProgressCallback = Box<dyn FnMut(&ProgressSnapshot) + Send>;

/// Percentage bands of the job's phases.
pub mod bands {
    pub const LOADING: (f32, f32) = (0.0, 5.0);
    pub const VIDEO: (f32, f32) = (5.0, 75.0);
    pub const AUDIO: (f32, f32) = (75.0, 95.0);
    pub const MUX: (f32, f32) = (95.0, 100.0);
}

/// Map `fraction` of work inside `band` onto the overall percentage.
pub fn in_band(band: (f32, f32), fraction: f64) -> f32 {
    let f = fraction.clamp(0.0, 1.0) as f32;
    band.0 + (band.1 - band.0) * f
}

/// ETA is reported once this much of the job completed.
const ETA_MIN_PERCENT: f32 = 5.0;

/// Emits snapshots at stage boundaries and at a bounded rate inside frame loops.
pub struct ProgressTracker {
    callback: Option<ProgressCallback>,
    started: Instant,
    last_emit: Option<Instant>,
    min_interval: Duration,
    percent: f32,
    emitted: Vec<f32>,
}

impl ProgressTracker {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            started: Instant::now(),
            last_emit: None,
            min_interval: Duration::from_millis(250),
            percent: 0.0,
            emitted: Vec::new(),
        }
    }

    /// Change the throttle interval used by [`ProgressTracker::frame`].
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn percent(&self) -> f32 {
        self.percent
    }

    /// Percentages emitted so far.
    pub fn history(&self) -> &[f32] {
        &self.emitted
    }

    /// Stage boundary: always emitted.
    pub fn stage(&mut self, percent: f32, status: impl Into<String>) {
        self.emit(percent, status.into());
    }

    /// In-loop update: emitted only when the throttle interval elapsed.
    pub fn frame(&mut self, percent: f32, status: impl FnOnce() -> String) {
        let due = self
            .last_emit
            .is_none_or(|t| t.elapsed() >= self.min_interval);
        if due {
            self.emit(percent, status());
        } else {
            self.percent = self.percent.max(percent.clamp(0.0, 100.0));
        }
    }

    fn emit(&mut self, percent: f32, status: String) {
        let percent = if percent.is_finite() {
            percent.clamp(0.0, 100.0)
        } else {
            self.percent
        };
        self.percent = self.percent.max(percent);
        self.last_emit = Some(Instant::now());
        self.emitted.push(self.percent);

        let eta_secs = (self.percent >= ETA_MIN_PERCENT && self.percent < 100.0).then(|| {
            let elapsed = self.started.elapsed().as_secs_f64();
            elapsed * f64::from(100.0 - self.percent) / f64::from(self.percent)
        });
        let snapshot = ProgressSnapshot {
            percent: self.percent,
            status,
            eta_secs,
        };
        tracing::debug!(percent = snapshot.percent, status = %snapshot.status, "progress");
        if let Some(cb) = self.callback.as_mut() {
            cb(&snapshot);
        }
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("percent", &self.percent)
            .field("min_interval", &self.min_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/job/progress.rs"]
mod tests;
