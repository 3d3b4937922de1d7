pub mod liveness;
pub mod progress;
pub mod staging;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::foundation::error::{ReelError, ReelResult};

/// Lifecycle of one composition job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobState {
    Idle,
    Loading,
    Encoding,
    Muxing,
    Done,
    Aborted,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Loading => 1,
            Self::Encoding => 2,
            Self::Muxing => 3,
            Self::Done | Self::Aborted | Self::Failed => 4,
        }
    }

    /// Forward-only transitions; `Aborted` and `Failed` are reachable from any live state and
    /// `Done` only from `Muxing`.
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Aborted | Self::Failed => true,
            Self::Done => self == Self::Muxing,
            _ => next.rank() > self.rank(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Encoding => "encoding",
            Self::Muxing => "muxing",
            Self::Done => "done",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }
}

/// Caller-owned abort flag. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an abort. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once an abort was requested.
    pub fn check(&self) -> ReelResult<()> {
        if self.is_cancelled() {
            Err(ReelError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// The live unit of work. Owned by the caller, threaded through every stage, never reused.
#[derive(Debug)]
pub struct CompositionJob {
    state: JobState,
    cancel: CancelToken,
    output_bytes: u64,
    history: Vec<JobState>,
}

impl CompositionJob {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            state: JobState::Idle,
            cancel,
            output_bytes: 0,
            history: vec![JobState::Idle],
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Every state visited so far, in order.
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn output_bytes(&self) -> u64 {
        self.output_bytes
    }

    pub fn add_output_bytes(&mut self, n: u64) {
        self.output_bytes = self.output_bytes.saturating_add(n);
    }

    /// Discard output accounting after an abort or failure removed the files.
    pub fn clear_output_bytes(&mut self) {
        self.output_bytes = 0;
    }

    pub fn transition(&mut self, next: JobState) -> ReelResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(ReelError::internal(format!(
                "illegal job transition {} -> {}",
                self.state.label(),
                next.label()
            )));
        }
        tracing::debug!(from = self.state.label(), to = next.label(), "job state");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Check the abort flag; an observed abort is reported as `Cancelled`.
    pub fn checkpoint(&self) -> ReelResult<()> {
        self.cancel.check()
    }
}

#[cfg(test)]
#[path = "../tests/unit/job/job.rs"]
mod tests;
