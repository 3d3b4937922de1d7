use std::process::{Child, Command, Stdio};

use crate::foundation::error::{ReelError, ReelResult};

/// Cooperative yield point of the frame loop.
pub trait Yield {
    fn yield_now(&mut self);
}

/// Yields the OS thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadYield;

impl Yield for ThreadYield {
    fn yield_now(&mut self) {
        std::thread::yield_now();
    }
}

/// Never yields. For tests and batch use.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoYield;

impl Yield for NoYield {
    fn yield_now(&mut self) {}
}

/// Best-effort measures that keep the host from throttling or sleeping during long encodes.
pub trait KeepAlive {
    fn acquire(&mut self) -> ReelResult<()>;
    fn release(&mut self);
}

/// Holds a [`KeepAlive`] for its lifetime; releases it on every exit path.
pub struct KeepAliveGuard<'a> {
    inner: Option<&'a mut dyn KeepAlive>,
}

impl<'a> KeepAliveGuard<'a> {
    /// Acquire; a failure is logged and yields an inert guard.
    pub fn acquire(keep_alive: &'a mut dyn KeepAlive) -> Self {
        match keep_alive.acquire() {
            Ok(()) => {
                tracing::debug!("keep-alive acquired");
                Self {
                    inner: Some(keep_alive),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "keep-alive unavailable; continuing without it");
                keep_alive.release();
                Self { inner: None }
            }
        }
    }

    pub fn is_held(&self) -> bool {
        self.inner.is_some()
    }
}

impl Drop for KeepAliveGuard<'_> {
    fn drop(&mut self) {
        if let Some(k) = self.inner.take() {
            k.release();
            tracing::debug!("keep-alive released");
        }
    }
}

/// Does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoKeepAlive;

impl KeepAlive for NoKeepAlive {
    fn acquire(&mut self) -> ReelResult<()> {
        Ok(())
    }

    fn release(&mut self) {}
}

/// Wake lock through a platform inhibitor process plus an inaudible 1 Hz tone played by
/// `ffplay`. Either half may be missing; acquisition succeeds if at least one started.
#[derive(Debug, Default)]
pub struct ProcessKeepAlive {
    children: Vec<Child>,
}

impl ProcessKeepAlive {
    pub fn new() -> Self {
        Self::default()
    }

    fn wake_lock_command() -> Option<Command> {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("caffeinate");
            cmd.arg("-i");
            Some(cmd)
        } else if cfg!(target_os = "linux") {
            let mut cmd = Command::new("systemd-inhibit");
            cmd.args([
                "--what=idle:sleep",
                "--who=reelforge",
                "--why=encoding video",
                "sleep",
                "infinity",
            ]);
            Some(cmd)
        } else {
            None
        }
    }

    fn signal_command() -> Command {
        let mut cmd = Command::new("ffplay");
        cmd.args([
            "-nodisp",
            "-loglevel",
            "quiet",
            "-f",
            "lavfi",
            "sine=frequency=1:sample_rate=8000,volume=0.001",
        ]);
        cmd
    }

    fn spawn(mut cmd: Command) -> Option<Child> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .ok()
    }
}

impl KeepAlive for ProcessKeepAlive {
    fn acquire(&mut self) -> ReelResult<()> {
        self.release();
        if let Some(child) = Self::wake_lock_command().and_then(Self::spawn) {
            self.children.push(child);
        }
        if let Some(child) = Self::spawn(Self::signal_command()) {
            self.children.push(child);
        }
        if self.children.is_empty() {
            return Err(ReelError::capability(
                "neither a wake-lock helper nor ffplay could be started",
            ));
        }
        Ok(())
    }

    fn release(&mut self) {
        for mut child in self.children.drain(..) {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for ProcessKeepAlive {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/job/liveness.rs"]
mod tests;
