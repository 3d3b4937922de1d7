use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::audio::stitch::{mux, stitch_audio};
use crate::backend::{MediaIo, VideoBackend, direct, pipeline, resolve_backend};
use crate::foundation::error::{ReelError, ReelResult};
use crate::job::liveness::{KeepAlive, KeepAliveGuard, Yield};
use crate::job::progress::{ProgressCallback, ProgressTracker, bands, in_band};
use crate::job::staging::Staging;
use crate::job::{CancelToken, CompositionJob, JobState};
use crate::model::{JobConfig, JobInputs, JobSources, validate_inputs, validate_sources};
use crate::plan::{AudioMixPlan, RetimingPlan};
use crate::render::compositor::FrameLoop;
use crate::transcode::{FfmpegTranscoder, StageRunner, Transcoder};

/// What to compose and where to put it.
#[derive(Clone, Debug)]
pub struct JobRequest {
    pub inputs: JobInputs,
    pub config: JobConfig,
    pub output_dir: PathBuf,
    /// Defaults to a timestamped name, see [`default_output_name`].
    pub file_name: Option<String>,
}

impl JobRequest {
    pub fn output_path(&self) -> PathBuf {
        let name = self
            .file_name
            .clone()
            .unwrap_or_else(|| default_output_name(chrono::Local::now()));
        self.output_dir.join(name)
    }
}

/// `reel_<YYYYmmdd_HHMMSS>.mp4`.
pub fn default_output_name<Tz>(at: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("reel_{}.mp4", at.format("%Y%m%d_%H%M%S"))
}

/// Capabilities injected into one job.
pub struct JobEnv<'a> {
    pub media: &'a mut dyn MediaIo,
    /// `None` runs the system `ffmpeg`, killed promptly on abort.
    pub transcoder: Option<&'a mut dyn Transcoder>,
    pub keep_alive: &'a mut dyn KeepAlive,
    pub yielder: &'a mut dyn Yield,
    pub progress: Option<ProgressCallback>,
    /// Parent of the staging namespace (system temp dir when `None`).
    pub staging_parent: Option<PathBuf>,
}

/// Facts about a finished output.
#[derive(Clone, Debug, PartialEq)]
pub struct JobReport {
    pub output: PathBuf,
    pub bytes: u64,
    pub elapsed: Duration,
    pub backend: &'static str,
    pub speed_factor: f64,
    pub frame_count: u64,
    pub background_mixed: bool,
    /// External stages run, in order.
    pub stages: Vec<String>,
}

impl JobReport {
    /// `12.3 MB · 45.2 s`.
    pub fn summary(&self) -> String {
        format_summary(self.bytes, self.elapsed)
    }
}

pub fn format_summary(bytes: u64, elapsed: Duration) -> String {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    format!("{mb:.1} MB · {:.1} s", elapsed.as_secs_f64())
}

/// Terminal result of [`Session::generate`].
#[derive(Debug)]
pub struct JobOutcome {
    pub state: JobState,
    pub history: Vec<JobState>,
    pub elapsed: Duration,
    pub report: Option<JobReport>,
    pub error: Option<ReelError>,
}

impl JobOutcome {
    pub fn is_done(&self) -> bool {
        self.state == JobState::Done
    }

    /// One line for the user, by outcome category.
    pub fn status_line(&self) -> String {
        match (&self.report, &self.error) {
            (Some(report), _) => format!("done: {} ({})", report.output.display(), report.summary()),
            (None, Some(err)) => err.status_line(),
            (None, None) => self.state.label().to_string(),
        }
    }
}

/// Cheap handle that aborts whatever job its session is running. Safe to move to other threads.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle {
    active: Arc<Mutex<Option<CancelToken>>>,
}

impl AbortHandle {
    /// Request an abort of the active job. Returns whether a job was active; idempotent.
    pub fn abort(&self) -> bool {
        match lock(&self.active).as_ref() {
            Some(token) => {
                tracing::info!("abort requested");
                token.cancel();
                true
            }
            None => false,
        }
    }
}

fn lock(slot: &Mutex<Option<CancelToken>>) -> MutexGuard<'_, Option<CancelToken>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clears the active slot when the job ends.
struct ActiveJob<'a> {
    slot: &'a Mutex<Option<CancelToken>>,
}

impl Drop for ActiveJob<'_> {
    fn drop(&mut self) {
        *lock(self.slot) = None;
    }
}

/// Runs at most one composition job at a time.
#[derive(Clone, Debug, Default)]
pub struct Session {
    handle: AbortHandle,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.handle.clone()
    }

    pub fn abort(&self) -> bool {
        self.handle.abort()
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.handle.active).is_some()
    }

    fn begin(&self) -> ReelResult<(CancelToken, ActiveJob<'_>)> {
        let mut slot = lock(&self.handle.active);
        if slot.is_some() {
            return Err(ReelError::Busy);
        }
        let token = CancelToken::new();
        *slot = Some(token.clone());
        Ok((
            token,
            ActiveJob {
                slot: &self.handle.active,
            },
        ))
    }

    /// Run one job to a terminal state. Only a concurrent call fails outright (`Busy`); every
    /// other outcome, success included, goes through the same cleanup and is returned.
    #[tracing::instrument(skip_all, fields(intro = %request.inputs.intro.display(), main = %request.inputs.main.display()))]
    pub fn generate(&self, request: &JobRequest, env: JobEnv<'_>) -> ReelResult<JobOutcome> {
        let (token, _active) = self.begin()?;
        let started = Instant::now();
        let mut job = CompositionJob::new(token.clone());
        let mut progress = ProgressTracker::new(env.progress);

        let result = match Staging::new(env.staging_parent.as_deref()) {
            Ok(staging) => {
                let mut system;
                let transcoder: &mut dyn Transcoder = match env.transcoder {
                    Some(t) => t,
                    None => {
                        system = FfmpegTranscoder::new().with_cancel(token.clone());
                        &mut system
                    }
                };
                let mut runner = StageRunner::new(transcoder, &token);
                let mut caps = Caps {
                    media: env.media,
                    keep_alive: env.keep_alive,
                    yielder: env.yielder,
                };
                let result = run_job(
                    &mut job,
                    request,
                    &mut caps,
                    &mut runner,
                    &staging,
                    &mut progress,
                    started,
                );
                if let Err(e) = staging.close() {
                    tracing::warn!(error = %e, "staging cleanup failed");
                }
                result
            }
            Err(e) => Err(e),
        };
        Ok(finish(job, result, started))
    }
}

struct Caps<'a> {
    media: &'a mut dyn MediaIo,
    keep_alive: &'a mut dyn KeepAlive,
    yielder: &'a mut dyn Yield,
}

/// Top-level handler: moves the job to its terminal state and builds the outcome.
fn finish(mut job: CompositionJob, result: ReelResult<JobReport>, started: Instant) -> JobOutcome {
    let (next, report, error) = match result {
        Ok(report) => (JobState::Done, Some(report), None),
        Err(ReelError::Cancelled) => {
            job.clear_output_bytes();
            (JobState::Aborted, None, Some(ReelError::Cancelled))
        }
        Err(e) => {
            job.clear_output_bytes();
            (JobState::Failed, None, Some(e))
        }
    };
    if let Err(e) = job.transition(next) {
        tracing::error!(error = %e, "job did not reach a terminal state");
    }
    let elapsed = started.elapsed();
    match (&report, &error) {
        (Some(r), _) => tracing::info!(output = %r.output.display(), summary = %r.summary(), "job done"),
        (None, Some(ReelError::Cancelled)) => tracing::info!("job aborted"),
        (None, Some(e)) => tracing::warn!(error = %e, "job failed"),
        (None, None) => {}
    }
    JobOutcome {
        state: job.state(),
        history: job.history().to_vec(),
        elapsed,
        report,
        error,
    }
}

fn load_sources(
    media: &mut dyn MediaIo,
    inputs: &JobInputs,
    cfg: &JobConfig,
    job: &CompositionJob,
    progress: &mut ProgressTracker,
) -> ReelResult<JobSources> {
    let total = if inputs.background.is_some() { 3.0 } else { 2.0 };
    job.checkpoint()?;
    let intro = media.probe(&inputs.intro)?;
    progress.stage(in_band(bands::LOADING, 1.0 / total), "intro loaded");
    job.checkpoint()?;
    let main = media.probe(&inputs.main)?;
    progress.stage(in_band(bands::LOADING, 2.0 / total), "main loaded");
    let background = match inputs.background.as_deref() {
        Some(path) => {
            job.checkpoint()?;
            let bg = media.probe(path)?;
            progress.stage(in_band(bands::LOADING, 1.0), "background loaded");
            Some(bg)
        }
        None => None,
    };
    let sources = JobSources {
        intro,
        main,
        background,
    };
    validate_sources(&sources, &cfg.limits)?;
    Ok(sources)
}

fn run_job(
    job: &mut CompositionJob,
    request: &JobRequest,
    caps: &mut Caps<'_>,
    runner: &mut StageRunner<'_>,
    staging: &Staging,
    progress: &mut ProgressTracker,
    started: Instant,
) -> ReelResult<JobReport> {
    let cfg = &request.config;
    cfg.validate()?;
    validate_inputs(&request.inputs, &cfg.limits)?;
    job.transition(JobState::Loading)?;
    progress.stage(bands::LOADING.0, "loading sources");
    let sources = load_sources(caps.media, &request.inputs, cfg, job, progress)?;

    let target = cfg.target_spec();
    let retiming = RetimingPlan::new(
        target.fps,
        sources.intro.duration,
        sources.main.duration,
        target.target_duration_secs,
    )?;
    tracing::info!(
        speed = retiming.speed_factor,
        frames = retiming.output_frame_count,
        intro_frames = retiming.intro_frames,
        main_frames = retiming.main_frames,
        "retiming planned"
    );
    job.checkpoint()?;
    let backend = resolve_backend(caps.media, cfg.backend, target.canvas, target.fps)?;
    let segments = retiming.segments(cfg.intro_effects(), cfg.main_effects());

    job.transition(JobState::Encoding)?;
    progress.stage(bands::VIDEO.0, "encoding video");
    let video = staging.file("video.mp4");
    {
        let _awake = if cfg.keep_alive {
            Some(KeepAliveGuard::acquire(&mut *caps.keep_alive))
        } else {
            None
        };
        match &backend {
            VideoBackend::Direct { encoder } => {
                let mut ctl = FrameLoop {
                    cancel: job.cancel_token(),
                    yielder: &mut *caps.yielder,
                    yield_every: cfg.yield_every_frames,
                    progress: &mut *progress,
                    total_frames: retiming.output_frame_count,
                };
                let bytes = direct::render_video(
                    caps.media, &segments, &sources, &target, encoder, &video, &mut ctl,
                )?;
                tracing::debug!(bytes, "video-only output written");
            }
            VideoBackend::Pipeline => {
                pipeline::render_video(runner, staging, &segments, &sources, &target, &video, progress)?;
            }
        }
    }

    job.transition(JobState::Muxing)?;
    progress.stage(bands::AUDIO.0, "stitching audio");
    let plan = AudioMixPlan::new(&retiming, &sources, cfg);
    let audio = stitch_audio(runner, staging, &plan, progress)?;

    progress.stage(bands::MUX.0, "muxing");
    let muxed = mux(runner, staging, &video, &audio.track, retiming.output_secs())?;
    job.checkpoint()?;
    let output = request.output_path();
    let bytes = persist_output(staging, &muxed, &output)?;
    job.add_output_bytes(bytes);
    progress.stage(bands::MUX.1, "done");

    Ok(JobReport {
        output,
        bytes,
        elapsed: started.elapsed(),
        backend: backend.name(),
        speed_factor: retiming.speed_factor,
        frame_count: retiming.output_frame_count,
        background_mixed: audio.mixed,
        stages: runner.completed().to_vec(),
    })
}

fn persist_output(staging: &Staging, muxed: &Path, output: &Path) -> ReelResult<u64> {
    if output.exists() {
        tracing::warn!(output = %output.display(), "overwriting existing output");
    }
    staging.persist(muxed, output)
}

#[cfg(test)]
#[path = "../tests/unit/session.rs"]
mod tests;
