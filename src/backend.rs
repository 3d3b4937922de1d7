pub mod direct;
pub mod pipeline;

use std::path::Path;

use crate::assets::media::{FfmpegFrameSource, FrameSource, probe_clip};
use crate::encode::ffmpeg::{ENCODER_CANDIDATES, FfmpegSink, FfmpegSinkOpts, trial_encode};
use crate::encode::sink::FrameSink;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{ReelError, ReelResult};
use crate::model::{BackendChoice, SourceClip};

/// Media capabilities a job needs: probing, frame decoding, frame encoding.
pub trait MediaIo {
    fn probe(&mut self, path: &Path) -> ReelResult<SourceClip>;

    /// Sequential decoder sampling `clip` at `fps / speed`.
    fn open_source(
        &mut self,
        clip: &SourceClip,
        fps: Fps,
        speed: f64,
    ) -> ReelResult<Box<dyn FrameSource>>;

    /// Video-only frame encoder writing to `out`.
    fn open_sink(&mut self, out: &Path) -> ReelResult<Box<dyn FrameSink>>;

    /// First frame encoder that accepts a trial encode at this profile.
    fn probe_encoder(&mut self, canvas: Canvas, fps: Fps) -> Option<String>;
}

/// [`MediaIo`] backed by the system `ffmpeg`/`ffprobe`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegMedia;

impl MediaIo for FfmpegMedia {
    fn probe(&mut self, path: &Path) -> ReelResult<SourceClip> {
        probe_clip(path)
    }

    fn open_source(
        &mut self,
        clip: &SourceClip,
        fps: Fps,
        speed: f64,
    ) -> ReelResult<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegFrameSource::open(clip, fps, speed)?))
    }

    fn open_sink(&mut self, out: &Path) -> ReelResult<Box<dyn FrameSink>> {
        Ok(Box::new(FfmpegSink::new(FfmpegSinkOpts::new(out))))
    }

    fn probe_encoder(&mut self, canvas: Canvas, fps: Fps) -> Option<String> {
        ENCODER_CANDIDATES
            .iter()
            .find(|enc| trial_encode(enc, canvas, fps))
            .map(|enc| (*enc).to_string())
    }
}

/// Video production strategy, chosen once per job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VideoBackend {
    /// Frame-level compositing through a streaming encoder. Supports effects.
    Direct { encoder: String },
    /// Whole-file filter pipeline. No effects.
    Pipeline,
}

impl VideoBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Direct { .. } => "direct",
            Self::Pipeline => "pipeline",
        }
    }

    pub fn supports_effects(&self) -> bool {
        matches!(self, Self::Direct { .. })
    }
}

/// Pick the backend from the configured choice and the encoder probe result.
pub fn select_backend(choice: BackendChoice, probed: Option<String>) -> ReelResult<VideoBackend> {
    let backend = match (choice, probed) {
        (BackendChoice::Pipeline, _) => VideoBackend::Pipeline,
        (_, Some(encoder)) => VideoBackend::Direct { encoder },
        (BackendChoice::Auto, None) => {
            tracing::warn!("no frame encoder accepted a trial encode; falling back to pipeline");
            VideoBackend::Pipeline
        }
        (BackendChoice::Direct, None) => {
            return Err(ReelError::capability(format!(
                "direct backend requested but none of {ENCODER_CANDIDATES:?} is usable"
            )));
        }
    };
    tracing::info!(backend = backend.name(), "video backend selected");
    Ok(backend)
}

/// Probe for an encoder unless the pipeline backend is forced.
pub fn resolve_backend(
    media: &mut dyn MediaIo,
    choice: BackendChoice,
    canvas: Canvas,
    fps: Fps,
) -> ReelResult<VideoBackend> {
    let probed = match choice {
        BackendChoice::Pipeline => None,
        BackendChoice::Auto | BackendChoice::Direct => media.probe_encoder(canvas, fps),
    };
    select_backend(choice, probed)
}

#[cfg(test)]
#[path = "../tests/unit/backend/select.rs"]
mod tests;
