//! reelforge composes short vertical (9:16) videos of a fixed duration.
//!
//! A job takes an intro clip and a main clip, retimes the main clip so both fit the target
//! duration, optionally lays a looping background track under the voice, and writes one MP4.
//!
//! - Describe the job with a [`JobConfig`] and [`JobInputs`]
//! - Run it through a [`Session`], which rejects concurrent jobs and exposes an abort handle
//! - Frames are composited directly when a frame encoder is available, otherwise a whole-file
//!   filter pipeline is used
#![forbid(unsafe_code)]

mod foundation;

/// Source probing and frame decoding.
pub mod assets;
/// Audio extraction, tempo and mixing stages.
pub mod audio;
/// Video backends and their selection.
pub mod backend;
pub(crate) mod effects;
/// Frame sinks.
pub mod encode;
pub mod geometry;
/// Job lifecycle, progress, staging and liveness.
pub mod job;
pub mod model;
pub mod plan;
/// Rasters and the per-segment compositor.
pub mod render;
pub mod session;
pub mod transcode;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex, Rgba8};
pub use crate::foundation::error::{ErrorCategory, ReelError, ReelResult};

pub use crate::backend::{FfmpegMedia, MediaIo, VideoBackend};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
pub use crate::encode::sink::{FrameMeta, FrameSink, InMemorySink, SinkConfig};
pub use crate::job::{CancelToken, CompositionJob, JobState};
pub use crate::model::{
    BackendChoice, CropCut, CropPreset, EffectConfig, EffectKind, EffectPosition, FrameRate,
    JobConfig, JobInputs, Limits, QualityPreset, Resolution, SourceClip,
};
pub use crate::render::surface::Surface;
pub use crate::session::{AbortHandle, JobEnv, JobOutcome, JobReport, JobRequest, Session};
pub use crate::transcode::{FfmpegTranscoder, TranscodeCommand, Transcoder};
