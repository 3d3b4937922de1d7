use std::path::PathBuf;

use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{ReelError, ReelResult};
use crate::model::{EffectConfig, JobConfig, JobSources};

/// Lower bound of the main clip speed factor.
pub const MIN_SPEED: f64 = 1.0;
/// Upper bound of the main clip speed factor. Tied to the tempo filter's single-stage range.
pub const MAX_SPEED: f64 = 2.0;

/// Frame budget and speed factor for one job.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetimingPlan {
    pub fps: Fps,
    pub target_duration_secs: f64,
    pub speed_factor: f64,
    pub output_frame_count: u64,
    pub intro_frames: u64,
    pub main_frames: u64,
}

/// `clamp(main / (target - intro), 1, 2)`; a target that leaves no room after the intro yields
/// the maximum speed.
pub fn speed_factor(intro_secs: f64, main_secs: f64, target_secs: f64) -> f64 {
    let room = target_secs - intro_secs;
    if !room.is_finite() || room <= 0.0 {
        return MAX_SPEED;
    }
    let speed = main_secs / room;
    if !speed.is_finite() {
        return MAX_SPEED;
    }
    speed.clamp(MIN_SPEED, MAX_SPEED)
}

impl RetimingPlan {
    pub fn new(fps: Fps, intro_secs: f64, main_secs: f64, target_secs: f64) -> ReelResult<Self> {
        if !target_secs.is_finite() || target_secs <= 0.0 {
            return Err(ReelError::validation("target duration must be positive"));
        }
        let output_frame_count = fps.secs_to_frames_floor(target_secs);
        if output_frame_count == 0 {
            return Err(ReelError::validation(
                "target duration is shorter than one frame",
            ));
        }
        let intro_frames = fps.secs_to_frames_floor(intro_secs).min(output_frame_count);
        Ok(Self {
            fps,
            target_duration_secs: target_secs,
            speed_factor: speed_factor(intro_secs, main_secs, target_secs),
            output_frame_count,
            intro_frames,
            main_frames: output_frame_count - intro_frames,
        })
    }

    /// Exact output span covered by the frame budget.
    pub fn output_secs(&self) -> f64 {
        self.fps.frames_to_secs(self.output_frame_count)
    }

    /// Frame-aligned span of the intro segment in seconds.
    pub fn intro_secs(&self) -> f64 {
        self.fps.frames_to_secs(self.intro_frames)
    }

    /// Output span of the main segment in seconds.
    pub fn main_secs(&self) -> f64 {
        self.fps.frames_to_secs(self.main_frames)
    }

    pub fn needs_retime(&self) -> bool {
        (self.speed_factor - 1.0).abs() > f64::EPSILON
    }

    pub fn segments(
        &self,
        intro_effects: Vec<EffectConfig>,
        main_effects: Vec<EffectConfig>,
    ) -> [SegmentPlan; 2] {
        [
            SegmentPlan {
                role: SegmentRole::Intro,
                speed: 1.0,
                frame_count: self.intro_frames,
                first_frame: FrameIndex(0),
                offset_micros: 0,
                effects: intro_effects,
            },
            SegmentPlan {
                role: SegmentRole::Main,
                speed: self.speed_factor,
                frame_count: self.main_frames,
                first_frame: FrameIndex(self.intro_frames),
                offset_micros: self.fps.frames_to_micros(self.intro_frames),
                effects: main_effects,
            },
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentRole {
    Intro,
    Main,
}

impl SegmentRole {
    pub fn label(self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Main => "main",
        }
    }
}

/// One compositor pass over a single source clip.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentPlan {
    pub role: SegmentRole,
    pub speed: f64,
    pub frame_count: u64,
    /// Absolute output index of the segment's first frame.
    pub first_frame: FrameIndex,
    /// Timestamp of the segment's first frame.
    pub offset_micros: u64,
    pub effects: Vec<EffectConfig>,
}

impl SegmentPlan {
    /// Source time sampled for segment-local frame `i`.
    pub fn source_time(&self, fps: Fps, i: u64) -> f64 {
        fps.frames_to_secs(i) * self.speed
    }

    /// Presentation timestamp of segment-local frame `i`.
    pub fn timestamp_micros(&self, fps: Fps, i: u64) -> u64 {
        self.offset_micros + fps.frames_to_micros(i)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioRole {
    Intro,
    Main,
    Background,
}

/// One input of the audio mix.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioSegment {
    pub role: AudioRole,
    pub source: PathBuf,
    /// Whether the source carries an audio stream. Silent sources are synthesized.
    pub has_audio: bool,
    /// Source span to take, in seconds (before tempo).
    pub source_secs: f64,
    pub tempo: f64,
    /// Linear gain in `[0, 1]`.
    pub gain: f64,
    pub looped: bool,
}

/// Ordered audio inputs for one job.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioMixPlan {
    pub segments: Vec<AudioSegment>,
    pub target_duration_secs: f64,
    pub normalize_loudness: bool,
}

impl AudioMixPlan {
    pub fn new(retiming: &RetimingPlan, sources: &JobSources, cfg: &JobConfig) -> Self {
        let mut segments = vec![
            AudioSegment {
                role: AudioRole::Intro,
                source: sources.intro.path.clone(),
                has_audio: sources.intro.has_audio,
                source_secs: retiming.intro_secs(),
                tempo: 1.0,
                gain: 1.0,
                looped: false,
            },
            AudioSegment {
                role: AudioRole::Main,
                source: sources.main.path.clone(),
                has_audio: sources.main.has_audio,
                // Uncapped; extraction pads a short clip so the voice spans the whole output.
                source_secs: retiming.main_secs() * retiming.speed_factor,
                tempo: retiming.speed_factor,
                gain: 1.0,
                looped: false,
            },
        ];
        let gain = cfg.background_gain();
        if let Some(bg) = sources.background.as_ref()
            && gain > 0.0
        {
            segments.push(AudioSegment {
                role: AudioRole::Background,
                source: bg.path.clone(),
                has_audio: bg.has_audio,
                source_secs: retiming.output_secs(),
                tempo: 1.0,
                gain,
                looped: true,
            });
        }
        Self {
            segments,
            target_duration_secs: retiming.output_secs(),
            normalize_loudness: cfg.normalize_loudness,
        }
    }

    pub fn segment(&self, role: AudioRole) -> Option<&AudioSegment> {
        self.segments.iter().find(|s| s.role == role)
    }

    pub fn background(&self) -> Option<&AudioSegment> {
        self.segment(AudioRole::Background)
    }
}

#[cfg(test)]
#[path = "../tests/unit/plan.rs"]
mod tests;
