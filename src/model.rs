use std::path::{Path, PathBuf};

use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{ReelError, ReelResult};

/// A probed source media file. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SourceClip {
    /// Location of the raw media bytes.
    pub path: PathBuf,
    /// Duration in seconds.
    pub duration: f64,
    /// Width in pixels (0 for audio-only files).
    pub width: u32,
    /// Height in pixels (0 for audio-only files).
    pub height: u32,
    /// Whether at least one audio stream exists.
    pub has_audio: bool,
}

/// Encoder quality tier.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    /// 1.5 Mb/s, fastest preset.
    Low,
    /// 2.5 Mb/s.
    #[default]
    Medium,
    /// 4 Mb/s, slowest preset.
    High,
}

/// Concrete encoder parameters behind a [`QualityPreset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QualityParams {
    /// Target video bitrate in bits per second.
    pub bitrate: u32,
    /// Constant rate factor for whole-file encodes.
    pub crf: u8,
    /// x264-style speed preset.
    pub encoder_preset: &'static str,
}

impl QualityPreset {
    pub fn params(self) -> QualityParams {
        match self {
            Self::Low => QualityParams {
                bitrate: 1_500_000,
                crf: 28,
                encoder_preset: "ultrafast",
            },
            Self::Medium => QualityParams {
                bitrate: 2_500_000,
                crf: 23,
                encoder_preset: "fast",
            },
            Self::High => QualityParams {
                bitrate: 4_000_000,
                crf: 18,
                encoder_preset: "medium",
            },
        }
    }
}

/// Output resolution, always a 9:16 portrait pair.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum,
)]
pub enum Resolution {
    /// 480x854.
    #[serde(rename = "480")]
    #[value(name = "480")]
    R480,
    /// 720x1280.
    #[default]
    #[serde(rename = "720")]
    #[value(name = "720")]
    R720,
    /// 1080x1920.
    #[serde(rename = "1080")]
    #[value(name = "1080")]
    R1080,
}

impl Resolution {
    pub fn canvas(self) -> Canvas {
        let (width, height) = match self {
            Self::R480 => (480, 854),
            Self::R720 => (720, 1280),
            Self::R1080 => (1080, 1920),
        };
        Canvas { width, height }
    }
}

/// Enumerated output frame rates.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum,
)]
pub enum FrameRate {
    #[serde(rename = "24")]
    #[value(name = "24")]
    F24,
    #[default]
    #[serde(rename = "30")]
    #[value(name = "30")]
    F30,
    #[serde(rename = "60")]
    #[value(name = "60")]
    F60,
}

impl FrameRate {
    pub fn fps(self) -> Fps {
        let n = match self {
            Self::F24 => 24,
            Self::F30 => 30,
            Self::F60 => 60,
        };
        Fps { num: n, den: 1 }
    }
}

/// Removes a device status bar / navigation bar before scaling.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CropCut {
    /// Fraction of source height removed at the top, in `[0, 0.5)`.
    pub top_cut_pct: f64,
    /// Fraction of source height removed at the bottom, in `[0, 0.5)`.
    pub bottom_cut_pct: f64,
}

impl CropCut {
    pub fn validate(&self) -> ReelResult<()> {
        for (name, v) in [("top", self.top_cut_pct), ("bottom", self.bottom_cut_pct)] {
            if !v.is_finite() || !(0.0..0.5).contains(&v) {
                return Err(ReelError::validation(format!(
                    "crop {name} cut must be within [0, 0.5), got {v}"
                )));
            }
        }
        Ok(())
    }

    /// Fraction of the source height that survives the cut. Always positive for valid cuts.
    pub fn kept_fraction(&self) -> f64 {
        1.0 - self.top_cut_pct - self.bottom_cut_pct
    }
}

/// Named device crop presets.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropPreset {
    /// No crop.
    #[default]
    None,
    /// Galaxy Tab S9 screen recordings.
    TabS9,
    /// Galaxy S25 Ultra screen recordings.
    S25Ultra,
    /// Caller-supplied cut fractions.
    Custom(CropCut),
}

impl CropPreset {
    pub fn cut(self) -> Option<CropCut> {
        match self {
            Self::None => None,
            Self::TabS9 => Some(CropCut {
                top_cut_pct: 0.055,
                bottom_cut_pct: 0.090,
            }),
            Self::S25Ultra => Some(CropCut {
                top_cut_pct: 0.090,
                bottom_cut_pct: 0.040,
            }),
            Self::Custom(cut) => Some(cut),
        }
    }
}

/// Transition effect variants.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    #[default]
    None,
    Tv,
    Vhs,
    Focus,
    Tremble,
    Zoom,
}

impl EffectKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Tv => "tv",
            Self::Vhs => "vhs",
            Self::Focus => "focus",
            Self::Tremble => "tremble",
            Self::Zoom => "zoom",
        }
    }
}

/// Which boundary of a segment an effect is anchored to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectPosition {
    Start,
    End,
}

/// One effect placed on one segment boundary.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EffectConfig {
    pub kind: EffectKind,
    pub position: EffectPosition,
    pub duration_secs: f64,
}

/// Which video backend to use.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Probe for a frame encoder; fall back to the command pipeline.
    #[default]
    Auto,
    /// Per-frame compositing into a streaming encoder.
    Direct,
    /// Whole-file command pipeline (no effects).
    Pipeline,
}

/// Output target for one job.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetSpec {
    pub canvas: Canvas,
    pub fps: Fps,
    pub target_duration_secs: f64,
    pub quality: QualityPreset,
    pub crop: CropPreset,
}

/// Application-defined bounds applied by [`JobConfig::validate`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Per-file size ceiling in bytes.
    pub max_file_bytes: u64,
    /// Minimum aggregate (intro + main) source duration.
    pub min_total_secs: f64,
    /// Maximum aggregate (intro + main) source duration.
    pub max_total_secs: f64,
    /// Target duration clamp.
    pub min_target_secs: f64,
    pub max_target_secs: f64,
    /// Effect duration clamp.
    pub min_effect_secs: f64,
    pub max_effect_secs: f64,
    /// Accepted background audio extensions, lowercase.
    pub audio_extensions: Vec<String>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_bytes: 500 * 1024 * 1024,
            min_total_secs: 1.0,
            max_total_secs: 2.0 * 60.0 * 60.0,
            min_target_secs: 10.0,
            max_target_secs: 600.0,
            min_effect_secs: 0.5,
            max_effect_secs: 2.0,
            audio_extensions: ["wav", "mp3", "m4a", "aac", "ogg"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Effect selection as exposed to callers: one transition across the intro→main boundary and
/// one ending effect at the end of the main clip.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EffectSelection {
    pub transition: EffectKind,
    pub ending: EffectKind,
    pub duration_secs: Option<f64>,
}

/// Caller-visible job options. Loadable from JSON; every field has a default.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub resolution: Resolution,
    pub fps: FrameRate,
    pub quality: QualityPreset,
    pub target_duration_secs: f64,
    /// Background audio gain in percent, 0..=100.
    pub background_gain_pct: u8,
    pub crop: CropPreset,
    pub effects: EffectSelection,
    pub backend: BackendChoice,
    /// Apply EBU R128 loudness normalization while extracting voice audio.
    pub normalize_loudness: bool,
    /// Hold a wake lock and an inaudible keep-alive signal while encoding.
    pub keep_alive: bool,
    /// Yield to the host every this many frames.
    pub yield_every_frames: u32,
    pub limits: Limits,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            fps: FrameRate::default(),
            quality: QualityPreset::default(),
            target_duration_secs: 180.0,
            background_gain_pct: 10,
            crop: CropPreset::None,
            effects: EffectSelection::default(),
            backend: BackendChoice::Auto,
            normalize_loudness: false,
            keep_alive: true,
            yield_every_frames: 4,
            limits: Limits::default(),
        }
    }
}

pub const DEFAULT_EFFECT_SECS: f64 = 1.0;

impl JobConfig {
    /// Load from a JSON file.
    pub fn from_json_file(path: &Path) -> ReelResult<Self> {
        use anyhow::Context as _;
        let f = std::fs::File::open(path)
            .with_context(|| format!("open job config '{}'", path.display()))?;
        let cfg = serde_json::from_reader(std::io::BufReader::new(f))
            .with_context(|| format!("parse job config '{}'", path.display()))?;
        Ok(cfg)
    }

    /// Configuration-only checks. Source-dependent checks live in [`validate_sources`].
    pub fn validate(&self) -> ReelResult<()> {
        if !self.target_duration_secs.is_finite() || self.target_duration_secs <= 0.0 {
            return Err(ReelError::validation("target duration must be positive"));
        }
        if self.background_gain_pct > 100 {
            return Err(ReelError::validation(
                "background gain must be within 0..=100 percent",
            ));
        }
        if let Some(cut) = self.crop.cut() {
            cut.validate()?;
        }
        if let Some(d) = self.effects.duration_secs
            && (!d.is_finite() || d <= 0.0)
        {
            return Err(ReelError::validation("effect duration must be positive"));
        }
        Ok(())
    }

    /// Target duration clamped into `[min_target_secs, max_target_secs]`.
    pub fn clamped_target_secs(&self) -> f64 {
        self.target_duration_secs
            .clamp(self.limits.min_target_secs, self.limits.max_target_secs)
    }

    pub fn effect_duration_secs(&self) -> f64 {
        self.effects
            .duration_secs
            .unwrap_or(DEFAULT_EFFECT_SECS)
            .clamp(self.limits.min_effect_secs, self.limits.max_effect_secs)
    }

    pub fn background_gain(&self) -> f64 {
        f64::from(self.background_gain_pct.min(100)) / 100.0
    }

    pub fn target_spec(&self) -> TargetSpec {
        TargetSpec {
            canvas: self.resolution.canvas(),
            fps: self.fps.fps(),
            target_duration_secs: self.clamped_target_secs(),
            quality: self.quality,
            crop: self.crop,
        }
    }

    /// Effects anchored to the intro segment: the transition closes it.
    pub fn intro_effects(&self) -> Vec<EffectConfig> {
        let mut out = Vec::new();
        if self.effects.transition != EffectKind::None {
            out.push(EffectConfig {
                kind: self.effects.transition,
                position: EffectPosition::End,
                duration_secs: self.effect_duration_secs(),
            });
        }
        out
    }

    /// Effects anchored to the main segment: the transition opens it, the ending closes it.
    pub fn main_effects(&self) -> Vec<EffectConfig> {
        let mut out = Vec::new();
        if self.effects.transition != EffectKind::None {
            out.push(EffectConfig {
                kind: self.effects.transition,
                position: EffectPosition::Start,
                duration_secs: self.effect_duration_secs(),
            });
        }
        if self.effects.ending != EffectKind::None {
            out.push(EffectConfig {
                kind: self.effects.ending,
                position: EffectPosition::End,
                duration_secs: self.effect_duration_secs(),
            });
        }
        out
    }
}

/// Input files for one job, before probing.
#[derive(Clone, Debug, PartialEq)]
pub struct JobInputs {
    pub intro: PathBuf,
    pub main: PathBuf,
    pub background: Option<PathBuf>,
}

/// Probed sources for one job.
#[derive(Clone, Debug, PartialEq)]
pub struct JobSources {
    pub intro: SourceClip,
    pub main: SourceClip,
    pub background: Option<SourceClip>,
}

/// Checks that need only the paths: the background extension allow-list and the per-file
/// size ceiling. Runs before anything is probed.
pub fn validate_inputs(inputs: &JobInputs, limits: &Limits) -> ReelResult<()> {
    if let Some(bg) = inputs.background.as_deref() {
        let ext = bg
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !limits.audio_extensions.iter().any(|a| *a == ext) {
            return Err(ReelError::validation(format!(
                "background audio '{}' is not one of: {}",
                bg.display(),
                limits.audio_extensions.join(", ")
            )));
        }
    }
    let files = [("intro", Some(inputs.intro.as_path())), ("main", Some(inputs.main.as_path()))]
        .into_iter()
        .chain([("background", inputs.background.as_deref())]);
    for (label, path) in files {
        if let Some(path) = path {
            check_size(label, path, limits)?;
        }
    }
    Ok(())
}

/// Checks on probed facts: durations, stream presence.
pub fn validate_sources(sources: &JobSources, limits: &Limits) -> ReelResult<()> {
    for (label, clip) in [("intro", &sources.intro), ("main", &sources.main)] {
        if !clip.duration.is_finite() || clip.duration <= 0.0 {
            return Err(ReelError::validation(format!(
                "{label} clip has no decodable duration"
            )));
        }
        if clip.width == 0 || clip.height == 0 {
            return Err(ReelError::validation(format!(
                "{label} clip has no video stream"
            )));
        }
    }

    let total = sources.intro.duration + sources.main.duration;
    if total < limits.min_total_secs || total > limits.max_total_secs {
        return Err(ReelError::validation(format!(
            "combined source duration {total:.1}s is outside [{:.0}s, {:.0}s]",
            limits.min_total_secs, limits.max_total_secs
        )));
    }

    if let Some(bg) = sources.background.as_ref()
        && !bg.has_audio
    {
        return Err(ReelError::validation(
            "background file contains no audio stream",
        ));
    }
    Ok(())
}

fn check_size(label: &str, path: &Path, limits: &Limits) -> ReelResult<()> {
    // Missing files are reported by the prober.
    let Ok(meta) = std::fs::metadata(path) else {
        return Ok(());
    };
    let size = meta.len();
    if size > limits.max_file_bytes {
        return Err(ReelError::validation(format!(
            "{label} file is {size} bytes, limit is {}",
            limits.max_file_bytes
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../tests/unit/model.rs"]
mod tests;
