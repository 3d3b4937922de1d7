use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::ReelResult;
use crate::geometry::resolve_region;
use crate::job::progress::{ProgressTracker, bands, in_band};
use crate::job::staging::Staging;
use crate::model::{CropCut, JobSources, QualityParams, SourceClip, TargetSpec};
use crate::plan::{SegmentPlan, SegmentRole};
use crate::transcode::{StageRunner, TranscodeCommand};

/// Encoder used by every pipeline pass.
pub const PIPELINE_ENCODER: &str = "libx264";
/// Intermediate passes favour speed; the final pass applies the quality preset.
pub const INTERMEDIATE_PRESET: &str = "ultrafast";
pub const INTERMEDIATE_CRF: u8 = 26;

/// Filter chain mapping one clip onto the canvas at the segment's playback rate, holding the
/// last frame if the clip runs short.
pub fn segment_filter(
    clip: &SourceClip,
    segment: &SegmentPlan,
    canvas: Canvas,
    fps: Fps,
    crop: Option<CropCut>,
) -> ReelResult<String> {
    let region = resolve_region(clip.width, clip.height, canvas, crop)?;
    let span = fps.frames_to_secs(segment.frame_count);
    let setpts = if (segment.speed - 1.0).abs() > f64::EPSILON {
        format!("setpts=(PTS-STARTPTS)/{:.6}", segment.speed)
    } else {
        "setpts=PTS-STARTPTS".to_string()
    };
    Ok(format!(
        "{},{setpts},fps={},tpad=stop_mode=clone:stop_duration={span:.6}",
        region.ffmpeg_filter(canvas),
        fps.ffmpeg_rate(),
    ))
}

/// Video-only intermediate of exactly `segment.frame_count` frames.
pub fn segment_command(
    clip: &SourceClip,
    segment: &SegmentPlan,
    target: &TargetSpec,
    out: &Path,
) -> ReelResult<TranscodeCommand> {
    let filter = segment_filter(clip, segment, target.canvas, target.fps, target.crop.cut())?;
    Ok(TranscodeCommand::new(format!("video-{}", segment.role.label()), out)
        .input(&clip.path)
        .output_arg("-an")
        .video_filter(filter)
        .output_args(["-c:v", PIPELINE_ENCODER, "-preset", INTERMEDIATE_PRESET])
        .output_args(["-crf".to_string(), INTERMEDIATE_CRF.to_string()])
        .output_args(["-pix_fmt", "yuv420p"])
        .output_args(["-frames:v".to_string(), segment.frame_count.to_string()]))
}

/// Demuxer list for `files`, single quotes escaped.
pub fn concat_list(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|f| {
            let path = f.to_string_lossy().replace('\'', "'\\''");
            format!("file '{path}'\n")
        })
        .collect()
}

/// Final single encode pass over the concatenated intermediates.
pub fn final_command(
    list: &Path,
    quality: QualityParams,
    fps: Fps,
    total_frames: u64,
    out: &Path,
) -> TranscodeCommand {
    TranscodeCommand::new("video-final", out)
        .input_with(["-f", "concat", "-safe", "0"], list)
        .output_arg("-an")
        .output_args(["-c:v", PIPELINE_ENCODER, "-preset", quality.encoder_preset])
        .output_args(["-crf".to_string(), quality.crf.to_string()])
        .output_args(["-r".to_string(), fps.ffmpeg_rate()])
        .output_args(["-pix_fmt", "yuv420p"])
        .output_args(["-frames:v".to_string(), total_frames.to_string()])
        .output_args(["-movflags", "+faststart"])
}

/// Produce the video-only file at `out` without frame-level access. Effects are not applied.
#[tracing::instrument(skip_all, fields(frames = segments.iter().map(|s| s.frame_count).sum::<u64>()))]
pub fn render_video(
    runner: &mut StageRunner<'_>,
    staging: &Staging,
    segments: &[SegmentPlan],
    sources: &JobSources,
    target: &TargetSpec,
    out: &Path,
    progress: &mut ProgressTracker,
) -> ReelResult<()> {
    let active: Vec<&SegmentPlan> = segments.iter().filter(|s| s.frame_count > 0).collect();
    if segments.iter().any(|s| !s.effects.is_empty()) {
        tracing::info!("pipeline backend does not render effects; skipping them");
    }
    let steps = active.len() as f64 + 1.0;

    let mut parts = Vec::with_capacity(active.len());
    for (k, segment) in active.iter().enumerate() {
        let clip = match segment.role {
            SegmentRole::Intro => &sources.intro,
            SegmentRole::Main => &sources.main,
        };
        let part = staging.file(&format!("{}_video.mp4", segment.role.label()));
        runner.run(&segment_command(clip, segment, target, &part)?)?;
        parts.push(part);
        progress.stage(
            in_band(bands::VIDEO, (k + 1) as f64 / steps),
            format!("{} segment prepared", segment.role.label()),
        );
    }

    let list = staging.file("concat.txt");
    std::fs::write(&list, concat_list(&parts))
        .with_context(|| format!("write concat list '{}'", list.display()))?;
    let total: u64 = active.iter().map(|s| s.frame_count).sum();
    runner.run(&final_command(
        &list,
        target.quality.params(),
        target.fps,
        total,
        out,
    ))?;
    staging.release(&list);
    for part in &parts {
        staging.release(part);
    }
    progress.stage(in_band(bands::VIDEO, 1.0), "video encoded");
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/backend/pipeline.rs"]
mod tests;
