use std::path::Path;

use crate::backend::MediaIo;
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::error::ReelResult;
use crate::model::{JobSources, TargetSpec};
use crate::plan::{SegmentPlan, SegmentRole};
use crate::render::compositor::{FrameLoop, SegmentFrames, composite_segment};

/// Composite both segments frame by frame into one video-only file at `out`.
/// Returns the encoded size in bytes. Any failure aborts the sink, removing partial output.
#[tracing::instrument(skip_all, fields(encoder = encoder, frames = target_frames(segments)))]
pub fn render_video(
    media: &mut dyn MediaIo,
    segments: &[SegmentPlan],
    sources: &JobSources,
    target: &TargetSpec,
    encoder: &str,
    out: &Path,
    ctl: &mut FrameLoop<'_>,
) -> ReelResult<u64> {
    ctl.cancel.check()?;
    let mut sink = media.open_sink(out)?;
    sink.begin(SinkConfig {
        canvas: target.canvas,
        fps: target.fps,
        encoder: encoder.to_string(),
        quality: target.quality.params(),
        total_frames: target_frames(segments),
    })?;

    match push_segments(media, sink.as_mut(), segments, sources, target, ctl) {
        Ok(pushed) => {
            let bytes = sink.end()?;
            tracing::info!(pushed, bytes, "video encoded");
            Ok(bytes)
        }
        Err(e) => {
            sink.abort();
            Err(e)
        }
    }
}

fn target_frames(segments: &[SegmentPlan]) -> u64 {
    segments.iter().map(|s| s.frame_count).sum()
}

fn push_segments(
    media: &mut dyn MediaIo,
    sink: &mut dyn FrameSink,
    segments: &[SegmentPlan],
    sources: &JobSources,
    target: &TargetSpec,
    ctl: &mut FrameLoop<'_>,
) -> ReelResult<u64> {
    let mut pushed = 0;
    for segment in segments {
        if segment.frame_count == 0 {
            continue;
        }
        let clip = match segment.role {
            SegmentRole::Intro => &sources.intro,
            SegmentRole::Main => &sources.main,
        };
        ctl.cancel.check()?;
        let mut source = media.open_source(clip, target.fps, segment.speed)?;
        let mut frames = SegmentFrames::new(
            segment,
            target.fps,
            target.canvas,
            target.crop.cut(),
            source.as_mut(),
        )?;
        pushed += composite_segment(&mut frames, sink, ctl)?;
    }
    Ok(pushed)
}
