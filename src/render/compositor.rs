use crate::assets::media::FrameSource;
use crate::effects::composite::blit_region;
use crate::effects::transitions::{apply_segment_effects, progress_at};
use crate::encode::sink::{FrameMeta, FrameSink};
use crate::foundation::core::{Canvas, Fps, FrameIndex, Rgba8};
use crate::foundation::error::ReelResult;
use crate::geometry::{Region, resolve_region};
use crate::job::CancelToken;
use crate::job::liveness::Yield;
use crate::job::progress::{ProgressTracker, bands, in_band};
use crate::model::CropCut;
use crate::plan::SegmentPlan;
use crate::render::surface::Surface;

/// Injected capabilities of the frame loop.
pub struct FrameLoop<'a> {
    pub cancel: &'a CancelToken,
    pub yielder: &'a mut dyn Yield,
    /// Yield after this many frames (0 disables yielding).
    pub yield_every: u32,
    pub progress: &'a mut ProgressTracker,
    /// Frame count of the whole job, for progress.
    pub total_frames: u64,
}

/// Lazy, finite sequence of composited frames for one segment.
pub struct SegmentFrames<'a> {
    segment: &'a SegmentPlan,
    fps: Fps,
    region: Region,
    source: &'a mut dyn FrameSource,
    /// Source frame blitted onto black; held when the source runs out.
    base: Surface,
    /// `base` with effects applied.
    out: Surface,
    next: u64,
    exhausted: bool,
}

impl<'a> SegmentFrames<'a> {
    pub fn new(
        segment: &'a SegmentPlan,
        fps: Fps,
        canvas: Canvas,
        crop: Option<CropCut>,
        source: &'a mut dyn FrameSource,
    ) -> ReelResult<Self> {
        let region = resolve_region(source.width(), source.height(), canvas, crop)?;
        Ok(Self {
            segment,
            fps,
            region,
            source,
            base: Surface::new(canvas),
            out: Surface::new(canvas),
            next: 0,
            exhausted: false,
        })
    }

    pub fn remaining(&self) -> u64 {
        self.segment.frame_count.saturating_sub(self.next)
    }

    /// Whether the source ran out and the last frame is being held.
    pub fn is_holding(&self) -> bool {
        self.exhausted
    }

    /// Produce the next frame, or `None` after the segment's last frame.
    pub fn next_frame(&mut self) -> ReelResult<Option<(FrameMeta, &Surface)>> {
        if self.next >= self.segment.frame_count {
            return Ok(None);
        }
        let i = self.next;
        self.next += 1;

        if !self.exhausted {
            let t = self.segment.source_time(self.fps, i);
            let decoded = if t >= self.source.duration() {
                None
            } else {
                self.source.frame_at(t)?
            };
            match decoded {
                Some(frame) => {
                    self.base.clear(Rgba8::BLACK);
                    blit_region(&mut self.base, frame, &self.region);
                }
                None => {
                    tracing::debug!(
                        segment = self.segment.role.label(),
                        frame = i,
                        "source exhausted; holding last frame"
                    );
                    self.exhausted = true;
                }
            }
        }

        let meta = FrameMeta::new(
            FrameIndex(self.segment.first_frame.0 + i),
            self.segment.timestamp_micros(self.fps, i),
        );
        let frames = self.segment.frame_count;
        let has_effect = self
            .segment
            .effects
            .iter()
            .any(|e| progress_at(e, self.fps, i, frames).is_some());
        if has_effect {
            self.out.clone_from(&self.base);
            apply_segment_effects(&mut self.out, &self.segment.effects, self.fps, i, frames);
            Ok(Some((meta, &self.out)))
        } else {
            Ok(Some((meta, &self.base)))
        }
    }
}

/// Composite segment-local frame `i` on its own, seeking the source directly.
/// Sample times past the end of the source are clamped to its last frame.
pub fn render_segment_frame(
    segment: &SegmentPlan,
    fps: Fps,
    canvas: Canvas,
    crop: Option<CropCut>,
    source: &mut dyn FrameSource,
    i: u64,
) -> ReelResult<Surface> {
    let region = resolve_region(source.width(), source.height(), canvas, crop)?;
    let mut out = Surface::new(canvas);
    let duration = source.duration();
    let t = segment.source_time(fps, i).min((duration - fps.frame_duration_secs()).max(0.0));
    if let Some(frame) = source.frame_at(t)? {
        blit_region(&mut out, frame, &region);
    }
    apply_segment_effects(&mut out, &segment.effects, fps, i, segment.frame_count);
    Ok(out)
}

/// Drive one segment into `sink`. Returns the number of frames pushed.
#[tracing::instrument(skip_all, fields(segment = frames.segment.role.label(), count = frames.segment.frame_count))]
pub fn composite_segment(
    frames: &mut SegmentFrames<'_>,
    sink: &mut dyn FrameSink,
    ctl: &mut FrameLoop<'_>,
) -> ReelResult<u64> {
    let label = frames.segment.role.label();
    let total = ctl.total_frames;
    let mut pushed = 0u64;
    loop {
        ctl.cancel.check()?;
        let Some((meta, surface)) = frames.next_frame()? else {
            break;
        };
        sink.push_frame(meta, surface)?;
        pushed += 1;

        if ctl.yield_every > 0 && pushed.is_multiple_of(u64::from(ctl.yield_every)) {
            ctl.yielder.yield_now();
        }
        let done = meta.index.0 + 1;
        let fraction = done as f64 / total.max(1) as f64;
        ctl.progress.frame(in_band(bands::VIDEO, fraction), || {
            format!("encoding {label} frame {done}/{total}")
        });
    }
    tracing::debug!(pushed, held = frames.is_holding(), "segment composited");
    Ok(pushed)
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
