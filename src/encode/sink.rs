use crate::foundation::core::{Canvas, Fps, FrameIndex};
use crate::foundation::error::{ReelError, ReelResult};
use crate::model::QualityParams;
use crate::render::surface::Surface;

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkConfig {
    pub canvas: Canvas,
    pub fps: Fps,
    /// Encoder name selected by the capability probe (e.g. `libx264`).
    pub encoder: String,
    pub quality: QualityParams,
    /// Total number of frames that will be pushed.
    pub total_frames: u64,
}

/// Per-frame metadata handed to the sink alongside the raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameMeta {
    /// Absolute output index.
    pub index: FrameIndex,
    /// Presentation timestamp.
    pub timestamp_micros: u64,
    /// Keyframe hint.
    pub keyframe: bool,
}

/// Keyframe hint interval in frames.
pub const KEYFRAME_INTERVAL: u64 = 60;

impl FrameMeta {
    pub fn new(index: FrameIndex, timestamp_micros: u64) -> Self {
        Self {
            index,
            timestamp_micros,
            keyframe: index.0 % KEYFRAME_INTERVAL == 0,
        }
    }
}

/// Streaming consumer of composited frames.
///
/// Ordering contract: `push_frame` is called with strictly increasing indices and timestamps.
pub trait FrameSink {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> ReelResult<()>;
    fn push_frame(&mut self, meta: FrameMeta, frame: &Surface) -> ReelResult<()>;
    /// Finalize. Returns the number of output bytes written.
    fn end(&mut self) -> ReelResult<u64>;
    /// Tear down without finalizing and discard any partial output.
    fn abort(&mut self);
}

/// Enforces the ordering contract; shared by every sink.
#[derive(Clone, Debug, Default)]
pub(crate) struct OrderGuard {
    last: Option<FrameMeta>,
}

impl OrderGuard {
    pub(crate) fn check(&mut self, meta: FrameMeta) -> ReelResult<()> {
        if let Some(last) = self.last
            && (meta.index <= last.index || meta.timestamp_micros <= last.timestamp_micros)
        {
            return Err(ReelError::internal(format!(
                "frame {} (t={}us) pushed after frame {} (t={}us)",
                meta.index.0, meta.timestamp_micros, last.index.0, last.timestamp_micros
            )));
        }
        self.last = Some(meta);
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.last = None;
    }
}

/// In-memory sink for tests and previews.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    retain_pixels: bool,
    order: OrderGuard,
    metas: Vec<FrameMeta>,
    frames: Vec<Surface>,
    finished: bool,
    aborted: bool,
}

impl InMemorySink {
    /// Sink that records frame metadata only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that also keeps a copy of every raster.
    pub fn with_pixels() -> Self {
        Self {
            retain_pixels: true,
            ..Self::default()
        }
    }

    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    pub fn metas(&self) -> &[FrameMeta] {
        &self.metas
    }

    pub fn frames(&self) -> &[Surface] {
        &self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> ReelResult<()> {
        self.cfg = Some(cfg);
        self.order.reset();
        self.metas.clear();
        self.frames.clear();
        self.finished = false;
        self.aborted = false;
        Ok(())
    }

    fn push_frame(&mut self, meta: FrameMeta, frame: &Surface) -> ReelResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| ReelError::internal("in-memory sink not started"))?;
        if frame.canvas() != cfg.canvas {
            return Err(ReelError::validation("frame size does not match sink canvas"));
        }
        self.order.check(meta)?;
        self.metas.push(meta);
        if self.retain_pixels {
            self.frames.push(frame.clone());
        }
        Ok(())
    }

    fn end(&mut self) -> ReelResult<u64> {
        self.finished = true;
        let bytes = self
            .cfg
            .as_ref()
            .map(|c| c.canvas.rgba_len() as u64 * self.metas.len() as u64)
            .unwrap_or(0);
        Ok(bytes)
    }

    fn abort(&mut self) {
        self.aborted = true;
        self.metas.clear();
        self.frames.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
