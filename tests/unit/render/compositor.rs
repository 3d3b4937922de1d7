use super::*;
use crate::encode::sink::{InMemorySink, SinkConfig};
use crate::foundation::error::ReelError;
use crate::job::liveness::NoYield;
use crate::model::{EffectConfig, EffectKind, EffectPosition, QualityPreset};
use crate::plan::{RetimingPlan, SegmentRole};

/// Source whose red channel encodes the sampled time in tenths of a second.
struct RampSource {
    duration: f64,
    frame: Surface,
    requests: Vec<f64>,
}

impl RampSource {
    fn new(duration: f64) -> Self {
        Self {
            duration,
            frame: Surface::new(Canvas {
                width: 4,
                height: 4,
            }),
            requests: Vec::new(),
        }
    }
}

impl FrameSource for RampSource {
    fn width(&self) -> u32 {
        4
    }

    fn height(&self) -> u32 {
        4
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn frame_at(&mut self, source_time: f64) -> ReelResult<Option<&Surface>> {
        self.requests.push(source_time);
        let r = ((source_time * 10.0).round() as u32).min(255) as u8;
        self.frame.clear(Rgba8::rgb(r, 0, 0));
        Ok(Some(&self.frame))
    }
}

struct CancelAfter {
    token: CancelToken,
    yields_left: u32,
}

impl Yield for CancelAfter {
    fn yield_now(&mut self) {
        self.yields_left = self.yields_left.saturating_sub(1);
        if self.yields_left == 0 {
            self.token.cancel();
        }
    }
}

const CANVAS: Canvas = Canvas {
    width: 4,
    height: 4,
};

fn fps10() -> Fps {
    Fps::whole(10).unwrap()
}

fn sink_for(total: u64) -> InMemorySink {
    let mut sink = InMemorySink::with_pixels();
    sink.begin(SinkConfig {
        canvas: CANVAS,
        fps: fps10(),
        encoder: "fake".to_string(),
        quality: QualityPreset::Low.params(),
        total_frames: total,
    })
    .unwrap();
    sink
}

fn run(
    segment: &SegmentPlan,
    source: &mut dyn FrameSource,
    sink: &mut InMemorySink,
    cancel: &CancelToken,
    yielder: &mut dyn Yield,
) -> ReelResult<u64> {
    let mut progress = ProgressTracker::new(None);
    let mut frames = SegmentFrames::new(segment, fps10(), CANVAS, None, source)?;
    let mut ctl = FrameLoop {
        cancel,
        yielder,
        yield_every: 2,
        progress: &mut progress,
        total_frames: 100,
    };
    composite_segment(&mut frames, sink, &mut ctl)
}

#[test]
fn two_segments_fill_budget_with_contiguous_timestamps() {
    let plan = RetimingPlan::new(fps10(), 2.0, 30.0, 10.0).unwrap();
    let [intro, main] = plan.segments(Vec::new(), Vec::new());
    let mut sink = sink_for(plan.output_frame_count);
    let cancel = CancelToken::new();

    let mut a = RampSource::new(2.0);
    let mut b = RampSource::new(30.0);
    let n1 = run(&intro, &mut a, &mut sink, &cancel, &mut NoYield).unwrap();
    let n2 = run(&main, &mut b, &mut sink, &cancel, &mut NoYield).unwrap();
    assert_eq!(n1 + n2, plan.output_frame_count);

    let metas = sink.metas();
    for pair in metas.windows(2) {
        assert_eq!(pair[1].index.0, pair[0].index.0 + 1);
        assert!(pair[1].timestamp_micros > pair[0].timestamp_micros);
    }
    assert_eq!(metas[20].timestamp_micros, 2_000_000);
    // main at 2x speed samples 0.0, 0.2, 0.4 ...
    assert!((b.requests[3] - 0.6).abs() < 1e-9);
}

#[test]
fn exhausted_source_holds_last_frame() {
    let segment = SegmentPlan {
        role: SegmentRole::Main,
        speed: 1.0,
        frame_count: 10,
        first_frame: FrameIndex(0),
        offset_micros: 0,
        effects: Vec::new(),
    };
    let mut src = RampSource::new(0.5);
    let mut sink = sink_for(10);
    run(&segment, &mut src, &mut sink, &CancelToken::new(), &mut NoYield).unwrap();

    assert_eq!(sink.metas().len(), 10);
    assert_eq!(src.requests.len(), 5);
    let last_decoded = sink.frames()[4].clone();
    for f in &sink.frames()[5..] {
        assert_eq!(f, &last_decoded);
    }
}

#[test]
fn ending_effect_only_touches_window() {
    let segment = SegmentPlan {
        role: SegmentRole::Main,
        speed: 1.0,
        frame_count: 20,
        first_frame: FrameIndex(0),
        offset_micros: 0,
        effects: vec![EffectConfig {
            kind: EffectKind::Tv,
            position: EffectPosition::End,
            duration_secs: 0.5,
        }],
    };
    let mut src = RampSource::new(100.0);
    let mut sink = sink_for(20);
    run(&segment, &mut src, &mut sink, &CancelToken::new(), &mut NoYield).unwrap();

    let frames = sink.frames();
    // window is the last 5 frames; frame 14 shows the raw ramp
    assert_eq!(frames[14].pixel(0, 0)[0], 14);
    // progress 0.4: one bar row top and bottom, odd rows untouched by scanlines
    assert_eq!(frames[17].pixel(0, 0), [0, 0, 0, 255]);
    assert_eq!(frames[17].pixel(0, 1)[0], 17);
}

#[test]
fn cancellation_before_first_frame_pushes_nothing() {
    let segment = SegmentPlan {
        role: SegmentRole::Intro,
        speed: 1.0,
        frame_count: 10,
        first_frame: FrameIndex(0),
        offset_micros: 0,
        effects: Vec::new(),
    };
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut src = RampSource::new(10.0);
    let mut sink = sink_for(10);
    let err = run(&segment, &mut src, &mut sink, &cancel, &mut NoYield).unwrap_err();
    assert!(matches!(err, ReelError::Cancelled));
    assert!(sink.metas().is_empty());
    assert!(src.requests.is_empty());
}

#[test]
fn cancellation_mid_loop_stops_at_next_frame() {
    let segment = SegmentPlan {
        role: SegmentRole::Intro,
        speed: 1.0,
        frame_count: 50,
        first_frame: FrameIndex(0),
        offset_micros: 0,
        effects: Vec::new(),
    };
    let cancel = CancelToken::new();
    let mut yielder = CancelAfter {
        token: cancel.clone(),
        yields_left: 3,
    };
    let mut src = RampSource::new(10.0);
    let mut sink = sink_for(50);
    let err = run(&segment, &mut src, &mut sink, &cancel, &mut yielder).unwrap_err();
    assert!(matches!(err, ReelError::Cancelled));
    // yield_every = 2, third yield after frame 6
    assert_eq!(sink.metas().len(), 6);
}

#[test]
fn single_frame_matches_streamed_frame() {
    let segment = SegmentPlan {
        role: SegmentRole::Main,
        speed: 1.0,
        frame_count: 20,
        first_frame: FrameIndex(0),
        offset_micros: 0,
        effects: vec![EffectConfig {
            kind: EffectKind::Tv,
            position: EffectPosition::End,
            duration_secs: 0.5,
        }],
    };
    let mut src = RampSource::new(100.0);
    let mut sink = sink_for(20);
    run(&segment, &mut src, &mut sink, &CancelToken::new(), &mut NoYield).unwrap();

    let mut single = RampSource::new(100.0);
    let frame = render_segment_frame(&segment, fps10(), CANVAS, None, &mut single, 17).unwrap();
    assert_eq!(&frame, &sink.frames()[17]);
}

#[test]
fn single_frame_past_source_end_clamps() {
    let segment = SegmentPlan {
        role: SegmentRole::Main,
        speed: 1.0,
        frame_count: 50,
        first_frame: FrameIndex(0),
        offset_micros: 0,
        effects: Vec::new(),
    };
    let mut src = RampSource::new(2.0);
    render_segment_frame(&segment, fps10(), CANVAS, None, &mut src, 40).unwrap();
    assert!((src.requests[0] - 1.9).abs() < 1e-9);
}
