use super::*;

fn cfg() -> SinkConfig {
    SinkConfig {
        canvas: Canvas {
            width: 4,
            height: 8,
        },
        fps: Fps::whole(30).unwrap(),
        encoder: "libx264".to_string(),
        quality: crate::model::QualityPreset::Low.params(),
        total_frames: 3,
    }
}

fn frame() -> Surface {
    Surface::new(cfg().canvas)
}

#[test]
fn keyframe_hint_every_interval() {
    assert!(FrameMeta::new(FrameIndex(0), 0).keyframe);
    assert!(!FrameMeta::new(FrameIndex(1), 33_333).keyframe);
    assert!(FrameMeta::new(FrameIndex(KEYFRAME_INTERVAL), 2_000_000).keyframe);
}

#[test]
fn in_memory_sink_records_frames_in_order() {
    let mut sink = InMemorySink::with_pixels();
    sink.begin(cfg()).unwrap();
    for i in 0..3u64 {
        sink.push_frame(FrameMeta::new(FrameIndex(i), i * 33_333), &frame())
            .unwrap();
    }
    assert_eq!(sink.end().unwrap(), 3 * 4 * 8 * 4);
    assert_eq!(sink.metas().len(), 3);
    assert_eq!(sink.frames().len(), 3);
    assert!(sink.is_finished());
}

#[test]
fn out_of_order_and_duplicate_timestamps_are_rejected() {
    let mut sink = InMemorySink::new();
    sink.begin(cfg()).unwrap();
    sink.push_frame(FrameMeta::new(FrameIndex(1), 100), &frame())
        .unwrap();
    assert!(
        sink.push_frame(FrameMeta::new(FrameIndex(0), 200), &frame())
            .is_err()
    );
    assert!(
        sink.push_frame(FrameMeta::new(FrameIndex(2), 100), &frame())
            .is_err()
    );
}

#[test]
fn wrong_frame_size_is_rejected() {
    let mut sink = InMemorySink::new();
    sink.begin(cfg()).unwrap();
    let other = Surface::new(Canvas {
        width: 2,
        height: 2,
    });
    assert!(
        sink.push_frame(FrameMeta::new(FrameIndex(0), 0), &other)
            .is_err()
    );
}

#[test]
fn abort_discards_frames() {
    let mut sink = InMemorySink::new();
    sink.begin(cfg()).unwrap();
    sink.push_frame(FrameMeta::new(FrameIndex(0), 0), &frame())
        .unwrap();
    sink.abort();
    assert!(sink.is_aborted());
    assert!(sink.metas().is_empty());
}
