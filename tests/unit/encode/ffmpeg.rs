use super::*;
use crate::foundation::core::FrameIndex;
use crate::model::QualityPreset;

fn cfg(encoder: &str) -> SinkConfig {
    SinkConfig {
        canvas: Canvas {
            width: 720,
            height: 1280,
        },
        fps: Fps::whole(30).unwrap(),
        encoder: encoder.to_string(),
        quality: QualityPreset::High.params(),
        total_frames: 5400,
    }
}

#[test]
fn canvas_validation_requires_even_nonzero_sizes() {
    assert!(validate_canvas(Canvas {
        width: 0,
        height: 10
    })
    .is_err());
    assert!(validate_canvas(Canvas {
        width: 11,
        height: 10
    })
    .is_err());
    assert!(validate_canvas(Canvas {
        width: 480,
        height: 854
    })
    .is_ok());
}

#[test]
fn encode_args_carry_rate_bitrate_and_frame_count() {
    let args = FfmpegSink::encode_args(&cfg("libx264"));
    let joined = args.join(" ");
    assert!(joined.contains("-s 720x1280"));
    assert!(joined.contains("-r 30/1 -i pipe:0"));
    assert!(joined.contains("-c:v libx264 -b:v 4000000 -g 60"));
    assert!(joined.contains("-preset medium"));
    assert!(joined.contains("-frames:v 5400"));
}

#[test]
fn preset_is_only_passed_to_x264() {
    let args = FfmpegSink::encode_args(&cfg("libopenh264"));
    assert!(!args.iter().any(|a| a == "-preset"));
}

#[test]
fn push_before_begin_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(dir.path().join("v.mp4")));
    let frame = Surface::new(cfg("libx264").canvas);
    assert!(
        sink.push_frame(FrameMeta::new(FrameIndex(0), 0), &frame)
            .is_err()
    );
    assert!(sink.end().is_err());
    sink.abort();
}

#[test]
fn abort_removes_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("partial.mp4");
    std::fs::write(&out, b"partial").unwrap();
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(&out));
    sink.abort();
    assert!(!out.exists());
}

#[test]
fn trial_encode_rejects_odd_canvas_without_spawning() {
    assert!(!trial_encode(
        "libx264",
        Canvas {
            width: 3,
            height: 3
        },
        Fps::whole(30).unwrap()
    ));
}
