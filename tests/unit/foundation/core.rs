use super::*;

#[test]
fn fps_new_rejects_zero_parts() {
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(30, 0).is_err());
}

#[test]
fn secs_to_frames_floor_is_exact_for_whole_rates() {
    let fps = Fps::whole(30).unwrap();
    assert_eq!(fps.secs_to_frames_floor(180.0), 5400);
    assert_eq!(fps.secs_to_frames_floor(0.1 * 3.0), 9);
    assert_eq!(fps.secs_to_frames_floor(10.033), 300);
    assert_eq!(fps.secs_to_frames_floor(-1.0), 0);
    assert_eq!(fps.secs_to_frames_floor(f64::NAN), 0);
}

#[test]
fn frames_to_micros_handles_rational_rates() {
    let fps = Fps::whole(30).unwrap();
    assert_eq!(fps.frames_to_micros(30), 1_000_000);
    assert_eq!(fps.frames_to_micros(1), 33_333);

    let ntsc = Fps::new(30_000, 1001).unwrap();
    assert_eq!(ntsc.frames_to_micros(30_000), 1_001_000_000);
}

#[test]
fn ffmpeg_rate_is_rational() {
    assert_eq!(Fps::new(24, 1).unwrap().ffmpeg_rate(), "24/1");
}

#[test]
fn rgba_with_opacity_clamps() {
    assert_eq!(Rgba8::WHITE.with_opacity(2.0).a, 255);
    assert_eq!(Rgba8::WHITE.with_opacity(-1.0).a, 0);
    assert_eq!(Rgba8::BLACK.with_opacity(0.5).a, 128);
}
