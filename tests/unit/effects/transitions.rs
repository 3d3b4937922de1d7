use super::*;
use crate::effects::composite::fill;
use crate::foundation::core::Canvas;

const KINDS: [EffectKind; 5] = [
    EffectKind::Tv,
    EffectKind::Vhs,
    EffectKind::Focus,
    EffectKind::Tremble,
    EffectKind::Zoom,
];

fn white(width: u32, height: u32) -> Surface {
    let mut s = Surface::new(Canvas { width, height });
    fill(&mut s, Rgba8::WHITE);
    s
}

fn fps30() -> Fps {
    Fps::whole(30).unwrap()
}

fn effect(kind: EffectKind, position: EffectPosition) -> EffectConfig {
    EffectConfig {
        kind,
        position,
        duration_secs: 1.0,
    }
}

#[test]
fn identical_progress_gives_identical_pixels() {
    for kind in KINDS {
        for p in [0.0, 0.13, 0.5, 0.97] {
            let mut a = white(64, 96);
            let mut b = white(64, 96);
            apply(&mut a, kind, p);
            apply(&mut b, kind, p);
            assert_eq!(a, b, "{kind:?} at {p}");
        }
    }
}

#[test]
fn progress_one_is_untouched() {
    for kind in KINDS {
        let mut s = white(16, 16);
        apply(&mut s, kind, 1.0);
        assert_eq!(s, white(16, 16), "{kind:?}");
    }
    let mut s = white(16, 16);
    apply(&mut s, EffectKind::Tv, f32::NAN);
    assert_eq!(s, white(16, 16));
}

#[test]
fn fully_applied_effects_change_the_frame() {
    for kind in [EffectKind::Tv, EffectKind::Vhs, EffectKind::Focus, EffectKind::Zoom] {
        let mut s = white(32, 48);
        apply(&mut s, kind, 0.0);
        assert_ne!(s, white(32, 48), "{kind:?}");
    }
}

#[test]
fn tv_closes_bars_and_draws_center_line() {
    let mut s = white(8, 20);
    apply(&mut s, EffectKind::Tv, 0.0);
    assert_eq!(s.pixel(0, 0), [0, 0, 0, 255]);
    assert_eq!(s.pixel(0, 19), [0, 0, 0, 255]);
    assert_eq!(s.pixel(0, 10), [255, 255, 255, 255]);

    let mut s = white(8, 20);
    apply(&mut s, EffectKind::Tv, 0.5);
    // bars cover h/2 * 0.5 = 5 rows top and bottom, no line yet
    assert_eq!(s.pixel(0, 4), [0, 0, 0, 255]);
    assert_ne!(s.pixel(0, 9), [0, 0, 0, 255]);
}

#[test]
fn tv_skips_scanlines_once_bars_are_gone() {
    // 20 rows: h/2 * (1 - 0.95) = 0.5, so no bar row remains
    let mut s = white(8, 20);
    apply(&mut s, EffectKind::Tv, 0.95);
    assert_eq!(s, white(8, 20));

    let mut s = white(8, 20);
    apply(&mut s, EffectKind::Tv, 0.5);
    // even rows between the bars carry the scanline
    assert_ne!(s.pixel(0, 8), [255, 255, 255, 255]);
    assert_eq!(s.pixel(0, 9), [255, 255, 255, 255]);
}

#[test]
fn vhs_speckles_are_short() {
    let (w, h) = (200, 300);
    let mut s = Surface::new(Canvas { width: w, height: h });
    fill(&mut s, Rgba8::BLACK);
    apply(&mut s, EffectKind::Vhs, 0.0);
    // rows lit end to end belong to the tracking bar; the rest is speckle
    let speckled: u32 = (0..h)
        .map(|y| (0..w).filter(|&x| s.pixel(x, y)[0] > 0).count() as u32)
        .filter(|&lit| lit < w)
        .sum();
    assert!(speckled > 0);
    assert!(speckled <= 50 * 2, "{speckled} speckle pixels");
}

#[test]
fn focus_darkens_edges_more_than_center() {
    let mut s = white(40, 40);
    apply(&mut s, EffectKind::Focus, 0.0);
    assert!(s.pixel(0, 0)[0] < s.pixel(20, 20)[0]);
}

#[test]
fn end_window_reaches_zero_on_last_frame() {
    let e = effect(EffectKind::Tv, EffectPosition::End);
    let frames = 100;
    assert_eq!(window_frames(&e, fps30(), frames), 30);
    assert_eq!(progress_at(&e, fps30(), 69, frames), None);
    let first = progress_at(&e, fps30(), 70, frames).unwrap();
    assert!((first - 29.0 / 30.0).abs() < 1e-6);
    assert_eq!(progress_at(&e, fps30(), 99, frames), Some(0.0));
    assert_eq!(progress_at(&e, fps30(), 100, frames), None);
}

#[test]
fn start_window_mirrors_end_window() {
    let e = effect(EffectKind::Vhs, EffectPosition::Start);
    assert_eq!(progress_at(&e, fps30(), 0, 100), Some(0.0));
    let p = progress_at(&e, fps30(), 15, 100).unwrap();
    assert!((p - 0.5).abs() < 1e-6);
    assert_eq!(progress_at(&e, fps30(), 30, 100), None);
}

#[test]
fn window_is_capped_by_short_segments() {
    let e = effect(EffectKind::Zoom, EffectPosition::End);
    assert_eq!(window_frames(&e, fps30(), 10), 10);
    assert_eq!(progress_at(&e, fps30(), 0, 10), Some(0.9));
    assert_eq!(progress_at(&e, fps30(), 0, 0), None);
    assert_eq!(
        progress_at(&effect(EffectKind::None, EffectPosition::End), fps30(), 9, 10),
        None
    );
}

#[test]
fn segment_effects_report_when_applied() {
    let effects = [
        effect(EffectKind::Tv, EffectPosition::Start),
        effect(EffectKind::Zoom, EffectPosition::End),
    ];
    let mut s = white(8, 8);
    assert!(apply_segment_effects(&mut s, &effects, fps30(), 0, 100));
    let mut s = white(8, 8);
    assert!(!apply_segment_effects(&mut s, &effects, fps30(), 50, 100));
    assert_eq!(s, white(8, 8));
}
