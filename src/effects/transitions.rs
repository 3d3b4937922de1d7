use crate::effects::composite::{darken_rows, fill, fill_rect, radial_darken};
use crate::foundation::core::{Fps, Rgba8};
use crate::foundation::math::NoiseRng;
use crate::model::{EffectConfig, EffectKind, EffectPosition};
use crate::render::surface::Surface;

const CYAN: Rgba8 = Rgba8::rgb(0, 255, 255);

/// Apply `kind` at `progress` (1 = untouched, 0 = fully applied).
///
/// Pure in `(surface, kind, progress)`: noise is seeded from `progress` alone.
pub fn apply(surface: &mut Surface, kind: EffectKind, progress: f32) {
    let progress = if progress.is_finite() {
        progress.clamp(0.0, 1.0)
    } else {
        1.0
    };
    if progress >= 1.0 {
        return;
    }
    match kind {
        EffectKind::None => {}
        EffectKind::Tv => tv(surface, progress),
        EffectKind::Vhs => vhs(surface, progress),
        EffectKind::Focus => focus(surface, progress),
        EffectKind::Tremble => tremble(surface, progress),
        EffectKind::Zoom => zoom(surface, progress),
    }
}

/// Frames covered by an effect window inside a segment of `segment_frames` frames.
pub fn window_frames(effect: &EffectConfig, fps: Fps, segment_frames: u64) -> u64 {
    fps.secs_to_frames_round(effect.duration_secs).min(segment_frames)
}

/// Progress of `effect` at segment-local frame `i`, or `None` outside its window.
pub fn progress_at(effect: &EffectConfig, fps: Fps, i: u64, segment_frames: u64) -> Option<f32> {
    if effect.kind == EffectKind::None || i >= segment_frames {
        return None;
    }
    let n = window_frames(effect, fps, segment_frames);
    if n == 0 {
        return None;
    }
    match effect.position {
        EffectPosition::Start => (i < n).then(|| i as f32 / n as f32),
        EffectPosition::End => {
            let left = segment_frames - 1 - i;
            (left < n).then(|| left as f32 / n as f32)
        }
    }
}

/// Apply every effect of a segment whose window covers frame `i`.
pub fn apply_segment_effects(
    surface: &mut Surface,
    effects: &[EffectConfig],
    fps: Fps,
    i: u64,
    segment_frames: u64,
) -> bool {
    let mut applied = false;
    for effect in effects {
        if let Some(p) = progress_at(effect, fps, i, segment_frames) {
            apply(surface, effect.kind, p);
            applied = true;
        }
    }
    applied
}

fn tv(surface: &mut Surface, progress: f32) {
    let (w, h) = (surface.width(), surface.height());
    let inv = 1.0 - progress;

    // Scanlines only while the bars are still open.
    let bar = ((h as f32 / 2.0) * inv).floor() as u32;
    if bar > 0 {
        fill_rect(surface, 0, 0, w, bar, Rgba8::BLACK);
        fill_rect(surface, 0, i64::from(h) - i64::from(bar), w, bar, Rgba8::BLACK);

        let keep = 1.0 - 0.4 * inv;
        for y in (0..h).step_by(2) {
            darken_rows(surface, y, 1, keep);
        }
    }

    if progress < 0.15 {
        let line = 6u32.min(h);
        fill_rect(
            surface,
            0,
            i64::from(h / 2) - i64::from(line / 2),
            w,
            line,
            Rgba8::WHITE,
        );
    }
}

fn vhs(surface: &mut Surface, progress: f32) {
    let (w, h) = (surface.width(), surface.height());
    let intensity = 1.0 - progress;
    let mut rng = NoiseRng::from_progress("vhs", progress);

    let speckles = (50.0 * intensity).round() as u32;
    let speckle = Rgba8::WHITE.with_opacity(0.15 * intensity);
    for _ in 0..speckles {
        let x = rng.below(w);
        let y = rng.below(h);
        let len = 1 + rng.below(2);
        fill_rect(surface, i64::from(x), i64::from(y), len, 1, speckle);
    }

    let bands = (5.0 * intensity).round() as u32;
    let band = CYAN.with_opacity(0.3 * intensity);
    for _ in 0..bands {
        let y = rng.below(h);
        fill_rect(surface, 0, i64::from(y), w, 2, band);
    }

    let track_y = ((intensity * 1.5 * h as f32) % h.max(1) as f32) as i64;
    fill_rect(
        surface,
        0,
        track_y,
        w,
        8,
        Rgba8::WHITE.with_opacity(0.5 * intensity),
    );
}

fn focus(surface: &mut Surface, progress: f32) {
    let (w, h) = (surface.width() as f32, surface.height() as f32);
    let i = 1.0 - progress;
    radial_darken(
        surface,
        w / 2.0,
        h / 2.0,
        w.max(h) * 0.6,
        &[(0.0, 0.0), (0.5, 0.3 * i), (1.0, 0.9 * i)],
    );
    fill(surface, Rgba8::BLACK.with_opacity(0.7 * i));
}

fn tremble(surface: &mut Surface, progress: f32) {
    let (w, h) = (surface.width(), surface.height());
    let intensity = 1.0 - progress;
    let mut rng = NoiseRng::from_progress("tremble", progress);

    if rng.next_f32() < 0.35 * intensity {
        let flash = if rng.next_f32() < 0.5 {
            Rgba8::WHITE
        } else {
            Rgba8::BLACK
        };
        fill(surface, flash.with_opacity(0.3 + 0.5 * intensity));
    }

    let bands = (6.0 * intensity).round() as u32;
    for _ in 0..bands {
        if rng.next_f32() >= intensity {
            continue;
        }
        let y = rng.below(h);
        let thickness = 1 + rng.below(3);
        let shade = if rng.next_f32() < 0.5 {
            Rgba8::WHITE.with_opacity(0.4 * intensity)
        } else {
            Rgba8::BLACK.with_opacity(0.6 * intensity)
        };
        fill_rect(surface, 0, i64::from(y), w, thickness, shade);
    }
}

fn zoom(surface: &mut Surface, progress: f32) {
    let (w, h) = (surface.width() as f32, surface.height() as f32);
    let i = 1.0 - progress;
    let radius = w.max(h) * (0.8 - 0.5 * i);
    radial_darken(
        surface,
        w / 2.0,
        h / 2.0,
        radius,
        &[(0.0, 0.0), (0.7, 0.5 * i), (1.0, i)],
    );
    fill(surface, Rgba8::BLACK.with_opacity(0.6 * i));
}

#[cfg(test)]
#[path = "../../tests/unit/effects/transitions.rs"]
mod tests;
