use crate::foundation::core::Rgba8;
use crate::foundation::math::{mul_div255_u8, mul_div255_u16};
use crate::geometry::Region;
use crate::render::surface::Surface;

/// `src` (straight alpha) over `dst`, scaled by `opacity`.
pub fn over(dst: [u8; 4], src: Rgba8, opacity: f32) -> [u8; 4] {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src.a == 0 {
        return dst;
    }
    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255_u16(u16::from(src.a), op);
    if sa == 0 {
        return dst;
    }
    let inv = 255u16 - sa;
    let sc = [src.r, src.g, src.b];
    let mut out = [0u8; 4];
    for i in 0..3 {
        let s = mul_div255_u16(u16::from(sc[i]), sa);
        let d = mul_div255_u16(u16::from(dst[i]), inv);
        out[i] = (s + d).min(255) as u8;
    }
    out[3] = (sa + mul_div255_u16(u16::from(dst[3]), inv)).min(255) as u8;
    out
}

/// Blend `color` over every pixel.
pub fn fill(surface: &mut Surface, color: Rgba8) {
    let (w, h) = (surface.width(), surface.height());
    fill_rect(surface, 0, 0, w, h, color);
}

/// Blend `color` over `[x, x + w) x [y, y + h)`, clipped to the surface. Negative origins clip.
pub fn fill_rect(surface: &mut Surface, x: i64, y: i64, w: u32, h: u32, color: Rgba8) {
    if color.a == 0 || w == 0 || h == 0 {
        return;
    }
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + i64::from(w)).min(i64::from(surface.width()));
    let y1 = (y + i64::from(h)).min(i64::from(surface.height()));
    if x0 >= x1 || y0 >= y1 {
        return;
    }
    for row in y0..y1 {
        let span = surface.row_span_mut(row as u32, x0 as u32, x1 as u32);
        for d in span.chunks_exact_mut(4) {
            let out = over([d[0], d[1], d[2], d[3]], color, 1.0);
            d.copy_from_slice(&out);
        }
    }
}

/// Opacity stop on a radial gradient: `(offset in [0, 1], alpha in [0, 1])`.
pub type GradientStop = (f32, f32);

/// Blend a black radial gradient centered at `(cx, cy)`; pixels beyond `radius` take the last
/// stop's alpha.
pub fn radial_darken(surface: &mut Surface, cx: f32, cy: f32, radius: f32, stops: &[GradientStop]) {
    if stops.is_empty() || radius <= 0.0 {
        return;
    }
    let w = surface.width();
    for y in 0..surface.height() {
        let dy = y as f32 + 0.5 - cy;
        let span = surface.row_span_mut(y, 0, w);
        for (x, d) in span.chunks_exact_mut(4).enumerate() {
            let dx = x as f32 + 0.5 - cx;
            let t = (dx * dx + dy * dy).sqrt() / radius;
            let alpha = sample_stops(stops, t);
            if alpha <= 0.0 {
                continue;
            }
            let out = over([d[0], d[1], d[2], d[3]], Rgba8::BLACK, alpha);
            d.copy_from_slice(&out);
        }
    }
}

fn sample_stops(stops: &[GradientStop], t: f32) -> f32 {
    let first = stops[0];
    if t <= first.0 {
        return first.1;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.0 {
            let span = (b.0 - a.0).max(f32::EPSILON);
            let f = (t - a.0) / span;
            return a.1 + (b.1 - a.1) * f;
        }
    }
    stops[stops.len() - 1].1
}

/// Bilinear resample of `src` through `region` onto `dst`. Outside the destination rectangle
/// `dst` is left untouched.
pub fn blit_region(dst: &mut Surface, src: &Surface, region: &Region) {
    if region.dst_w == 0 || region.dst_h == 0 || src.width() == 0 || src.height() == 0 {
        return;
    }
    let sx_step = region.src_w / f64::from(region.dst_w);
    let sy_step = region.src_h / f64::from(region.dst_h);
    let max_x = f64::from(src.width() - 1);
    let max_y = f64::from(src.height() - 1);

    for oy in 0..region.dst_h {
        let sy = (region.src_y + (f64::from(oy) + 0.5) * sy_step - 0.5).clamp(0.0, max_y);
        let y0 = sy.floor() as u32;
        let fy = ((sy - f64::from(y0)) * 256.0) as u16;
        let y1 = (y0 + 1).min(src.height() - 1);

        let span = dst.row_span_mut(
            region.dst_y + oy,
            region.dst_x,
            region.dst_x + region.dst_w,
        );
        for (ox, d) in span.chunks_exact_mut(4).enumerate() {
            let sx = (region.src_x + (ox as f64 + 0.5) * sx_step - 0.5).clamp(0.0, max_x);
            let x0 = sx.floor() as u32;
            let fx = ((sx - f64::from(x0)) * 256.0) as u16;
            let x1 = (x0 + 1).min(src.width() - 1);

            let p00 = src.pixel(x0, y0);
            let p10 = src.pixel(x1, y0);
            let p01 = src.pixel(x0, y1);
            let p11 = src.pixel(x1, y1);
            for c in 0..3 {
                let top = lerp256(p00[c], p10[c], fx);
                let bot = lerp256(p01[c], p11[c], fx);
                d[c] = lerp256(top, bot, fy);
            }
            d[3] = 255;
        }
    }
}

fn lerp256(a: u8, b: u8, f: u16) -> u8 {
    let a = u32::from(a);
    let b = u32::from(b);
    let f = u32::from(f.min(256));
    ((a * (256 - f) + b * f + 128) >> 8) as u8
}

/// Scale RGB channels of every pixel by `factor` in `[0, 1]` (alpha untouched).
pub fn darken_rows(surface: &mut Surface, y: u32, h: u32, factor: f32) {
    let keep = ((factor.clamp(0.0, 1.0) * 255.0).round()) as u16;
    let w = surface.width();
    for row in y..y.saturating_add(h).min(surface.height()) {
        for d in surface.row_span_mut(row, 0, w).chunks_exact_mut(4) {
            for c in d.iter_mut().take(3) {
                *c = mul_div255_u8(u16::from(*c), keep);
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/composite.rs"]
mod tests;
