use crate::foundation::core::Canvas;
use crate::foundation::error::{ReelError, ReelResult};
use crate::model::CropCut;

/// Source rectangle (in source pixels) mapped onto a destination rectangle (in canvas pixels).
///
/// The destination always lies inside the canvas; the rest of the canvas is black letterbox.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    pub src_x: f64,
    pub src_y: f64,
    pub src_w: f64,
    pub src_h: f64,
    pub dst_x: u32,
    pub dst_y: u32,
    pub dst_w: u32,
    pub dst_h: u32,
}

/// Resolve the crop + contain-scale mapping for one clip.
pub fn resolve_region(
    src_w: u32,
    src_h: u32,
    target: Canvas,
    crop: Option<CropCut>,
) -> ReelResult<Region> {
    if src_w == 0 || src_h == 0 {
        return Err(ReelError::validation(format!(
            "source dimensions must be non-zero, got {src_w}x{src_h}"
        )));
    }
    if target.width == 0 || target.height == 0 {
        return Err(ReelError::validation("target canvas must be non-zero"));
    }

    let (src_y, eff_h) = match crop {
        Some(cut) => {
            cut.validate()?;
            let h = f64::from(src_h);
            (h * cut.top_cut_pct, h * cut.kept_fraction())
        }
        None => (0.0, f64::from(src_h)),
    };
    let eff_w = f64::from(src_w);

    let tw = f64::from(target.width);
    let th = f64::from(target.height);
    let scale = (tw / eff_w).min(th / eff_h);

    // Extreme aspect ratios may round one axis to zero; keep at least one pixel.
    let dst_w = ((eff_w * scale).round() as u32).clamp(1, target.width);
    let dst_h = ((eff_h * scale).round() as u32).clamp(1, target.height);

    Ok(Region {
        src_x: 0.0,
        src_y,
        src_w: eff_w,
        src_h: eff_h,
        dst_x: (target.width - dst_w) / 2,
        dst_y: (target.height - dst_h) / 2,
        dst_w,
        dst_h,
    })
}

impl Region {
    /// Whether the destination covers the whole canvas (no letterbox).
    pub fn fills(&self, target: Canvas) -> bool {
        self.dst_x == 0 && self.dst_y == 0 && self.dst_w == target.width && self.dst_h == target.height
    }

    /// Equivalent `crop,scale,pad` ffmpeg filter chain for whole-file processing.
    pub fn ffmpeg_filter(&self, target: Canvas) -> String {
        let crop_w = (self.src_w.round() as u32).max(1);
        let crop_h = (self.src_h.round() as u32).max(1);
        let crop_x = self.src_x.round() as u32;
        let crop_y = self.src_y.round() as u32;
        format!(
            "crop={crop_w}:{crop_h}:{crop_x}:{crop_y},scale={}:{}:flags=bilinear,setsar=1,pad={}:{}:{}:{}:black",
            self.dst_w, self.dst_h, target.width, target.height, self.dst_x, self.dst_y
        )
    }
}

#[cfg(test)]
#[path = "../tests/unit/geometry.rs"]
mod tests;
