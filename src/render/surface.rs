use crate::foundation::core::{Canvas, Rgba8};
use crate::foundation::error::{ReelError, ReelResult};

/// Tightly packed straight-alpha RGBA8 raster.
///
/// Output surfaces are kept fully opaque; decoded source frames use the same type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    /// Opaque black surface of `canvas` size.
    pub fn new(canvas: Canvas) -> Self {
        let mut s = Self {
            width: canvas.width,
            height: canvas.height,
            data: vec![0u8; canvas.rgba_len()],
        };
        s.clear(Rgba8::BLACK);
        s
    }

    /// Wrap an existing RGBA8 buffer.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> ReelResult<Self> {
        let expected = Canvas { width, height }.rgba_len();
        if data.len() != expected {
            return Err(ReelError::validation(format!(
                "rgba buffer is {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn clear(&mut self, color: Rgba8) {
        let px = [color.r, color.g, color.b, color.a];
        for d in self.data.chunks_exact_mut(4) {
            d.copy_from_slice(&px);
        }
    }

    /// Pixel at `(x, y)`; coordinates outside the surface clamp to the nearest edge.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let x = x.min(self.width.saturating_sub(1)) as usize;
        let y = y.min(self.height.saturating_sub(1)) as usize;
        let off = (y * self.width as usize + x) * 4;
        [
            self.data[off],
            self.data[off + 1],
            self.data[off + 2],
            self.data[off + 3],
        ]
    }

    /// Mutable row slice `y` covering columns `[x0, x1)`, clipped to the surface.
    pub(crate) fn row_span_mut(&mut self, y: u32, x0: u32, x1: u32) -> &mut [u8] {
        if y >= self.height {
            return &mut [];
        }
        let x0 = x0.min(self.width) as usize;
        let x1 = x1.min(self.width) as usize;
        let row = y as usize * self.width as usize * 4;
        if x0 >= x1 {
            return &mut [];
        }
        &mut self.data[row + x0 * 4..row + x1 * 4]
    }

    /// Write as PNG. Used by previews and debugging.
    pub fn save_png(&self, path: &std::path::Path) -> ReelResult<()> {
        use anyhow::Context as _;
        let img = image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| ReelError::internal("surface buffer does not match its dimensions"))?;
        img.save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
