// ============================================================================
// Region of interest: working rectangle around a dab
// ============================================================================

use image::{RgbaImage, imageops};
use serde::{Deserialize, Serialize};

/// Extra pixels kept around the sampling ring and patch margins.
pub const ROI_PADDING: i32 = 8;

/// Rectangle in image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x0: u32,
    pub y0: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    /// Square of half-width `half` around `(cx, cy)`, clamped to the image.
    ///
    /// Returns `None` when the clamped rectangle cannot host a patch with a
    /// one-pixel border (`side <= min_side`), which happens near edges with
    /// large brushes.
    pub fn around(
        img_w: u32,
        img_h: u32,
        cx: i32,
        cy: i32,
        half: i32,
        min_side: u32,
    ) -> Option<Roi> {
        if img_w == 0 || img_h == 0 {
            return None;
        }
        let max_x = img_w as i64 - 1;
        let max_y = img_h as i64 - 1;
        let (cx, cy, half) = (cx as i64, cy as i64, half as i64);
        let x0 = (cx - half).clamp(0, max_x);
        let y0 = (cy - half).clamp(0, max_y);
        let x1 = (cx + half).clamp(0, max_x);
        let y1 = (cy + half).clamp(0, max_y);
        let width = (x1 - x0 + 1) as u32;
        let height = (y1 - y0 + 1) as u32;
        if width <= min_side || height <= min_side {
            return None;
        }
        Some(Roi {
            x0: x0 as u32,
            y0: y0 as u32,
            width,
            height,
        })
    }

    /// Copy the rectangle out of `image`.
    pub fn extract(&self, image: &RgbaImage) -> RgbaImage {
        imageops::crop_imm(image, self.x0, self.y0, self.width, self.height).to_image()
    }

    /// Write `pixels` (same size as the ROI) back into `image`, row by row.
    pub fn commit(&self, image: &mut RgbaImage, pixels: &RgbaImage) {
        debug_assert_eq!(pixels.dimensions(), (self.width, self.height));
        let img_w = image.width() as usize;
        let row_len = self.width as usize * 4;
        let src: &[u8] = pixels;
        let dst: &mut [u8] = image;
        for (ry, row) in src.chunks_exact(row_len).enumerate() {
            let start = ((self.y0 as usize + ry) * img_w + self.x0 as usize) * 4;
            dst[start..start + row_len].copy_from_slice(row);
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (x, y) = (x as i64, y as i64);
        x >= self.x0 as i64
            && y >= self.y0 as i64
            && x < self.x0 as i64 + self.width as i64
            && y < self.y0 as i64 + self.height as i64
    }

    /// Dab center translated into ROI-local coordinates.
    pub fn local(&self, cx: i32, cy: i32) -> (i32, i32) {
        (cx - self.x0 as i32, cy - self.y0 as i32)
    }
}
