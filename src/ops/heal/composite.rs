use image::{Rgba, RgbaImage};

use super::alpha::DabMask;

#[inline(always)]
fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * t).round().clamp(0.0, 255.0) as u8
}

/// Effective mix weight of one pixel, `alpha/255 * flow`.
#[inline(always)]
fn blend_weight(alpha: u8, flow: f32) -> f64 {
    (alpha as f64 / 255.0) * flow as f64
}

/// Mix `blended` over `dst` with weight `alpha/255 * flow` per pixel.
///
/// Touched pixels become fully opaque; pixels with zero effective weight
/// (outside the dab, or `flow == 0`) keep every byte of `dst`.
pub fn composite(dst: &RgbaImage, blended: &RgbaImage, mask: &DabMask, flow: f32) -> RgbaImage {
    let mut out = dst.clone();
    for (x, y, px) in out.enumerate_pixels_mut() {
        let idx = (y * dst.width() + x) as usize;
        let a = mask.alpha_at(idx);
        if a == 0 {
            continue;
        }
        let t = blend_weight(a, flow);
        if t <= 0.0 {
            continue;
        }
        let s = blended.get_pixel(x, y);
        *px = Rgba([
            lerp_u8(px.0[0], s.0[0], t),
            lerp_u8(px.0[1], s.0[1], t),
            lerp_u8(px.0[2], s.0[2], t),
            255,
        ]);
    }
    out
}
