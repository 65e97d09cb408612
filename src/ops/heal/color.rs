// ============================================================================
// sRGB <-> linear lookup tables and the luma approximation used for matching
// ============================================================================

use std::sync::OnceLock;

use image::{GrayImage, RgbaImage};
use rayon::prelude::*;

/// Number of quantization steps in the linear -> sRGB table.
pub const LINEAR_STEPS: usize = 4096;

/// Both transfer-function tables, built once and shared read-only.
pub struct SrgbLut {
    /// sRGB(0..255) -> linear (0..1)
    to_linear: [f32; 256],
    /// linear(0..1) quantized to 4096 steps -> sRGB(0..255)
    to_srgb: [u8; LINEAR_STEPS],
}

static LUT: OnceLock<SrgbLut> = OnceLock::new();

/// Shared tables; the first call builds them.
pub fn lut() -> &'static SrgbLut {
    LUT.get_or_init(SrgbLut::build)
}

impl SrgbLut {
    fn build() -> Self {
        let mut to_linear = [0.0f32; 256];
        for (v, slot) in to_linear.iter_mut().enumerate() {
            let c = v as f64 / 255.0;
            let l = if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            };
            *slot = l as f32;
        }

        let mut to_srgb = [0u8; LINEAR_STEPS];
        for (i, slot) in to_srgb.iter_mut().enumerate() {
            let l = i as f64 / (LINEAR_STEPS - 1) as f64;
            let s = if l <= 0.003_130_8 {
                12.92 * l
            } else {
                1.055 * l.powf(1.0 / 2.4) - 0.055
            };
            *slot = (s * 255.0).round().clamp(0.0, 255.0) as u8;
        }

        Self { to_linear, to_srgb }
    }

    #[inline]
    pub fn srgb_to_linear(&self, v: u8) -> f32 {
        self.to_linear[v as usize]
    }

    #[inline]
    pub fn linear_to_srgb(&self, l: f32) -> u8 {
        self.to_srgb[linear_index(l)]
    }
}

/// Table slot for a linear value: round-half-up in f64, clamped to the table.
#[inline]
pub fn linear_index(l: f32) -> usize {
    let scaled = l as f64 * (LINEAR_STEPS - 1) as f64 + 0.5;
    if scaled.is_nan() || scaled < 0.0 {
        0
    } else {
        (scaled as usize).min(LINEAR_STEPS - 1)
    }
}

/// Integer Rec.601-ish luma, `(77r + 150g + 29b) >> 8`.
#[inline(always)]
pub fn approx_luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

/// Luma plane of an RGBA buffer, rows converted in parallel.
pub fn luma_plane(rgba: &RgbaImage) -> GrayImage {
    let (w, h) = rgba.dimensions();
    let mut luma = GrayImage::new(w, h);
    if w == 0 || h == 0 {
        return luma;
    }
    let src: &[u8] = rgba;
    let dst: &mut [u8] = &mut luma;
    dst.par_chunks_exact_mut(w as usize)
        .zip(src.par_chunks_exact(w as usize * 4))
        .for_each(|(out_row, in_row)| {
            for (o, px) in out_row.iter_mut().zip(in_row.chunks_exact(4)) {
                *o = approx_luma(px[0], px[1], px[2]);
            }
        });
    luma
}

/// Planar linear-light R, G and B for an RGBA buffer.
pub struct LinearPlanes {
    pub r: Vec<f32>,
    pub g: Vec<f32>,
    pub b: Vec<f32>,
}

impl LinearPlanes {
    pub fn from_rgba(rgba: &RgbaImage) -> Self {
        let lut = lut();
        let raw: &[u8] = rgba;
        let channel = |c: usize| -> Vec<f32> {
            raw.par_chunks_exact(4)
                .map(|px| lut.srgb_to_linear(px[c]))
                .collect()
        };
        Self {
            r: channel(0),
            g: channel(1),
            b: channel(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_within_one_step() {
        let lut = lut();
        for v in 0..=255u8 {
            let back = lut.linear_to_srgb(lut.srgb_to_linear(v));
            assert!(
                (back as i32 - v as i32).abs() <= 1,
                "sRGB {} came back as {}",
                v,
                back
            );
        }
    }

    #[test]
    fn table_endpoints() {
        let lut = lut();
        assert_eq!(lut.srgb_to_linear(0), 0.0);
        assert!((lut.srgb_to_linear(255) - 1.0).abs() < 1e-6);
        assert_eq!(lut.linear_to_srgb(-3.0), 0);
        assert_eq!(lut.linear_to_srgb(7.0), 255);
        assert_eq!(lut.linear_to_srgb(f32::NAN), 0);
    }

    #[test]
    fn index_rounds_in_double_precision() {
        // 0.5009768 * 4095 + 0.5 is 2051.9999998 in f64 but 2052.0 in f32.
        assert_eq!(linear_index(0.500_976_8), 2051);
        assert_eq!(linear_index(0.0), 0);
        assert_eq!(linear_index(1.0), LINEAR_STEPS - 1);
        assert_eq!(linear_index(f32::INFINITY), LINEAR_STEPS - 1);
    }

    #[test]
    fn luma_weights() {
        assert_eq!(approx_luma(0, 0, 0), 0);
        assert_eq!(approx_luma(255, 255, 255), 255);
        assert_eq!(approx_luma(128, 128, 128), 128);
        // Green dominates
        assert!(approx_luma(0, 200, 0) > approx_luma(200, 0, 0));
    }

    #[test]
    fn luma_plane_matches_pixelwise() {
        let img = RgbaImage::from_fn(5, 3, |x, y| {
            image::Rgba([(x * 40) as u8, (y * 60) as u8, 17, 255])
        });
        let luma = luma_plane(&img);
        for (x, y, p) in img.enumerate_pixels() {
            assert_eq!(luma.get_pixel(x, y).0[0], approx_luma(p.0[0], p.0[1], p.0[2]));
        }
    }
}
