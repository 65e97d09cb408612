use image::{Rgba, RgbaImage};

use super::alpha::DabMask;
use super::patchmatch::NearestNeighborField;

/// Build the synthetic source: a copy of `dst` where every masked pixel with
/// an in-bounds resolved source takes that source's RGB, fully opaque.
pub fn synthesize(dst: &RgbaImage, mask: &DabMask, nnf: &NearestNeighborField) -> RgbaImage {
    let (w, h) = dst.dimensions();
    let mut out = dst.clone();
    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            if !mask.is_inside(idx) {
                continue;
            }
            let Some((sx, sy)) = nnf.source(x, y) else { continue };
            if sx < 0 || sy < 0 || sx >= w as i32 || sy >= h as i32 {
                continue;
            }
            let src = dst.get_pixel(sx as u32, sy as u32);
            out.put_pixel(x, y, Rgba([src.0[0], src.0[1], src.0[2], 255]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_source_and_forces_opaque() {
        let dst = RgbaImage::from_fn(12, 12, |x, y| Rgba([x as u8 * 10, y as u8 * 10, 5, 100]));
        let mask = DabMask::build(12, 12, 6, 6, 1, 0.0);
        let mut nnf = NearestNeighborField::new(12, 12);
        let center = 6 * 12 + 6;
        nnf.dx[center] = -4;
        nnf.dy[center] = 3;
        nnf.cost[center] = 17;

        let out = synthesize(&dst, &mask, &nnf);
        assert_eq!(*out.get_pixel(6, 6), Rgba([20, 90, 5, 255]));
        // Unmasked pixels stay as the destination
        assert_eq!(out.get_pixel(6, 5), dst.get_pixel(6, 5));
        assert_eq!(out.get_pixel(0, 0), dst.get_pixel(0, 0));
    }

    #[test]
    fn out_of_bounds_source_keeps_destination() {
        let dst = RgbaImage::from_pixel(8, 8, Rgba([9, 9, 9, 9]));
        let mask = DabMask::build(8, 8, 4, 4, 1, 0.0);
        let mut nnf = NearestNeighborField::new(8, 8);
        let center = 4 * 8 + 4;
        nnf.dx[center] = 40;
        nnf.cost[center] = 0;
        let out = synthesize(&dst, &mask, &nnf);
        assert_eq!(out, dst);
    }
}
