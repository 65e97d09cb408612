// ============================================================================
// Poisson blend: gradient-domain seam removal in linear light
// ============================================================================
//
// Solves, per channel, for values whose 4-neighbour Laplacian matches the
// synthesized image's while unmasked pixels stay pinned to the destination.
// Relaxation runs in place in raster order: left/up neighbours already hold
// this pass's values, right/down neighbours still hold the previous pass's.

use image::{Rgba, RgbaImage};

use super::alpha::DabMask;
use super::color::{LinearPlanes, lut};

/// Blend `src` (synthesized) into `dst` over the mask.
///
/// Masked pixels are rewritten from the solve (alpha 255); unmasked pixels
/// are copied from `dst`. With no interior masked pixels, or zero
/// iterations, `dst` is returned unchanged.
pub fn poisson_blend(dst: &RgbaImage, src: &RgbaImage, mask: &DabMask, iterations: usize) -> RgbaImage {
    let (w, h) = dst.dimensions();
    let (wu, hu) = (w as usize, h as usize);
    if iterations == 0 || wu < 3 || hu < 3 {
        return dst.clone();
    }

    let solve: Vec<usize> = (1..hu - 1)
        .flat_map(|y| (1..wu - 1).map(move |x| y * wu + x))
        .filter(|&idx| mask.is_inside(idx))
        .collect();
    if solve.is_empty() {
        return dst.clone();
    }

    let dst_lin = LinearPlanes::from_rgba(dst);
    let src_lin = LinearPlanes::from_rgba(src);
    let mut cur = LinearPlanes {
        r: dst_lin.r.clone(),
        g: dst_lin.g.clone(),
        b: dst_lin.b.clone(),
    };

    let channels: [(&mut Vec<f32>, &Vec<f32>, &Vec<f32>); 3] = [
        (&mut cur.r, &dst_lin.r, &src_lin.r),
        (&mut cur.g, &dst_lin.g, &src_lin.g),
        (&mut cur.b, &dst_lin.b, &src_lin.b),
    ];
    for (cur_c, dst_c, src_c) in channels {
        for _ in 0..iterations {
            relax_channel(cur_c, dst_c, src_c, mask, &solve, wu);
        }
    }

    let lut = lut();
    let mut out = dst.clone();
    for y in 0..h {
        for x in 0..w {
            let p = (y * w + x) as usize;
            if !mask.is_inside(p) {
                continue;
            }
            out.put_pixel(
                x,
                y,
                Rgba([
                    lut.linear_to_srgb(cur.r[p]),
                    lut.linear_to_srgb(cur.g[p]),
                    lut.linear_to_srgb(cur.b[p]),
                    255,
                ]),
            );
        }
    }
    out
}

/// One in-place relaxation pass of a single channel.
fn relax_channel(cur: &mut [f32], dst: &[f32], src: &[f32], mask: &DabMask, solve: &[usize], w: usize) {
    for &idx in solve {
        let neighbours = [idx - 1, idx + 1, idx - w, idx + w];
        let mut sum = 0.0f32;
        let mut guide = 0.0f32;
        for n in neighbours {
            sum += if mask.is_inside(n) { cur[n] } else { dst[n] };
            guide += src[idx] - src[n];
        }
        cur[idx] = ((sum + guide) * 0.25).clamp(0.0, 1.0);
    }
}
