use image::RgbaImage;
use rand::Rng;

use super::{Dab, HealParams, apply_dab};

/// Apply dabs in order against one buffer; each dab sees the previous ones.
/// `None` entries are skipped. Returns how many dabs had an effect.
pub fn apply_stroke<R: Rng + ?Sized>(
    image: &mut RgbaImage,
    dabs: &[Option<Dab>],
    params: &HealParams,
    rng: &mut R,
) -> usize {
    let mut applied = 0;
    for dab in dabs.iter().flatten() {
        if apply_dab(image, *dab, params, rng).is_some() {
            applied += 1;
        }
    }
    applied
}

/// Distance between consecutive dabs, never below one pixel.
pub fn dab_spacing(params: &HealParams) -> f32 {
    let p = params.normalized();
    (p.brush_radius as f32 * p.spacing_factor).max(1.0)
}

/// Resample a pointer path into evenly spaced dabs. The first point always
/// gets a dab.
pub fn space_dabs(points: &[(f32, f32)], params: &HealParams) -> Vec<Dab> {
    let Some(&(x0, y0)) = points.first() else { return Vec::new() };
    let spacing = dab_spacing(params);
    let mut dabs = vec![Dab::new(x0, y0)];
    // Distance walked since the last emitted dab
    let mut carry = 0.0f32;

    for seg in points.windows(2) {
        let (ax, ay) = seg[0];
        let (bx, by) = seg[1];
        let len = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt();
        if len <= 0.0 || !len.is_finite() {
            continue;
        }
        let mut d = spacing - carry;
        while d <= len {
            let t = d / len;
            dabs.push(Dab::new(ax + (bx - ax) * t, ay + (by - ay) * t));
            d += spacing;
        }
        carry = len - (d - spacing);
    }
    dabs
}
