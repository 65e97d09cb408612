// ============================================================================
// Dab alpha field: feathered disc plus the binary "inside" set
// ============================================================================

use image::{GrayImage, Luma};

/// Cubic Hermite ease, `3t² − 2t³`, with `t` clamped to [0, 1].
#[inline]
pub fn smoothstep(t: f64) -> f64 {
    if t <= 0.0 {
        0.0
    } else if t >= 1.0 {
        1.0
    } else {
        t * t * (3.0 - 2.0 * t)
    }
}

/// Alpha (0..=255) at squared distance `dist2` from the dab center.
///
/// Full opacity inside `radius * (1 - feather)`, zero at `radius` and beyond,
/// smoothstep falloff between.
pub fn dab_alpha(dist2: i64, radius: i32, feather: f32) -> u8 {
    if radius <= 0 {
        return 0;
    }
    let r1 = radius as f64;
    let r0 = (r1 * (1.0 - feather as f64)).max(0.0);
    let d2 = dist2 as f64;
    if d2 >= r1 * r1 {
        return 0;
    }
    if d2 <= r0 * r0 || r1 == r0 {
        return 255;
    }
    let t = (d2.sqrt() - r0) / (r1 - r0);
    let w = 1.0 - smoothstep(t);
    (w * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Per-ROI mask of one dab.
pub struct DabMask {
    /// Feather-weighted coverage.
    pub alpha: GrayImage,
    /// `alpha > 0`, row-major; the solve set for PatchMatch and Poisson.
    pub inside: Vec<bool>,
}

impl DabMask {
    /// Build the mask for a dab centered at `(cx, cy)` in ROI-local coordinates.
    pub fn build(width: u32, height: u32, cx: i32, cy: i32, radius: i32, feather: f32) -> Self {
        let alpha = GrayImage::from_fn(width, height, |x, y| {
            let dx = x as i64 - cx as i64;
            let dy = y as i64 - cy as i64;
            Luma([dab_alpha(dx * dx + dy * dy, radius, feather)])
        });
        let inside = alpha.as_raw().iter().map(|&a| a > 0).collect();
        Self { alpha, inside }
    }

    pub fn width(&self) -> u32 {
        self.alpha.width()
    }

    pub fn height(&self) -> u32 {
        self.alpha.height()
    }

    #[inline]
    pub fn alpha_at(&self, idx: usize) -> u8 {
        self.alpha.as_raw()[idx]
    }

    #[inline]
    pub fn is_inside(&self, idx: usize) -> bool {
        self.inside[idx]
    }

    pub fn is_empty(&self) -> bool {
        !self.inside.iter().any(|&m| m)
    }
}
