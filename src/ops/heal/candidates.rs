// ============================================================================
// Candidate ring: annulus of source pixels a patch may be copied from
// ============================================================================

use rand::Rng;

use super::alpha::DabMask;

/// Radii of the sampling annulus, all in pixels.
#[derive(Clone, Copy, Debug)]
pub struct RingGeometry {
    /// `radius + gap`
    pub inner: i64,
    /// `radius + sample_radius`
    pub outer: i64,
    /// `radius + patch_half + 1`; keeps whole patches off the hole.
    pub safe_inner: i64,
    pub patch_half: u32,
}

impl RingGeometry {
    pub fn new(radius: i32, gap: i32, sample_radius: i32, patch_half: u32) -> Self {
        let r = radius as i64;
        Self {
            inner: r + gap as i64,
            outer: r + sample_radius as i64,
            safe_inner: r + patch_half as i64 + 1,
            patch_half,
        }
    }

    #[inline]
    pub fn admits(&self, dist2: i64) -> bool {
        dist2 >= self.inner.saturating_mul(self.inner)
            && dist2 <= self.outer.saturating_mul(self.outer)
            && dist2 >= self.safe_inner.saturating_mul(self.safe_inner)
    }
}

/// Eligible source pixels of one ROI.
pub struct CandidateRing {
    width: u32,
    eligible: Vec<bool>,
    indices: Vec<u32>,
}

impl CandidateRing {
    /// Scan every ROI pixel that can host a full patch.
    pub fn build(mask: &DabMask, cx: i32, cy: i32, geom: RingGeometry) -> Self {
        let (w, h) = (mask.width(), mask.height());
        let half = geom.patch_half;
        let mut eligible = vec![false; (w * h) as usize];
        let mut indices = Vec::new();

        if w > 2 * half && h > 2 * half {
            for y in half..h - half {
                let dy = y as i64 - cy as i64;
                for x in half..w - half {
                    let idx = (y * w + x) as usize;
                    if mask.is_inside(idx) {
                        continue;
                    }
                    let dx = x as i64 - cx as i64;
                    if !geom.admits(dx * dx + dy * dy) {
                        continue;
                    }
                    eligible[idx] = true;
                    indices.push(idx as u32);
                }
            }
        }

        Self {
            width: w,
            eligible,
            indices,
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// O(1) eligibility lookup; out-of-range coordinates are never eligible.
    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x as u32 >= self.width {
            return false;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.eligible.get(idx).copied().unwrap_or(false)
    }

    /// Uniformly drawn candidate as ROI coordinates. Callers check
    /// `is_empty` first.
    #[inline]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> (i32, i32) {
        let idx = self.indices[rng.random_range(0..self.indices.len())];
        ((idx % self.width) as i32, (idx / self.width) as i32)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.indices
            .iter()
            .map(move |&i| ((i % self.width) as i32, (i / self.width) as i32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn ring_respects_every_bound() {
        let (w, h, cx, cy) = (90u32, 90u32, 45, 45);
        let mask = DabMask::build(w, h, cx, cy, 10, 0.5);
        let geom = RingGeometry::new(10, 2, 30, 3);
        let ring = CandidateRing::build(&mask, cx, cy, geom);
        assert!(!ring.is_empty());

        for (x, y) in ring.iter() {
            let dx = (x - cx) as i64;
            let dy = (y - cy) as i64;
            let d2 = dx * dx + dy * dy;
            assert!(d2 >= 14 * 14, "inside safety margin at ({}, {})", x, y);
            assert!(d2 <= 40 * 40, "beyond outer radius at ({}, {})", x, y);
            assert!(!mask.is_inside((y as u32 * w + x as u32) as usize));
            assert!(x >= 3 && y >= 3 && x < (w - 3) as i32 && y < (h - 3) as i32);
            assert!(ring.contains(x, y));
        }
        assert!(!ring.contains(cx, cy));
        assert!(!ring.contains(-1, 0));
        assert!(!ring.contains(0, 500));
    }

    #[test]
    fn samples_come_from_the_list() {
        let mask = DabMask::build(60, 60, 30, 30, 6, 0.0);
        let ring = CandidateRing::build(&mask, 30, 30, RingGeometry::new(6, 4, 16, 2));
        let mut rng = Pcg32::seed_from_u64(7);
        for _ in 0..500 {
            let (x, y) = ring.sample(&mut rng);
            assert!(ring.contains(x, y));
        }
    }

    #[test]
    fn extreme_radii_do_not_overflow() {
        let geom = RingGeometry::new(i32::MAX, i32::MAX, i32::MAX, 3);
        assert!(!geom.admits(0));
        assert!(!geom.admits(i64::MAX - 1));

        let neg = RingGeometry::new(i32::MIN, i32::MIN, i32::MIN, 0);
        assert!(!neg.admits(-1));
    }

    #[test]
    fn ring_outside_roi_is_empty() {
        let mask = DabMask::build(20, 20, 1, 1, 8, 0.0);
        let ring = CandidateRing::build(&mask, 1, 1, RingGeometry::new(8, 40, 64, 3));
        assert!(ring.is_empty());
        assert_eq!(ring.len(), 0);
    }
}
