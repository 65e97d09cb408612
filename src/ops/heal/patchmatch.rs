// ============================================================================
// PatchMatch: approximate nearest-neighbour field over the luma plane
// ============================================================================
//
// Every masked pixel keeps the offset to its best-known source pixel in the
// candidate ring and the SSD of the two luma patches. Random init, then
// alternating forward/backward passes of neighbour propagation plus a couple
// of uniform random samples. Costs only ever decrease.

use image::GrayImage;
use rand::Rng;

use super::alpha::DabMask;
use super::candidates::CandidateRing;

/// Random candidates scored per pixel at initialization.
pub const INIT_SAMPLES: usize = 12;
/// Random candidates scored per pixel on every pass.
pub const RANDOM_TRIES: usize = 2;

/// Sum of squared luma differences between the patches centered at
/// `(x1, y1)` and `(x2, y2)`. Both windows must lie inside the plane.
#[inline]
pub fn patch_ssd(luma: &[u8], w: usize, x1: i32, y1: i32, x2: i32, y2: i32, half: i32) -> u64 {
    let mut sum = 0u64;
    for dy in -half..=half {
        let row1 = (y1 + dy) as usize * w;
        let row2 = (y2 + dy) as usize * w;
        let a = &luma[row1 + (x1 - half) as usize..=row1 + (x1 + half) as usize];
        let b = &luma[row2 + (x2 - half) as usize..=row2 + (x2 + half) as usize];
        for (&pa, &pb) in a.iter().zip(b) {
            let d = pa as i32 - pb as i32;
            sum += (d * d) as u64;
        }
    }
    sum
}

/// Per-pixel source offsets and patch costs for one ROI.
#[derive(Clone, Debug)]
pub struct NearestNeighborField {
    width: u32,
    height: u32,
    pub dx: Vec<i32>,
    pub dy: Vec<i32>,
    /// `u64::MAX` marks pixels that were never resolved.
    pub cost: Vec<u64>,
}

impl NearestNeighborField {
    pub fn new(width: u32, height: u32) -> Self {
        let n = (width * height) as usize;
        Self {
            width,
            height,
            dx: vec![0; n],
            dy: vec![0; n],
            cost: vec![u64::MAX; n],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn is_resolved(&self, idx: usize) -> bool {
        self.cost[idx] != u64::MAX
    }

    /// Source pixel resolved for `(x, y)`, if any. May be out of bounds.
    #[inline]
    pub fn source(&self, x: u32, y: u32) -> Option<(i32, i32)> {
        let idx = (y * self.width + x) as usize;
        if !self.is_resolved(idx) {
            return None;
        }
        Some((x as i32 + self.dx[idx], y as i32 + self.dy[idx]))
    }
}

/// Solver state for one dab.
pub struct PatchMatch<'a> {
    luma: &'a GrayImage,
    mask: &'a DabMask,
    ring: &'a CandidateRing,
    half: u32,
    nnf: NearestNeighborField,
}

impl<'a> PatchMatch<'a> {
    pub fn new(
        luma: &'a GrayImage,
        mask: &'a DabMask,
        ring: &'a CandidateRing,
        patch_half: u32,
    ) -> Self {
        let (w, h) = luma.dimensions();
        Self {
            luma,
            mask,
            ring,
            half: patch_half,
            nnf: NearestNeighborField::new(w, h),
        }
    }

    pub fn field(&self) -> &NearestNeighborField {
        &self.nnf
    }

    pub fn into_field(self) -> NearestNeighborField {
        self.nnf
    }

    /// Half-open x and y ranges of pixels that can host a full patch.
    fn patch_bounds(&self) -> Option<(i32, i32, i32, i32)> {
        let (w, h) = self.luma.dimensions();
        if w <= 2 * self.half || h <= 2 * self.half {
            return None;
        }
        let half = self.half as i32;
        Some((half, w as i32 - half, half, h as i32 - half))
    }

    #[inline]
    fn cost(&self, x: i32, y: i32, sx: i32, sy: i32) -> u64 {
        patch_ssd(
            self.luma.as_raw(),
            self.luma.width() as usize,
            x,
            y,
            sx,
            sy,
            self.half as i32,
        )
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> usize {
        y as usize * self.luma.width() as usize + x as usize
    }

    /// Seed every masked pixel with the best of [`INIT_SAMPLES`] random
    /// candidates.
    pub fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let Some((x_lo, x_hi, y_lo, y_hi)) = self.patch_bounds() else { return };
        if self.ring.is_empty() {
            return;
        }
        for y in y_lo..y_hi {
            for x in x_lo..x_hi {
                let idx = self.index(x, y);
                if !self.mask.is_inside(idx) {
                    continue;
                }
                let mut best = (0, 0, u64::MAX);
                for _ in 0..INIT_SAMPLES {
                    let (sx, sy) = self.ring.sample(rng);
                    let c = self.cost(x, y, sx, sy);
                    if c < best.2 {
                        best = (sx - x, sy - y, c);
                    }
                }
                self.nnf.dx[idx] = best.0;
                self.nnf.dy[idx] = best.1;
                self.nnf.cost[idx] = best.2;
            }
        }
    }

    /// One forward (raster) pass followed by one backward pass.
    pub fn iterate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let Some((x_lo, x_hi, y_lo, y_hi)) = self.patch_bounds() else { return };
        if self.ring.is_empty() {
            return;
        }

        for y in y_lo..y_hi {
            for x in x_lo..x_hi {
                self.visit(x, y, [(-1, 0), (0, -1)], rng);
            }
        }
        for y in (y_lo..y_hi).rev() {
            for x in (x_lo..x_hi).rev() {
                self.visit(x, y, [(1, 0), (0, 1)], rng);
            }
        }
    }

    fn visit<R: Rng + ?Sized>(&mut self, x: i32, y: i32, neighbours: [(i32, i32); 2], rng: &mut R) {
        let idx = self.index(x, y);
        if !self.mask.is_inside(idx) {
            return;
        }
        let Some((x_lo, x_hi, y_lo, y_hi)) = self.patch_bounds() else { return };

        let mut best_dx = self.nnf.dx[idx];
        let mut best_dy = self.nnf.dy[idx];
        let mut best_cost = self.nnf.cost[idx];

        // Propagation
        for (ndx, ndy) in neighbours {
            let nx = x + ndx;
            let ny = y + ndy;
            if nx < x_lo || nx >= x_hi || ny < y_lo || ny >= y_hi {
                continue;
            }
            let ni = self.index(nx, ny);
            if !self.mask.is_inside(ni) {
                continue;
            }
            let cand_dx = self.nnf.dx[ni];
            let cand_dy = self.nnf.dy[ni];
            let sx = x + cand_dx;
            let sy = y + cand_dy;
            if !self.ring.contains(sx, sy) {
                continue;
            }
            let c = self.cost(x, y, sx, sy);
            if c < best_cost {
                best_cost = c;
                best_dx = cand_dx;
                best_dy = cand_dy;
            }
        }

        // Random search
        for _ in 0..RANDOM_TRIES {
            let (sx, sy) = self.ring.sample(rng);
            let c = self.cost(x, y, sx, sy);
            if c < best_cost {
                best_cost = c;
                best_dx = sx - x;
                best_dy = sy - y;
            }
        }

        self.nnf.dx[idx] = best_dx;
        self.nnf.dy[idx] = best_dy;
        self.nnf.cost[idx] = best_cost;
    }
}

/// Initialize and run `iterations` forward/backward passes.
pub fn solve<R: Rng + ?Sized>(
    luma: &GrayImage,
    mask: &DabMask,
    ring: &CandidateRing,
    patch_half: u32,
    iterations: usize,
    rng: &mut R,
) -> NearestNeighborField {
    let mut pm = PatchMatch::new(luma, mask, ring, patch_half);
    pm.initialize(rng);
    for _ in 0..iterations {
        pm.iterate(rng);
    }
    pm.into_field()
}
