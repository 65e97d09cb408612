// ============================================================================
// Healing brush: per-dab content-aware repair
// ============================================================================
//
// One dab: carve an ROI, build the feathered disc and the sampling ring,
// resolve a PatchMatch field over luma, synthesize, optionally Poisson-blend
// in linear light, then composite with feather × flow and commit.

pub mod alpha;
pub mod candidates;
pub mod color;
pub mod composite;
pub mod patchmatch;
pub mod poisson;
pub mod roi;
pub mod stroke;
pub mod synthesis;

#[cfg(test)]
mod tests;

use image::RgbaImage;
use rand::Rng;
use serde::{Deserialize, Serialize};

use alpha::DabMask;
use candidates::{CandidateRing, RingGeometry};
pub use roi::Roi;

// -- Quality levels -----------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealQuality {
    /// Interactive: small sampling ring, few iterations.
    Preview,
    /// Committed strokes: wider ring, more PatchMatch and Poisson passes.
    Full,
}

impl HealQuality {
    pub fn label(&self) -> &'static str {
        match self {
            HealQuality::Preview => "preview",
            HealQuality::Full => "full",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "preview" => Some(HealQuality::Preview),
            "full" => Some(HealQuality::Full),
            _ => None,
        }
    }

    pub fn sample_radius(&self) -> i32 {
        match self {
            HealQuality::Preview => 64,
            HealQuality::Full => 128,
        }
    }

    pub fn patchmatch_iters(&self) -> u32 {
        match self {
            HealQuality::Preview => 3,
            HealQuality::Full => 6,
        }
    }

    pub fn poisson_iters(&self) -> u32 {
        match self {
            HealQuality::Preview => 60,
            HealQuality::Full => 180,
        }
    }
}

// -- Parameters -----------------------------------------------------------

pub const DEFAULT_SPACING_FACTOR: f32 = 0.35;

/// Ceiling for every pixel-extent parameter (radius, gap, sample radius,
/// patch size).
pub const MAX_EXTENT: i32 = 1 << 20;

/// Per-stroke brush parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealParams {
    /// Brush radius in pixels.
    pub brush_radius: i32,
    /// Fraction of the radius over which alpha ramps from 255 to 0.
    pub feather: f32,
    /// Opacity multiplier on top of feather.
    pub flow: f32,
    /// Exclusion margin between the brush edge and the sampling ring.
    pub gap: i32,
    /// Width of the sampling annulus.
    pub sample_radius: i32,
    /// Side of the comparison patch (odd).
    pub patch_size: i32,
    pub patchmatch_iters: u32,
    /// 0 disables the Poisson blend.
    pub poisson_iters: u32,
    /// Dab spacing as a fraction of the radius.
    pub spacing_factor: f32,
}

impl Default for HealParams {
    fn default() -> Self {
        Self::for_quality(HealQuality::Preview)
    }
}

impl HealParams {
    pub fn for_quality(quality: HealQuality) -> Self {
        Self {
            brush_radius: 18,
            feather: 0.6,
            flow: 1.0,
            gap: 8,
            sample_radius: quality.sample_radius(),
            patch_size: 7,
            patchmatch_iters: quality.patchmatch_iters(),
            poisson_iters: quality.poisson_iters(),
            spacing_factor: DEFAULT_SPACING_FACTOR,
        }
    }

    /// Copy with every field clamped into its valid domain.
    pub fn normalized(&self) -> Self {
        let feather = if self.feather.is_nan() { 0.0 } else { self.feather.clamp(0.0, 1.0) };
        let flow = if self.flow.is_nan() { 1.0 } else { self.flow.clamp(0.0, 1.0) };
        let spacing_factor = if self.spacing_factor.is_finite() && self.spacing_factor > 0.0 {
            self.spacing_factor
        } else {
            DEFAULT_SPACING_FACTOR
        };
        Self {
            brush_radius: self.brush_radius.clamp(1, MAX_EXTENT),
            feather,
            flow,
            gap: self.gap.clamp(0, MAX_EXTENT),
            sample_radius: self.sample_radius.clamp(8, MAX_EXTENT),
            patch_size: self.patch_size.clamp(3, MAX_EXTENT) | 1,
            patchmatch_iters: self.patchmatch_iters.max(1),
            poisson_iters: self.poisson_iters,
            spacing_factor,
        }
    }

    pub fn patch_half(&self) -> u32 {
        (self.patch_size.max(3) / 2) as u32
    }

    /// Half-width of the ROI carved around a dab, saturating at `i32::MAX`.
    pub fn roi_half(&self) -> i32 {
        let half = self.brush_radius as i64
            + self.sample_radius as i64
            + self.patch_half() as i64
            + roi::ROI_PADDING as i64;
        half.clamp(0, i32::MAX as i64) as i32
    }
}

// -- Dabs -----------------------------------------------------------------

/// One brush application point, in image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dab {
    pub cx: f32,
    pub cy: f32,
}

impl Dab {
    pub fn new(cx: f32, cy: f32) -> Self {
        Self { cx, cy }
    }

    /// Integer pixel center (truncated toward zero).
    pub fn pixel(&self) -> (i32, i32) {
        (self.cx as i32, self.cy as i32)
    }
}

/// ROI touched by a dab and its final pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct DabPatch {
    pub bbox: Roi,
    pub rgba: RgbaImage,
}

/// Apply one healing dab to `image` in place.
///
/// Returns `None` when the dab cannot have any effect (clamped ROI too small
/// for a patch). When the sampling ring is empty the ROI is returned
/// unmodified and nothing is written back.
pub fn apply_dab<R: Rng + ?Sized>(
    image: &mut RgbaImage,
    dab: Dab,
    params: &HealParams,
    rng: &mut R,
) -> Option<DabPatch> {
    let p = params.normalized();
    let (cx, cy) = dab.pixel();
    let (img_w, img_h) = image.dimensions();
    let half = p.patch_half();

    let bbox = Roi::around(img_w, img_h, cx, cy, p.roi_half(), p.patch_size as u32 + 2)?;
    let dst = bbox.extract(image);
    let (w, h) = dst.dimensions();
    let (lcx, lcy) = bbox.local(cx, cy);

    let luma = color::luma_plane(&dst);
    let mask = DabMask::build(w, h, lcx, lcy, p.brush_radius, p.feather);
    let ring = CandidateRing::build(
        &mask,
        lcx,
        lcy,
        RingGeometry::new(p.brush_radius, p.gap, p.sample_radius, half),
    );
    if ring.is_empty() {
        return Some(DabPatch { bbox, rgba: dst });
    }

    let nnf = patchmatch::solve(&luma, &mask, &ring, half, p.patchmatch_iters as usize, rng);
    let synthesized = synthesis::synthesize(&dst, &mask, &nnf);
    let blended = if p.poisson_iters > 0 {
        poisson::poisson_blend(&dst, &synthesized, &mask, p.poisson_iters as usize)
    } else {
        synthesized
    };
    let out = composite::composite(&dst, &blended, &mask, p.flow);

    bbox.commit(image, &out);
    Some(DabPatch { bbox, rgba: out })
}
