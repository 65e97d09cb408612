//! Scenario tests for the whole dab pipeline

use image::{Rgba, RgbaImage};
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::stroke::apply_stroke;
use super::*;

fn rng() -> Pcg32 {
    Pcg32::seed_from_u64(0x5eed)
}

/// Mildly textured image so patch costs differ.
fn textured(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        let v = ((x * 7 + y * 3) % 40 + 90) as u8;
        Rgba([v, v.wrapping_add(10), v.wrapping_sub(20), 255])
    })
}

fn params(radius: i32, feather: f32) -> HealParams {
    HealParams {
        brush_radius: radius,
        feather,
        sample_radius: 24,
        ..HealParams::default()
    }
}

// ========================================================================
// Parameters
// ========================================================================

#[test]
fn test_normalize_clamps_every_field() {
    let raw = HealParams {
        brush_radius: -4,
        feather: 3.0,
        flow: f32::NAN,
        gap: -2,
        sample_radius: 1,
        patch_size: 4,
        patchmatch_iters: 0,
        poisson_iters: 0,
        spacing_factor: -1.0,
    };
    let p = raw.normalized();
    assert_eq!(p.brush_radius, 1);
    assert_eq!(p.feather, 1.0);
    assert_eq!(p.flow, 1.0);
    assert_eq!(p.gap, 0);
    assert_eq!(p.sample_radius, 8);
    assert_eq!(p.patch_size, 5);
    assert_eq!(p.patchmatch_iters, 1);
    assert_eq!(p.poisson_iters, 0);
    assert_eq!(p.spacing_factor, DEFAULT_SPACING_FACTOR);
}

#[test]
fn test_zero_flow_survives_normalization() {
    let p = HealParams { flow: 0.0, ..HealParams::default() }.normalized();
    assert_eq!(p.flow, 0.0);
}

#[test]
fn test_extents_are_capped() {
    let raw = HealParams {
        brush_radius: i32::MAX,
        gap: i32::MAX,
        sample_radius: i32::MAX,
        patch_size: i32::MAX,
        ..HealParams::default()
    };
    assert_eq!(raw.roi_half(), i32::MAX);

    let p = raw.normalized();
    assert_eq!(p.brush_radius, MAX_EXTENT);
    assert_eq!(p.gap, MAX_EXTENT);
    assert_eq!(p.sample_radius, MAX_EXTENT);
    assert_eq!(p.patch_size, MAX_EXTENT | 1);
    assert!(p.roi_half() > MAX_EXTENT);
}

#[test]
fn test_huge_radius_is_no_effect() {
    let gray = Rgba([90, 90, 90, 255]);
    let mut img = RgbaImage::from_pixel(64, 64, gray);
    let before = img.clone();

    // The disc swallows the whole ROI, so there is nowhere to sample from.
    let p = HealParams { brush_radius: i32::MAX, ..HealParams::default() };
    let patch = apply_dab(&mut img, Dab::new(32.0, 32.0), &p, &mut rng());
    assert_eq!(patch.map(|d| d.bbox), Some(Roi { x0: 0, y0: 0, width: 64, height: 64 }));
    assert_eq!(img, before);

    // A patch wider than the image cannot fit at all.
    let p = HealParams { patch_size: i32::MAX, sample_radius: i32::MAX, ..HealParams::default() };
    assert!(apply_dab(&mut img, Dab::new(32.0, 32.0), &p, &mut rng()).is_none());
    assert_eq!(img, before);
}

#[test]
fn test_quality_presets() {
    let preview = HealParams::for_quality(HealQuality::Preview);
    let full = HealParams::for_quality(HealQuality::Full);
    assert_eq!((preview.sample_radius, full.sample_radius), (64, 128));
    assert_eq!((preview.patchmatch_iters, full.patchmatch_iters), (3, 6));
    assert_eq!((preview.poisson_iters, full.poisson_iters), (60, 180));
    assert_eq!(preview.brush_radius, 18);
    assert_eq!(HealQuality::parse(" Full "), Some(HealQuality::Full));
    assert_eq!(HealQuality::parse("draft"), None);
}

// ========================================================================
// Degenerate geometry
// ========================================================================

#[test]
fn test_tiny_roi_is_no_effect() {
    let mut img = textured(9, 40);
    let before = img.clone();
    // patch 7 -> ROI side must exceed 9
    assert!(apply_dab(&mut img, Dab::new(4.0, 20.0), &params(3, 0.5), &mut rng()).is_none());
    assert_eq!(img, before);
}

#[test]
fn test_dab_far_outside_is_no_effect() {
    let mut img = textured(64, 64);
    let before = img.clone();
    let res = apply_dab(&mut img, Dab::new(-900.0, 30.0), &params(8, 0.5), &mut rng());
    assert!(res.is_none());
    assert_eq!(img, before);
}

#[test]
fn test_empty_annulus_passes_through() {
    let mut img = textured(50, 50);
    let before = img.clone();
    let p = HealParams {
        brush_radius: 40,
        gap: 40,
        sample_radius: 64,
        ..HealParams::default()
    };
    let patch = apply_dab(&mut img, Dab::new(1.0, 1.0), &p, &mut rng()).expect("roi fits");
    assert_eq!(patch.bbox, Roi { x0: 0, y0: 0, width: 50, height: 50 });
    assert_eq!(patch.rgba, before);
    assert_eq!(img, before);
}

#[test]
fn test_zero_flow_leaves_image_untouched() {
    let mut img = textured(80, 80);
    for y in 36..44 {
        for x in 36..44 {
            img.put_pixel(x, y, Rgba([0, 0, 0, 200]));
        }
    }
    let before = img.clone();
    let p = HealParams { flow: 0.0, ..params(8, 0.5) };
    let patch = apply_dab(&mut img, Dab::new(40.0, 40.0), &p, &mut rng());
    assert!(patch.is_some());
    assert_eq!(img, before);
}

// ========================================================================
// Synthesis scenarios
// ========================================================================

#[test]
fn test_uniform_gray_stays_exact() {
    let gray = Rgba([128, 128, 128, 255]);
    let mut img = RgbaImage::from_pixel(100, 100, gray);
    let p = HealParams {
        brush_radius: 10,
        feather: 0.0,
        ..HealParams::default()
    };
    apply_dab(&mut img, Dab::new(50.0, 50.0), &p, &mut rng()).expect("dab applies");
    for y in 40..=60u32 {
        for x in 40..=60u32 {
            let dx = x as i32 - 50;
            let dy = y as i32 - 50;
            if dx * dx + dy * dy < 100 {
                assert_eq!(*img.get_pixel(x, y), gray, "pixel ({}, {})", x, y);
            }
        }
    }
    assert!(img.pixels().all(|p| *p == gray));
}

#[test]
fn test_spot_is_replaced_by_surroundings() {
    let bg = Rgba([100, 100, 100, 255]);
    let mut img = RgbaImage::from_pixel(80, 80, bg);
    for y in 37..=43 {
        for x in 37..=43 {
            img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
        }
    }
    let p = HealParams {
        brush_radius: 8,
        feather: 0.0,
        poisson_iters: 0,
        ..params(8, 0.0)
    };
    let patch = apply_dab(&mut img, Dab::new(40.0, 40.0), &p, &mut rng()).expect("dab applies");
    assert_eq!(*img.get_pixel(40, 40), bg);
    assert_eq!(*img.get_pixel(37, 43), bg);
    let (lx, ly) = patch.bbox.local(40, 40);
    assert_eq!(*patch.rgba.get_pixel(lx as u32, ly as u32), bg);
}

#[test]
fn test_poisson_moves_spot_toward_background() {
    let bg = Rgba([100, 100, 100, 255]);
    let mut img = RgbaImage::from_pixel(80, 80, bg);
    img.put_pixel(40, 40, Rgba([0, 0, 0, 255]));
    let p = HealParams {
        poisson_iters: 120,
        ..params(6, 0.0)
    };
    apply_dab(&mut img, Dab::new(40.0, 40.0), &p, &mut rng()).expect("dab applies");
    let v = img.get_pixel(40, 40).0[0];
    assert!(v > 80, "spot only reached {}", v);
}

#[test]
fn test_feathered_edge_is_partial() {
    let mut img = RgbaImage::from_pixel(80, 80, Rgba([200, 200, 200, 255]));
    for y in 30..50 {
        for x in 30..50 {
            img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
        }
    }
    // Ring lies on the bright background; the dark square is under the brush.
    let p = HealParams {
        brush_radius: 10,
        feather: 1.0,
        gap: 12,
        poisson_iters: 0,
        ..params(10, 1.0)
    };
    apply_dab(&mut img, Dab::new(40.0, 40.0), &p, &mut rng()).expect("dab applies");
    let center = img.get_pixel(40, 40).0[0];
    let edge = img.get_pixel(40, 48).0[0];
    assert!(center > edge, "center {} should be lighter than edge {}", center, edge);
    assert!(edge > 0 && edge < 200);
}

// ========================================================================
// Strokes
// ========================================================================

#[test]
fn test_later_dabs_see_earlier_ones() {
    let mut img = textured(120, 60);
    for x in 20..100 {
        for y in 29..=31 {
            img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
        }
    }
    let original = img.clone();
    let p = params(6, 0.4);
    let dabs = [Dab::new(40.0, 30.0), Dab::new(50.0, 30.0), Dab::new(60.0, 30.0)];
    let mut r = rng();

    apply_dab(&mut img, dabs[0], &p, &mut r).expect("first dab");
    apply_dab(&mut img, dabs[1], &p, &mut r).expect("second dab");
    let after_two = img.clone();
    let third = apply_dab(&mut img, dabs[2], &p, &mut r).expect("third dab");

    let bbox = third.bbox;
    let (lcx, lcy) = bbox.local(60, 30);
    let mut carried = 0;
    for ly in 0..bbox.height {
        for lx in 0..bbox.width {
            let dx = lx as i32 - lcx;
            let dy = ly as i32 - lcy;
            if dx * dx + dy * dy < 36 {
                continue;
            }
            let (gx, gy) = (bbox.x0 + lx, bbox.y0 + ly);
            let got = third.rgba.get_pixel(lx, ly);
            assert_eq!(got, after_two.get_pixel(gx, gy));
            if got != original.get_pixel(gx, gy) {
                carried += 1;
            }
        }
    }
    assert!(carried > 0, "third ROI shows none of the earlier dabs");
}

#[test]
fn test_stroke_matches_sequential_dabs() {
    let mut a = textured(100, 60);
    let mut b = a.clone();
    let p = params(5, 0.5);
    let dabs = [Dab::new(30.0, 30.0), Dab::new(38.0, 30.0), Dab::new(46.0, 30.0)];

    let mut r1 = rng();
    for dab in dabs {
        apply_dab(&mut a, dab, &p, &mut r1);
    }
    let mut r2 = rng();
    let with_gaps: Vec<Option<Dab>> = vec![Some(dabs[0]), None, Some(dabs[1]), Some(dabs[2]), None];
    assert_eq!(apply_stroke(&mut b, &with_gaps, &p, &mut r2), 3);
    assert_eq!(a, b);
}
