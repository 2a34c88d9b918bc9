//! Internal texture of a fitted ball: the dark patches inside the circle.
//!
//! A real ball shows a handful of mid-sized dark patches, typically three
//! around a central one in a roughly equilateral layout. Field lines,
//! robot feet and goal posts produce too few patches, one dominant patch,
//! or none at all.

use nalgebra::Point2;

use soccer_vision_core::{BallStage, CcaScratch, CircleMask, Component, Region};

use crate::candidate::CircleFit;
use crate::params::TextureParams;

/// A dark patch inside the circle that passed the size filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InternalRegion {
    pub component: Component,
    /// All four bounding-box corners lie strictly inside the circle.
    pub completely_internal: bool,
}

impl InternalRegion {
    /// Integer bounding-box midpoint.
    pub fn centre(&self) -> Point2<i32> {
        let c = &self.component;
        Point2::new(
            (c.max_x - c.min_x) / 2 + c.min_x,
            (c.max_y - c.min_y) / 2 + c.min_y,
        )
    }
}

/// Patch statistics for one circle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InternalRegions {
    /// Patches that passed both the pixel-count and the side filters.
    pub groups: Vec<InternalRegion>,
    /// Completely internal patches that passed the pixel-count filter.
    pub num_internal: usize,
    /// Largest completely internal patch, as a fraction of the circle area.
    pub max_internal_prop: f32,
}

/// Label the non-white pixels inside `circle` and keep the ball-like
/// patches. In crazy mode the lower pixel bound is much looser.
pub fn internal_regions(
    scratch: &mut CcaScratch,
    region: &Region,
    circle: &CircleFit,
    crazy: bool,
    params: &TextureParams,
) -> InternalRegions {
    let r = circle.radius;
    let r2 = r * r;
    let area = r2 * std::f32::consts::PI;
    let min_count = if crazy {
        (r2 * params.crazy_min_radius_sq_fraction) as i64
    } else {
        (area * params.min_area_fraction) as i64
    };
    let max_count = (area * params.max_area_fraction) as i64;
    let centre = Point2::new(circle.centre.x as i32, circle.centre.y as i32);

    let mask = CircleMask::new(circle.centre, r);
    let labelling = scratch.label_not_white(region, Some(&mask));

    let mut out = InternalRegions::default();
    for c in labelling.groups() {
        let count = i64::from(c.count);
        if count <= min_count || count >= max_count {
            continue;
        }
        let completely_internal = c.corners().iter().all(|corner| {
            let dx = (corner.x - centre.x) as f32;
            let dy = (corner.y - centre.y) as f32;
            dx * dx + dy * dy < r2
        });
        if completely_internal {
            out.num_internal += 1;
            out.max_internal_prop = out.max_internal_prop.max(c.count as f32 / area);
        }

        let (w, h) = (c.x_extent() as f32, c.y_extent() as f32);
        let min_side = r * params.min_side_ratio;
        let max_side = r * params.max_side_ratio;
        if w < min_side && h < min_side {
            continue;
        }
        if w > max_side || h > max_side {
            continue;
        }
        out.groups.push(InternalRegion {
            component: *c,
            completely_internal,
        });
    }
    out
}

impl InternalRegions {
    /// At least one completely internal patch of meaningful size.
    pub fn has_internal_patch(&self, params: &TextureParams) -> bool {
        self.num_internal >= 1 && self.max_internal_prop >= params.min_internal_fraction
    }

    /// Either one well-sized patch sits in the middle of the circle, or the
    /// patch count is in the ball range.
    pub fn has_ball_layout(&self, circle: &CircleFit, params: &TextureParams) -> bool {
        let max_w = (circle.radius * params.centred_max_width) as i32;
        let min_w = (circle.radius * params.centred_min_width) as i32;
        let max_offset = (circle.radius * params.centred_max_offset) as i32 as f32;
        let centred = self.groups.iter().filter(|g| g.completely_internal).any(|g| {
            let c = &g.component;
            let (w, h) = (c.x_extent(), c.y_extent());
            let cx = (c.max_x + c.min_x) / 2;
            let cy = (c.max_y + c.min_y) / 2;
            w < max_w
                && w > min_w
                && h < max_w
                && h > min_w
                && (cx as f32 - circle.centre.x).abs() < max_offset
                && (cy as f32 - circle.centre.y).abs() < max_offset
        });
        centred || (params.min_regions..=params.max_regions).contains(&self.groups.len())
    }

    /// Roughly equilateral triangles of patch centres that include the key
    /// patch: the completely internal patch nearest the circle centre, or
    /// the first patch when none is near.
    pub fn triangles(&self, circle: &CircleFit, params: &TextureParams) -> Vec<[Point2<i32>; 3]> {
        if self.groups.len() < 3 {
            return Vec::new();
        }
        let centres: Vec<Point2<i32>> = self.groups.iter().map(InternalRegion::centre).collect();
        let cx = circle.centre.x as i32;
        let cy = circle.centre.y as i32;
        let mut key_dist = circle.radius as i32;
        let mut key = 0;
        for (i, g) in self.groups.iter().enumerate() {
            if !g.completely_internal {
                continue;
            }
            let (dx, dy) = (centres[i].x - cx, centres[i].y - cy);
            let dist = f64::from(dx * dx + dy * dy).sqrt() as i32;
            if dist < key_dist {
                key_dist = dist;
                key = i;
            }
        }
        let key_centre = centres[key];

        let n = centres.len();
        let mut out = Vec::new();
        for i in 0..n {
            for j in i + 1..n {
                for k in j + 1..n {
                    let tri = [centres[i], centres[j], centres[k]];
                    if tri.contains(&key_centre) && is_equilateral(&tri, circle.radius, params) {
                        out.push(tri);
                    }
                }
            }
        }
        out
    }
}

/// Every squared side within the radius-derived band and nearly equal.
fn is_equilateral(tri: &[Point2<i32>; 3], radius: f32, params: &TextureParams) -> bool {
    let r2 = (radius * radius) as i32;
    let min = (r2 as f32 - r2 as f32 * params.triangle_dist_ratio_min) as i32;
    let max = (r2 as f32 + r2 as f32 * params.triangle_dist_ratio_max) as i32;
    let mut d = [0i32; 3];
    for i in 0..3 {
        let a = tri[i];
        let b = tri[(i + 1) % 3];
        let dist2 = (a.x - b.x).pow(2) + (a.y - b.y).pow(2);
        if dist2 < min || dist2 > max {
            return false;
        }
        d[i] = dist2;
    }
    let avg_error = ((d[0] - d[1]).abs() + (d[1] - d[2]).abs() + (d[2] - d[0]).abs()) / 3;
    avg_error < params.triangle_error_threshold
}

/// Raw luminance spread (max minus min) of the pixels strictly inside the
/// circle; zero when no pixel is inside.
pub fn raw_range(region: &Region, circle: &CircleFit) -> i32 {
    let r2 = circle.radius * circle.radius;
    let mut lo = u8::MAX;
    let mut hi = u8::MIN;
    let mut any = false;
    for y in 0..region.rows() {
        let dy = y as f32 - circle.centre.y;
        for x in 0..region.cols() {
            let dx = x as f32 - circle.centre.x;
            if dx * dx + dy * dy < r2 {
                let v = region.raw(x, y);
                lo = lo.min(v);
                hi = hi.max(v);
                any = true;
            }
        }
    }
    if any {
        i32::from(hi) - i32::from(lo)
    } else {
        0
    }
}

/// First texture check a candidate fails, in pipeline order.
pub fn texture_rejection(
    regions: &InternalRegions,
    circle: &CircleFit,
    params: &TextureParams,
) -> Option<BallStage> {
    if regions.groups.len() < params.min_regions {
        return Some(BallStage::InternalRegionCount);
    }
    if !regions.has_internal_patch(params) {
        return Some(BallStage::InternalRegions);
    }
    if !regions.has_ball_layout(circle, params) {
        return Some(BallStage::InternalLayout);
    }
    if regions.triangles(circle, params).is_empty() {
        return Some(BallStage::Triangles);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use soccer_vision_core::{Camera, CameraFrame};
    use std::sync::Arc;

    /// 64x64 white disk of radius 20.5 with dark blobs of `blob_radius`
    /// at `blobs`; everything outside the disk is dark.
    fn ball_region(blobs: &[(f64, f64)], blob_radius: f64) -> Region {
        let n = 64usize;
        let mut luma = vec![30u8; n * n];
        for y in 0..n {
            for x in 0..n {
                let (fx, fy) = (x as f64, y as f64);
                if (fx - 32.0).powi(2) + (fy - 32.0).powi(2) > 20.5 * 20.5 {
                    continue;
                }
                let dark = blobs
                    .iter()
                    .any(|&(bx, by)| (fx - bx).powi(2) + (fy - by).powi(2) <= blob_radius * blob_radius);
                if !dark {
                    luma[y * n + x] = 220;
                }
            }
        }
        let frame = CameraFrame::from_luma(Camera::Bottom, n, n, luma, 128).unwrap();
        Region::whole_frame(Arc::new(frame), 1)
    }

    fn triangle_blobs(side: f64) -> Vec<(f64, f64)> {
        let rho = side / 3f64.sqrt();
        let start = -std::f64::consts::FRAC_PI_2;
        (0..3)
            .map(|i| {
                let a = start + i as f64 * 2.0 * std::f64::consts::PI / 3.0;
                (32.0 + rho * a.cos(), 32.0 + rho * a.sin())
            })
            .collect()
    }

    fn circle() -> CircleFit {
        CircleFit::new(Point2::new(32.0, 32.0), 20.0)
    }

    #[test]
    fn three_patch_ball_passes_every_check() {
        let region = ball_region(&triangle_blobs(18.0), 7.0);
        let params = TextureParams::default();
        let mut scratch = CcaScratch::new();
        let regions = internal_regions(&mut scratch, &region, &circle(), false, &params);

        assert_eq!(regions.groups.len(), 3);
        assert_eq!(regions.num_internal, 3);
        assert!(regions.groups.iter().all(|g| g.completely_internal));
        assert!(regions.groups.iter().all(|g| g.component.x_extent() == 12));
        assert!(regions.max_internal_prop > 0.1);

        let tris = regions.triangles(&circle(), &params);
        assert_eq!(tris.len(), 1, "one equilateral layout");
        assert_eq!(texture_rejection(&regions, &circle(), &params), None);
    }

    #[test]
    fn one_dominant_patch_is_not_a_ball() {
        let region = ball_region(&[(32.0, 32.0)], 16.0);
        let params = TextureParams::default();
        let mut scratch = CcaScratch::new();
        let regions = internal_regions(&mut scratch, &region, &circle(), false, &params);
        assert!(regions.groups.is_empty(), "patch above 20% of the circle is dropped");
        assert_eq!(
            texture_rejection(&regions, &circle(), &params),
            Some(BallStage::InternalRegionCount)
        );
    }

    #[test]
    fn uniform_disk_has_no_patches() {
        let region = ball_region(&[], 0.0);
        let mut scratch = CcaScratch::new();
        let regions = internal_regions(&mut scratch, &region, &circle(), false, &TextureParams::default());
        assert!(regions.groups.is_empty());
        assert_eq!(regions.num_internal, 0);
    }

    #[test]
    fn raw_range_reflects_contrast_inside_circle() {
        let textured = ball_region(&triangle_blobs(18.0), 7.0);
        assert_eq!(raw_range(&textured, &circle()), 190);
        let plain = ball_region(&[], 0.0);
        assert_eq!(raw_range(&plain, &circle()), 0);
        let nowhere = CircleFit::new(Point2::new(-100.0, -100.0), 1.0);
        assert_eq!(raw_range(&plain, &nowhere), 0);
    }

    #[test]
    fn skewed_triangle_is_rejected() {
        let params = TextureParams::default();
        // r = 20: sides must fall in 300..=680 and agree within 130.
        let tri = [Point2::new(0, 0), Point2::new(20, 0), Point2::new(10, 17)];
        assert!(is_equilateral(&tri, 20.0, &params));
        let skewed = [Point2::new(0, 0), Point2::new(26, 0), Point2::new(10, 14)];
        assert!(!is_equilateral(&skewed, 20.0, &params));
    }
}
