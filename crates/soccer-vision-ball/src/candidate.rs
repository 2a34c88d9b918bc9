//! Working state for one ball candidate.
//!
//! A candidate owns its current working region. Each refinement step builds
//! a new region and replaces the old one, which is simply dropped. Circle
//! and boundary points are always expressed in the working region's local
//! pixels, so every step that moves or rescales the region moves them too.

use nalgebra::{Point2, Vector2};

use soccer_vision_core::Region;

use crate::size::SizeEstimate;

/// Shape class of the coarse region a candidate came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RegionAspect {
    #[default]
    Undefined,
    Normal,
    /// Much wider than tall.
    Short,
    /// Much taller than wide.
    Tall,
}

/// Frame edge a region touches, if any; partial balls may have their centre
/// on that edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PartialSide {
    Left,
    Top,
    Right,
    Bottom,
    #[default]
    None,
}

impl PartialSide {
    /// Checked in left, top, right, bottom order.
    pub fn of(region: &Region) -> Self {
        let bbox = region.bbox_raw();
        let frame = region.frame();
        if bbox.a.x == 0 {
            PartialSide::Left
        } else if bbox.a.y == 0 {
            PartialSide::Top
        } else if bbox.b.x == frame.width() as i32 {
            PartialSide::Right
        } else if bbox.b.y == frame.height() as i32 {
            PartialSide::Bottom
        } else {
            PartialSide::None
        }
    }

    pub fn is_partial(self) -> bool {
        self != PartialSide::None
    }
}

/// A circle in local pixels of the region it was fitted against.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CircleFit {
    pub centre: Point2<f32>,
    pub radius: f32,
    pub found: bool,
}

impl CircleFit {
    pub fn new(centre: Point2<f32>, radius: f32) -> Self {
        Self {
            centre,
            radius,
            found: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BallCandidate {
    /// Current working region.
    pub region: Region,
    /// Region the candidate was derived from, for retries.
    pub original: Region,
    pub aspect: RegionAspect,
    pub circle: CircleFit,
    /// Boundary points for circle fitting, local pixels.
    pub points: Vec<Point2<i32>>,
    pub size: SizeEstimate,
    pub partial: PartialSide,
    /// Looser internal-patch bounds for balls found by `circle_roi`.
    pub crazy: bool,
}

impl BallCandidate {
    pub fn new(region: Region, original: Region, aspect: RegionAspect) -> Self {
        Self {
            region,
            original,
            aspect,
            circle: CircleFit::default(),
            points: Vec::new(),
            size: SizeEstimate::default(),
            partial: PartialSide::None,
            crazy: false,
        }
    }

    fn replace_region(&mut self, region: Region) {
        self.region = region;
    }

    /// Pad the region and, for regions wider than tall, extend it
    /// downwards by the excess width (limited by the expected diameter).
    /// With `aspect_check`, very wide regions (aspect 4 and up) are only
    /// padded.
    pub fn regenerate(&mut self, aspect_check: bool, padding: i32) {
        let cols = self.region.cols() as i32;
        let rows = self.region.rows() as i32;
        let aspect = cols as f32 / rows.max(1) as f32;
        let mut bounds = self.region.bbox_local();
        if aspect > 1.0 && (!aspect_check || aspect < 4.0) {
            let limit = (self.size.diam_expected_pixels / self.region.density() as f32) as i32;
            bounds.b.y += (cols - rows).min(limit);
        }
        let bounds = bounds.expanded(padding, padding);
        let region = self.region.sub_region(bounds.a, bounds.b);
        self.replace_region(region);
    }

    /// Crop to the bounding box of the boundary points plus one pixel on the
    /// left, right and top; the bottom edge is kept.
    ///
    /// Not part of [`crate::BallDetector`]'s refinement; offered for callers
    /// building their own candidate pipelines.
    pub fn trim_to_points(&mut self) {
        if self.points.is_empty() {
            return;
        }
        let mut min_x = self.region.cols() as i32;
        let mut max_x = 0;
        let mut min_y = self.region.rows() as i32;
        for p in &self.points {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
        }
        let a = Point2::new(min_x - 1, min_y - 1);
        let b = Point2::new(max_x + 1, self.region.rows() as i32);
        self.shift_points(-a.coords);
        let region = self.region.sub_region(a, b);
        self.replace_region(region);
    }

    /// Crop to the fitted circle's bounding square (kept inside the current
    /// region) plus padding. Points that fall outside are dropped.
    pub fn regenerate_from_circle(&mut self, padding: i32) {
        let c = self.circle;
        let current = self.region.bbox_local();
        let a = Point2::new(
            ((c.centre.x - c.radius) as i32).max(current.a.x) - padding,
            ((c.centre.y - c.radius) as i32).max(current.a.y) - padding,
        );
        let b = Point2::new(
            ((c.centre.x + c.radius) as i32).min(current.b.x) + padding,
            ((c.centre.y + c.radius) as i32).min(current.b.y) + padding,
        );
        let width = b.x - a.x;
        let height = b.y - a.y;
        self.shift_points(-a.coords);
        self.points
            .retain(|p| p.x >= 0 && p.x < width && p.y >= 0 && p.y < height);
        self.circle.centre -= a.coords.cast::<f32>();
        let region = self.region.sub_region(a, b);
        self.replace_region(region);
    }

    /// Zoom in by powers of two until the region has at least `min_pixels`
    /// pixels, never below one raw pixel per local pixel. Points, circle and
    /// expected size scale with the zoom. Returns the zoom exponent.
    pub fn rescale(&mut self, min_pixels: usize) -> u32 {
        let mut pixels = self.region.cols() * self.region.rows();
        let mut change = 0u32;
        while pixels > 0 && pixels < min_pixels {
            pixels <<= 2;
            change += 1;
        }
        while change > 0 && (1u32 << change) > self.region.density() {
            change -= 1;
        }
        if change == 0 {
            return 0;
        }
        let factor = 1i32 << change;
        self.size.diam_expected_size = ((self.size.diam_expected_size as i32) << change) as f32;
        for p in &mut self.points {
            *p = Point2::new(p.x * factor, p.y * factor);
        }
        self.circle.centre = Point2::new(
            (self.circle.centre.x as i32 * factor) as f32,
            (self.circle.centre.y as i32 * factor) as f32,
        );
        self.circle.radius = (self.circle.radius as i32 * factor) as f32;
        let region = self.region.zoom_in(factor as u32);
        self.replace_region(region);
        change
    }

    /// Re-threshold the working region in place.
    pub fn reclassify(&mut self, window: i32, percentage: i32) {
        let region = self.region.reclassify(window, percentage);
        self.replace_region(region);
    }

    fn shift_points(&mut self, by: Vector2<i32>) {
        for p in &mut self.points {
            *p += by;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soccer_vision_core::{BBox, Camera, CameraFrame};
    use std::sync::Arc;

    fn frame(w: usize, h: usize) -> Arc<CameraFrame> {
        let luma = (0..w * h).map(|i| (i % 251) as u8).collect();
        Arc::new(CameraFrame::from_luma(Camera::Bottom, w, h, luma, 128).unwrap())
    }

    #[test]
    fn partial_side_prefers_left_then_top() {
        let f = frame(100, 80);
        let corner = Region::new(f.clone(), BBox::from_coords(0, 0, 10, 10), 1);
        assert_eq!(PartialSide::of(&corner), PartialSide::Left);
        let right = Region::new(f.clone(), BBox::from_coords(90, 10, 100, 20), 1);
        assert_eq!(PartialSide::of(&right), PartialSide::Right);
        let inner = Region::new(f, BBox::from_coords(10, 10, 20, 20), 1);
        assert!(!PartialSide::of(&inner).is_partial());
    }

    #[test]
    fn rescale_scales_points_and_circle_consistently() {
        let f = frame(400, 300);
        let region = Region::new(f, BBox::from_coords(100, 100, 164, 132), 4);
        let mut cand = BallCandidate::new(region.clone(), region, RegionAspect::Normal);
        cand.points = vec![Point2::new(3, 5), Point2::new(10, 2)];
        cand.circle = CircleFit::new(Point2::new(8.0, 4.0), 3.0);
        cand.size.diam_expected_size = 5.0;

        // 16 x 8 = 128 pixels: x4 twice reaches 2048, capped by density 4.
        let change = cand.rescale(32 * 32);
        assert_eq!(change, 2);
        assert_eq!(cand.region.density(), 1);
        assert_eq!((cand.region.cols(), cand.region.rows()), (64, 32));
        assert_eq!(cand.points, vec![Point2::new(12, 20), Point2::new(40, 8)]);
        assert_eq!(cand.circle.radius, 12.0);
        assert_eq!(cand.size.diam_expected_size, 20.0);

        // Dividing back by the zoom recovers the original coordinates.
        let back: Vec<_> = cand.points.iter().map(|p| Point2::new(p.x >> change, p.y >> change)).collect();
        assert_eq!(back, vec![Point2::new(3, 5), Point2::new(10, 2)]);
        assert_eq!(cand.circle.centre / 4.0, Point2::new(8.0, 4.0));
    }

    #[test]
    fn rescale_leaves_full_resolution_regions_alone() {
        let f = frame(200, 200);
        let region = Region::new(f, BBox::from_coords(10, 10, 20, 20), 1);
        let mut cand = BallCandidate::new(region.clone(), region, RegionAspect::Normal);
        assert_eq!(cand.rescale(32 * 32), 0);
        assert_eq!(cand.region.cols(), 10);
    }

    #[test]
    fn regenerate_extends_wide_regions_downwards() {
        let f = frame(200, 200);
        let region = Region::new(f, BBox::from_coords(50, 50, 80, 60), 1);
        let mut cand = BallCandidate::new(region.clone(), region, RegionAspect::Short);
        cand.size.diam_expected_pixels = 100.0;
        cand.regenerate(true, 2);
        // 30 x 10 grows by 20 rows, then 2 pixels of padding all round.
        assert_eq!(cand.region.bbox_raw(), BBox::from_coords(48, 48, 82, 82));
    }

    #[test]
    fn trim_moves_points_into_new_frame() {
        let f = frame(200, 200);
        let region = Region::new(f, BBox::from_coords(20, 20, 60, 60), 1);
        let mut cand = BallCandidate::new(region.clone(), region, RegionAspect::Normal);
        cand.points = vec![Point2::new(10, 12), Point2::new(30, 20)];
        cand.trim_to_points();
        assert_eq!(cand.region.bbox_raw(), BBox::from_coords(29, 31, 51, 60));
        assert_eq!(cand.points, vec![Point2::new(1, 1), Point2::new(21, 9)]);
    }

    #[test]
    fn regenerate_from_circle_recentres_fit() {
        let f = frame(200, 200);
        let region = Region::new(f, BBox::from_coords(0, 0, 100, 100), 1);
        let mut cand = BallCandidate::new(region.clone(), region, RegionAspect::Undefined);
        cand.circle = CircleFit::new(Point2::new(50.0, 40.0), 10.0);
        cand.points = vec![Point2::new(40, 40), Point2::new(5, 5)];
        cand.regenerate_from_circle(2);
        assert_eq!(cand.region.bbox_raw(), BBox::from_coords(38, 28, 62, 52));
        assert_eq!(cand.circle.centre, Point2::new(12.0, 12.0));
        assert_eq!(cand.points, vec![Point2::new(2, 12)]);
    }
}
