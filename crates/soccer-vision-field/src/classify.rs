//! Per-region shape decisions, keyed on the number of border ends.

use log::trace;
use nalgebra::Point2;

use soccer_vision_core::{Camera, FrameContext, RansacLine, Region, RegionClassifier};

use crate::angles::{corner_angle, t_angle};
use crate::edge::{trace_connection, EdgeTrace};
use crate::params::LineCheckParams;
use crate::shape::{all_white_between, bends_in_two_parts, centre_offset_analysis, corner_tip, step_along};
use crate::spread::SpreadRegion;

/// What a region was found to contain. Intersections and spots are
/// robot-relative millimetres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RegionShape {
    Line,
    Curve,
    Corner { intersection: Point2<i32>, angle: f32 },
    TJunction { intersection: Point2<i32>, angle: f32 },
    PenaltySpot(Point2<i32>),
}

/// Outcome of analysing one seed region.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionAnalysis {
    /// Index of the seed region in the frame's region list.
    pub index: usize,
    pub shape: RegionShape,
    /// Border end centres projected onto the ground, in end order.
    pub field_ends: Vec<Point2<i32>>,
}

impl RegionAnalysis {
    /// Lines, curves and corners all run between two ends.
    pub fn is_line(&self) -> bool {
        matches!(
            self.shape,
            RegionShape::Line | RegionShape::Curve | RegionShape::Corner { .. }
        )
    }

    pub fn is_curve(&self) -> bool {
        self.shape == RegionShape::Curve
    }

    /// The two projected ends of a line-like region.
    pub fn line_ends(&self) -> Option<(Point2<i32>, Point2<i32>)> {
        if !self.is_line() || self.field_ends.len() < 2 {
            return None;
        }
        Some((self.field_ends[0], self.field_ends[1]))
    }
}

/// Ground position of a raw pixel, truncated to whole millimetres.
pub(crate) fn project_raw(ctx: &FrameContext<'_>, camera: Camera, raw: Point2<i32>) -> Point2<i32> {
    let q = ctx.camera.image_to_robot_xy(camera, raw.cast(), 0.0);
    Point2::new(q.x as i32, q.y as i32)
}

/// Ground position of a pixel given in `region`'s local coordinates.
pub fn project_local(region: &Region, ctx: &FrameContext<'_>, p: Point2<i32>) -> Point2<i32> {
    let d = region.density() as i32;
    let a = region.bbox_raw().a;
    project_raw(ctx, region.camera(), Point2::new(p.x * d + a.x, p.y * d + a.y))
}

/// Project every end centre of `region`.
pub fn project_ends(region: &SpreadRegion, ctx: &FrameContext<'_>) -> Vec<Point2<i32>> {
    region
        .ends
        .iter()
        .map(|end| project_local(&region.padded, ctx, end.centre))
        .collect()
}

/// Two ends: a line, a curve or a corner. `None` when the ends are not
/// joined by one white band.
pub fn classify_two_ends(
    region: &SpreadRegion,
    field_ends: &[Point2<i32>],
    ctx: &FrameContext<'_>,
    corner_classifier: &dyn RegionClassifier,
    params: &LineCheckParams,
) -> Option<RegionShape> {
    let padded = &region.padded;
    let (first, second) = (&region.ends[0], &region.ends[1]);
    let trace = trace_connection(padded, first.span_xy, second.span_xy)?;
    let (start, end) = (first.centre, second.centre);
    let (f0, f1) = (field_ends[0], field_ends[1]);

    if is_curve(padded, start, end, (f0, f1), &trace, params) {
        return Some(RegionShape::Curve);
    }

    match corner_point(padded, start, end, &trace, params) {
        Some(tip) if corner_classifier.predict(padded) => {
            let intersection = project_local(padded, ctx, tip);
            let angle = corner_angle(
                intersection,
                &RansacLine::new(intersection, f0),
                &RansacLine::new(intersection, f1),
            );
            Some(RegionShape::Corner {
                intersection,
                angle,
            })
        }
        Some(_) => {
            trace!("corner at region {:?} vetoed", padded.bbox_raw());
            Some(RegionShape::Line)
        }
        None => Some(RegionShape::Line),
    }
}

fn is_curve(
    region: &Region,
    start: Point2<i32>,
    end: Point2<i32>,
    field_ends: (Point2<i32>, Point2<i32>),
    trace: &EdgeTrace,
    params: &LineCheckParams,
) -> bool {
    let min_length = params.min_curve_length_mm;
    if soccer_vision_core::distance_sq(field_ends.0, field_ends.1) < min_length * min_length {
        return false;
    }
    if region.rows() < params.min_curve_side || region.cols() < params.min_curve_side {
        return false;
    }
    centre_offset_analysis(region, start, end, params) && bends_in_two_parts(region, &trace.first, params)
}

/// Local position of the corner: the midpoint of the two edge tips.
fn corner_point(
    region: &Region,
    start: Point2<i32>,
    end: Point2<i32>,
    trace: &EdgeTrace,
    params: &LineCheckParams,
) -> Option<Point2<i32>> {
    if !centre_offset_analysis(region, start, end, params) {
        return None;
    }
    let tip1 = corner_tip(&trace.first, params)?;
    let tip2 = corner_tip(&trace.second, params)?;
    Some(Point2::new((tip1.x + tip2.x) / 2, (tip1.y + tip2.y) / 2))
}

/// Three ends: a T-junction, when exactly one pair of ends is joined by a
/// straight white path (the bar) and the third end (the stem) can be
/// reached in a straight line from points on that bar.
pub fn classify_three_ends(
    region: &SpreadRegion,
    ctx: &FrameContext<'_>,
    t_classifier: &dyn RegionClassifier,
) -> Option<RegionShape> {
    let padded = &region.padded;
    let (p1, p2, p3) = (
        region.ends[0].centre,
        region.ends[1].centre,
        region.ends[2].centre,
    );
    let joined = (
        all_white_between(padded, p1, p2),
        all_white_between(padded, p1, p3),
        all_white_between(padded, p2, p3),
    );
    let (shoulder1, shoulder2, tail) = match joined {
        (true, false, false) => (p1, p2, p3),
        (false, true, false) => (p1, p3, p2),
        (false, false, true) => (p3, p2, p1),
        _ => {
            trace!("no unique bar among three ends: {joined:?}");
            return None;
        }
    };

    let junction = junction_point(padded, shoulder1, shoulder2, tail)?;
    if !t_classifier.predict(padded) {
        trace!("T at region {:?} vetoed", padded.bbox_raw());
        return None;
    }
    let intersection = project_local(padded, ctx, junction);
    let tail = project_local(padded, ctx, tail);
    let angle = t_angle(intersection, &RansacLine::new(tail, intersection));
    Some(RegionShape::TJunction {
        intersection,
        angle,
    })
}

/// Mean of the bar points with a clear white path to `tail`.
fn junction_point(
    region: &Region,
    shoulder1: Point2<i32>,
    shoulder2: Point2<i32>,
    tail: Point2<i32>,
) -> Option<Point2<i32>> {
    let len = f64::from(shoulder1.x - shoulder2.x).hypot(f64::from(shoulder1.y - shoulder2.y));
    let (mut sum_x, mut sum_y, mut count) = (0i64, 0i64, 0i64);
    let mut d = 1.0;
    while d + 1.0 < len {
        let p = step_along(shoulder1, shoulder2, len, d);
        if !region.contains(p.x, p.y) {
            break;
        }
        if all_white_between(region, p, tail) {
            sum_x += i64::from(p.x);
            sum_y += i64::from(p.y);
            count += 1;
        }
        d += 1.0;
    }
    (count > 0).then(|| Point2::new((sum_x / count) as i32, (sum_y / count) as i32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::BorderParams;
    use crate::spread::spread_region;
    use nalgebra::Vector3;
    use soccer_vision_core::{AcceptAll, BBox, CameraFrame, CameraModel, RejectAll, RrCoord};
    use std::sync::Arc;

    /// 40 mm per pixel, robot at image (320, 265).
    struct GridCamera;

    impl CameraModel for GridCamera {
        fn image_to_robot_xy(&self, _: Camera, p: Point2<f32>, _: f32) -> Point2<f32> {
            Point2::new(10600.0 - 40.0 * p.y, 40.0 * (320.0 - p.x))
        }

        fn robot_relative_to_neck(&self, _: &RrCoord, _: f32) -> Vector3<f32> {
            Vector3::zeros()
        }

        fn neck_pitch(&self) -> f32 {
            0.0
        }
    }

    fn seed(white: impl Fn(usize, usize) -> bool) -> SpreadRegion {
        let (w, h) = (640, 480);
        let luma = (0..w * h)
            .map(|i| if white(i % w, i / w) { 255 } else { 0 })
            .collect();
        let frame = Arc::new(CameraFrame::from_luma(Camera::Bottom, w, h, luma, 128).unwrap());
        let regions = vec![Region::new(frame, BBox::from_coords(300, 200, 340, 230), 1)];
        spread_region(&regions, 0, &BorderParams::default())
    }

    fn t_shape(x: usize, y: usize) -> bool {
        ((210..214).contains(&y) && (250..390).contains(&x))
            || ((214..300).contains(&y) && (318..322).contains(&x))
    }

    #[test]
    fn t_junction_sits_on_the_bar_above_the_stem() {
        let region = seed(t_shape);
        assert_eq!(region.ends.len(), 3);
        let camera = GridCamera;
        let ctx = FrameContext::new(&camera);
        let shape = classify_three_ends(&region, &ctx, &AcceptAll).expect("T found");
        let RegionShape::TJunction { intersection, .. } = shape else {
            panic!("expected a T, got {shape:?}");
        };
        // Local (24, 15) in the padded region is raw (320, 211).
        assert_eq!(intersection, Point2::new(10600 - 40 * 211, 0));
    }

    #[test]
    fn t_classifier_can_veto() {
        let region = seed(t_shape);
        let camera = GridCamera;
        let ctx = FrameContext::new(&camera);
        assert_eq!(classify_three_ends(&region, &ctx, &RejectAll), None);
    }

    #[test]
    fn straight_strip_is_a_line() {
        let region = seed(|x, y| (213..217).contains(&y) && (200..450).contains(&x));
        assert_eq!(region.ends.len(), 2);
        let camera = GridCamera;
        let ctx = FrameContext::new(&camera);
        let ends = project_ends(&region, &ctx);
        let shape = classify_two_ends(&region, &ends, &ctx, &AcceptAll, &LineCheckParams::default());
        assert_eq!(shape, Some(RegionShape::Line));
    }

    #[test]
    fn line_analysis_exposes_its_ends() {
        let analysis = RegionAnalysis {
            index: 0,
            shape: RegionShape::Curve,
            field_ends: vec![Point2::new(1, 2), Point2::new(3, 4)],
        };
        assert!(analysis.is_line());
        assert!(analysis.is_curve());
        assert_eq!(analysis.line_ends(), Some((Point2::new(1, 2), Point2::new(3, 4))));

        let spot = RegionAnalysis {
            shape: RegionShape::PenaltySpot(Point2::new(1000, 0)),
            field_ends: Vec::new(),
            ..analysis
        };
        assert!(!spot.is_line());
        assert_eq!(spot.line_ends(), None);
    }
}
