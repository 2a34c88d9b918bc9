//! Turning per-region shapes into localisation features.
//!
//! Line-like regions become line segments in robot-relative millimetres.
//! The segments vote for centre-circle positions, are intersected pairwise
//! to find corners and T-junctions, and are themselves reported as lines.
//! Point features are deduplicated and capped per frame.

use std::f32::consts::{FRAC_PI_2, PI};

use log::{debug, trace};
use nalgebra::{Matrix3, Point2, Vector3};

use soccer_vision_core::field::{CENTER_CIRCLE_DIAMETER, GOAL_BOX_LENGTH};
use soccer_vision_core::{distance_sq, normalise_angle, FieldFeature, RansacCircle, RansacLine, RrCoord};

use crate::angles::{centre_line_angle, robot_to_centre_angle, t_angle, corner_angle};
use crate::classify::{RegionAnalysis, RegionShape};
use crate::params::{CentreCircleParams, FieldFeatureParams, IntersectionParams};

/// A possible centre-circle position and its accumulated quality.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CircleCandidate {
    pub centre: Point2<f32>,
    pub quality: f32,
    /// Best line through the centre, once one has been scored.
    pub centre_line: Option<RansacLine>,
}

/// Two roughly perpendicular lines meeting at `point`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intersection {
    pub point: Point2<i32>,
    /// Indices into the cleaned line list.
    pub lines: (usize, usize),
    pub quality: f32,
    pub corner: f32,
    pub t: f32,
    pub four_way: f32,
    /// Whether the point lies strictly inside each line.
    pub on_lines: (bool, bool),
}

/// Segments for every line-like region: a plain line gives its own
/// segment, corners and Ts give one ray from the intersection to each end.
/// Curves give none.
pub fn construct_lines(analyses: &[RegionAnalysis]) -> Vec<RansacLine> {
    let mut lines = Vec::new();
    for analysis in analyses {
        match analysis.shape {
            RegionShape::Line => {
                if let Some((a, b)) = analysis.line_ends() {
                    lines.push(RansacLine::new(a, b));
                }
            }
            RegionShape::Corner { intersection, .. } | RegionShape::TJunction { intersection, .. } => {
                lines.extend(
                    analysis
                        .field_ends
                        .iter()
                        .map(|&end| RansacLine::new(intersection, end)),
                );
            }
            RegionShape::Curve | RegionShape::PenaltySpot(_) => {}
        }
    }
    lines
}

/// Centres of circles of the centre-circle radius through each line's two
/// ends, kept when enough line (and curve) length from all regions lies on
/// them.
pub fn centre_circle_candidates(
    analyses: &[RegionAnalysis],
    params: &CentreCircleParams,
) -> Vec<CircleCandidate> {
    let radius = CENTER_CIRCLE_DIAMETER / 2.0;
    let segments: Vec<_> = analyses
        .iter()
        .filter_map(|a| a.line_ends().map(|ends| (ends, a.is_curve())))
        .collect();

    let mut candidates = Vec::new();
    for &((a, b), _) in &segments {
        let Some(circle) = RansacCircle::from_chord(a, b, radius) else {
            continue;
        };
        for centre in [circle.centre, circle.secondary_centre] {
            let range = centre.coords.norm_squared() as i64;
            let error = params.radius_error.at(range) as f32;
            let min_sq = ((radius - error) * (radius - error)) as i64;
            let max_sq = ((radius + error) * (radius + error)) as i64;
            let centre_px = Point2::new(centre.x as i32, centre.y as i32);
            let on_circle = |p: Point2<i32>| {
                let d = distance_sq_f(p, centre);
                d > min_sq && d < max_sq
            };

            let (mut length, mut curved) = (0i64, 0i64);
            for &((p, q), curve) in &segments {
                let chord = RansacLine::new(p, q);
                if on_circle(p) && on_circle(q) && chord.distance(centre_px) > params.min_distance_from_centre {
                    let l = (chord.length_sq() as f64).sqrt() as i64;
                    length += l;
                    if curve {
                        curved += l;
                    }
                }
            }

            let wanted = params.min_length.at(range) as f32;
            let wanted_curve = wanted * params.min_curve_portion;
            let length_quality = params
                .length_ramp
                .score(wanted / 2.0, wanted, wanted * 2.0, length as f32);
            let curve_quality = params.curve_ramp.score(
                wanted_curve / 2.0,
                wanted_curve,
                wanted_curve * 2.0,
                curved as f32,
            );
            trace!(
                "circle at ({:.0}, {:.0}): length {length} ({length_quality:.2}), curved {curved} ({curve_quality:.2})",
                centre.x,
                centre.y
            );
            if length_quality > 0.0 && curve_quality > 0.0 {
                candidates.push(CircleCandidate {
                    centre,
                    quality: length_quality + curve_quality,
                    centre_line: None,
                });
            }
        }
    }
    candidates
}

/// Build the frame's feature list from the per-region analyses.
pub fn aggregate(analyses: &[RegionAnalysis], params: &FieldFeatureParams) -> Vec<FieldFeature> {
    let mut frame = FrameFeatures::new(analyses, params);
    frame.run();
    frame.features
}

/// Working state for one frame.
struct FrameFeatures<'a> {
    analyses: &'a [RegionAnalysis],
    params: &'a FieldFeatureParams,
    lines: Vec<RansacLine>,
    line_lengths: Vec<i64>,
    circles: Vec<CircleCandidate>,
    best_circle: Option<usize>,
    intersections: Vec<Intersection>,
    features: Vec<FieldFeature>,
    /// Point features emitted so far; lines are not counted.
    features_sent: usize,
}

impl<'a> FrameFeatures<'a> {
    fn new(analyses: &'a [RegionAnalysis], params: &'a FieldFeatureParams) -> Self {
        Self {
            analyses,
            params,
            lines: Vec::new(),
            line_lengths: Vec::new(),
            circles: Vec::new(),
            best_circle: None,
            intersections: Vec::new(),
            features: Vec::new(),
            features_sent: 0,
        }
    }

    fn run(&mut self) {
        self.lines = construct_lines(self.analyses);
        self.circles = centre_circle_candidates(self.analyses, &self.params.centre_circle);
        self.select_centre_lines();
        self.emit_best_circle();
        self.clean_up_and_emit_lines();
        self.find_intersections();
        self.score_with_lines();
        self.score_with_regions();
        self.goal_box_check();
        self.emit_ts_and_corners();
        self.emit_penalty_spots();
    }

    fn cap_reached(&self) -> bool {
        self.features_sent >= self.params.limits.max_features
    }

    /// Score every line as the halfway line through each circle candidate.
    fn select_centre_lines(&mut self) {
        let p = &self.params.centre_circle;
        for circle in &mut self.circles {
            let centre_px = Point2::new(circle.centre.x as i32, circle.centre.y as i32);
            let mut best: Option<(f32, RansacLine)> = None;
            for line in &self.lines {
                let length = line.length_sq();
                let to_centre = line.distance(centre_px) as f32;
                let end1 = distance_sq_f(line.p1, circle.centre);
                let end2 = distance_sq_f(line.p2, circle.centre);

                let mut value = p
                    .line_ramp
                    .score(p.line_distance * 2.0, p.line_distance, 0.0, to_centre);
                value += p.line_ramp.score(
                    p.line_length_sq / 2.0,
                    p.line_length_sq,
                    2.0 * p.line_length_sq,
                    length as f32,
                );
                let end_value = if end1 < length && end2 < length {
                    p.line_ramp.max_value
                } else {
                    let d = p.line_end_distance_sq;
                    p.line_ramp
                        .score(d * 2.0, d, 0.0, end1 as f32)
                        .max(p.line_ramp.score(d * 2.0, d, 0.0, end2 as f32))
                };
                value += end_value;
                if value > best.map_or(-1.0, |(v, _)| v) {
                    best = Some((value, *line));
                }
            }
            if let Some((value, line)) = best {
                circle.quality += value;
                circle.centre_line = Some(line);
            }
        }
    }

    fn emit_best_circle(&mut self) {
        let mut best: Option<usize> = None;
        for (i, circle) in self.circles.iter().enumerate() {
            if best.is_none_or(|b| circle.quality > self.circles[b].quality) {
                best = Some(i);
            }
        }
        let Some(index) = best else {
            return;
        };
        let circle = self.circles[index];
        if circle.quality <= self.params.centre_circle.min_quality {
            trace!("best centre circle quality {:.2} too low", circle.quality);
            return;
        }

        let centre = circle.centre;
        let line_angle = circle.centre_line.as_ref().map_or(0.0, centre_line_angle);
        let mut orientation = robot_to_centre_angle(centre) - line_angle;
        if orientation < 0.0 {
            orientation += PI;
        }
        let rr = RrCoord::new(centre.coords.norm(), centre.y.atan2(centre.x), orientation);
        debug!("centre circle at {:.0} mm (quality {:.2})", rr.distance, circle.quality);
        self.features.push(FieldFeature::CentreCircle { rr });
        self.best_circle = Some(index);
        self.features_sent += 1;
    }

    /// Drop lines that belong to the centre circle, keep the rest for
    /// intersection finding and report those in range.
    fn clean_up_and_emit_lines(&mut self) {
        let centre = self.best_circle.map(|i| self.circles[i].centre);
        let min_sq = self.params.centre_circle.min_line_distance_sq;
        let all = std::mem::take(&mut self.lines);
        for line in all {
            let clear_of_circle = centre.is_none_or(|c| {
                distance_sq_f(line.p1, c) > min_sq && distance_sq_f(line.p2, c) > min_sq
            });
            if !clear_of_circle {
                continue;
            }
            self.lines.push(line);
            self.line_lengths.push(line.length_sq());
            if let Some(feature) = line_feature(&line, self.params) {
                self.features.push(feature);
            }
        }
    }

    fn find_intersections(&mut self) {
        let p = &self.params.intersection;
        let error = p.max_perpendicular_error;
        for (i, first) in self.lines.iter().enumerate() {
            let first_angle = first.undirected_angle();
            for (j, second) in self.lines.iter().enumerate().skip(i + 1) {
                let between = (second.undirected_angle() - first_angle).abs();
                let value = p
                    .perpendicular_ramp
                    .score(error * 2.0, error, 0.0, (between - FRAC_PI_2).abs());
                if value <= 0.0 {
                    continue;
                }
                let Some(point) = first.intersect(second) else {
                    continue;
                };
                self.intersections.push(Intersection {
                    point,
                    lines: (i, j),
                    quality: value,
                    corner: 0.0,
                    t: 0.0,
                    four_way: 0.0,
                    on_lines: (false, false),
                });
            }
        }
    }

    /// Length and end-proximity quality, plus T-ness when the point lies
    /// inside exactly one of its lines.
    fn score_with_lines(&mut self) {
        let p = &self.params.intersection;
        for x in &mut self.intersections {
            let (first, second) = (&self.lines[x.lines.0], &self.lines[x.lines.1]);
            let (len1, len2) = (self.line_lengths[x.lines.0], self.line_lengths[x.lines.1]);
            let range = distance_sq(x.point, Point2::origin());
            let min_length = p.min_feature_line_length.at(range);
            let max_end = p.line_end_distance.at(range) as f32;

            let f1 = distance_sq(first.p1, x.point);
            let f2 = distance_sq(first.p2, x.point);
            let s1 = distance_sq(second.p1, x.point);
            let s2 = distance_sq(second.p2, x.point);
            let on_first = f1 < len1 && f2 < len1;
            let on_second = s1 < len2 && s2 < len2;

            let length_score = |len: i64| {
                p.line_length_ramp.score(
                    (min_length / 2) as f32,
                    min_length as f32,
                    (min_length * 2) as f32,
                    len as f32,
                )
            };
            let end_score = |d: i64| p.line_end_ramp.score(max_end * 2.0, max_end, 0.0, d as f32);
            x.quality += length_score(len1) + length_score(len2);
            x.quality += end_score(f1.min(f2)) + end_score(s1.min(s2));

            let excess = p.t_excess_sq;
            let t_score = |d: i64| p.t_on_line_ramp.score(excess / 2.0, excess, excess * 2.0, d as f32);
            match (on_first, on_second) {
                (true, true) => {}
                (true, false) => x.t += t_score(f1.min(f2)),
                (false, true) => x.t += t_score(s1.min(s2)),
                (false, false) => x.corner += 1.0,
            }
            x.on_lines = (on_first, on_second);
        }
    }

    /// Intersections that a region already recognised get a large bonus.
    fn score_with_regions(&mut self) {
        let p = &self.params.intersection;
        let corners = region_points(self.analyses, |s| matches!(s, RegionShape::Corner { .. }));
        let ts = region_points(self.analyses, |s| matches!(s, RegionShape::TJunction { .. }));
        for x in &mut self.intersections {
            if corners
                .iter()
                .any(|&(c, _)| distance_sq(x.point, c) <= p.max_corner_error_sq)
            {
                x.corner += p.region_corner_bonus;
            }
            if ts.iter().any(|&(t, _)| distance_sq(x.point, t) <= p.max_t_error_sq) {
                x.t += p.region_t_bonus;
            }
        }
    }

    fn goal_box_check(&mut self) {
        goal_box_boost(&mut self.intersections, &self.params.intersection);
    }

    fn emit_ts_and_corners(&mut self) {
        let p = &self.params.intersection;
        let corners = region_points(self.analyses, |s| matches!(s, RegionShape::Corner { .. }));
        let ts = region_points(self.analyses, |s| matches!(s, RegionShape::TJunction { .. }));

        for x in &self.intersections {
            if self.cap_reached() {
                return;
            }
            let t_quality = x.t - x.corner - x.four_way;
            let corner_quality = x.corner - x.t - x.four_way;
            let (first, second) = (&self.lines[x.lines.0], &self.lines[x.lines.1]);

            let feature = if t_quality > p.t_threshold && t_quality > corner_quality {
                if x.quality + t_quality <= p.quality_threshold {
                    continue;
                }
                let stem = if x.on_lines.0 { second } else { first };
                let angle = region_angle(&ts, x.point, p.max_t_error_sq).unwrap_or_else(|| t_angle(x.point, stem));
                FieldFeature::TJunction {
                    rr: intersection_rr(x.point, angle),
                }
            } else if corner_quality > p.corner_threshold && x.corner > p.corner_threshold {
                if x.quality + corner_quality <= p.quality_threshold {
                    continue;
                }
                let angle = region_angle(&corners, x.point, p.max_corner_error_sq)
                    .unwrap_or_else(|| corner_angle(x.point, first, second));
                FieldFeature::Corner {
                    rr: intersection_rr(x.point, angle),
                }
            } else {
                continue;
            };

            if self.too_close(&feature) {
                trace!("{} at {:?} duplicates an earlier feature", feature.name(), x.point);
                continue;
            }
            debug!(
                "{} at ({}, {}) quality {:.1}, corner {:.1}, t {:.1}",
                feature.name(),
                x.point.x,
                x.point.y,
                x.quality,
                x.corner,
                x.t
            );
            self.features.push(feature);
            self.features_sent += 1;
        }
    }

    fn emit_penalty_spots(&mut self) {
        for analysis in self.analyses {
            let RegionShape::PenaltySpot(spot) = analysis.shape else {
                continue;
            };
            if self.cap_reached() {
                return;
            }
            let heading = if spot.x != 0 {
                (spot.y as f32).atan2(spot.x as f32)
            } else if spot.y >= 0 {
                FRAC_PI_2
            } else {
                -FRAC_PI_2
            };
            let distance = (spot.x as f32).hypot(spot.y as f32);
            self.features.push(FieldFeature::PenaltySpot {
                rr: RrCoord::new(distance, heading, 0.0),
            });
            self.features_sent += 1;
        }
    }

    fn too_close(&self, feature: &FieldFeature) -> bool {
        let min = self.params.limits.min_separation_mm;
        self.features
            .iter()
            .any(|f| feature.rr().distance_squared(f.rr()) < min * min)
    }
}

/// A line feature, reported at the point of the infinite line closest to
/// the robot. `None` for lines too far away, too short or too long.
fn line_feature(line: &RansacLine, params: &FieldFeatureParams) -> Option<FieldFeature> {
    let p = &params.lines;
    let (p1, p2) = (line.p1, line.p2);
    let norm = |q: Point2<i32>| (q.x as f32).hypot(q.y as f32);
    if norm(p1) > p.max_end_distance || norm(p2) > p.max_end_distance {
        return None;
    }
    let length = (line.length_sq() as f32).sqrt();
    if length < p.min_length || length > p.max_length {
        return None;
    }

    let (dx, dy) = (i64::from(p2.x - p1.x), i64::from(p2.y - p1.y));
    let num = -(i64::from(p1.x) * dx + i64::from(p1.y) * dy);
    let den = match dx * dx + dy * dy {
        0 => 1,
        d => d,
    };
    let t = num as f32 / den as f32;
    let closest = Point2::new(
        (p1.x as f32 + dx as f32 * t) as i32,
        (p1.y as f32 + dy as f32 * t) as i32,
    );
    let heading = normalise_angle((closest.y as f32).atan2(closest.x as f32));
    let distance = norm(closest);

    let mid = norm(Point2::new((p1.x + p2.x) / 2, (p1.y + p2.y) / 2));
    let distance_sd = p.distance_sd_slope * mid + p.distance_sd_offset;
    let heading_sd = p.heading_sd_slope * mid + p.heading_sd_offset;
    if distance.is_nan() || heading.is_nan() || distance_sd.is_nan() || heading_sd.is_nan() {
        return None;
    }
    let var = Matrix3::from_diagonal(&Vector3::new(distance_sd * distance_sd, heading_sd * heading_sd, 0.0));
    Some(FieldFeature::Line {
        rr: RrCoord::new(distance, heading, 0.0).with_variance(var),
        p1,
        p2,
    })
}

/// Two intersections on a shared line, a goal-box depth apart: the more
/// T-like one is the T where the box meets the goal line and the other is a
/// box corner. Pairs where neither has any T quality are left alone.
fn goal_box_boost(intersections: &mut [Intersection], p: &IntersectionParams) {
    let n = intersections.len();
    for i in 0..n {
        for j in i + 1..n {
            let (a, b) = (intersections[i], intersections[j]);
            if a.t == 0.0 && b.t == 0.0 {
                continue;
            }
            let shares_line = a.lines.0 == b.lines.0
                || a.lines.0 == b.lines.1
                || a.lines.1 == b.lines.0
                || a.lines.1 == b.lines.1;
            if !shares_line {
                continue;
            }
            let spacing = (distance_sq(a.point, b.point) as f64).sqrt() as i64;
            let error = (spacing as f32 - GOAL_BOX_LENGTH).abs();
            let value = p
                .goal_box_ramp
                .score(p.goal_box_error * 2.0, p.goal_box_error, 0.0, error);
            let (t, corner) = if a.t > b.t { (i, j) } else { (j, i) };
            intersections[t].t += value;
            intersections[corner].corner += value;
        }
    }
}

fn intersection_rr(point: Point2<i32>, angle: f32) -> RrCoord {
    let (x, y) = (point.x as f32, point.y as f32);
    RrCoord::new(x.hypot(y), y.atan2(x), -angle)
}

fn region_points(
    analyses: &[RegionAnalysis],
    wanted: impl Fn(&RegionShape) -> bool,
) -> Vec<(Point2<i32>, f32)> {
    analyses
        .iter()
        .filter(|a| wanted(&a.shape))
        .filter_map(|a| match a.shape {
            RegionShape::Corner { intersection, angle } | RegionShape::TJunction { intersection, angle } => {
                Some((intersection, angle))
            }
            _ => None,
        })
        .collect()
}

/// Orientation of the last region detection near `point`.
fn region_angle(points: &[(Point2<i32>, f32)], point: Point2<i32>, max_error_sq: i64) -> Option<f32> {
    points
        .iter()
        .rev()
        .find(|&&(p, _)| distance_sq(point, p) <= max_error_sq)
        .map(|&(_, angle)| angle)
}

/// Squared distance between an integer and a real point, truncated.
#[inline]
fn distance_sq_f(a: Point2<i32>, b: Point2<f32>) -> i64 {
    let dx = a.x as f32 - b.x;
    let dy = a.y as f32 - b.y;
    (dx * dx + dy * dy) as i64
}
