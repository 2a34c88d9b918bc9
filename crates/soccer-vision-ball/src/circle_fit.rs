//! Circle fitting on region boundary points.
//!
//! [`kenji_fit`] is the fit used for acceptance: centres of circles through
//! sampled point triples vote into a smoothed accumulator and radii into a
//! histogram. The grid searches and the fixed-radius RANSAC only shape
//! regions before that fit runs.

use std::collections::BTreeSet;

use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use soccer_vision_core::{RansacCircle, Region};

use crate::candidate::{CircleFit, PartialSide};
use crate::params::KenjiParams;

/// Pre-generated sampling sequence. Fixed so that a fit depends only on its
/// input points.
const SAMPLE_TABLE: [usize; 300] = [
    2186, 3239, 1, 8418, 7672, 1986, 4083, 5536, 3430, 2753, 6445, 3645, 6085, 5719, 6570,
    4466, 3535, 3566, 2529, 6752, 497, 7368, 3026, 7023, 521, 6979, 5402, 512, 6176, 4284,
    4099, 4635, 8336, 2467, 1082, 4949, 5164, 8169, 8791, 9351, 5662, 6454, 4139, 7898, 2011,
    4156, 9192, 1434, 20, 6415, 7837, 4374, 4414, 686, 6346, 3598, 1834, 1194, 1807, 3162,
    5011, 9100, 6463, 4583, 5725, 8222, 1453, 4164, 9179, 7993, 2862, 1158, 9176, 323, 6279,
    9546, 6635, 4309, 1475, 3849, 2489, 7054, 484, 3873, 1393, 7154, 6164, 5857, 2375, 8764,
    2584, 8908, 8703, 2332, 8854, 5544, 9189, 7693, 4712, 8832, 515, 3048, 7709, 3797, 1296,
    7111, 7094, 5796, 6641, 8237, 4787, 5118, 4299, 9309, 2643, 434, 9806, 2498, 4614, 9683,
    4656, 6721, 4117, 5680, 9244, 5441, 4253, 8441, 9916, 7601, 8849, 4576, 872, 374, 2778,
    3809, 2865, 2959, 5314, 493, 1866, 9688, 3709, 9202, 2392, 1655, 4504, 1364, 7977, 3423,
    7742, 3863, 6692, 5563, 3155, 3753, 313, 4464, 9466, 339, 2745, 2837, 1456, 8461, 6914,
    8700, 4653, 4664, 2640, 9115, 4762, 2814, 6662, 3456, 2540, 3320, 5751, 1446, 3156, 16,
    6643, 4710, 7298, 1769, 8043, 2342, 3440, 9086, 2583, 1430, 6441, 5253, 7039, 6341, 316,
    4395, 8307, 6990, 2755, 1366, 8108, 8044, 5319, 1771, 4595, 9630, 348, 4661, 2873, 4465,
    4615, 7519, 6416, 6614, 8882, 2053, 8736, 4563, 1268, 2131, 2062, 1837, 6223, 8059, 4645,
    1912, 9126, 7882, 388, 5675, 9915, 2964, 4272, 5202, 2409, 7617, 9593, 291, 3444, 756,
    1404, 8239, 4546, 2917, 5483, 8704, 2382, 7824, 6156, 832, 2654, 7523, 4258, 9358, 5962,
    4345, 6383, 6136, 3362, 7045, 7666, 2420, 8506, 7917, 2097, 1370, 9755, 9235, 3098, 3195,
    2296, 4377, 9614, 3077, 2027, 8472, 3547, 4136, 7088, 6654, 49, 7532, 5446, 2153, 2610,
    5614, 8149, 1601, 7671, 1646, 4851, 5565, 1250, 163, 7798, 3164, 8532, 5811, 5136, 9497,
];

/// Side of the smoothing kernel splatted around each centre vote.
const KERNEL_SIZE: i64 = 5;
const KERNEL: [[i32; 5]; 5] = [
    [1, 4, 7, 4, 1],
    [4, 16, 26, 16, 4],
    [7, 26, 41, 26, 7],
    [4, 16, 26, 16, 4],
    [1, 4, 7, 4, 1],
];

/// Boundary points of the white area: per row, the outermost white pixels
/// that have a white horizontal neighbour; per column, the topmost white
/// pixel with white below it and, for the bottom camera, the bottommost
/// with white above it. Points on the region border are skipped.
pub fn candidate_points(region: &Region) -> Vec<Point2<i32>> {
    let cols = region.cols() as i32;
    let rows = region.rows() as i32;
    let with_bottoms = !region.is_top_camera();
    let mut points = Vec::with_capacity(2 * (cols + rows).max(0) as usize);
    let mut tops = vec![-1i32; cols.max(0) as usize];
    let mut bottoms = vec![-1i32; cols.max(0) as usize];

    for y in 0..rows {
        let mut left = -1;
        let mut right = -1;
        for x in 0..cols {
            if !region.is_white_at(x, y) {
                continue;
            }
            if left == -1 && x < cols - 1 && region.is_white_at(x + 1, y) {
                left = x;
            }
            if x > 0 && region.is_white_at(x - 1, y) {
                right = x;
            }
            let col = x as usize;
            if tops[col] == -1 && y < rows - 1 && region.is_white_at(x, y + 1) {
                tops[col] = y;
            }
            if with_bottoms && y > 0 && region.is_white_at(x, y - 1) {
                bottoms[col] = y;
            }
        }
        if left > 0 && left < cols - 1 {
            points.push(Point2::new(left, y));
        }
        if right > 0 && right < cols - 1 {
            points.push(Point2::new(right, y));
        }
    }

    let interior = |v: i32| v > 0 && v < rows - 1;
    for (x, &y) in tops.iter().enumerate() {
        if interior(y) {
            points.push(Point2::new(x as i32, y));
        }
    }
    if with_bottoms {
        for (x, &y) in bottoms.iter().enumerate() {
            if interior(y) {
                points.push(Point2::new(x as i32, y));
            }
        }
    }
    points
}

/// Centre of the circle through three points, solved from the two
/// perpendicular-bisector equations. `None` for singular systems.
fn circumcentre(p1: Point2<i32>, p2: Point2<i32>, p3: Point2<i32>) -> Option<(f64, f64)> {
    let (x1, y1) = (f64::from(p1.x), f64::from(p1.y));
    let (x2, y2) = (f64::from(p2.x), f64::from(p2.y));
    let (x3, y3) = (f64::from(p3.x), f64::from(p3.y));
    let a = 2.0 * (x2 - x1);
    let b = 2.0 * (y2 - y1);
    let c = 2.0 * (x3 - x2);
    let d = 2.0 * (y3 - y2);
    let b0 = x2 * x2 + y2 * y2 - x1 * x1 - y1 * y1;
    let b1 = x3 * x3 + y3 * y3 - x2 * x2 - y2 * y2;
    let det = a * d - b * c;
    if det == 0.0 {
        return None;
    }
    Some(((d * b0 - b * b1) / det, (a * b1 - c * b0) / det))
}

/// Randomised three-point circle fit over a `cols x rows` region.
///
/// Deterministic: triples are drawn from a fixed table. `None` when there
/// are too few points, the centre vote peak misses its threshold or the
/// winning radius is below `min_radius`.
pub fn kenji_fit(
    points: &[Point2<i32>],
    cols: usize,
    rows: usize,
    params: &KenjiParams,
) -> Option<CircleFit> {
    let n = points.len();
    if n < params.min_points.max(3) {
        return None;
    }
    let (w, h) = (cols as i64, rows as i64);
    let max_radius = cols.min(rows);
    let mut radii = vec![0i32; max_radius + 1];

    let combinations = (0.5 * (n as f64 - 2.0) * (n as f64 - 1.0)) as usize;
    let trials = (combinations / 5)
        .min(params.max_trials)
        .min(SAMPLE_TABLE.len() / 3);

    let margin = KERNEL_SIZE as f64;
    let mut centres = Vec::with_capacity(trials);
    for t in 0..trials {
        let p1 = points[SAMPLE_TABLE[3 * t] % n];
        let p2 = points[SAMPLE_TABLE[3 * t + 1] % n];
        let p3 = points[SAMPLE_TABLE[3 * t + 2] % n];
        if p1 == p2 || p2 == p3 || p1 == p3 {
            continue;
        }
        let Some((x, y)) = circumcentre(p1, p2, p3) else {
            continue;
        };
        if x < margin || x >= (w - 1) as f64 - margin {
            continue;
        }
        if y < margin || y >= (h - 1) as f64 - margin {
            continue;
        }
        let r = ((x - f64::from(p1.x)).powi(2) + (y - f64::from(p1.y)).powi(2)).sqrt() as usize;
        if r < 1 || r >= max_radius {
            continue;
        }
        radii[r - 1] += 1;
        radii[r] += 2;
        radii[r + 1] += 1;
        centres.push((x as i64, y as i64));
    }

    // Column-major so the scan below visits x in the outer loop.
    let mut votes = vec![0i32; cols * rows];
    let half = KERNEL_SIZE / 2;
    for &(cx, cy) in &centres {
        for (i, kernel_row) in KERNEL.iter().enumerate() {
            let x = cx - half + i as i64;
            for (j, weight) in kernel_row.iter().enumerate() {
                let y = cy - half + j as i64;
                votes[(x * h + y) as usize] += weight;
            }
        }
    }

    let (mut best, mut best_x, mut best_y) = (0, 0, 0);
    for x in 0..w {
        for y in 0..h {
            let v = votes[(x * h + y) as usize];
            if v > best {
                best = v;
                best_x = x;
                best_y = y;
            }
        }
    }
    if best < params.centre_vote_threshold {
        return None;
    }

    let mut radius = 0;
    for (r, &v) in radii.iter().enumerate() {
        if v > radii[radius] {
            radius = r;
        }
    }
    if (radius as i32) < params.min_radius {
        return None;
    }
    Some(CircleFit::new(
        Point2::new(best_x as f32, best_y as f32),
        radius as f32,
    ))
}

/// Exhaustive (centre, radius) scan shared by the grid fits.
///
/// Centres that would put the circle outside the region are skipped,
/// except towards a partial side, where the centre may lie on the edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridFitParams {
    pub max_radius: f32,
    /// The scan stops once the radius is no longer above this fraction of
    /// `max_radius`.
    pub min_radius_proportion: f32,
    /// Consensus tolerance on `|distance - radius|`.
    pub error: f32,
    pub min_consensus: usize,
    /// Centre step, and radius step for the largest fit.
    pub step: f32,
    pub partial: PartialSide,
}

impl GridFitParams {
    fn centres(&self, cols: usize, rows: usize, radius: f32) -> impl Iterator<Item = Point2<f32>> {
        let step = self.step;
        let x0 = if self.partial == PartialSide::Left { 0.0 } else { radius };
        let x1 = cols as f32 - if self.partial == PartialSide::Right { 0.0 } else { radius };
        let y0 = if self.partial == PartialSide::Top { 0.0 } else { radius };
        let y1 = rows as f32 - if self.partial == PartialSide::Bottom { 0.0 } else { radius };
        let xs = std::iter::successors(Some(x0), move |x| Some(x + step)).take_while(move |&x| x < x1 + 1.0);
        xs.flat_map(move |x| {
            std::iter::successors(Some(y0), move |y| Some(y + step))
                .take_while(move |&y| y < y1 + 1.0)
                .map(move |y| Point2::new(x, y))
        })
    }

    fn tolerance_sq(&self) -> f32 {
        // Truncated like an integer threshold.
        (self.error * self.error).trunc()
    }
}

fn quadrant(d: nalgebra::Vector2<f32>) -> usize {
    match (d.x > 0.0, d.y > 0.0) {
        (true, true) => 0,
        (true, false) => 3,
        (false, true) => 1,
        (false, false) => 2,
    }
}

/// Lowest-variance circle with enough consensus over every scanned radius
/// from `max_radius` down.
pub fn find_best_circle_fit(
    points: &[Point2<i32>],
    cols: usize,
    rows: usize,
    params: &GridFitParams,
) -> Option<CircleFit> {
    if params.step <= 0.0 {
        return None;
    }
    let e2 = params.tolerance_sq();
    let mut min_err = f32::MAX;
    let mut best = None;
    let mut radius = params.max_radius;
    while radius > params.min_radius_proportion * params.max_radius {
        for centre in params.centres(cols, rows, radius) {
            let mut pos = [0.0f32; 4];
            let mut neg = [0.0f32; 4];
            let mut consensus = 0usize;
            for p in points {
                let d = centre - p.cast::<f32>();
                let dist = d.norm() - radius;
                let dist2 = dist * dist;
                if dist2 >= e2 {
                    continue;
                }
                let q = quadrant(d);
                if dist > 0.0 {
                    pos[q] += dist2;
                } else {
                    neg[q] += dist2;
                }
                consensus += 1;
            }
            let spread: f32 = (0..4)
                .map(|q| pos[q] + neg[q] + (pos[q] - neg[q]).powi(2))
                .sum();
            let var = 0.2 * spread - consensus as f32;
            if var < min_err && consensus >= params.min_consensus {
                min_err = var;
                best = Some(CircleFit::new(centre, radius));
            }
        }
        radius -= 1.0;
    }
    best
}

/// First circle, scanning from the largest radius, whose consensus points
/// cover the upper half of the circle: distinct x values over 75% of the
/// diameter and distinct y values over 55% of the radius on each side.
///
/// A stricter alternative to [`find_best_circle_fit`] for size estimation.
/// [`crate::BallDetector`] does not call it.
pub fn find_largest_circle_fit(
    points: &[Point2<i32>],
    cols: usize,
    rows: usize,
    params: &GridFitParams,
) -> Option<CircleFit> {
    if params.step <= 0.0 {
        return None;
    }
    let e2 = params.tolerance_sq();
    let mut radius = params.max_radius;
    while radius > params.min_radius_proportion * params.max_radius {
        for centre in params.centres(cols, rows, radius) {
            let mut xs = BTreeSet::new();
            let mut left = BTreeSet::new();
            let mut right = BTreeSet::new();
            for p in points {
                let pf = p.cast::<f32>();
                let dist = (centre - pf).norm() - radius;
                if dist * dist >= e2 {
                    continue;
                }
                let upper = pf.y <= centre.y && pf.y >= centre.y - radius;
                let within = pf.x >= centre.x - radius && pf.x <= centre.x + radius;
                if upper && within {
                    xs.insert(p.x);
                    if pf.x < centre.x {
                        left.insert(p.y);
                    } else {
                        right.insert(p.y);
                    }
                }
            }
            if xs.len() as f32 >= 0.75 * 2.0 * radius
                && left.len() as f32 >= 0.55 * radius
                && right.len() as f32 >= 0.55 * radius
            {
                return Some(CircleFit::new(centre, radius));
            }
        }
        radius -= params.step;
    }
    None
}

/// RANSAC for a circle of roughly known radius.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixedRadiusParams {
    pub radius: f32,
    /// Allowed deviation of a sampled circle's radius from `radius`.
    pub radius_tolerance: f32,
    pub iterations: usize,
    /// Consensus tolerance on `|distance - radius|`.
    pub error: f32,
    pub min_consensus: usize,
    pub seed: u64,
}

impl FixedRadiusParams {
    /// Settings for a ball of `diameter` pixels.
    pub fn for_diameter(diameter: f32) -> Self {
        let radius = 0.45 * diameter;
        Self {
            radius,
            radius_tolerance: 0.1 * radius,
            iterations: 10,
            error: 0.05 * radius,
            min_consensus: ((1.5 * 2.0 * std::f32::consts::PI * radius) as usize).max(20),
            seed: 42,
        }
    }
}

/// Seeded RANSAC over point triples. Circles whose radius is off target or
/// whose centre lies within `0.4 * radius` of the region edge are skipped.
pub fn fixed_radius_fit(
    points: &[Point2<i32>],
    cols: usize,
    rows: usize,
    params: &FixedRadiusParams,
) -> Option<CircleFit> {
    if points.len() < 3 {
        return None;
    }
    let bound = 0.4 * params.radius;
    let (x_max, y_max) = (cols as f32 - bound, rows as f32 - bound);
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<(usize, CircleFit)> = None;

    for _ in 0..params.iterations {
        let picked = index::sample(&mut rng, points.len(), 3);
        let [a, b, c] = [0, 1, 2].map(|i| points[picked.index(i)].cast::<f32>());
        let Some(circle) = RansacCircle::through(a, b, c) else {
            continue;
        };
        if (circle.radius - params.radius).abs() > params.radius_tolerance {
            continue;
        }
        let centre = circle.centre;
        if centre.x < bound || centre.x > x_max || centre.y < bound || centre.y > y_max {
            continue;
        }
        let consensus = points
            .iter()
            .filter(|p| ((centre - p.cast::<f32>()).norm() - circle.radius).abs() < params.error)
            .count();
        if consensus >= params.min_consensus && best.is_none_or(|(n, _)| consensus > n) {
            best = Some((consensus, CircleFit::new(centre, circle.radius)));
        }
    }
    best.map(|(_, fit)| fit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle_points(cx: f64, cy: f64, r: f64, samples: usize) -> Vec<Point2<i32>> {
        let mut out = Vec::new();
        for i in 0..samples {
            let a = 2.0 * std::f64::consts::PI * i as f64 / samples as f64;
            let p = Point2::new((cx + r * a.cos()).round() as i32, (cy + r * a.sin()).round() as i32);
            if !out.contains(&p) {
                out.push(p);
            }
        }
        out
    }

    #[test]
    fn kenji_recovers_clean_circle() {
        let points = circle_points(30.0, 30.0, 20.0, 48);
        assert_eq!(points.len(), 48);
        let fit = kenji_fit(&points, 60, 60, &KenjiParams::default()).expect("clean circle");
        assert!(fit.found);
        assert_eq!(fit.centre, Point2::new(30.0, 30.0));
        assert_eq!(fit.radius, 19.0, "radius bins are truncated distances");
    }

    #[test]
    fn kenji_tolerates_outliers() {
        let circle = circle_points(30.0, 30.0, 20.0, 48);
        let outliers: Vec<_> = (0..32)
            .map(|i| Point2::new((i * 37) % 56 + 2, (i * 53) % 56 + 2))
            .collect();
        let mut points = Vec::new();
        for i in 0..circle.len() {
            points.push(circle[i]);
            if let Some(&o) = outliers.get(i) {
                points.push(o);
            }
        }
        let fit = kenji_fit(&points, 60, 60, &KenjiParams::default()).expect("40% outliers");
        assert!((fit.centre.x - 30.0).abs() <= 2.0 && (fit.centre.y - 30.0).abs() <= 2.0);
        assert!((fit.radius - 20.0).abs() <= 2.0, "radius {}", fit.radius);
    }

    #[test]
    fn kenji_is_deterministic() {
        let points = circle_points(25.0, 28.0, 15.0, 40);
        let params = KenjiParams::default();
        let first = kenji_fit(&points, 55, 60, &params);
        for _ in 0..5 {
            assert_eq!(kenji_fit(&points, 55, 60, &params), first);
        }
    }

    #[test]
    fn kenji_drops_circles_below_min_radius() {
        let points = circle_points(20.0, 20.0, 5.0, 240);
        assert!(points.len() >= KenjiParams::default().min_points);
        assert!(kenji_fit(&points, 40, 40, &KenjiParams::default()).is_none());

        let params = KenjiParams {
            min_radius: 0,
            ..KenjiParams::default()
        };
        if let Some(fit) = kenji_fit(&points, 40, 40, &params) {
            assert!(fit.radius < 8.0, "radius {}", fit.radius);
        }
    }

    #[test]
    fn kenji_needs_enough_points() {
        let points = circle_points(30.0, 30.0, 20.0, 9);
        assert!(kenji_fit(&points, 60, 60, &KenjiParams::default()).is_none());
    }

    #[test]
    fn best_fit_locks_onto_small_circle() {
        let points = circle_points(10.0, 10.0, 8.0, 64);
        let params = GridFitParams {
            max_radius: 9.0,
            min_radius_proportion: 0.7,
            error: 1.0,
            min_consensus: 20,
            step: 2.0,
            partial: PartialSide::None,
        };
        let fit = find_best_circle_fit(&points, 20, 20, &params).expect("circle");
        assert_eq!(fit.centre, Point2::new(10.0, 10.0));
        assert_eq!(fit.radius, 8.0);
    }

    #[test]
    fn largest_fit_returns_first_covering_circle() {
        let points = circle_points(20.0, 20.0, 12.0, 96);
        let params = GridFitParams {
            max_radius: 16.0,
            min_radius_proportion: 0.5,
            error: 2.0,
            min_consensus: 0,
            step: 2.0,
            partial: PartialSide::None,
        };
        let fit = find_largest_circle_fit(&points, 40, 40, &params).expect("covering circle");
        // The loose tolerance lets a larger circle cover the upper arc first.
        assert_eq!(fit.centre, Point2::new(20.0, 22.0));
        assert_eq!(fit.radius, 14.0);
    }

    #[test]
    fn fixed_radius_fit_is_seeded() {
        let points = circle_points(30.0, 30.0, 18.0, 200);
        let params = FixedRadiusParams {
            min_consensus: 20,
            error: 1.5,
            iterations: 50,
            ..FixedRadiusParams::for_diameter(40.0)
        };
        let fit = fixed_radius_fit(&points, 60, 60, &params).expect("circle of known size");
        assert!((fit.centre - Point2::new(30.0, 30.0)).norm() < 2.0);
        assert_eq!(fixed_radius_fit(&points, 60, 60, &params), Some(fit));
    }
}
