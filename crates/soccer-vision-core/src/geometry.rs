//! Robot-relative coordinates and the line/circle primitives used once
//! detections leave image space.

use nalgebra::{Matrix3, Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Robot-relative polar coordinate with a 3x3 covariance over
/// `(distance, heading, orientation)`.
///
/// Distances are millimetres, angles radians.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RrCoord {
    pub distance: f32,
    pub heading: f32,
    pub orientation: f32,
    pub var: Matrix3<f32>,
}

impl Default for RrCoord {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl RrCoord {
    pub fn new(distance: f32, heading: f32, orientation: f32) -> Self {
        Self {
            distance,
            heading,
            orientation,
            var: Matrix3::zeros(),
        }
    }

    /// Polar form of a robot-relative cartesian point.
    pub fn from_cartesian(p: Point2<f32>) -> Self {
        Self::new(p.x.hypot(p.y), p.y.atan2(p.x), 0.0)
    }

    pub fn with_orientation(mut self, orientation: f32) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_variance(mut self, var: Matrix3<f32>) -> Self {
        self.var = var;
        self
    }

    pub fn to_cartesian(&self) -> Point2<f32> {
        Point2::new(
            self.distance * self.heading.cos(),
            self.distance * self.heading.sin(),
        )
    }

    /// Squared distance between two polar points (law of cosines).
    pub fn distance_squared(&self, other: &RrCoord) -> f32 {
        let (a, b) = (self.distance, other.distance);
        a * a + b * b - 2.0 * a * b * (self.heading - other.heading).cos()
    }
}

/// Wrap an angle into `(-pi, pi]`.
pub fn normalise_angle(angle: f32) -> f32 {
    use std::f32::consts::PI;
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a <= -PI {
        a += 2.0 * PI;
    }
    a
}

/// Squared euclidean distance between integer points, widened to `i64`.
#[inline]
pub fn distance_sq(a: Point2<i32>, b: Point2<i32>) -> i64 {
    let dx = i64::from(a.x - b.x);
    let dy = i64::from(a.y - b.y);
    dx * dx + dy * dy
}

/// Line through two integer points, stored as `t1*x + t2*y + t3 = 0`.
///
/// Used both in region pixels and in robot-relative millimetres.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RansacLine {
    pub p1: Point2<i32>,
    pub p2: Point2<i32>,
    t1: i64,
    t2: i64,
    t3: i64,
    norm: i64,
}

impl RansacLine {
    pub fn new(p1: Point2<i32>, p2: Point2<i32>) -> Self {
        let (x1, y1) = (i64::from(p1.x), i64::from(p1.y));
        let (x2, y2) = (i64::from(p2.x), i64::from(p2.y));
        let t1 = y1 - y2;
        let t2 = x2 - x1;
        let t3 = x1 * y2 - x2 * y1;
        let norm = ((t1 * t1 + t2 * t2) as f64).sqrt() as i64;
        Self {
            p1,
            p2,
            t1,
            t2,
            t3,
            norm,
        }
    }

    /// Line with the same normal length, perpendicular to `self`, through `p`.
    pub fn perpendicular_through(&self, p: Point2<i32>) -> Self {
        let t1 = self.t2;
        let t2 = -self.t1;
        let t3 = -t1 * i64::from(p.x) - t2 * i64::from(p.y);
        let dir = Vector2::new(-t2 as i32, t1 as i32);
        Self {
            p1: p,
            p2: p + dir,
            t1,
            t2,
            t3,
            norm: self.norm,
        }
    }

    #[inline]
    pub fn coefficients(&self) -> (i64, i64, i64) {
        (self.t1, self.t2, self.t3)
    }

    /// Truncated perpendicular distance to `p`; zero for degenerate lines.
    pub fn distance(&self, p: Point2<i32>) -> i64 {
        if self.norm <= 0 {
            return 0;
        }
        (self.t1 * i64::from(p.x) + self.t2 * i64::from(p.y) + self.t3).abs() / self.norm
    }

    /// Exact perpendicular distance to a real-valued point.
    pub fn distance_f(&self, p: Point2<f32>) -> f64 {
        let n = ((self.t1 * self.t1 + self.t2 * self.t2) as f64).sqrt();
        if n == 0.0 {
            return 0.0;
        }
        (self.t1 as f64 * f64::from(p.x) + self.t2 as f64 * f64::from(p.y) + self.t3 as f64).abs()
            / n
    }

    /// Intersection with `other`; `None` for parallel lines.
    pub fn intersect(&self, other: &RansacLine) -> Option<Point2<i32>> {
        let divisor = self.t2 * other.t1 - self.t1 * other.t2;
        if divisor == 0 {
            return None;
        }
        let x = (self.t3 * other.t2 - self.t2 * other.t3) / divisor;
        let y = (self.t1 * other.t3 - self.t3 * other.t1) / divisor;
        Some(Point2::new(x as i32, y as i32))
    }

    /// Direction angle `atan2(t1, t2)` in `(-pi, pi]`.
    pub fn angle(&self) -> f32 {
        (self.t1 as f32).atan2(self.t2 as f32)
    }

    /// Direction angle folded into `[0, pi)`.
    pub fn undirected_angle(&self) -> f32 {
        let a = self.angle();
        if a < 0.0 {
            a + std::f32::consts::PI
        } else {
            a
        }
    }

    #[inline]
    pub fn length_sq(&self) -> i64 {
        distance_sq(self.p1, self.p2)
    }
}

/// Candidate circle centres. A chord of known radius has two possible
/// centres, one on each side; three points have exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RansacCircle {
    pub centre: Point2<f32>,
    pub secondary_centre: Point2<f32>,
    pub radius: f32,
}

impl RansacCircle {
    /// Circle through three points; `None` when they are collinear.
    pub fn through(p1: Point2<f32>, p2: Point2<f32>, p3: Point2<f32>) -> Option<Self> {
        let (bx, by) = (p1.x, p1.y);
        let (cx, cy) = (p2.x, p2.y);
        let (dx, dy) = (p3.x, p3.y);
        let temp = cx * cx + cy * cy;
        let bc = (bx * bx + by * by - temp) / 2.0;
        let cd = (temp - dx * dx - dy * dy) / 2.0;
        let det = (bx - cx) * (cy - dy) - (cx - dx) * (by - cy);
        if det.abs() < 1.0e-6 {
            return None;
        }
        let inv = 1.0 / det;
        let centre = Point2::new(
            (bc * (cy - dy) - cd * (by - cy)) * inv,
            ((bx - cx) * cd - (cx - dx) * bc) * inv,
        );
        Some(Self {
            centre,
            secondary_centre: centre,
            radius: (centre - p1).norm(),
        })
    }

    /// Both centres of a circle of `radius` passing through `p1` and `p2`.
    ///
    /// `None` when the points coincide or are further apart than a diameter.
    pub fn from_chord(p1: Point2<i32>, p2: Point2<i32>, radius: f32) -> Option<Self> {
        if p1 == p2 {
            return None;
        }
        let a = p1.cast::<f32>();
        let b = p2.cast::<f32>();
        let half = (a - b).norm() / 2.0;
        let h2 = radius * radius - half * half;
        if h2 < 0.0 {
            return None;
        }
        let height = h2.sqrt();
        let dir = (a - b).normalize();
        let mid = a - dir * half;
        let perp = Vector2::new(dir.y * height, -dir.x * height);
        Some(Self {
            centre: mid + perp,
            secondary_centre: mid - perp,
            radius,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn polar_distance_matches_cartesian() {
        let a = RrCoord::from_cartesian(Point2::new(1000.0, 0.0));
        let b = RrCoord::from_cartesian(Point2::new(1000.0, 1000.0));
        assert_relative_eq!(a.distance_squared(&b), 1.0e6, max_relative = 1e-4);
        let back = b.to_cartesian();
        assert_relative_eq!(back.x, 1000.0, epsilon = 1e-2);
        assert_relative_eq!(back.y, 1000.0, epsilon = 1e-2);
    }

    #[test]
    fn perpendicular_lines_intersect_at_corner() {
        let horizontal = RansacLine::new(Point2::new(0, 100), Point2::new(1000, 100));
        let vertical = RansacLine::new(Point2::new(300, -500), Point2::new(300, 900));
        assert_eq!(horizontal.intersect(&vertical), Some(Point2::new(300, 100)));
        assert_eq!(horizontal.distance(Point2::new(40, 160)), 60);
        let parallel = RansacLine::new(Point2::new(0, 0), Point2::new(10, 0));
        assert_eq!(horizontal.intersect(&parallel), None);
    }

    #[test]
    fn perpendicular_through_point_contains_point() {
        let line = RansacLine::new(Point2::new(0, 0), Point2::new(10, 10));
        let perp = line.perpendicular_through(Point2::new(5, 5));
        assert_eq!(perp.distance(Point2::new(5, 5)), 0);
        let (a1, b1, _) = line.coefficients();
        let (a2, b2, _) = perp.coefficients();
        assert_eq!(a1 * a2 + b1 * b2, 0, "normals must be orthogonal");
    }

    #[test]
    fn chord_centres_lie_at_radius_from_both_ends() {
        let circle =
            RansacCircle::from_chord(Point2::new(-600, 0), Point2::new(600, 0), 750.0).unwrap();
        for c in [circle.centre, circle.secondary_centre] {
            assert_relative_eq!((c - Point2::new(-600.0, 0.0)).norm(), 750.0, epsilon = 0.5);
            assert_relative_eq!(c.y.abs(), 450.0, epsilon = 0.5);
        }
        assert!(RansacCircle::from_chord(Point2::new(0, 0), Point2::new(2000, 0), 750.0).is_none());
    }

    #[test]
    fn three_point_circle() {
        let c = RansacCircle::through(
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
            Point2::new(-10.0, 0.0),
        )
        .unwrap();
        assert_relative_eq!(c.radius, 10.0, epsilon = 1e-4);
        assert_relative_eq!(c.centre.x, 0.0, epsilon = 1e-4);
        assert!(RansacCircle::through(
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 2.0)
        )
        .is_none());
    }

    #[test]
    fn normalise_wraps_into_half_open_range() {
        use std::f32::consts::PI;
        assert_relative_eq!(normalise_angle(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-5);
        assert_relative_eq!(normalise_angle(-3.0 * PI / 2.0), PI / 2.0, epsilon = 1e-5);
    }
}
