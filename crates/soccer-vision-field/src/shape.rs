//! Shape tests on the white band inside a padded region.

use nalgebra::Point2;

use soccer_vision_core::{RansacLine, Region};

use crate::params::LineCheckParams;

/// Walk outwards from the midpoint of `start`..`end` along the
/// perpendicular, in both directions, and report whether the band is
/// off-centre (as it is for curves and corners).
pub fn centre_offset_analysis(
    region: &Region,
    start: Point2<i32>,
    end: Point2<i32>,
    params: &LineCheckParams,
) -> bool {
    let Some((left, right)) = perpendicular_offsets(region, start, end) else {
        return false;
    };
    let wide = region.cols() >= params.max_corner_aspect * region.rows();
    let mut diff = (left - right).abs();
    diff += diff / 2;
    if left == 0 || right == 0 {
        true
    } else if (left == -1 || right == -1) && !wide {
        false
    } else {
        diff / left > 1 || diff / right > 1
    }
}

/// Steps taken from the chord midpoint until the first non-white pixel,
/// walking each way along the perpendicular; `-1` when the walk leaves the
/// region first. `None` when the midpoint is outside the region.
pub fn perpendicular_offsets(
    region: &Region,
    start: Point2<i32>,
    end: Point2<i32>,
) -> Option<(i64, i64)> {
    let w = region.cols() as i64;
    let h = region.rows() as i64;
    let centre = Point2::new(
        (i64::from(start.x) + i64::from(end.x)) / 2,
        (i64::from(start.y) + i64::from(end.y)) / 2,
    );
    if centre.x < 0 || centre.x >= w || centre.y < 0 || centre.y >= h {
        return None;
    }

    let (b1, b2, _) = RansacLine::new(start, end).coefficients();
    let (t1, t2) = (b2, -b1);
    let t3 = -t1 * centre.x - t2 * centre.y;
    let going_up = t2 == 0 || (-t1 / t2) > 0;
    let column_y = |x: i64, y: i64| if t2 == 0 { y } else { (-t1 * x - t3) / t2 };
    let white = |x: i64, y: i64| region.is_white_at(x as i32, y as i32);

    let mut left = -1;
    let (mut x, mut y) = (centre.x, centre.y);
    let mut offset = 0;
    loop {
        let col_y = column_y(x, y);
        if !white(x, y) {
            left = offset;
            break;
        }
        offset += 1;
        if going_up {
            if y > col_y {
                y -= 1;
            } else {
                x -= 1;
            }
            if x < 0 || y < 0 {
                break;
            }
        } else {
            if y < col_y {
                y += 1;
            } else {
                x -= 1;
            }
            if x < 0 || y >= h {
                break;
            }
        }
    }

    let mut right = -1;
    let (mut x, mut y) = (centre.x, centre.y);
    let mut offset = 0;
    loop {
        let col_y = column_y(x, y);
        if !white(x, y) {
            right = offset;
            break;
        }
        offset += 1;
        if going_up {
            if y > col_y {
                x += 1;
            } else {
                y += 1;
            }
            if x >= w || y >= h {
                break;
            }
        } else {
            if y < col_y {
                x += 1;
            } else {
                y -= 1;
            }
            if x >= w || y < 0 {
                break;
            }
        }
    }
    Some((left, right))
}

/// True when neither half of `edge` (split at its middle pixel) is straight.
pub fn bends_in_two_parts(region: &Region, edge: &[Point2<i32>], params: &LineCheckParams) -> bool {
    if edge.len() < 7 {
        return false;
    }
    let border_len = 2 * region.cols() + 2 * region.rows() - 4;
    let error = f64::from(
        params
            .straight_error_min
            .max(border_len as f32 / params.straight_error_divisor),
    );

    let head = edge[0];
    let tail = edge[edge.len() - 1];
    let m = edge.len() / 2;
    let mid = edge[m];

    let upper = RansacLine::new(head, mid);
    let upper_straight = edge[1..m]
        .iter()
        .all(|p| !(upper.distance_f(p.cast()) > error));
    let lower = RansacLine::new(tail, mid);
    let lower_straight = edge[m + 1..]
        .iter()
        .all(|p| !(lower.distance_f(p.cast()) > error));
    !(upper_straight || lower_straight)
}

/// Tip of an L-shaped edge: the pixel furthest from the head-tail chord,
/// provided both legs are straight and meet at a real angle.
pub fn corner_tip(edge: &[Point2<i32>], params: &LineCheckParams) -> Option<Point2<i32>> {
    let (&head, &tail) = (edge.first()?, edge.last()?);
    let x_weight = i64::from(tail.y - head.y);
    let y_weight = i64::from(tail.x - head.x);
    let c = i64::from(tail.x) * i64::from(head.y) - i64::from(tail.y) * i64::from(head.x);

    let mut best = -1;
    let mut tip_index = 0;
    for (i, p) in edge.iter().enumerate() {
        let score = (x_weight * i64::from(p.x) - y_weight * i64::from(p.y) + c).abs();
        if score > best {
            best = score;
            tip_index = i;
        }
    }
    let tip = edge[tip_index];

    let first_leg = RansacLine::new(head, tip);
    let second_leg = RansacLine::new(tip, tail);
    let mut between = (first_leg.undirected_angle() - second_leg.undirected_angle()).abs();
    if between > std::f32::consts::FRAC_PI_2 {
        between = std::f32::consts::PI - between;
    }
    if between <= params.min_corner_angle_deg.to_radians() {
        return None;
    }

    let limit = params.corner_point_distance;
    let on_first = edge[..tip_index]
        .iter()
        .all(|p| !(first_leg.distance_f(p.cast()) > limit));
    let on_second = edge[tip_index + 1..]
        .iter()
        .all(|p| !(second_leg.distance_f(p.cast()) > limit));
    (on_first && on_second).then_some(tip)
}

/// Pixel `d` steps along the segment from `a` towards `b` of length `len`,
/// truncated towards zero.
#[inline]
pub(crate) fn step_along(a: Point2<i32>, b: Point2<i32>, len: f64, d: f64) -> Point2<i32> {
    let x = f64::from(a.x) * (len - d) / len + f64::from(b.x) * d / len;
    let y = f64::from(a.y) * (len - d) / len + f64::from(b.y) * d / len;
    Point2::new(x as i32, y as i32)
}

/// Whether every pixel sampled on the open segment `a`..`b` is white.
/// Sampling stops quietly at the region edge.
pub fn all_white_between(region: &Region, a: Point2<i32>, b: Point2<i32>) -> bool {
    let len = f64::from(a.x - b.x).hypot(f64::from(a.y - b.y));
    if len < 1.0 {
        return true;
    }
    let mut d = 1.0;
    loop {
        let p = step_along(a, b, len, d);
        if !region.contains(p.x, p.y) {
            break;
        }
        if !region.is_white_at(p.x, p.y) {
            return false;
        }
        d += 1.0;
        if d + 1.0 >= len {
            break;
        }
    }
    true
}
