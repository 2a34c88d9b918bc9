//! Boundary tracing between two region ends.
//!
//! The tracer walks the lattice of pixel corners ("intersections"), always
//! keeping white on one side and non-white on the other. Intersection
//! `(x, y)` is the top-left corner of pixel `(x, y)`, so a region of
//! `w x h` pixels has intersections on `[0, w] x [0, h]`.

use nalgebra::Point2;

use soccer_vision_core::Region;

/// Pixels along both sides of a white band running between two ends.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeTrace {
    pub first: Vec<Point2<i32>>,
    pub second: Vec<Point2<i32>>,
}

/// Trace from the start of end `a` to the end of end `b` (both given as
/// `(first, last)` border pixels). `None` when the boundary leads anywhere
/// else, in which case the two ends are not joined by one white band.
pub fn trace_connection(
    region: &Region,
    a: (Point2<i32>, Point2<i32>),
    b: (Point2<i32>, Point2<i32>),
) -> Option<EdgeTrace> {
    let w = region.cols() as i32;
    let h = region.rows() as i32;
    let from = a.0;
    let to = b.1;
    if !region.is_white_at(from.x, from.y) || !region.is_white_at(to.x, to.y) {
        return None;
    }

    // Counter-clockwise neighbour as the previous intersection.
    let mut last = from;
    let mut start = from;
    if from.x == 0 {
        last.y += 1;
    } else if from.y == 0 {
        start.x += 1;
    } else if from.x == w - 1 {
        start += nalgebra::Vector2::new(1, 1);
        last.x += 1;
    } else {
        start += nalgebra::Vector2::new(1, 1);
        last.y += 1;
    }
    let mut end = to;
    if to.x == w - 1 {
        end.x += 1;
    }
    if to.y == h - 1 {
        end.y += 1;
    }
    let (connected, first) = build_edge(region, last, start, end);
    if !connected {
        return None;
    }

    // The other side, seeded clockwise. The end intersection is the pixel
    // corner itself here.
    let mut last = from;
    let mut start = from;
    if from.x == 0 {
        start.y += 1;
    } else if from.y == 0 {
        last.x += 1;
    } else if from.x == w - 1 {
        last += nalgebra::Vector2::new(1, 1);
        start.x += 1;
    } else {
        last += nalgebra::Vector2::new(1, 1);
        start.y += 1;
    }
    let (_, second) = build_edge(region, last, start, to);
    Some(EdgeTrace { first, second })
}

/// Follow the white boundary from `start` (arriving from `last`) until it
/// reaches `end` or returns to `start`. Returns whether `end` was reached,
/// and the white pixels bordering the walk.
pub fn build_edge(
    region: &Region,
    mut last: Point2<i32>,
    start: Point2<i32>,
    end: Point2<i32>,
) -> (bool, Vec<Point2<i32>>) {
    let w = region.cols() as i32;
    let h = region.rows() as i32;
    let max_steps = 4 * (i64::from(w) + 1) * (i64::from(h) + 1);
    let mut current = start;
    let mut points = Vec::new();
    let mut steps = 0i64;

    loop {
        let mut candidate = last;
        let mut rotations = 0;
        loop {
            // Rotate clockwise about the current intersection, skipping
            // positions off the lattice.
            loop {
                candidate = rotate_clockwise(candidate, current);
                rotations += 1;
                if candidate.x >= 0 && candidate.y >= 0 && candidate.x <= w && candidate.y <= h {
                    break;
                }
            }
            if rotations > 8 {
                return (false, points);
            }

            if candidate.x != current.x {
                let x = if current.x < candidate.x { current.x } else { current.x - 1 };
                let upper = current.y != 0 && region.is_white_at(x, current.y - 1);
                let lower = current.y != h && region.is_white_at(x, current.y);
                if upper != lower {
                    last = current;
                    current = candidate;
                    if current.y != 0 && current.y != h {
                        let y = if lower { current.y } else { current.y - 1 };
                        points.push(Point2::new(x, y));
                    }
                    break;
                }
            } else {
                let y = if current.y < candidate.y { current.y } else { current.y - 1 };
                let left = current.x != 0 && region.is_white_at(current.x - 1, y);
                let right = current.x != w && region.is_white_at(current.x, y);
                if left != right {
                    last = current;
                    current = candidate;
                    if current.x != 0 && current.x != w {
                        let x = if right { current.x } else { current.x - 1 };
                        points.push(Point2::new(x, y));
                    }
                    break;
                }
            }
        }

        steps += 1;
        if current == start || current == end {
            break;
        }
        if steps > max_steps {
            return (false, points);
        }
    }
    (current == end, points)
}

#[inline]
fn rotate_clockwise(candidate: Point2<i32>, about: Point2<i32>) -> Point2<i32> {
    if candidate.y < about.y {
        Point2::new(candidate.x + 1, candidate.y + 1)
    } else if candidate.x > about.x {
        Point2::new(candidate.x - 1, candidate.y + 1)
    } else if candidate.y > about.y {
        Point2::new(candidate.x - 1, candidate.y - 1)
    } else {
        Point2::new(candidate.x + 1, candidate.y - 1)
    }
}
