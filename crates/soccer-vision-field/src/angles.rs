//! Orientation of intersection features, in the convention localisation
//! expects: the direction the feature "opens" towards, relative to the
//! bearing from the robot.

use std::f32::consts::PI;

use nalgebra::Point2;

use soccer_vision_core::{distance_sq, normalise_angle, RansacLine};

/// Direction along `line` pointing away from `p`, as `atan2(dx, dy)`.
pub fn gradient_from(line: &RansacLine, p: Point2<i32>) -> f32 {
    let (far, close) = if distance_sq(p, line.p1) > distance_sq(p, line.p2) {
        (line.p1, line.p2)
    } else {
        (line.p2, line.p1)
    };
    ((far.x - close.x) as f32).atan2((far.y - close.y) as f32)
}

fn bearing(p: Point2<i32>) -> f32 {
    (p.x as f32).atan2(p.y as f32)
}

/// Orientation of a T at `p` whose stem runs along `stem`.
pub fn t_angle(p: Point2<i32>, stem: &RansacLine) -> f32 {
    let g = gradient_from(stem, p);
    let theta = bearing(p);
    let angle = if g > 0.0 {
        theta + PI - g
    } else {
        theta - (PI + g)
    };
    if angle > PI {
        normalise_angle(angle)
    } else {
        angle
    }
}

/// Orientation of a corner at `p` bisecting its two legs.
pub fn corner_angle(p: Point2<i32>, first: &RansacLine, second: &RansacLine) -> f32 {
    let mut g1 = gradient_from(first, p);
    let mut g2 = gradient_from(second, p);
    // Legs either side of the +-pi seam would otherwise average to the
    // opposite direction.
    let quadrant = 8.0 * PI / 18.0;
    if g1 > quadrant && g2 < -quadrant {
        g2 += 2.0 * PI;
    } else if g2 > quadrant && g1 < -quadrant {
        g1 += 2.0 * PI;
    }
    let mut bisector = (g1 + g2) / 2.0;
    if bisector > PI {
        bisector -= 2.0 * PI;
    }

    let theta = bearing(p);
    let angle = if bisector > 0.0 {
        theta + PI - bisector
    } else {
        theta - (PI + bisector)
    };
    if angle > PI {
        (angle - PI) % (2.0 * PI) - PI
    } else {
        angle
    }
}

/// Heading of the segment from the robot to `centre`, taken from its lower
/// (smaller y) end.
pub fn robot_to_centre_angle(centre: Point2<f32>) -> f32 {
    let centre = Point2::new(centre.x as i32, centre.y as i32);
    let (mut right, mut left) = (Point2::new(0, 0), centre);
    if right.y > left.y {
        std::mem::swap(&mut right, &mut left);
    }
    ((right.y - left.y) as f32).atan2((right.x - left.x) as f32)
}

/// Heading of the centre line, taken from its lower end.
pub fn centre_line_angle(line: &RansacLine) -> f32 {
    let (mut right, mut left) = (line.p1, line.p2);
    if right.y > left.y {
        std::mem::swap(&mut right, &mut left);
    }
    ((right.y - left.y) as f32).atan2((right.x - left.x) as f32)
}
