//! Distance-banded thresholds and piecewise-linear quality ramps.
//!
//! Nearly every heuristic in the field-feature stage is expressed with these
//! two primitives: a threshold that loosens with distance ([`HyperBand`]) and
//! a score that ramps between two values around a midpoint ([`QualityRamp`]).

use serde::{Deserialize, Serialize};

/// A threshold interpolated by distance: `near` below `near_distance`,
/// `far` above `far_distance`, linear (integer arithmetic) in between.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HyperBand {
    pub near: i64,
    pub far: i64,
    pub near_distance: i64,
    pub far_distance: i64,
}

impl HyperBand {
    pub const fn new(near: i64, far: i64, near_distance: i64, far_distance: i64) -> Self {
        Self {
            near,
            far,
            near_distance,
            far_distance,
        }
    }

    /// A band that does not depend on distance.
    pub const fn constant(value: i64) -> Self {
        Self::new(value, value, 0, 1)
    }

    pub fn at(&self, distance: i64) -> i64 {
        if distance < self.near_distance {
            self.near
        } else if distance > self.far_distance || self.far_distance == self.near_distance {
            self.far
        } else {
            self.near
                + ((self.far - self.near) * (distance - self.near_distance))
                    / (self.far_distance - self.near_distance)
        }
    }
}

/// Score that is `0` at `mid`, reaching `max_value` at `max` and
/// `min_value` at `min`, clamped beyond both.
///
/// `min` and `max` may lie on either side of `mid`; the side is picked by
/// whichever end `value` is closer to.
pub fn value_from_thresholds(
    min: f32,
    mid: f32,
    max: f32,
    min_value: f32,
    max_value: f32,
    value: f32,
) -> f32 {
    if (value - max).abs() < (value - min).abs() {
        max_value * ((value - mid) / (max - mid)).clamp(0.0, 1.0)
    } else {
        min_value * ((value - mid) / (min - mid)).clamp(0.0, 1.0)
    }
}

/// [`value_from_thresholds`] with the scores bundled for configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityRamp {
    pub min_value: f32,
    pub max_value: f32,
}

impl QualityRamp {
    pub const fn new(min_value: f32, max_value: f32) -> Self {
        Self {
            min_value,
            max_value,
        }
    }

    #[inline]
    pub fn score(&self, min: f32, mid: f32, max: f32, value: f32) -> f32 {
        value_from_thresholds(min, mid, max, self.min_value, self.max_value, value)
    }
}
