use serde::{Deserialize, Serialize};

use soccer_vision_core::{HyperBand, QualityRamp};

/// Border scan and region spreading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BorderParams {
    /// Local pixels added on every side before the border is scanned.
    pub padding: i32,
    /// White runs shorter than this are not ends.
    pub min_end_size: usize,
    /// The debounce is `max(min_switch_rate, border_len / switch_rate_divisor)`.
    pub min_switch_rate: usize,
    pub switch_rate_divisor: usize,
    /// Rounds of merging overlapping regions into the seed.
    pub spread_iterations: usize,
}

impl Default for BorderParams {
    fn default() -> Self {
        Self {
            padding: 4,
            min_end_size: 1,
            min_switch_rate: 1,
            switch_rate_divisor: 100,
            spread_iterations: 1,
        }
    }
}

/// Two-end regions: line, curve and corner tests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineCheckParams {
    /// Shorter lines (field distance between the ends) are never curves.
    pub min_curve_length_mm: i64,
    /// Both region sides must reach this for the curve test.
    pub min_curve_side: usize,
    /// Straightness tolerance is `max(min, border_len / divisor)` pixels.
    pub straight_error_min: f32,
    pub straight_error_divisor: f32,
    /// A region this many times wider than tall tolerates a one-sided
    /// offset walk.
    pub max_corner_aspect: usize,
    /// Edge legs must meet at more than this, degrees.
    pub min_corner_angle_deg: f32,
    /// Edge pixels may stray this far from their leg, pixels.
    pub corner_point_distance: f64,
}

impl Default for LineCheckParams {
    fn default() -> Self {
        Self {
            min_curve_length_mm: 100,
            min_curve_side: 8,
            straight_error_min: 1.5,
            straight_error_divisor: 140.0,
            max_corner_aspect: 5,
            min_corner_angle_deg: 20.0,
            corner_point_distance: 4.0,
        }
    }
}

/// Centre-circle candidates and centre-line selection. Distances are
/// millimetres; bands are keyed on the squared distance to the robot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentreCircleParams {
    pub min_quality: f32,
    /// Line length that must lie on the circle.
    pub min_length: HyperBand,
    pub length_ramp: QualityRamp,
    /// Fraction of `min_length` that must come from curves.
    pub min_curve_portion: f32,
    pub curve_ramp: QualityRamp,
    /// Tolerance on the circle radius for line ends.
    pub radius_error: HyperBand,
    /// Lines passing closer to the candidate centre are chords, not arcs.
    pub min_distance_from_centre: i64,
    /// Centre line: distance from the circle centre, squared length and
    /// squared end distance.
    pub line_distance: f32,
    pub line_length_sq: f32,
    pub line_end_distance_sq: f32,
    pub line_ramp: QualityRamp,
    /// Lines with an end closer than this (squared) to an accepted circle
    /// are dropped.
    pub min_line_distance_sq: i64,
}

impl Default for CentreCircleParams {
    fn default() -> Self {
        Self {
            min_quality: 4.0,
            min_length: HyperBand::new(1178, 1649, 500 * 500, 900 * 900),
            length_ramp: QualityRamp::new(-100.0, 1.0),
            min_curve_portion: 0.35,
            curve_ramp: QualityRamp::new(-100.0, 1.0),
            radius_error: HyperBand::new(300, 300, 500 * 500, 700 * 700),
            min_distance_from_centre: 600,
            line_distance: 300.0,
            line_length_sq: (200 * 200) as f32,
            line_end_distance_sq: (500 * 500) as f32,
            line_ramp: QualityRamp::new(-100.0, 1.0),
            min_line_distance_sq: 2000 * 2000,
        }
    }
}

/// Corner and T scoring over line intersections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionParams {
    /// Allowed deviation from perpendicular, radians.
    pub max_perpendicular_error: f32,
    pub perpendicular_ramp: QualityRamp,
    /// Squared distance an intersection must sit inside a line to look
    /// like a T.
    pub t_excess_sq: f32,
    pub t_on_line_ramp: QualityRamp,
    /// Goal box pairing: expected spacing error, millimetres.
    pub goal_box_error: f32,
    pub goal_box_ramp: QualityRamp,
    /// Squared line length that earns full length quality.
    pub min_feature_line_length: HyperBand,
    pub line_length_ramp: QualityRamp,
    /// Squared distance from the intersection to the nearest line end.
    pub line_end_distance: HyperBand,
    pub line_end_ramp: QualityRamp,
    pub quality_threshold: f32,
    pub t_threshold: f32,
    pub corner_threshold: f32,
    /// Region detections closer than this (squared) confirm an
    /// intersection.
    pub max_t_error_sq: i64,
    pub max_corner_error_sq: i64,
    pub region_t_bonus: f32,
    pub region_corner_bonus: f32,
}

impl Default for IntersectionParams {
    fn default() -> Self {
        Self {
            max_perpendicular_error: std::f32::consts::PI / 8.0,
            perpendicular_ramp: QualityRamp::new(-100.0, 1.0),
            t_excess_sq: (100 * 100) as f32,
            t_on_line_ramp: QualityRamp::new(-100.0, 1.0),
            goal_box_error: 200.0,
            goal_box_ramp: QualityRamp::new(0.0, 1.0),
            min_feature_line_length: HyperBand::new(
                1000 * 1000,
                1500 * 1500,
                1000 * 1000,
                3000 * 3000,
            ),
            line_length_ramp: QualityRamp::new(0.0, 1.0),
            line_end_distance: HyperBand::new(200 * 200, 600 * 600, 1000 * 1000, 3000 * 3000),
            line_end_ramp: QualityRamp::new(-100.0, 1.0),
            quality_threshold: 1.0,
            t_threshold: 50.0,
            corner_threshold: 50.0,
            max_t_error_sq: 100 * 100,
            max_corner_error_sq: 100 * 100,
            region_t_bonus: 200.0,
            region_corner_bonus: 100.0,
        }
    }
}

/// Zero-end regions that may be the penalty spot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyCrossParams {
    /// Off in the deployed configuration.
    pub enabled: bool,
    /// Both box corners must project within this squared distance.
    pub max_distance_sq: i64,
    /// Squared diagonal of the projected box.
    pub min_diagonal_sq: i64,
    pub max_diagonal_sq: i64,
    /// Width over height of the unpadded region.
    pub min_aspect: f32,
    pub max_aspect: f32,
    /// Dark groups at least this large count against the cross.
    pub min_group_count_top: u32,
    pub min_group_count_bottom: u32,
    /// More counted dark groups than this rejects the region.
    pub max_dark_groups: usize,
    pub min_whites_top: usize,
    pub min_whites_bottom: usize,
}

impl Default for PenaltyCrossParams {
    fn default() -> Self {
        Self {
            enabled: false,
            max_distance_sq: 2000 * 2000,
            min_diagonal_sq: 80 * 80,
            max_diagonal_sq: 250 * 250,
            min_aspect: 0.8,
            max_aspect: 4.0,
            min_group_count_top: 2,
            min_group_count_bottom: 1,
            max_dark_groups: 1,
            min_whites_top: 30,
            min_whites_bottom: 10,
        }
    }
}

/// Which lines are reported to localisation, and with what variance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineEmissionParams {
    /// Both ends must be closer than this, millimetres.
    pub max_end_distance: f32,
    pub min_length: f32,
    pub max_length: f32,
    /// Standard deviations grow linearly with the distance to the line
    /// midpoint: `slope * d + offset`.
    pub distance_sd_slope: f32,
    pub distance_sd_offset: f32,
    pub heading_sd_slope: f32,
    pub heading_sd_offset: f32,
}

impl Default for LineEmissionParams {
    fn default() -> Self {
        Self {
            max_end_distance: 4000.0,
            min_length: 1000.0,
            max_length: 7000.0,
            distance_sd_slope: 0.2,
            distance_sd_offset: 200.0,
            heading_sd_slope: 0.000_058_09,
            heading_sd_offset: 0.290_973,
        }
    }
}

/// Parameters for [`crate::FieldFeatureDetector`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldFeatureParams {
    pub border: BorderParams,
    pub line: LineCheckParams,
    pub centre_circle: CentreCircleParams,
    pub intersection: IntersectionParams,
    pub penalty_cross: PenaltyCrossParams,
    pub lines: LineEmissionParams,
    pub limits: FeatureLimits,
}

/// Output caps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureLimits {
    /// Point features (circle, corners, Ts, penalty spot) per frame.
    pub max_features: usize,
    /// Corners and Ts closer than this to an earlier feature are dropped.
    pub min_separation_mm: f32,
}

impl Default for FeatureLimits {
    fn default() -> Self {
        Self {
            max_features: 6,
            min_separation_mm: 300.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_blocks_fill_missing_fields() {
        let params: FieldFeatureParams = serde_json::from_str(
            r#"{"penalty_cross": {"enabled": true}, "limits": {"max_features": 3}}"#,
        )
        .unwrap();
        assert!(params.penalty_cross.enabled);
        assert_eq!(params.penalty_cross.min_whites_top, 30);
        assert_eq!(params.limits.max_features, 3);
        assert_eq!(params.centre_circle.min_length.at(0), 1178);
        assert_eq!(params.border, BorderParams::default());
    }
}
