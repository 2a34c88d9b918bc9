use serde::{Deserialize, Serialize};

/// Votes of the randomized three-point circle fitter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KenjiParams {
    /// Fewer candidate points than this and no fit is attempted.
    pub min_points: usize,
    /// Upper bound on sampled triples.
    pub max_trials: usize,
    /// Peak accumulator value required for a centre.
    pub centre_vote_threshold: i32,
    /// Fits whose winning radius bin is below this are dropped.
    pub min_radius: i32,
}

impl Default for KenjiParams {
    fn default() -> Self {
        Self {
            min_points: 10,
            max_trials: 100,
            centre_vote_threshold: 300,
            min_radius: 8,
        }
    }
}

/// Internal dark-patch filtering and acceptance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureParams {
    /// Patch pixel count bounds, as fractions of the circle area.
    pub min_area_fraction: f32,
    pub max_area_fraction: f32,
    /// Lower bound in crazy-ball mode, as a fraction of `radius^2`.
    pub crazy_min_radius_sq_fraction: f32,
    /// Patch side bounds relative to the radius.
    pub min_side_ratio: f32,
    pub max_side_ratio: f32,
    /// Largest completely-internal patch, as a fraction of the circle area.
    pub min_internal_fraction: f32,
    pub min_regions: usize,
    pub max_regions: usize,
    /// Single centred patch: width bounds and centre offset, times radius.
    pub centred_min_width: f32,
    pub centred_max_width: f32,
    pub centred_max_offset: f32,
    /// Triangle side bounds are `r^2 * (1 - min)` .. `r^2 * (1 + max)`.
    pub triangle_dist_ratio_min: f32,
    pub triangle_dist_ratio_max: f32,
    pub triangle_error_threshold: i32,
    /// Minimum luminance spread inside the circle.
    pub min_raw_range: i32,
    /// Adaptive threshold used before labelling internal patches.
    pub adaptive_window: i32,
    pub adaptive_percentage: i32,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            min_area_fraction: 0.01,
            max_area_fraction: 0.2,
            crazy_min_radius_sq_fraction: 0.005,
            min_side_ratio: 0.25,
            max_side_ratio: 0.8,
            min_internal_fraction: 0.04,
            min_regions: 3,
            max_regions: 10,
            centred_min_width: 0.4,
            centred_max_width: 0.9,
            centred_max_offset: 0.2,
            triangle_dist_ratio_min: 0.25,
            triangle_dist_ratio_max: 0.7,
            triangle_error_threshold: 130,
            min_raw_range: 40,
            adaptive_window: 12,
            adaptive_percentage: 15,
        }
    }
}

/// Region-of-interest refinement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiParams {
    /// A row needs a second white run of at least this fraction of the width.
    pub min_section_fraction: f32,
    /// Accepted ball size estimate, millimetres (exclusive bounds).
    pub min_size_estimate: f32,
    pub max_size_estimate: f32,
    /// Below the accepted range but above this, blob search still runs.
    pub blob_size_estimate: f32,
    /// `cols / rows` at or below this is tall, at or above `short_aspect` short.
    pub tall_aspect: f64,
    pub short_aspect: f64,
    /// Padding in local pixels added by region regeneration.
    pub padding: i32,
    /// Rescaling zooms in until the region has at least this many pixels.
    pub min_region_pixels: usize,
    /// Dark-blob pixel count bounds for blob search (exclusive).
    pub blob_min_pixels: u32,
    pub blob_max_pixels: u32,
    /// Blob box density must exceed this.
    pub blob_min_density: f32,
    pub blob_max_count: usize,
    /// Box half-size multipliers around one or several blob centres.
    pub blob_expand_single: f32,
    pub blob_expand_multi: f32,
    /// Fallback strategies, off in the deployed configuration.
    pub enable_black_roi: bool,
    pub enable_circle_roi: bool,
}

impl Default for RoiParams {
    fn default() -> Self {
        Self {
            min_section_fraction: 0.01,
            min_size_estimate: 50.0,
            max_size_estimate: 200.0,
            blob_size_estimate: 40.0,
            tall_aspect: 0.5,
            short_aspect: 1.5,
            padding: 2,
            min_region_pixels: 32 * 32,
            blob_min_pixels: 6,
            blob_max_pixels: 200,
            blob_min_density: 0.75,
            blob_max_count: 6,
            blob_expand_single: 2.0,
            blob_expand_multi: 2.5,
            enable_black_roi: false,
            enable_circle_roi: false,
        }
    }
}

/// Adaptive re-thresholding before circle fitting and blob search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveParams {
    /// Circle-fit window as a fraction of the region rows.
    pub circle_fit_window: f32,
    pub circle_fit_percentage_top: i32,
    pub circle_fit_percentage_bottom: i32,
    /// Blob-search window as a fraction of the shorter region side.
    pub blob_window_top: f32,
    pub blob_window_bottom: f32,
    /// Top camera blob bias is the average white brightness over this.
    pub blob_brightness_divisor: i32,
    pub blob_percentage_bottom: i32,
    /// Used whenever a computed window is not positive.
    pub default_window: i32,
}

impl Default for AdaptiveParams {
    fn default() -> Self {
        Self {
            circle_fit_window: 0.4,
            circle_fit_percentage_top: -5,
            circle_fit_percentage_bottom: 20,
            blob_window_top: 0.5,
            blob_window_bottom: 0.6,
            blob_brightness_divisor: 10,
            blob_percentage_bottom: 20,
            default_window: 15,
        }
    }
}

impl AdaptiveParams {
    fn window(&self, computed: i32) -> i32 {
        if computed <= 0 {
            self.default_window
        } else {
            computed
        }
    }

    /// `(window, percentage)` for circle fitting on a region of `rows`.
    pub fn circle_fit(&self, rows: usize, top_camera: bool) -> (i32, i32) {
        let window = self.window((rows as f32 * self.circle_fit_window) as i32);
        let percentage = if top_camera {
            self.circle_fit_percentage_top
        } else {
            self.circle_fit_percentage_bottom
        };
        (window, percentage)
    }

    /// `(window, percentage)` for blob search on a `cols x rows` region
    /// whose white pixels average `brightness`.
    pub fn blob_search(&self, cols: usize, rows: usize, top_camera: bool, brightness: i32) -> (i32, i32) {
        let side = cols.min(rows) as f32;
        if top_camera {
            let window = self.window((side * self.blob_window_top) as i32);
            (window, brightness / self.blob_brightness_divisor.max(1))
        } else {
            let window = self.window((side * self.blob_window_bottom) as i32);
            (window, self.blob_percentage_bottom)
        }
    }
}

/// Perspective size model. Affine `a * row + b` coefficients predict the
/// ball diameter in raw pixels from the image row of its bottom edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeModelParams {
    /// Head pitch above which the tilted coefficients apply.
    pub head_tilt_limit: f32,
    pub top_tilted: [f32; 2],
    pub top_level: [f32; 2],
    pub bottom_tilted: [f32; 2],
    pub bottom_level: [f32; 2],
    /// Added to every positive prediction.
    pub diameter_offset: f32,
    /// Lateral offset between the camera and the lean axis, millimetres.
    pub lean_offset_mm: f32,
    /// Distance is shortened by `correction * d / robot_height`.
    pub distance_correction_mm: f32,
    pub robot_height_mm: f32,
    /// Height of the ball centre used for the neck distance.
    pub ball_centre_height_mm: f32,
}

impl Default for SizeModelParams {
    fn default() -> Self {
        Self {
            head_tilt_limit: 0.2,
            top_tilted: [0.218, -8.86],
            top_level: [0.21, -43.84],
            bottom_tilted: [0.146, 82.5],
            bottom_level: [0.151, 76.77],
            diameter_offset: 8.0,
            lean_offset_mm: 190.0,
            distance_correction_mm: 30.0,
            robot_height_mm: 500.0,
            ball_centre_height_mm: 50.0,
        }
    }
}

/// Parameters for [`crate::BallDetector`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallDetectorParams {
    pub roi: RoiParams,
    pub kenji: KenjiParams,
    pub texture: TextureParams,
    pub size: SizeModelParams,
    pub adaptive: AdaptiveParams,
    /// Accepted radius in raw pixels, per camera.
    pub top_radius: [f32; 2],
    pub bottom_radius: [f32; 2],
    /// Balls further than this outside the field lines are dropped.
    pub field_margin_mm: f32,
    /// Stop after the first accepted ball.
    pub early_exit: bool,
}

impl Default for BallDetectorParams {
    fn default() -> Self {
        Self {
            roi: RoiParams::default(),
            kenji: KenjiParams::default(),
            texture: TextureParams::default(),
            size: SizeModelParams::default(),
            adaptive: AdaptiveParams::default(),
            top_radius: [10.0, 110.0],
            bottom_radius: [20.0, 90.0],
            field_margin_mm: 300.0,
            early_exit: true,
        }
    }
}

impl BallDetectorParams {
    /// Deployed thresholds plus both fallback ROI strategies.
    pub fn with_fallbacks() -> Self {
        Self {
            roi: RoiParams {
                enable_black_roi: true,
                enable_circle_roi: true,
                ..RoiParams::default()
            },
            ..Default::default()
        }
    }

    pub fn radius_bounds(&self, top_camera: bool) -> [f32; 2] {
        if top_camera {
            self.top_radius
        } else {
            self.bottom_radius
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let params: BallDetectorParams =
            serde_json::from_str(r#"{"kenji": {"max_trials": 50}, "early_exit": false}"#).unwrap();
        assert_eq!(params.kenji.max_trials, 50);
        assert_eq!(params.kenji.centre_vote_threshold, 300);
        assert!(!params.early_exit);
        assert_eq!(params.radius_bounds(false), [20.0, 90.0]);
    }

    #[test]
    fn adaptive_windows_fall_back_when_region_is_tiny() {
        let adaptive = AdaptiveParams::default();
        assert_eq!(adaptive.circle_fit(40, true), (16, -5));
        assert_eq!(adaptive.circle_fit(2, false), (15, 20), "0.8 rows truncates to 0");
        assert_eq!(adaptive.blob_search(30, 20, true, 187), (10, 18));
        assert_eq!(adaptive.blob_search(30, 20, false, 187), (12, 20));
    }
}
