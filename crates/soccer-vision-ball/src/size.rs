//! Expected ball size from the robot's pose and a region's screen position.

use nalgebra::Point2;

use soccer_vision_core::field::BALL_RADIUS;
use soccer_vision_core::{Camera, FrameContext, Region, RrCoord};

use crate::params::SizeModelParams;

/// Size cues for one candidate region.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SizeEstimate {
    /// Robot-relative position of the region centre.
    pub rr: RrCoord,
    /// Ball diameter implied by the region width, millimetres.
    pub diam_size_est: f32,
    /// Expected ball diameter at this position, local pixels.
    pub diam_expected_size: f32,
    /// Empirical expected diameter from the image row, raw pixels.
    pub diam_expected_pixels: f32,
}

/// Robot-relative polar position of a raw image point on a ball.
pub(crate) fn ball_rr(
    ctx: &FrameContext<'_>,
    camera: Camera,
    centre: Point2<f32>,
    params: &SizeModelParams,
) -> RrCoord {
    let mut b = ctx.camera.image_to_robot_xy(camera, centre, BALL_RADIUS);
    b.y -= params.lean_offset_mm * ctx.lean_x.tan();
    let mut rr = RrCoord::from_cartesian(b);
    rr.distance -= params.distance_correction_mm * rr.distance / params.robot_height_mm;
    rr
}

/// Estimate the ball size that `region` would have if it were a ball.
pub fn estimate_size(
    region: &Region,
    ctx: &FrameContext<'_>,
    params: &SizeModelParams,
) -> SizeEstimate {
    let bbox = region.bbox_raw();
    let centre = bbox.centre();
    let radius = (region.cols() as f32 * region.density() as f32) / 2.0;

    let rr = ball_rr(ctx, region.camera(), centre, params);
    let neck = ctx
        .camera
        .robot_relative_to_neck(&rr, params.ball_centre_height_mm)
        .norm()
        .max(1.0);

    let half_width = region.frame().width() as f32 / 2.0;
    let dx = (centre.x - half_width).abs();
    let focal = (3.0 * half_width * half_width + dx * dx).sqrt();

    let tilted = ctx.camera.neck_pitch() > params.head_tilt_limit;
    let bottom_row = centre.y + bbox.height() as f32 / 2.0;
    SizeEstimate {
        rr,
        diam_size_est: 2.0 * neck * radius / focal,
        diam_expected_size: (100.0 * focal / neck) / region.density() as f32,
        diam_expected_pixels: diameter_in_image(region.camera(), bottom_row, tilted, params),
    }
}

/// Empirical diameter in raw pixels for a ball whose lowest point sits on
/// raw image `row`; zero when the model predicts a negative size.
pub fn diameter_in_image(camera: Camera, row: f32, tilted: bool, params: &SizeModelParams) -> f32 {
    let [a, b] = match (camera, tilted) {
        (Camera::Top, true) => params.top_tilted,
        (Camera::Top, false) => params.top_level,
        (Camera::Bottom, true) => params.bottom_tilted,
        (Camera::Bottom, false) => params.bottom_level,
    };
    let diameter = a * row + b;
    if diameter < 0.0 {
        0.0
    } else {
        diameter + params.diameter_offset
    }
}
