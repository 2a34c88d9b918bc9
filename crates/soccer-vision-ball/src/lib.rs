//! Ball detector for the soccer robot vision pipeline.
//!
//! ## Quickstart
//!
//! ```
//! use soccer_vision_ball::{BallDetector, BallDetectorParams};
//! use soccer_vision_core::{FlatGroundCamera, FrameContext, Region};
//!
//! let camera = FlatGroundCamera::default();
//! let ctx = FrameContext::new(&camera);
//! let mut detector = BallDetector::new(BallDetectorParams::default());
//!
//! let regions: Vec<Region> = Vec::new();
//! let balls = detector.detect(&regions, &ctx);
//! assert!(balls.is_empty());
//! ```
//!
//! Per saliency region:
//! 1. Drop regions above the field boundary and uniform blobs.
//! 2. Estimate the ball size the region would have and refine it into
//!    candidates, either directly or by boxing dark ball patches.
//! 3. Re-threshold each candidate and fit a circle with a voting fitter.
//! 4. Check radius, luminance spread and the layout of the dark patches
//!    inside the circle.
//! 5. Ask the injected classifier, then drop balls outside the field.

mod candidate;
mod circle_fit;
mod detector;
mod params;
mod roi;
mod size;
mod texture;

pub use candidate::{BallCandidate, CircleFit, PartialSide, RegionAspect};
pub use circle_fit::{
    candidate_points, find_best_circle_fit, find_largest_circle_fit, fixed_radius_fit, kenji_fit,
    FixedRadiusParams, GridFitParams,
};
pub use detector::BallDetector;
pub use params::{
    AdaptiveParams, BallDetectorParams, KenjiParams, RoiParams, SizeModelParams, TextureParams,
};
pub use roi::{black_roi, blob_roi, circle_roi, combo_roi, is_simple_blob};
pub use size::{diameter_in_image, estimate_size, SizeEstimate};
pub use texture::{internal_regions, raw_range, texture_rejection, InternalRegion, InternalRegions};
