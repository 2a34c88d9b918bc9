//! Field feature detector for the soccer robot vision pipeline.
//!
//! ## Quickstart
//!
//! ```
//! use soccer_vision_core::{FlatGroundCamera, FrameContext, Region};
//! use soccer_vision_field::{FieldFeatureDetector, FieldFeatureParams};
//!
//! let camera = FlatGroundCamera::default();
//! let ctx = FrameContext::new(&camera);
//! let mut detector = FieldFeatureDetector::new(FieldFeatureParams::default());
//!
//! let regions: Vec<Region> = Vec::new();
//! assert!(detector.detect(&regions, &ctx).is_empty());
//! ```
//!
//! Per saliency region:
//! 1. Merge it with overlapping regions that continue the same shape.
//! 2. Count the white runs ("ends") on the padded region's border.
//! 3. Two ends are a line, curve or corner; three ends a T-junction; none
//!    may be the penalty spot.
//!
//! Then, over the whole frame, line segments vote for the centre circle and
//! are intersected pairwise to confirm corners and T-junctions.

mod aggregate;
mod angles;
mod border;
mod classify;
mod detector;
mod edge;
mod params;
mod penalty;
mod shape;
mod spread;

pub use aggregate::{aggregate, centre_circle_candidates, construct_lines, CircleCandidate, Intersection};
pub use angles::{corner_angle, t_angle};
pub use border::{region_ends, RegionBorder, RegionEnd};
pub use classify::{
    classify_three_ends, classify_two_ends, project_ends, project_local, RegionAnalysis, RegionShape,
};
pub use detector::FieldFeatureDetector;
pub use edge::{trace_connection, EdgeTrace};
pub use params::{
    BorderParams, CentreCircleParams, FeatureLimits, FieldFeatureParams, IntersectionParams,
    LineCheckParams, LineEmissionParams, PenaltyCrossParams,
};
pub use penalty::{penalty_cross, PenaltyRejection};
pub use shape::{all_white_between, bends_in_two_parts, centre_offset_analysis, corner_tip};
pub use spread::{pad_region, spread_region, SpreadRegion};
