//! Shared primitives for the soccer robot vision pipeline.
//!
//! Frames and regions, connected components, robot-relative geometry and the
//! seams (classifiers, camera model, observer) that the ball and field
//! detectors are built against. Nothing here knows about balls or lines.

mod camera;
mod cca;
mod classifier;
mod error;
mod features;
mod geometry;
mod group_links;
mod image;
mod logger;
mod observer;
mod ramp;
mod region;
mod timing;

pub use camera::{CameraGeometry, CameraModel, FieldPose, FlatGroundCamera, FrameContext};
pub use cca::{CcaScratch, CircleMask, Component, Labelling};
pub use classifier::{AcceptAll, RegionClassifier, RejectAll};
pub use error::{CapacityError, FrameError};
pub use features::{BallDetection, FieldFeature};
pub use geometry::{distance_sq, normalise_angle, RansacCircle, RansacLine, RrCoord};
pub use group_links::{GroupLinks, MAX_GROUPS, MAX_LINKS};
pub use image::{adaptive_white_mask, Camera, CameraFrame, Colour};
pub use observer::{BallStage, CountingObserver, NoopObserver, PipelineObserver};
pub use ramp::{value_from_thresholds, HyperBand, QualityRamp};
pub use region::{BBox, Region};
pub use timing::{StageSummary, StageTimings};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_env, init_with_level, LOG_ENV};

/// SPL field dimensions, millimetres.
pub mod field {
    pub const FIELD_LENGTH: f32 = 9010.0;
    pub const FIELD_WIDTH: f32 = 6020.0;
    pub const GOAL_BOX_LENGTH: f32 = 615.0;
    pub const CENTER_CIRCLE_DIAMETER: f32 = 1500.0;
    pub const BALL_RADIUS: f32 = 50.0;
}
