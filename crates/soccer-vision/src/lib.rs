//! High-level facade crate for the `soccer-vision-*` workspace.
//!
//! This crate provides:
//! - re-exports of the core, ball and field crates
//! - [`VisionPipeline`], which runs both detectors over one frame's saliency
//!   regions and keeps the per-stage timing registry
//! - [`VisionConfig`], the JSON configuration holding every tunable
//!
//! ## Quickstart
//!
//! ```
//! use soccer_vision::{VisionConfig, VisionPipeline};
//! use soccer_vision::core::{FrameContext, Region};
//!
//! let config = VisionConfig::default();
//! let camera = config.camera.clone();
//! let ctx = FrameContext::new(&camera);
//! let mut pipeline = VisionPipeline::from_config(&config);
//!
//! let regions: Vec<Region> = Vec::new();
//! let output = pipeline.process(&regions, &ctx);
//! assert!(output.is_empty());
//! pipeline.end_frame();
//! ```
//!
//! ## API map
//! - `soccer_vision::core`: frames, regions, CCA, geometry, observer, timing.
//! - `soccer_vision::ball`: ROI refinement, circle fitting, texture checks.
//! - `soccer_vision::field`: region-border classification and aggregation.

pub use soccer_vision_ball as ball;
pub use soccer_vision_core as core;
pub use soccer_vision_field as field;

pub use soccer_vision_ball::{BallDetector, BallDetectorParams};
pub use soccer_vision_core::{BallDetection, FieldFeature, FlatGroundCamera, FrameContext, Region};
pub use soccer_vision_field::{FieldFeatureDetector, FieldFeatureParams};

mod config;
mod pipeline;

pub use config::{ConfigError, VisionConfig};
pub use pipeline::{VisionOutput, VisionPipeline};
