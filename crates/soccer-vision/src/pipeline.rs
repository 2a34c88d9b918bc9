//! Both detectors over one frame, sharing a timing registry.

use log::debug;
use serde::{Deserialize, Serialize};

use soccer_vision_ball::BallDetector;
use soccer_vision_core::{
    BallDetection, FieldFeature, FrameContext, PipelineObserver, Region, RegionClassifier,
    StageSummary, StageTimings,
};
use soccer_vision_field::FieldFeatureDetector;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::VisionConfig;

/// Everything found in one frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VisionOutput {
    pub balls: Vec<BallDetection>,
    pub features: Vec<FieldFeature>,
}

impl VisionOutput {
    pub fn is_empty(&self) -> bool {
        self.balls.is_empty() && self.features.is_empty()
    }
}

/// Ball and field-feature detection for a stream of frames.
///
/// Keep one pipeline alive across frames: the detectors reuse their
/// labelling scratch and the timings accumulate until a report is due.
pub struct VisionPipeline {
    ball: BallDetector,
    field: FieldFeatureDetector,
    timings: StageTimings,
}

impl VisionPipeline {
    pub fn new(ball: BallDetector, field: FieldFeatureDetector, report_every: u32) -> Self {
        Self {
            ball,
            field,
            timings: StageTimings::new(report_every),
        }
    }

    /// Pipeline with accept-all classifier gates.
    pub fn from_config(config: &VisionConfig) -> Self {
        Self::new(
            BallDetector::new(config.ball.clone()),
            FieldFeatureDetector::new(config.field.clone()),
            config.report_every,
        )
    }

    pub fn with_ball_classifier(mut self, classifier: impl RegionClassifier + 'static) -> Self {
        self.ball = self.ball.with_classifier(classifier);
        self
    }

    /// Install `observer` on both detectors. Pass an `Arc<Mutex<_>>` to read
    /// the events back afterwards.
    pub fn with_observer(mut self, observer: impl PipelineObserver + Clone + 'static) -> Self {
        self.ball = self.ball.with_observer(observer.clone());
        self.field = self.field.with_observer(observer);
        self
    }

    pub fn ball_detector(&self) -> &BallDetector {
        &self.ball
    }

    pub fn field_detector(&self) -> &FieldFeatureDetector {
        &self.field
    }

    /// Run ball detection, then field-feature detection, over `regions`.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, regions, ctx), fields(regions = regions.len()))
    )]
    pub fn process(&mut self, regions: &[Region], ctx: &FrameContext<'_>) -> VisionOutput {
        let balls = self.ball.detect_timed(regions, ctx, &mut self.timings);
        let features = self.field.detect_timed(regions, ctx, &mut self.timings);
        debug!(
            "frame: {} balls, {} field features from {} regions",
            balls.len(),
            features.len(),
            regions.len()
        );
        VisionOutput { balls, features }
    }

    /// Close the frame. Returns the averaged stage timings when a report
    /// was due; they are also logged at `info` level.
    pub fn end_frame(&mut self) -> Option<Vec<StageSummary>> {
        self.timings.end_frame()
    }

    pub fn timings(&self) -> &StageTimings {
        &self.timings
    }

    pub fn reset_timings(&mut self) {
        self.timings.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soccer_vision_core::FlatGroundCamera;

    #[test]
    fn empty_frames_report_on_schedule() {
        let config = VisionConfig {
            report_every: 2,
            ..VisionConfig::default()
        };
        let camera = FlatGroundCamera::default();
        let ctx = FrameContext::new(&camera);
        let mut pipeline = VisionPipeline::from_config(&config);

        assert!(pipeline.process(&[], &ctx).is_empty());
        assert!(pipeline.end_frame().is_none());
        assert!(pipeline.process(&[], &ctx).is_empty());
        assert!(pipeline.end_frame().is_some());
        assert_eq!(pipeline.timings().frames(), 0);
    }
}
