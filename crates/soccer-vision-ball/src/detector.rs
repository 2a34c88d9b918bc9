//! Ball detection over the saliency regions of one frame.

use std::time::Instant;

use log::{debug, info};

use soccer_vision_core::field::{FIELD_LENGTH, FIELD_WIDTH};
use soccer_vision_core::{
    AcceptAll, BallDetection, BallStage, CcaScratch, FrameContext, NoopObserver,
    PipelineObserver, Region, RegionClassifier, StageTimings,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::candidate::{BallCandidate, PartialSide, RegionAspect};
use crate::circle_fit::{candidate_points, kenji_fit};
use crate::params::BallDetectorParams;
use crate::roi::{average_white_brightness, black_roi, blob_roi, circle_roi, combo_roi};
use crate::size::ball_rr;
use crate::texture::{internal_regions, raw_range, texture_rejection};

/// Refines saliency regions into ball candidates and inspects each one.
///
/// The detector owns its labelling scratch, so one instance should be reused
/// across frames.
pub struct BallDetector {
    params: BallDetectorParams,
    scratch: CcaScratch,
    classifier: Box<dyn RegionClassifier>,
    observer: Box<dyn PipelineObserver>,
}

impl BallDetector {
    /// Detector with an accept-everything classifier and no observer.
    pub fn new(params: BallDetectorParams) -> Self {
        Self {
            params,
            scratch: CcaScratch::new(),
            classifier: Box::new(AcceptAll),
            observer: Box::new(NoopObserver),
        }
    }

    /// Final yes/no check applied to candidates that pass every geometric
    /// test.
    pub fn with_classifier(mut self, classifier: impl RegionClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn with_observer(mut self, observer: impl PipelineObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Detector parameters.
    #[inline]
    pub fn params(&self) -> &BallDetectorParams {
        &self.params
    }

    /// Detect balls in `regions`, visiting them last to first.
    ///
    /// With `early_exit` set the first candidate that passes inspection ends
    /// the search, even when it then turns out to be off the field.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, regions, ctx), fields(regions = regions.len()))
    )]
    pub fn detect(&mut self, regions: &[Region], ctx: &FrameContext<'_>) -> Vec<BallDetection> {
        self.run(regions, ctx, None)
    }

    /// [`Self::detect`], charging refinement and inspection time to
    /// `timings`.
    pub fn detect_timed(
        &mut self,
        regions: &[Region],
        ctx: &FrameContext<'_>,
        timings: &mut StageTimings,
    ) -> Vec<BallDetection> {
        self.run(regions, ctx, Some(timings))
    }

    fn run(
        &mut self,
        regions: &[Region],
        ctx: &FrameContext<'_>,
        mut timings: Option<&mut StageTimings>,
    ) -> Vec<BallDetection> {
        let mut balls = Vec::new();
        for region in regions.iter().rev() {
            let started = Instant::now();
            let refined = combo_roi(region, ctx, &self.params, &mut self.scratch);
            charge(&mut timings, "ball.roi", started);
            let candidates = match refined {
                Ok(candidates) => candidates,
                Err(stage) => {
                    debug!("region {:?} dropped at {:?}", region.bbox_raw(), stage);
                    self.observer.on_ball_rejected(region, stage);
                    Vec::new()
                }
            };

            let mut retry = Vec::new();
            for candidate in candidates {
                if candidate.aspect == RegionAspect::Normal {
                    retry.push(candidate.original.clone());
                }
                if self.consider(candidate, ctx, &mut balls, &mut timings) && self.params.early_exit {
                    return balls;
                }
            }

            for original in retry {
                let started = Instant::now();
                let blobs = blob_roi(&original, RegionAspect::Normal, ctx, &self.params, &mut self.scratch);
                charge(&mut timings, "ball.roi", started);
                for candidate in blobs {
                    if self.consider(candidate, ctx, &mut balls, &mut timings) && self.params.early_exit {
                        return balls;
                    }
                }
            }

            let mut fallbacks = Vec::new();
            if self.params.roi.enable_black_roi {
                fallbacks.extend(black_roi(region, ctx, &self.params));
            }
            if self.params.roi.enable_circle_roi {
                fallbacks.extend(circle_roi(region, ctx, &self.params));
            }
            for candidate in fallbacks {
                if self.consider(candidate, ctx, &mut balls, &mut timings) && self.params.early_exit {
                    return balls;
                }
            }
        }
        balls
    }

    /// Inspect one candidate and record the outcome. Returns true when the
    /// candidate passed inspection, whether or not it lies on the field.
    fn consider(
        &mut self,
        mut candidate: BallCandidate,
        ctx: &FrameContext<'_>,
        balls: &mut Vec<BallDetection>,
        timings: &mut Option<&mut StageTimings>,
    ) -> bool {
        self.observer.on_ball_candidate(&candidate.region);
        let started = Instant::now();
        let verdict = self.inspect(&mut candidate);
        charge(timings, "ball.inspect", started);
        if let Err(stage) = verdict {
            debug!(
                "ball candidate {:?} rejected at {:?}",
                candidate.region.bbox_raw(),
                stage
            );
            self.observer.on_ball_rejected(&candidate.region, stage);
            return false;
        }

        let region = &candidate.region;
        let image_centre = region.local_to_raw(candidate.circle.centre);
        let rr = ball_rr(ctx, region.camera(), image_centre, &self.params.size);
        let ball = BallDetection {
            rr,
            image_centre,
            radius: candidate.circle.radius * region.density() as f32,
            top_camera: region.is_top_camera(),
        };

        let field = ctx.pose.to_field(&ball.rr);
        let margin = self.params.field_margin_mm;
        let on_field =
            field.x.abs() < FIELD_LENGTH / 2.0 + margin && field.y.abs() < FIELD_WIDTH / 2.0 + margin;
        if on_field {
            info!(
                "ball at {:.0} mm, heading {:.2} rad (radius {:.1} px)",
                ball.rr.distance,
                ball.rr.heading,
                ball.radius
            );
            self.observer.on_ball_accepted(&ball);
            balls.push(ball);
        } else {
            debug!("ball at {:?} is off the field", ball.rr);
            self.observer.on_ball_rejected(region, BallStage::OffField);
        }
        true
    }

    /// Run the geometric, texture and classifier checks in order.
    fn inspect(&mut self, candidate: &mut BallCandidate) -> Result<(), BallStage> {
        let params = &self.params;
        candidate.partial = PartialSide::of(&candidate.region);
        if average_white_brightness(&candidate.region) == 0 {
            return Err(BallStage::Brightness);
        }

        let top = candidate.region.is_top_camera();
        let (window, percentage) = params.adaptive.circle_fit(candidate.region.rows(), top);
        candidate.reclassify(window, percentage);
        // The classifier sees the region as thresholded for circle fitting.
        let model = candidate.region.clone();

        candidate.points = candidate_points(&candidate.region);
        let circle = kenji_fit(
            &candidate.points,
            candidate.region.cols(),
            candidate.region.rows(),
            &params.kenji,
        )
        .ok_or(BallStage::CircleFit)?;
        candidate.circle = circle;

        let radius = circle.radius * candidate.region.density() as f32;
        let [min_radius, max_radius] = params.radius_bounds(top);
        if radius < 2.0 || radius < min_radius || radius > max_radius {
            return Err(BallStage::Radius);
        }
        if raw_range(&candidate.region, &circle) < params.texture.min_raw_range {
            return Err(BallStage::RawRange);
        }

        candidate.reclassify(params.texture.adaptive_window, params.texture.adaptive_percentage);
        let internal = internal_regions(
            &mut self.scratch,
            &candidate.region,
            &circle,
            candidate.crazy,
            &params.texture,
        );
        if let Some(stage) = texture_rejection(&internal, &circle, &params.texture) {
            return Err(stage);
        }

        if !self.classifier.predict(&model) {
            return Err(BallStage::Classifier);
        }
        Ok(())
    }
}

fn charge(timings: &mut Option<&mut StageTimings>, stage: &'static str, started: Instant) {
    if let Some(timings) = timings.as_deref_mut() {
        timings.record(stage, started.elapsed());
    }
}
