//! Field feature detection over the saliency regions of one frame.

use std::time::Instant;

use log::{debug, info, trace};

use soccer_vision_core::{
    AcceptAll, CcaScratch, FieldFeature, FrameContext, NoopObserver, PipelineObserver, Region,
    RegionClassifier, StageTimings,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::aggregate::aggregate;
use crate::classify::{classify_three_ends, classify_two_ends, project_ends, RegionAnalysis, RegionShape};
use crate::params::FieldFeatureParams;
use crate::penalty::penalty_cross;
use crate::spread::spread_region;

/// Classifies each saliency region by its border ends and combines the
/// results into lines, corners, T-junctions, the centre circle and the
/// penalty spot.
///
/// Like the ball detector it owns its labelling scratch; reuse one instance
/// across frames.
pub struct FieldFeatureDetector {
    params: FieldFeatureParams,
    scratch: CcaScratch,
    corner_classifier: Box<dyn RegionClassifier>,
    t_classifier: Box<dyn RegionClassifier>,
    penalty_classifier: Box<dyn RegionClassifier>,
    observer: Box<dyn PipelineObserver>,
}

impl FieldFeatureDetector {
    /// Detector whose classifier gates accept everything.
    pub fn new(params: FieldFeatureParams) -> Self {
        Self {
            params,
            scratch: CcaScratch::new(),
            corner_classifier: Box::new(AcceptAll),
            t_classifier: Box::new(AcceptAll),
            penalty_classifier: Box::new(AcceptAll),
            observer: Box::new(NoopObserver),
        }
    }

    /// Gate for corner regions. A vetoed corner is kept as a plain line.
    pub fn with_corner_classifier(mut self, classifier: impl RegionClassifier + 'static) -> Self {
        self.corner_classifier = Box::new(classifier);
        self
    }

    pub fn with_t_classifier(mut self, classifier: impl RegionClassifier + 'static) -> Self {
        self.t_classifier = Box::new(classifier);
        self
    }

    pub fn with_penalty_classifier(mut self, classifier: impl RegionClassifier + 'static) -> Self {
        self.penalty_classifier = Box::new(classifier);
        self
    }

    pub fn with_observer(mut self, observer: impl PipelineObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    #[inline]
    pub fn params(&self) -> &FieldFeatureParams {
        &self.params
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, regions, ctx), fields(regions = regions.len()))
    )]
    pub fn detect(&mut self, regions: &[Region], ctx: &FrameContext<'_>) -> Vec<FieldFeature> {
        self.run(regions, ctx, None)
    }

    /// [`Self::detect`], charging region analysis and feature building to
    /// `timings`.
    pub fn detect_timed(
        &mut self,
        regions: &[Region],
        ctx: &FrameContext<'_>,
        timings: &mut StageTimings,
    ) -> Vec<FieldFeature> {
        self.run(regions, ctx, Some(timings))
    }

    /// Shape of every region that was recognised, in region order.
    pub fn analyse(&mut self, regions: &[Region], ctx: &FrameContext<'_>) -> Vec<RegionAnalysis> {
        (0..regions.len())
            .filter_map(|index| self.analyse_region(regions, index, ctx))
            .collect()
    }

    fn run(
        &mut self,
        regions: &[Region],
        ctx: &FrameContext<'_>,
        mut timings: Option<&mut StageTimings>,
    ) -> Vec<FieldFeature> {
        let started = Instant::now();
        let analyses = self.analyse(regions, ctx);
        charge(&mut timings, "field.regions", started);

        let started = Instant::now();
        let features = aggregate(&analyses, &self.params);
        charge(&mut timings, "field.features", started);

        for feature in &features {
            self.observer.on_field_feature(feature);
        }
        if !features.is_empty() {
            info!(
                "{} field features from {} of {} regions",
                features.len(),
                analyses.len(),
                regions.len()
            );
        }
        features
    }

    fn analyse_region(
        &mut self,
        regions: &[Region],
        index: usize,
        ctx: &FrameContext<'_>,
    ) -> Option<RegionAnalysis> {
        let region = spread_region(regions, index, &self.params.border);
        self.observer.on_region_ends(index, region.ends.len());
        let field_ends = project_ends(&region, ctx);

        let shape = match region.ends.len() {
            0 if self.params.penalty_cross.enabled => {
                match penalty_cross(
                    &region,
                    ctx,
                    &mut self.scratch,
                    self.penalty_classifier.as_ref(),
                    &self.params.penalty_cross,
                ) {
                    Ok(spot) => Some(RegionShape::PenaltySpot(spot)),
                    Err(reason) => {
                        debug!("region {index} is not a penalty cross: {reason:?}");
                        None
                    }
                }
            }
            2 => classify_two_ends(
                &region,
                &field_ends,
                ctx,
                self.corner_classifier.as_ref(),
                &self.params.line,
            ),
            3 => classify_three_ends(&region, ctx, self.t_classifier.as_ref()),
            _ => None,
        };

        match shape {
            Some(shape) => {
                trace!("region {index} ({} ends): {shape:?}", region.ends.len());
                Some(RegionAnalysis {
                    index,
                    shape,
                    field_ends,
                })
            }
            None => {
                debug!(
                    "region {index} at {:?} with {} ends not recognised",
                    region.spread.bbox_raw(),
                    region.ends.len()
                );
                None
            }
        }
    }
}

fn charge(timings: &mut Option<&mut StageTimings>, stage: &'static str, started: Instant) {
    if let Some(timings) = timings.as_deref_mut() {
        timings.record(stage, started.elapsed());
    }
}
