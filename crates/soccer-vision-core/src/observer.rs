//! Optional instrumentation hooks.
//!
//! Detectors report what they see to a [`PipelineObserver`]; every method
//! has an empty default, so an observer only overrides what it cares about.
//! Detection results never depend on the observer.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::features::{BallDetection, FieldFeature};
use crate::region::Region;

/// Where in the ball pipeline a candidate was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BallStage {
    FieldBoundary,
    SimpleBlob,
    SizeEstimate,
    Brightness,
    CircleFit,
    Radius,
    RawRange,
    InternalRegionCount,
    InternalRegions,
    InternalLayout,
    Triangles,
    Classifier,
    OffField,
}

pub trait PipelineObserver: Send {
    /// A refined candidate is about to be inspected.
    fn on_ball_candidate(&mut self, _region: &Region) {}

    fn on_ball_rejected(&mut self, _region: &Region, _stage: BallStage) {}

    fn on_ball_accepted(&mut self, _ball: &BallDetection) {}

    /// Border analysis of field region `index` found `ends` white runs.
    fn on_region_ends(&mut self, _index: usize, _ends: usize) {}

    fn on_field_feature(&mut self, _feature: &FieldFeature) {}
}

/// Observer that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Observer that keeps counters, handy in tests and offline tools.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CountingObserver {
    pub candidates: usize,
    pub rejections: Vec<BallStage>,
    pub balls: usize,
    pub region_ends: Vec<(usize, usize)>,
    pub features: usize,
}

impl PipelineObserver for CountingObserver {
    fn on_ball_candidate(&mut self, _region: &Region) {
        self.candidates += 1;
    }

    fn on_ball_rejected(&mut self, _region: &Region, stage: BallStage) {
        self.rejections.push(stage);
    }

    fn on_ball_accepted(&mut self, _ball: &BallDetection) {
        self.balls += 1;
    }

    fn on_region_ends(&mut self, index: usize, ends: usize) {
        self.region_ends.push((index, ends));
    }

    fn on_field_feature(&mut self, _feature: &FieldFeature) {
        self.features += 1;
    }
}

/// Lets a caller keep a handle on an observer that a detector owns.
impl<T: PipelineObserver> PipelineObserver for Arc<Mutex<T>> {
    fn on_ball_candidate(&mut self, region: &Region) {
        if let Ok(mut inner) = self.lock() {
            inner.on_ball_candidate(region);
        }
    }

    fn on_ball_rejected(&mut self, region: &Region, stage: BallStage) {
        if let Ok(mut inner) = self.lock() {
            inner.on_ball_rejected(region, stage);
        }
    }

    fn on_ball_accepted(&mut self, ball: &BallDetection) {
        if let Ok(mut inner) = self.lock() {
            inner.on_ball_accepted(ball);
        }
    }

    fn on_region_ends(&mut self, index: usize, ends: usize) {
        if let Ok(mut inner) = self.lock() {
            inner.on_region_ends(index, ends);
        }
    }

    fn on_field_feature(&mut self, feature: &FieldFeature) {
        if let Ok(mut inner) = self.lock() {
            inner.on_field_feature(feature);
        }
    }
}
