//! Learned-classifier gates, reduced to a yes/no veto over a region.

use crate::region::Region;

/// Final binary gate applied to a candidate region.
///
/// Implementations are opaque to the detectors; a `false` rejects the
/// candidate with no retry.
pub trait RegionClassifier: Send + Sync {
    fn predict(&self, region: &Region) -> bool;
}

/// Gate that lets every candidate through.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl RegionClassifier for AcceptAll {
    fn predict(&self, _region: &Region) -> bool {
        true
    }
}

/// Gate that vetoes every candidate.
#[derive(Clone, Copy, Debug, Default)]
pub struct RejectAll;

impl RegionClassifier for RejectAll {
    fn predict(&self, _region: &Region) -> bool {
        false
    }
}

impl<F> RegionClassifier for F
where
    F: Fn(&Region) -> bool + Send + Sync,
{
    fn predict(&self, region: &Region) -> bool {
        self(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{Camera, CameraFrame};
    use std::sync::Arc;

    #[test]
    fn closures_and_constants_gate_regions() {
        let frame = CameraFrame::from_luma(Camera::Top, 4, 4, vec![255; 16], 128).unwrap();
        let region = Region::whole_frame(Arc::new(frame), 1);
        let mostly_white = |r: &Region| r.white_count() * 2 > r.cols() * r.rows();

        let gates: [&dyn RegionClassifier; 3] = [&AcceptAll, &RejectAll, &mostly_white];
        let verdicts: Vec<bool> = gates.iter().map(|g| g.predict(&region)).collect();
        assert_eq!(verdicts, vec![true, false, true]);
    }
}
