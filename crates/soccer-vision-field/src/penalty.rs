//! Penalty cross test for regions with no border ends.

use log::trace;
use nalgebra::Point2;

use soccer_vision_core::{distance_sq, CcaScratch, Colour, FrameContext, Region, RegionClassifier};

use crate::classify::project_raw;
use crate::params::PenaltyCrossParams;
use crate::spread::SpreadRegion;

/// Why a zero-end region is not a penalty cross.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PenaltyRejection {
    Aspect,
    HollowCentre,
    HasNeighbours,
    TooFar,
    Size,
    DarkGroups,
    TooFewWhites,
    BodyPart,
    Classifier,
}

/// Robot-relative position of a penalty cross, or the first check that
/// failed. The cheap geometric checks run first.
pub fn penalty_cross(
    region: &SpreadRegion,
    ctx: &FrameContext<'_>,
    scratch: &mut CcaScratch,
    classifier: &dyn RegionClassifier,
    params: &PenaltyCrossParams,
) -> Result<Point2<i32>, PenaltyRejection> {
    let spread = &region.spread;
    let (cols, rows) = (spread.cols(), spread.rows());
    if cols == 0 || rows == 0 {
        return Err(PenaltyRejection::Aspect);
    }
    let aspect = cols as f32 / rows as f32;
    if aspect < params.min_aspect || aspect > params.max_aspect {
        return Err(PenaltyRejection::Aspect);
    }
    if !spread.is_white(cols / 2, rows / 2) {
        return Err(PenaltyRejection::HollowCentre);
    }
    if !region.neighbours.is_empty() {
        return Err(PenaltyRejection::HasNeighbours);
    }

    let bbox = spread.bbox_raw();
    let a = project_raw(ctx, spread.camera(), bbox.a);
    let b = project_raw(ctx, spread.camera(), bbox.b);
    let origin = Point2::origin();
    if distance_sq(a, origin) > params.max_distance_sq || distance_sq(b, origin) > params.max_distance_sq {
        return Err(PenaltyRejection::TooFar);
    }
    let diagonal = distance_sq(a, b);
    if diagonal < params.min_diagonal_sq || diagonal > params.max_diagonal_sq {
        return Err(PenaltyRejection::Size);
    }

    let top = spread.is_top_camera();
    let padded = &region.padded;
    let min_count = if top {
        params.min_group_count_top
    } else {
        params.min_group_count_bottom
    };
    let dark_groups = scratch
        .label_not_white(padded, None)
        .groups()
        .filter(|g| g.count >= min_count)
        .count();
    trace!("penalty cross candidate has {dark_groups} dark groups");
    if dark_groups > params.max_dark_groups {
        return Err(PenaltyRejection::DarkGroups);
    }
    let min_whites = if top {
        params.min_whites_top
    } else {
        params.min_whites_bottom
    };
    if padded.white_count() < min_whites {
        return Err(PenaltyRejection::TooFewWhites);
    }
    if has_body_part(padded) {
        return Err(PenaltyRejection::BodyPart);
    }
    if !classifier.predict(spread) {
        return Err(PenaltyRejection::Classifier);
    }
    Ok(Point2::new((a.x + b.x) / 2, (a.y + b.y) / 2))
}

fn has_body_part(region: &Region) -> bool {
    region.colours().contains(&Colour::BodyPart)
}
