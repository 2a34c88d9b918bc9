//! Detection records handed to localisation.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::geometry::RrCoord;

/// A localisation landmark, robot-relative.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldFeature {
    /// A straight field line; `rr` is the closest point on the infinite line
    /// and `p1`/`p2` are its ends in robot-relative millimetres.
    Line {
        rr: RrCoord,
        p1: Point2<i32>,
        p2: Point2<i32>,
    },
    Corner {
        rr: RrCoord,
    },
    TJunction {
        rr: RrCoord,
    },
    CentreCircle {
        rr: RrCoord,
    },
    PenaltySpot {
        rr: RrCoord,
    },
}

impl FieldFeature {
    pub fn rr(&self) -> &RrCoord {
        match self {
            FieldFeature::Line { rr, .. }
            | FieldFeature::Corner { rr }
            | FieldFeature::TJunction { rr }
            | FieldFeature::CentreCircle { rr }
            | FieldFeature::PenaltySpot { rr } => rr,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldFeature::Line { .. } => "line",
            FieldFeature::Corner { .. } => "corner",
            FieldFeature::TJunction { .. } => "t_junction",
            FieldFeature::CentreCircle { .. } => "centre_circle",
            FieldFeature::PenaltySpot { .. } => "penalty_spot",
        }
    }
}

/// An accepted ball.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BallDetection {
    pub rr: RrCoord,
    /// Centre in raw pixels of the camera that saw it.
    pub image_centre: Point2<f32>,
    /// Radius in raw pixels.
    pub radius: f32,
    pub top_camera: bool,
}
