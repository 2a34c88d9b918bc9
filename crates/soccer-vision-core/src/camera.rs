//! Image-to-robot projection and the per-frame robot state the detectors
//! read.

use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

use crate::geometry::RrCoord;
use crate::image::Camera;

/// Native resolution of both head cameras, in raw pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraGeometry {
    pub top_width: usize,
    pub top_height: usize,
    pub bottom_width: usize,
    pub bottom_height: usize,
}

impl Default for CameraGeometry {
    fn default() -> Self {
        Self {
            top_width: 1280,
            top_height: 960,
            bottom_width: 640,
            bottom_height: 480,
        }
    }
}

impl CameraGeometry {
    /// `(width, height)` of `camera`.
    pub fn size(&self, camera: Camera) -> (usize, usize) {
        match camera {
            Camera::Top => (self.top_width, self.top_height),
            Camera::Bottom => (self.bottom_width, self.bottom_height),
        }
    }
}

/// Projection from image pixels to the robot-relative ground frame.
///
/// `x` points forward and `y` to the left of the robot, in millimetres.
pub trait CameraModel: Send + Sync {
    /// Intersect the ray through raw pixel `point` of `camera` with the
    /// horizontal plane `height_mm` above the ground.
    fn image_to_robot_xy(&self, camera: Camera, point: Point2<f32>, height_mm: f32) -> Point2<f32>;

    /// Offset of a robot-relative point at `height_mm` from the neck joint.
    fn robot_relative_to_neck(&self, rr: &RrCoord, height_mm: f32) -> Vector3<f32>;

    /// Current head pitch in radians; positive tilts the head down.
    fn neck_pitch(&self) -> f32;
}

/// Pinhole cameras over a flat field.
///
/// The focal length is `sqrt(3) * width / 2`, which gives the roughly 60
/// degree horizontal field of view of the head cameras.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatGroundCamera {
    pub geometry: CameraGeometry,
    /// Lens heights above the ground, millimetres.
    pub top_height_mm: f32,
    pub bottom_height_mm: f32,
    /// Downward tilt of each optical axis, radians.
    pub top_pitch: f32,
    pub bottom_pitch: f32,
    pub neck_height_mm: f32,
    pub neck_pitch: f32,
}

impl Default for FlatGroundCamera {
    fn default() -> Self {
        Self {
            geometry: CameraGeometry::default(),
            top_height_mm: 520.0,
            bottom_height_mm: 480.0,
            top_pitch: 0.35,
            bottom_pitch: 0.95,
            neck_height_mm: 460.0,
            neck_pitch: 0.0,
        }
    }
}

/// Ground distance used for rays at or above the horizon.
const HORIZON_MM: f32 = 100_000.0;

impl CameraModel for FlatGroundCamera {
    fn image_to_robot_xy(&self, camera: Camera, point: Point2<f32>, height_mm: f32) -> Point2<f32> {
        let (w, h) = self.geometry.size(camera);
        let (lens, pitch) = match camera {
            Camera::Top => (self.top_height_mm, self.top_pitch),
            Camera::Bottom => (self.bottom_height_mm, self.bottom_pitch),
        };
        let focal = 3.0f32.sqrt() * w as f32 / 2.0;
        let left = w as f32 / 2.0 - point.x;
        let up = h as f32 / 2.0 - point.y;

        let (s, c) = pitch.sin_cos();
        let ray = Vector3::new(focal * c + up * s, left, -focal * s + up * c);
        let drop = height_mm - lens;
        if ray.z >= -1.0e-6 || drop >= 0.0 {
            let dir = Point2::new(ray.x, ray.y);
            let norm = dir.coords.norm().max(1.0e-6);
            return Point2::from(dir.coords * (HORIZON_MM / norm));
        }
        let t = drop / ray.z;
        Point2::new(ray.x * t, ray.y * t)
    }

    fn robot_relative_to_neck(&self, rr: &RrCoord, height_mm: f32) -> Vector3<f32> {
        let p = rr.to_cartesian();
        Vector3::new(p.x, p.y, height_mm - self.neck_height_mm)
    }

    fn neck_pitch(&self) -> f32 {
        self.neck_pitch
    }
}

/// Robot position on the field, millimetres and radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldPose {
    pub x: f32,
    pub y: f32,
    pub theta: f32,
}

impl FieldPose {
    /// Field coordinates of a robot-relative polar point.
    pub fn to_field(&self, rr: &RrCoord) -> Point2<f32> {
        let a = self.theta + rr.heading;
        Point2::new(
            self.x + rr.distance * a.cos(),
            self.y + rr.distance * a.sin(),
        )
    }
}

/// Everything a detector needs to know about the robot for one frame.
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    pub camera: &'a dyn CameraModel,
    pub pose: FieldPose,
    /// Sideways body lean, radians.
    pub lean_x: f32,
    /// First field row of the top camera per raw column; empty when unknown.
    pub top_field_boundary: &'a [i32],
}

impl<'a> FrameContext<'a> {
    pub fn new(camera: &'a dyn CameraModel) -> Self {
        Self {
            camera,
            pose: FieldPose::default(),
            lean_x: 0.0,
            top_field_boundary: &[],
        }
    }

    pub fn with_pose(mut self, pose: FieldPose) -> Self {
        self.pose = pose;
        self
    }

    pub fn with_lean(mut self, lean_x: f32) -> Self {
        self.lean_x = lean_x;
        self
    }

    pub fn with_field_boundary(mut self, rows: &'a [i32]) -> Self {
        self.top_field_boundary = rows;
        self
    }

    /// Field-boundary row at raw column `x` of the top camera.
    pub fn boundary_at(&self, x: i32) -> Option<i32> {
        usize::try_from(x)
            .ok()
            .and_then(|x| self.top_field_boundary.get(x))
            .copied()
    }
}

impl std::fmt::Debug for FrameContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameContext")
            .field("pose", &self.pose)
            .field("lean_x", &self.lean_x)
            .field("boundary_columns", &self.top_field_boundary.len())
            .finish_non_exhaustive()
    }
}
