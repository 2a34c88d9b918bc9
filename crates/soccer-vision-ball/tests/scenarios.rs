use std::sync::{Arc, Mutex};

use nalgebra::{Point2, Vector3};
use soccer_vision_ball::{BallDetector, BallDetectorParams};
use soccer_vision_core::{
    BBox, BallStage, Camera, CameraFrame, CameraModel, CountingObserver, FieldPose, FrameContext,
    Region, RejectAll, RrCoord, StageTimings,
};

const WIDTH: usize = 640;
const HEIGHT: usize = 480;

/// Every ball sits one metre ahead; the neck distance controls the size
/// estimate.
struct FixedCamera {
    neck: f32,
}

impl CameraModel for FixedCamera {
    fn image_to_robot_xy(&self, _: Camera, _: Point2<f32>, _: f32) -> Point2<f32> {
        Point2::new(1000.0, 0.0)
    }

    fn robot_relative_to_neck(&self, _: &RrCoord, _: f32) -> Vector3<f32> {
        Vector3::new(self.neck, 0.0, 0.0)
    }

    fn neck_pitch(&self) -> f32 {
        0.0
    }
}

/// Bright disk of radius 24 at (320, 240) on a dark field, optionally with
/// three dark patches of radius 8 on a triangle of side 21.
fn ball_frame(camera: Camera, patches: bool) -> Arc<CameraFrame> {
    let (cx, cy, r) = (320.0f64, 240.0f64, 24.0f64);
    let rho = 21.0 / 3.0f64.sqrt();
    let centres: Vec<(f64, f64)> = (0..3)
        .map(|i| {
            let a = -std::f64::consts::FRAC_PI_2 + f64::from(i) * 2.0 * std::f64::consts::PI / 3.0;
            (cx + rho * a.cos(), cy + rho * a.sin())
        })
        .collect();

    let mut luma = vec![60u8; WIDTH * HEIGHT];
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let (fx, fy) = (x as f64, y as f64);
            if (fx - cx).powi(2) + (fy - cy).powi(2) > r * r {
                continue;
            }
            let dark = patches
                && centres
                    .iter()
                    .any(|&(bx, by)| (fx - bx).powi(2) + (fy - by).powi(2) <= 64.0);
            luma[y * WIDTH + x] = if dark { 30 } else { 220 };
        }
    }
    Arc::new(CameraFrame::from_luma(camera, WIDTH, HEIGHT, luma, 128).expect("valid frame"))
}

/// Saliency region hugging the disk.
fn ball_region(frame: Arc<CameraFrame>) -> Region {
    Region::new(frame, BBox::from_coords(296, 216, 345, 265), 1)
}

fn detector_with_observer(params: BallDetectorParams) -> (BallDetector, Arc<Mutex<CountingObserver>>) {
    let observer = Arc::new(Mutex::new(CountingObserver::default()));
    let detector = BallDetector::new(params).with_observer(observer.clone());
    (detector, observer)
}

#[test]
fn textured_ball_is_detected() {
    let camera = FixedCamera { neck: 1000.0 };
    let ctx = FrameContext::new(&camera);
    let (mut detector, observer) = detector_with_observer(BallDetectorParams::default());

    let balls = detector.detect(&[ball_region(ball_frame(Camera::Bottom, true))], &ctx);
    assert_eq!(balls.len(), 1, "expected exactly one ball");
    let ball = &balls[0];
    assert_eq!(ball.image_centre, Point2::new(320.0, 239.0));
    assert_eq!(ball.radius, 23.0);
    assert!(!ball.top_camera);
    // One metre ahead, shortened by the distance correction.
    assert!((ball.rr.distance - 940.0).abs() < 0.5, "distance {}", ball.rr.distance);

    let seen = observer.lock().unwrap();
    assert_eq!(seen.candidates, 1);
    assert_eq!(seen.balls, 1);
    assert!(seen.rejections.is_empty(), "unexpected rejections {:?}", seen.rejections);
}

#[test]
fn uniform_disk_is_a_simple_blob() {
    let camera = FixedCamera { neck: 1000.0 };
    let ctx = FrameContext::new(&camera);
    let (mut detector, observer) = detector_with_observer(BallDetectorParams::default());

    let balls = detector.detect(&[ball_region(ball_frame(Camera::Bottom, false))], &ctx);
    assert!(balls.is_empty());
    let seen = observer.lock().unwrap();
    assert_eq!(seen.rejections, vec![BallStage::SimpleBlob]);
    assert_eq!(seen.candidates, 0);
}

#[test]
fn top_camera_region_above_boundary_is_skipped() {
    let camera = FixedCamera { neck: 1000.0 };
    let boundary = vec![300; WIDTH];
    let ctx = FrameContext::new(&camera).with_field_boundary(&boundary);
    let (mut detector, observer) = detector_with_observer(BallDetectorParams::default());

    let balls = detector.detect(&[ball_region(ball_frame(Camera::Top, true))], &ctx);
    assert!(balls.is_empty());
    assert_eq!(observer.lock().unwrap().rejections, vec![BallStage::FieldBoundary]);
}

#[test]
fn implausibly_small_estimate_is_rejected() {
    // A short neck distance makes the 49 pixel region read as a 9 mm ball.
    let camera = FixedCamera { neck: 100.0 };
    let ctx = FrameContext::new(&camera);
    let (mut detector, observer) = detector_with_observer(BallDetectorParams::default());

    let balls = detector.detect(&[ball_region(ball_frame(Camera::Bottom, true))], &ctx);
    assert!(balls.is_empty());
    assert_eq!(observer.lock().unwrap().rejections, vec![BallStage::SizeEstimate]);
}

#[test]
fn classifier_veto_drops_the_ball() {
    let camera = FixedCamera { neck: 1000.0 };
    let ctx = FrameContext::new(&camera);
    let observer = Arc::new(Mutex::new(CountingObserver::default()));
    let mut detector = BallDetector::new(BallDetectorParams::default())
        .with_classifier(RejectAll)
        .with_observer(observer.clone());

    let balls = detector.detect(&[ball_region(ball_frame(Camera::Bottom, true))], &ctx);
    assert!(balls.is_empty());
    let seen = observer.lock().unwrap();
    assert_eq!(seen.rejections.first(), Some(&BallStage::Classifier));
    assert_eq!(seen.balls, 0);
}

#[test]
fn ball_outside_the_field_ends_the_search_without_a_detection() {
    let camera = FixedCamera { neck: 1000.0 };
    // Standing near the far goal line, facing out: the ball lands 5.9 m from
    // the centre spot.
    let ctx = FrameContext::new(&camera).with_pose(FieldPose {
        x: 5000.0,
        y: 0.0,
        theta: 0.0,
    });
    let (mut detector, observer) = detector_with_observer(BallDetectorParams::default());

    let region = ball_region(ball_frame(Camera::Bottom, true));
    let balls = detector.detect(&[region.clone(), region], &ctx);
    assert!(balls.is_empty());
    let seen = observer.lock().unwrap();
    assert_eq!(seen.rejections, vec![BallStage::OffField]);
    assert_eq!(seen.candidates, 1, "early exit stops after the first inspected ball");
}

#[test]
fn timed_detection_charges_refinement_and_inspection() {
    let camera = FixedCamera { neck: 1000.0 };
    let ctx = FrameContext::new(&camera);
    let mut detector = BallDetector::new(BallDetectorParams::default());
    let mut timings = StageTimings::new(0);

    let balls = detector.detect_timed(&[ball_region(ball_frame(Camera::Bottom, true))], &ctx, &mut timings);
    assert_eq!(balls.len(), 1);
    let stages: Vec<(String, u64)> = timings
        .snapshot()
        .into_iter()
        .map(|s| (s.stage, s.calls))
        .collect();
    assert_eq!(
        stages,
        vec![("ball.inspect".to_string(), 1), ("ball.roi".to_string(), 1)]
    );
}
