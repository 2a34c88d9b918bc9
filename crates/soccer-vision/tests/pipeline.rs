use std::sync::{Arc, Mutex};

use approx::assert_abs_diff_eq;
use nalgebra::{Point2, Vector3};
use soccer_vision::core::{
    BBox, Camera, CameraFrame, CameraModel, CountingObserver, FrameContext, Region, RrCoord,
};
use soccer_vision::{ConfigError, FieldFeature, VisionConfig, VisionPipeline};

/// Straight down, 40 mm per pixel, robot at image (320, 265).
struct OverheadCamera;

impl CameraModel for OverheadCamera {
    fn image_to_robot_xy(&self, _: Camera, p: Point2<f32>, _: f32) -> Point2<f32> {
        Point2::new(10600.0 - 40.0 * p.y, 40.0 * (320.0 - p.x))
    }

    fn robot_relative_to_neck(&self, _: &RrCoord, _: f32) -> Vector3<f32> {
        Vector3::zeros()
    }

    fn neck_pitch(&self) -> f32 {
        0.0
    }
}

fn t_regions() -> Vec<Region> {
    let (w, h) = (640usize, 480usize);
    let luma = (0..w * h)
        .map(|i| {
            let (x, y) = (i % w, i / w);
            let white = ((210..214).contains(&y) && (250..390).contains(&x))
                || ((214..300).contains(&y) && (318..322).contains(&x));
            if white {
                230
            } else {
                40
            }
        })
        .collect();
    let frame = Arc::new(CameraFrame::from_luma(Camera::Bottom, w, h, luma, 128).expect("valid frame"));
    vec![Region::new(frame, BBox::from_coords(300, 200, 340, 230), 1)]
}

#[test]
fn pipeline_finds_the_t_junction_and_times_both_detectors() {
    let camera = OverheadCamera;
    let ctx = FrameContext::new(&camera);
    let observer = Arc::new(Mutex::new(CountingObserver::default()));
    let mut pipeline = VisionPipeline::from_config(&VisionConfig::default()).with_observer(observer.clone());

    let output = pipeline.process(&t_regions(), &ctx);
    let ts: Vec<&FieldFeature> = output
        .features
        .iter()
        .filter(|f| f.name() == "t_junction")
        .collect();
    assert_eq!(ts.len(), 1, "features: {:?}", output.features);
    assert_abs_diff_eq!(ts[0].rr().distance, 2160.0, epsilon = 1.0);

    let stages: Vec<String> = pipeline.timings().snapshot().into_iter().map(|s| s.stage).collect();
    for stage in ["ball.roi", "field.regions", "field.features"] {
        assert!(stages.iter().any(|s| s == stage), "missing {stage} in {stages:?}");
    }
    let seen = observer.lock().expect("observer lock");
    assert_eq!(seen.region_ends, vec![(0, 3)]);
}

#[test]
fn config_round_trips_through_a_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("vision.json");

    let mut config = VisionConfig::default();
    config.ball.early_exit = false;
    config.field.penalty_cross.enabled = true;
    config.report_every = 30;
    config.write_json(&path).expect("write config");

    let loaded = VisionConfig::load_json(&path).expect("load config");
    assert_eq!(loaded, config);
}

#[test]
fn partial_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("partial.json");
    std::fs::write(&path, r#"{ "report_every": 0 }"#).expect("write");

    let loaded = VisionConfig::load_json(&path).expect("load config");
    assert_eq!(loaded.report_every, 0);
    assert_eq!(loaded.ball, VisionConfig::default().ball);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = VisionConfig::load_json(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)), "got {err:?}");
}
