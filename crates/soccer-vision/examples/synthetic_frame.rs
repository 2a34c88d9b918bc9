//! Run the vision pipeline over one frame.
//!
//! Without `--image` a bottom-camera frame holding a T-junction and a ball is
//! drawn. Saliency regions are a coarse tiling: every tile with white pixels
//! becomes one region.
//!
//! ```text
//! cargo run -p soccer-vision --example synthetic_frame -- --out found.json
//! cargo run -p soccer-vision --example synthetic_frame -- --image frame.png --config vision.json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use image::ImageReader;
use soccer_vision::core::{BBox, Camera, CameraFrame, Colour, FrameContext, Region};
use soccer_vision::{VisionConfig, VisionPipeline};

#[derive(Parser, Debug)]
#[command(about = "Detect balls and field features in one frame")]
struct Cli {
    /// Grayscale input; a synthetic frame is drawn when omitted.
    #[arg(long)]
    image: Option<PathBuf>,

    /// JSON config; defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective config here and exit.
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Treat `--image` as a top-camera frame.
    #[arg(long)]
    top: bool,

    /// Luminance at or above which a pixel is saliency-white.
    #[arg(long, default_value = "128")]
    threshold: u8,

    /// Tile edge in pixels for the coarse saliency regions.
    #[arg(long, default_value = "40")]
    tile: usize,

    /// Write the detections as JSON.
    #[arg(long)]
    out: Option<PathBuf>,
}

const WIDTH: usize = 640;
const HEIGHT: usize = 480;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "tracing")]
    soccer_vision::core::init_tracing(false);
    #[cfg(not(feature = "tracing"))]
    soccer_vision::core::init_from_env(log::LevelFilter::Info)?;

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => VisionConfig::load_json(path)?,
        None => VisionConfig::default(),
    };
    if let Some(path) = &cli.write_config {
        config.write_json(path)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let frame = match &cli.image {
        Some(path) => {
            let img = ImageReader::open(path)?.decode()?.to_luma8();
            let (w, h) = (img.width() as usize, img.height() as usize);
            let camera = if cli.top { Camera::Top } else { Camera::Bottom };
            CameraFrame::from_luma(camera, w, h, img.into_raw(), cli.threshold)?
        }
        None => CameraFrame::from_luma(Camera::Bottom, WIDTH, HEIGHT, draw_frame(), cli.threshold)?,
    };
    let regions = tile_regions(Arc::new(frame), cli.tile.max(4));

    let ctx = FrameContext::new(&config.camera);
    let mut pipeline = VisionPipeline::from_config(&config);
    let output = pipeline.process(&regions, &ctx);

    println!("{} regions", regions.len());
    for ball in &output.balls {
        println!(
            "ball at ({:.0}, {:.0}) r {:.1} px, {:.0} mm away",
            ball.image_centre.x, ball.image_centre.y, ball.radius, ball.rr.distance
        );
    }
    for feature in &output.features {
        let rr = feature.rr();
        println!(
            "{:>14} {:>6.0} mm {:>6.1} deg",
            feature.name(),
            rr.distance,
            rr.heading.to_degrees()
        );
    }
    for stage in pipeline.timings().snapshot() {
        println!("{:>16} {:>8.3} ms", stage.stage, stage.ms_per_frame);
    }

    if let Some(path) = &cli.out {
        std::fs::write(path, serde_json::to_string_pretty(&output)?)?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

/// Dark green field with a T-junction and a ball with three dark patches.
fn draw_frame() -> Vec<u8> {
    let (bx, by, br) = (470.0f64, 360.0f64, 30.0f64);
    let patches: Vec<(f64, f64)> = (0..3)
        .map(|i| {
            let a = -std::f64::consts::FRAC_PI_2 + f64::from(i) * 2.0 * std::f64::consts::PI / 3.0;
            (bx + 15.0 * a.cos(), by + 15.0 * a.sin())
        })
        .collect();

    let mut luma = vec![60u8; WIDTH * HEIGHT];
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let bar = (150..158).contains(&y) && (80..560).contains(&x);
            let stem = (158..420).contains(&y) && (236..244).contains(&x);
            if bar || stem {
                luma[y * WIDTH + x] = 230;
            }

            let (fx, fy) = (x as f64, y as f64);
            if (fx - bx).powi(2) + (fy - by).powi(2) <= br * br {
                let dark = patches
                    .iter()
                    .any(|&(px, py)| (fx - px).powi(2) + (fy - py).powi(2) <= 81.0);
                luma[y * WIDTH + x] = if dark { 30 } else { 220 };
            }
        }
    }
    luma
}

fn tile_regions(frame: Arc<CameraFrame>, tile: usize) -> Vec<Region> {
    let (w, h) = (frame.width(), frame.height());
    let mut regions = Vec::new();
    for y0 in (0..h).step_by(tile) {
        for x0 in (0..w).step_by(tile) {
            let (x1, y1) = ((x0 + tile).min(w), (y0 + tile).min(h));
            let any_white = (y0..y1).any(|y| (x0..x1).any(|x| frame.colour(x, y) == Colour::White));
            if any_white {
                let bbox = BBox::from_coords(x0 as i32, y0 as i32, x1 as i32, y1 as i32);
                regions.push(Region::new(frame.clone(), bbox, 1));
            }
        }
    }
    regions
}
