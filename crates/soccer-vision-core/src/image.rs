//! Camera frames: raw luminance plus a saliency colour classification.

use serde::{Deserialize, Serialize};

use crate::FrameError;

/// Which of the two head cameras produced a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Camera {
    Top,
    Bottom,
}

impl Camera {
    #[inline]
    pub fn is_top(self) -> bool {
        matches!(self, Camera::Top)
    }
}

/// Classified saliency colour of a pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Colour {
    #[default]
    Background,
    White,
    Green,
    Black,
    BodyPart,
}

/// One full-resolution camera image.
///
/// `luma` and `colours` are row-major with `width * height` samples each.
#[derive(Clone, Debug)]
pub struct CameraFrame {
    camera: Camera,
    width: usize,
    height: usize,
    luma: Vec<u8>,
    colours: Vec<Colour>,
}

impl CameraFrame {
    pub fn new(
        camera: Camera,
        width: usize,
        height: usize,
        luma: Vec<u8>,
        colours: Vec<Colour>,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyFrame { width, height });
        }
        let expected = width * height;
        if luma.len() != expected {
            return Err(FrameError::PlaneSize {
                plane: "luma",
                expected,
                actual: luma.len(),
            });
        }
        if colours.len() != expected {
            return Err(FrameError::PlaneSize {
                plane: "colour",
                expected,
                actual: colours.len(),
            });
        }
        Ok(Self {
            camera,
            width,
            height,
            luma,
            colours,
        })
    }

    /// Build a frame whose colour plane is a global luminance threshold:
    /// pixels at or above `white_threshold` are white, the rest green.
    pub fn from_luma(
        camera: Camera,
        width: usize,
        height: usize,
        luma: Vec<u8>,
        white_threshold: u8,
    ) -> Result<Self, FrameError> {
        let colours = luma
            .iter()
            .map(|&v| {
                if v >= white_threshold {
                    Colour::White
                } else {
                    Colour::Green
                }
            })
            .collect();
        Self::new(camera, width, height, luma, colours)
    }

    #[inline]
    pub fn camera(&self) -> Camera {
        self.camera
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Luminance at `(x, y)`. Coordinates must be inside the frame.
    #[inline]
    pub fn luma(&self, x: usize, y: usize) -> u8 {
        self.luma[y * self.width + x]
    }

    /// Saliency colour at `(x, y)`. Coordinates must be inside the frame.
    #[inline]
    pub fn colour(&self, x: usize, y: usize) -> Colour {
        self.colours[y * self.width + x]
    }

    pub fn luma_plane(&self) -> &[u8] {
        &self.luma
    }
}

/// Local-window adaptive threshold over a row-major luminance buffer.
///
/// A pixel is white when `raw * count * 100 > window_sum * (100 - percentage)`,
/// i.e. when it is brighter than the window mean lowered by `percentage`
/// percent. The window is square, centred, clipped to the buffer, and clamped
/// to an odd size no larger than `min(width, height) - 1`.
pub fn adaptive_white_mask(
    width: usize,
    height: usize,
    luma: &[u8],
    window: i32,
    percentage: i32,
) -> Vec<bool> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let mut size = window.min(width.min(height) as i32 - 1);
    if size % 2 == 0 {
        size -= 1;
    }
    let half = (size.max(1) / 2) as usize;

    // (width + 1) x (height + 1) summed-area table.
    let stride = width + 1;
    let mut integral = vec![0i64; stride * (height + 1)];
    for y in 0..height {
        let mut row_sum = 0i64;
        for x in 0..width {
            row_sum += i64::from(luma[y * width + x]);
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    let bias = i64::from(100 - percentage);
    let mut mask = Vec::with_capacity(width * height);
    for y in 0..height {
        let y0 = y.saturating_sub(half);
        let y1 = (y + half).min(height - 1) + 1;
        for x in 0..width {
            let x0 = x.saturating_sub(half);
            let x1 = (x + half).min(width - 1) + 1;
            let sum = integral[y1 * stride + x1] - integral[y0 * stride + x1]
                - integral[y1 * stride + x0]
                + integral[y0 * stride + x0];
            let count = ((x1 - x0) * (y1 - y0)) as i64;
            let raw = i64::from(luma[y * width + x]);
            mask.push(raw * count * 100 > sum * bias);
        }
    }
    mask
}
