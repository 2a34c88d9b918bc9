//! Rectangular sub-windows of a camera frame at a given pixel density.
//!
//! Two coordinate frames are in play everywhere:
//! - *raw*: full-resolution pixels of the camera frame,
//! - *local*: region pixels, where one local step is `density` raw pixels.

use std::sync::Arc;

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::image::{adaptive_white_mask, Camera, CameraFrame, Colour};

/// Axis-aligned box with inclusive `a` and exclusive `b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox {
    pub a: Point2<i32>,
    pub b: Point2<i32>,
}

impl BBox {
    pub fn new(a: Point2<i32>, b: Point2<i32>) -> Self {
        Self { a, b }
    }

    pub fn from_coords(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self::new(Point2::new(x0, y0), Point2::new(x1, y1))
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.b.x - self.a.x
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.b.y - self.a.y
    }

    #[inline]
    pub fn area(&self) -> i64 {
        i64::from(self.width().max(0)) * i64::from(self.height().max(0))
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn centre(&self) -> Point2<f32> {
        Point2::new(
            self.a.x as f32 + self.width() as f32 * 0.5,
            self.a.y as f32 + self.height() as f32 * 0.5,
        )
    }

    /// Overlap of two boxes; empty when they do not intersect.
    pub fn intersection(&self, other: &BBox) -> BBox {
        BBox::from_coords(
            self.a.x.max(other.a.x),
            self.a.y.max(other.a.y),
            self.b.x.min(other.b.x),
            self.b.y.min(other.b.y),
        )
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox::from_coords(
            self.a.x.min(other.a.x),
            self.a.y.min(other.a.y),
            self.b.x.max(other.b.x),
            self.b.y.max(other.b.y),
        )
    }

    pub fn expanded(&self, dx: i32, dy: i32) -> BBox {
        BBox::from_coords(self.a.x - dx, self.a.y - dy, self.b.x + dx, self.b.y + dy)
    }

    pub fn clamped(&self, width: i32, height: i32) -> BBox {
        BBox::from_coords(
            self.a.x.clamp(0, width),
            self.a.y.clamp(0, height),
            self.b.x.clamp(0, width),
            self.b.y.clamp(0, height),
        )
    }
}

/// A classified window into a shared [`CameraFrame`].
///
/// Regions are cheap to derive: every refinement produces a new owned
/// `Region` and the previous one is simply dropped.
#[derive(Clone, Debug)]
pub struct Region {
    frame: Arc<CameraFrame>,
    bbox: BBox,
    density: u32,
    cols: usize,
    rows: usize,
    colours: Vec<Colour>,
}

impl Region {
    /// Window over `bbox` (raw coordinates, clamped to the frame), sampled
    /// every `density` raw pixels. Colours are taken from the frame.
    pub fn new(frame: Arc<CameraFrame>, bbox: BBox, density: u32) -> Self {
        let density = density.max(1);
        let bbox = bbox.clamped(frame.width() as i32, frame.height() as i32);
        let d = density as i32;
        let cols = (bbox.width().max(0) / d) as usize;
        let rows = (bbox.height().max(0) / d) as usize;
        let mut colours = Vec::with_capacity(cols * rows);
        for y in 0..rows {
            let ry = (bbox.a.y + y as i32 * d) as usize;
            for x in 0..cols {
                let rx = (bbox.a.x + x as i32 * d) as usize;
                colours.push(frame.colour(rx, ry));
            }
        }
        Self {
            frame,
            bbox,
            density,
            cols,
            rows,
            colours,
        }
    }

    /// Region covering the whole frame.
    pub fn whole_frame(frame: Arc<CameraFrame>, density: u32) -> Self {
        let bbox = BBox::from_coords(0, 0, frame.width() as i32, frame.height() as i32);
        Self::new(frame, bbox, density)
    }

    #[inline]
    pub fn frame(&self) -> &Arc<CameraFrame> {
        &self.frame
    }

    #[inline]
    pub fn camera(&self) -> Camera {
        self.frame.camera()
    }

    #[inline]
    pub fn is_top_camera(&self) -> bool {
        self.frame.camera().is_top()
    }

    /// Bounding box in raw frame pixels.
    #[inline]
    pub fn bbox_raw(&self) -> BBox {
        self.bbox
    }

    /// Bounding box in local pixels; always anchored at the origin.
    #[inline]
    pub fn bbox_local(&self) -> BBox {
        BBox::from_coords(0, 0, self.cols as i32, self.rows as i32)
    }

    #[inline]
    pub fn density(&self) -> u32 {
        self.density
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cols == 0 || self.rows == 0
    }

    #[inline]
    pub fn colour(&self, x: usize, y: usize) -> Colour {
        self.colours[y * self.cols + x]
    }

    #[inline]
    pub fn is_white(&self, x: usize, y: usize) -> bool {
        self.colour(x, y) == Colour::White
    }

    /// White test with signed coordinates; outside the region is not white.
    #[inline]
    pub fn is_white_at(&self, x: i32, y: i32) -> bool {
        self.contains(x, y) && self.is_white(x as usize, y as usize)
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.cols && (y as usize) < self.rows
    }

    /// Raw luminance under local pixel `(x, y)`.
    #[inline]
    pub fn raw(&self, x: usize, y: usize) -> u8 {
        let d = self.density as usize;
        self.frame.luma(
            self.bbox.a.x as usize + x * d,
            self.bbox.a.y as usize + y * d,
        )
    }

    pub fn colours(&self) -> &[Colour] {
        &self.colours
    }

    /// Map a local point to raw frame pixels.
    pub fn local_to_raw(&self, p: Point2<f32>) -> Point2<f32> {
        let d = self.density as f32;
        Point2::new(self.bbox.a.x as f32 + p.x * d, self.bbox.a.y as f32 + p.y * d)
    }

    /// Where this region's origin sits in `other`'s local frame.
    pub fn origin_in(&self, other: &Region) -> Vector2<i32> {
        let d = other.density as i32;
        Vector2::new(
            (self.bbox.a.x - other.bbox.a.x) / d,
            (self.bbox.a.y - other.bbox.a.y) / d,
        )
    }

    /// Same-density window given in local coordinates (`b` exclusive).
    ///
    /// The result is clipped to the camera frame, not to this region, so a
    /// sub-region may extend past the parent's edges.
    pub fn sub_region(&self, a: Point2<i32>, b: Point2<i32>) -> Region {
        let d = self.density as i32;
        let bbox = BBox::new(
            Point2::new(self.bbox.a.x + a.x * d, self.bbox.a.y + a.y * d),
            Point2::new(self.bbox.a.x + b.x * d, self.bbox.a.y + b.y * d),
        );
        Region::new(self.frame.clone(), bbox, self.density)
    }

    /// Same window sampled `factor` times more finely.
    pub fn zoom_in(&self, factor: u32) -> Region {
        let density = (self.density / factor.max(1)).max(1);
        Region::new(self.frame.clone(), self.bbox, density)
    }

    /// Same window with colours recomputed by local adaptive thresholding
    /// of the raw luminance (white or green only).
    pub fn reclassify(&self, window: i32, percentage: i32) -> Region {
        let mut luma = Vec::with_capacity(self.cols * self.rows);
        for y in 0..self.rows {
            for x in 0..self.cols {
                luma.push(self.raw(x, y));
            }
        }
        let mask = adaptive_white_mask(self.cols, self.rows, &luma, window, percentage);
        let colours = mask
            .into_iter()
            .map(|white| if white { Colour::White } else { Colour::Green })
            .collect();
        Region {
            frame: self.frame.clone(),
            bbox: self.bbox,
            density: self.density,
            cols: self.cols,
            rows: self.rows,
            colours,
        }
    }

    /// Number of white pixels in the region.
    pub fn white_count(&self) -> usize {
        self.colours.iter().filter(|&&c| c == Colour::White).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn striped_frame() -> Arc<CameraFrame> {
        let (w, h) = (16usize, 12usize);
        let luma: Vec<u8> = (0..w * h)
            .map(|i| if (i % w) % 2 == 0 { 200 } else { 30 })
            .collect();
        Arc::new(CameraFrame::from_luma(Camera::Top, w, h, luma, 128).unwrap())
    }

    #[test]
    fn density_sampling_picks_top_left_of_each_cell() {
        let region = Region::whole_frame(striped_frame(), 2);
        assert_eq!((region.cols(), region.rows()), (8, 6));
        // Every sample lands on an even raw column, which is white.
        assert_eq!(region.white_count(), 48);
        assert_eq!(region.raw(3, 2), 200);
    }

    #[test]
    fn sub_region_is_clipped_to_frame_not_parent() {
        let frame = striped_frame();
        let parent = Region::new(frame, BBox::from_coords(4, 4, 8, 8), 1);
        let child = parent.sub_region(Point2::new(-2, -2), Point2::new(10, 20));
        assert_eq!(child.bbox_raw(), BBox::from_coords(2, 2, 14, 12));
        assert_eq!(child.origin_in(&parent), Vector2::new(-2, -2));
    }

    #[test]
    fn zoom_in_halves_density_and_doubles_resolution() {
        let coarse = Region::whole_frame(striped_frame(), 4);
        let fine = coarse.zoom_in(2);
        assert_eq!(fine.density(), 2);
        assert_eq!(fine.cols(), coarse.cols() * 2);
        assert_eq!(fine.bbox_raw(), coarse.bbox_raw());
    }

    #[test]
    fn local_to_raw_scales_by_density() {
        let region = Region::new(striped_frame(), BBox::from_coords(2, 4, 14, 12), 2);
        let p = region.local_to_raw(Point2::new(1.5, 2.0));
        assert_eq!(p, Point2::new(5.0, 8.0));
    }
}
