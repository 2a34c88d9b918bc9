//! Growing a seed region over its neighbours.
//!
//! A field line is often split across several saliency regions. The seed is
//! merged with each overlapping region in turn, and a merge is kept only if
//! the padded result still has the same number of border ends.

use nalgebra::Point2;

use soccer_vision_core::{BBox, Region};

use crate::border::{region_ends, RegionEnd};
use crate::params::BorderParams;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SpreadStatus {
    NotChecked,
    Potential,
    Added,
    Rejected,
}

/// Seed region after spreading.
#[derive(Clone, Debug)]
pub struct SpreadRegion {
    /// Union of the seed and every accepted neighbour.
    pub spread: Region,
    /// `spread` with padding; ends and every later pixel test use this.
    pub padded: Region,
    pub ends: Vec<RegionEnd>,
    /// Indices of the accepted neighbours, in acceptance order.
    pub neighbours: Vec<usize>,
}

/// Spread `regions[seed]` over the regions that overlap it.
pub fn spread_region(regions: &[Region], seed: usize, params: &BorderParams) -> SpreadRegion {
    let mut spread = regions[seed].clone();
    let mut padded = pad_region(&spread, params.padding);
    let mut ends = region_ends(&padded, params);
    let mut neighbours = Vec::new();

    let mut status = vec![SpreadStatus::NotChecked; regions.len()];
    status[seed] = SpreadStatus::Added;
    mark_potential(&mut status, &spread, regions);

    for _ in 0..params.spread_iterations {
        let potential: Vec<usize> = status
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == SpreadStatus::Potential)
            .map(|(i, _)| i)
            .collect();

        for id in potential {
            let combined = combine_regions(&spread, &regions[id]);
            let combined_padded = pad_region(&combined, params.padding);
            let combined_ends = region_ends(&combined_padded, params);
            if combined_ends.len() == ends.len() {
                spread = combined;
                padded = combined_padded;
                ends = combined_ends;
                neighbours.push(id);
                status[id] = SpreadStatus::Added;
            } else {
                status[id] = SpreadStatus::Rejected;
            }
        }
        mark_potential(&mut status, &spread, regions);
    }

    SpreadRegion {
        spread,
        padded,
        ends,
        neighbours,
    }
}

fn mark_potential(status: &mut [SpreadStatus], region: &Region, regions: &[Region]) {
    for id in overlapping_regions(region, regions) {
        if status[id] == SpreadStatus::NotChecked {
            status[id] = SpreadStatus::Potential;
        }
    }
}

/// Indices of same-camera regions touching `region` or separated from it by
/// at most its density, in raw pixels.
pub fn overlapping_regions(region: &Region, regions: &[Region]) -> Vec<usize> {
    let bbox = region.bbox_raw();
    let d = region.density() as i32;
    regions
        .iter()
        .enumerate()
        .filter(|(_, other)| other.camera() == region.camera())
        .filter(|(_, other)| {
            let test = other.bbox_raw();
            bbox.a.x - test.b.x <= d
                && bbox.a.y - test.b.y <= d
                && test.a.x - bbox.b.x <= d
                && test.a.y - bbox.b.y <= d
        })
        .map(|(i, _)| i)
        .collect()
}

/// Bounding union of two regions at the density of `base`.
pub fn combine_regions(base: &Region, other: &Region) -> Region {
    let union = base.bbox_raw().union(&other.bbox_raw());
    let origin = base.bbox_raw().a;
    let d = base.density() as i32;
    base.sub_region(
        Point2::new((union.a.x - origin.x) / d, (union.a.y - origin.y) / d),
        Point2::new((union.b.x - origin.x) / d, (union.b.y - origin.y) / d),
    )
}

/// Grow `region` by `padding` local pixels on every side, staying one pixel
/// clear of the frame's right and bottom edges.
pub fn pad_region(region: &Region, padding: i32) -> Region {
    let original = region.bbox_raw();
    let d = region.density() as i32;
    let frame = region.frame();
    let grown = original.expanded(padding * d, padding * d);
    let raw = BBox::from_coords(
        grown.a.x.max(0),
        grown.a.y.max(0),
        grown.b.x.min(frame.width() as i32 - 1),
        grown.b.y.min(frame.height() as i32 - 1),
    );
    region.sub_region(
        Point2::new((raw.a.x - original.a.x) / d, (raw.a.y - original.a.y) / d),
        Point2::new((raw.b.x - original.a.x) / d, (raw.b.y - original.a.y) / d),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use soccer_vision_core::{Camera, CameraFrame};
    use std::sync::Arc;

    fn frame(camera: Camera, white: impl Fn(usize, usize) -> bool) -> Arc<CameraFrame> {
        let (w, h) = (160, 120);
        let luma = (0..w * h)
            .map(|i| if white(i % w, i / w) { 255 } else { 0 })
            .collect();
        Arc::new(CameraFrame::from_luma(camera, w, h, luma, 128).unwrap())
    }

    /// Horizontal strip over rows 50..54.
    fn strip() -> Arc<CameraFrame> {
        frame(Camera::Bottom, |x, y| (50..54).contains(&y) && (10..150).contains(&x))
    }

    #[test]
    fn padding_is_clamped_short_of_the_far_edges() {
        let f = strip();
        let near = Region::new(f.clone(), BBox::from_coords(2, 2, 20, 20), 1);
        assert_eq!(pad_region(&near, 4).bbox_raw(), BBox::from_coords(0, 0, 24, 24));
        let far = Region::new(f, BBox::from_coords(140, 100, 158, 118), 1);
        assert_eq!(pad_region(&far, 4).bbox_raw(), BBox::from_coords(136, 96, 159, 119));
    }

    #[test]
    fn overlap_allows_a_density_wide_gap() {
        let f = strip();
        let seed = Region::new(f.clone(), BBox::from_coords(40, 40, 60, 60), 2);
        let regions = vec![
            seed.clone(),
            Region::new(f.clone(), BBox::from_coords(62, 40, 80, 60), 2),
            Region::new(f.clone(), BBox::from_coords(63, 40, 80, 60), 2),
            Region::new(frame(Camera::Top, |_, _| false), BBox::from_coords(40, 40, 60, 60), 2),
        ];
        assert_eq!(overlapping_regions(&seed, &regions), vec![0, 1]);
    }

    #[test]
    fn combined_region_keeps_the_base_density() {
        let f = strip();
        let a = Region::new(f.clone(), BBox::from_coords(40, 40, 60, 60), 2);
        let b = Region::new(f, BBox::from_coords(50, 30, 90, 50), 1);
        let c = combine_regions(&a, &b);
        assert_eq!(c.bbox_raw(), BBox::from_coords(40, 30, 90, 60));
        assert_eq!(c.density(), 2);
    }

    #[test]
    fn neighbours_along_the_same_line_are_merged() {
        // The strip with a spur at x = 30 running down from it; the spur
        // would add a third end.
        let f = frame(Camera::Bottom, |x, y| {
            ((50..54).contains(&y) && (10..150).contains(&x)) || (x == 30 && y >= 54)
        });
        let regions = vec![
            Region::new(f.clone(), BBox::from_coords(40, 44, 60, 60), 1),
            Region::new(f.clone(), BBox::from_coords(60, 44, 80, 60), 1),
            Region::new(f, BBox::from_coords(20, 44, 40, 60), 1),
        ];
        let spread = spread_region(&regions, 0, &BorderParams::default());
        assert_eq!(spread.ends.len(), 2);
        assert_eq!(spread.neighbours, vec![1]);
        assert_eq!(spread.spread.bbox_raw(), BBox::from_coords(40, 44, 80, 60));
        assert_eq!(spread.padded.bbox_raw(), BBox::from_coords(36, 40, 84, 64));
    }
}
