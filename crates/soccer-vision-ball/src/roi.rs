//! Region-of-interest refinement: coarse saliency regions in, tight
//! ball-sized candidates out.
//!
//! [`combo_roi`] is the entry point. Depending on the size estimate and the
//! region's aspect ratio it either keeps the region as one candidate or
//! hands it to [`blob_roi`], which looks for dark ball patches and boxes
//! around them. [`black_roi`] and [`circle_roi`] are optional fallbacks.

use log::{debug, trace};
use nalgebra::Point2;

use soccer_vision_core::{BallStage, BBox, CcaScratch, Component, FrameContext, Region};

use crate::candidate::{BallCandidate, PartialSide, RegionAspect};
use crate::circle_fit::{
    candidate_points, find_best_circle_fit, fixed_radius_fit, FixedRadiusParams, GridFitParams,
};
use crate::params::{BallDetectorParams, RoiParams};
use crate::size::estimate_size;

/// True when no row contains two separate white runs, the second of which
/// is at least `min_section_fraction` of the width. Such regions are
/// uniform blobs (line segments, feet) rather than a patterned ball.
pub fn is_simple_blob(region: &Region, min_section_fraction: f32) -> bool {
    let cols = region.cols();
    let min_section = ((min_section_fraction * cols as f32) as usize).max(1);
    !(0..region.rows()).any(|y| {
        let mut largest = 0;
        let mut second = 0;
        let mut x = 0;
        while x < cols {
            while x < cols && !region.is_white(x, y) {
                x += 1;
            }
            let start = x;
            while x < cols && region.is_white(x, y) {
                x += 1;
            }
            let run = x - start;
            if run > largest {
                second = largest;
                largest = run;
            } else if run > second {
                second = run;
            }
            if second >= min_section {
                return true;
            }
        }
        false
    })
}

/// Mean raw luminance of the saliency-white pixels of `region`.
pub(crate) fn average_white_brightness(region: &Region) -> i32 {
    let (mut total, mut whites) = (0i64, 0i64);
    for y in 0..region.rows() {
        for x in 0..region.cols() {
            if region.is_white(x, y) {
                total += i64::from(region.raw(x, y));
                whites += 1;
            }
        }
    }
    (total / whites.max(1)) as i32
}

/// Entry refinement for one saliency region.
///
/// `Err` names the check that dropped the region before any candidate was
/// produced; an empty `Ok` means blob search found nothing to box.
pub fn combo_roi(
    region: &Region,
    ctx: &FrameContext<'_>,
    params: &BallDetectorParams,
    scratch: &mut CcaScratch,
) -> Result<Vec<BallCandidate>, BallStage> {
    let roi = &params.roi;
    let bbox = region.bbox_raw();
    if region.is_top_camera() {
        if let Some(boundary) = ctx.boundary_at(bbox.a.x) {
            if bbox.a.y < boundary {
                return Err(BallStage::FieldBoundary);
            }
        }
    }
    if is_simple_blob(region, roi.min_section_fraction) {
        return Err(BallStage::SimpleBlob);
    }

    let size = estimate_size(region, ctx, &params.size);
    trace!(
        "combo roi {:?}: size estimate {:.1} mm, expected {:.1} px",
        bbox,
        size.diam_size_est,
        size.diam_expected_pixels
    );

    if size.diam_size_est > roi.min_size_estimate && size.diam_size_est < roi.max_size_estimate {
        let aspect = region.cols() as f64 / region.rows() as f64;
        if aspect <= roi.tall_aspect {
            return Ok(blob_roi(region, RegionAspect::Tall, ctx, params, scratch));
        }
        let mut candidate = BallCandidate::new(region.clone(), region.clone(), RegionAspect::Undefined);
        candidate.size = size;
        if aspect >= roi.short_aspect {
            candidate.regenerate(true, roi.padding);
            let widened = candidate.region;
            return Ok(blob_roi(&widened, RegionAspect::Short, ctx, params, scratch));
        }
        candidate.regenerate(false, roi.padding);
        candidate.rescale(roi.min_region_pixels);
        candidate.aspect = RegionAspect::Normal;
        return Ok(vec![candidate]);
    }
    if size.diam_size_est > roi.blob_size_estimate {
        return Ok(blob_roi(region, RegionAspect::Undefined, ctx, params, scratch));
    }
    Err(BallStage::SizeEstimate)
}

/// Dark blobs of ball-patch size, shape and fill, plus the index of the
/// densest one.
fn ball_patches(
    scratch: &mut CcaScratch,
    region: &Region,
    roi: &RoiParams,
) -> (Vec<Component>, usize) {
    let labelling = scratch.label_not_white(region, None);
    let mut patches = Vec::new();
    let mut densest = 0;
    let mut best_density = f32::MIN;
    for c in labelling.groups() {
        if c.count <= roi.blob_min_pixels || c.count >= roi.blob_max_pixels {
            continue;
        }
        // One-row or one-column patches have zero extent.
        let x_size = c.x_extent().max(1) as f32;
        let y_size = c.y_extent().max(1) as f32;
        let aspect = x_size / y_size;
        if aspect <= 0.5 || aspect >= 2.0 {
            continue;
        }
        let area = (x_size * y_size) as i32;
        let density = c.count as f32 / area as f32;
        if density <= roi.blob_min_density {
            continue;
        }
        if density > best_density {
            best_density = density;
            densest = patches.len();
        }
        patches.push(*c);
    }
    (patches, densest)
}

/// Box around each plausible ball patch of `region`, plus one around the
/// midpoint of two patches or the centroid of three.
pub fn blob_roi(
    region: &Region,
    aspect: RegionAspect,
    ctx: &FrameContext<'_>,
    params: &BallDetectorParams,
    scratch: &mut CcaScratch,
) -> Vec<BallCandidate> {
    let roi = &params.roi;
    let brightness = average_white_brightness(region);
    let (window, percentage) =
        params
            .adaptive
            .blob_search(region.cols(), region.rows(), region.is_top_camera(), brightness);
    let reclassified = region.reclassify(window, percentage);
    let (patches, densest) = ball_patches(scratch, &reclassified, roi);
    if patches.is_empty() || patches.len() > roi.blob_max_count {
        trace!("blob roi: {} patches, nothing to box", patches.len());
        return Vec::new();
    }

    let dense = &patches[densest];
    let blob_size = (dense.x_extent() + 1).max(dense.y_extent() + 1);
    let blob_min = (blob_size as f32 * 0.7).floor() as i32;
    let blob_max = (blob_size as f32 * 1.3).ceil() as i32;

    let centres: Vec<Point2<i32>> = patches
        .iter()
        .filter_map(|c| {
            let x_size = c.x_extent() + 1;
            let y_size = c.y_extent() + 1;
            let fits = |s: i32| s > blob_min && s < blob_max;
            if patches.len() > 2 && !fits(x_size) && !fits(y_size) {
                return None;
            }
            Some(Point2::new(x_size / 2 + c.min_x, y_size / 2 + c.min_y))
        })
        .collect();

    let expand = if centres.len() == 1 {
        (blob_size as f32 * roi.blob_expand_single) as i32
    } else {
        (blob_size as f32 * roi.blob_expand_multi) as i32
    };
    let mut boxes: Vec<(Point2<i32>, i32)> = centres.iter().map(|&c| (c, expand)).collect();
    let joint = (blob_size as f32 * roi.blob_expand_single) as i32;
    match centres.as_slice() {
        [a, b] => boxes.push((Point2::new((a.x + b.x) / 2, (a.y + b.y) / 2), joint)),
        [a, b, c] => boxes.push((
            Point2::new((a.x + b.x + c.x) / 3, (a.y + b.y + c.y) / 3),
            joint,
        )),
        _ => {}
    }

    boxes
        .into_iter()
        .map(|(centre, half)| {
            let sub = region.sub_region(
                Point2::new(centre.x - half, centre.y - half),
                Point2::new(centre.x + half, centre.y + half),
            );
            let mut candidate = BallCandidate::new(sub, region.clone(), aspect);
            candidate.size = estimate_size(&candidate.region, ctx, &params.size);
            candidate.rescale(roi.min_region_pixels);
            candidate
        })
        .collect()
}

/// Box a ball-sized window sitting on the darkest pixel of the region.
///
/// Dropped when less than half of the window overlaps the region.
pub fn black_roi(
    region: &Region,
    ctx: &FrameContext<'_>,
    params: &BallDetectorParams,
) -> Option<BallCandidate> {
    let roi = &params.roi;
    let mut candidate = BallCandidate::new(region.clone(), region.clone(), RegionAspect::Undefined);
    candidate.size = estimate_size(region, ctx, &params.size);
    candidate.regenerate(false, roi.padding);

    let work = &candidate.region;
    let mut darkest = u8::MAX;
    let mut at = None;
    for y in 0..work.rows() {
        for x in 0..work.cols() {
            let v = work.raw(x, y);
            if v < darkest {
                darkest = v;
                at = Some(Point2::new(x as i32, y as i32));
            }
        }
    }
    let bottom = at?;

    let d = candidate.size.diam_expected_size;
    let window = BBox::from_coords(
        (bottom.x as f32 - 0.6 * d) as i32,
        (bottom.y as f32 - d) as i32,
        (bottom.x as f32 + 0.6 * d) as i32,
        bottom.y + 2,
    );
    let overlap = window.intersection(&work.bbox_local());
    let overlap_area = if overlap.is_empty() { 0 } else { overlap.area() };
    let window_area = i64::from(window.width()) * i64::from(window.height());
    if window_area == 0 || 2 * overlap_area < window_area {
        debug!("black roi: window {window:?} mostly outside region");
        return None;
    }

    let sub = work.sub_region(window.a, window.b);
    candidate.region = sub;
    candidate.rescale(roi.min_region_pixels);
    Some(candidate)
}

/// Fit a circle of the expected ball size directly and crop to it. The
/// resulting candidate is inspected in crazy-ball mode.
pub fn circle_roi(
    region: &Region,
    ctx: &FrameContext<'_>,
    params: &BallDetectorParams,
) -> Option<BallCandidate> {
    let mut candidate = BallCandidate::new(region.clone(), region.clone(), RegionAspect::Undefined);
    candidate.crazy = true;
    candidate.size = estimate_size(region, ctx, &params.size);
    candidate.regenerate(false, params.roi.padding);
    let (window, percentage) = params
        .adaptive
        .circle_fit(candidate.region.rows(), candidate.region.is_top_camera());
    candidate.reclassify(window, percentage);
    candidate.points = candidate_points(&candidate.region);

    let (cols, rows) = (candidate.region.cols(), candidate.region.rows());
    let fixed = FixedRadiusParams::for_diameter(candidate.size.diam_expected_pixels);
    let radius = candidate.size.diam_expected_size * 0.5;
    let grid = GridFitParams {
        max_radius: 9.0,
        min_radius_proportion: 0.7,
        error: ((radius * 0.1) as i32).max(1) as f32,
        min_consensus: ((2.5 * radius) as usize).max(20),
        step: 2.0,
        partial: PartialSide::of(&candidate.region),
    };
    let fit = fixed_radius_fit(&candidate.points, cols, rows, &fixed)
        .or_else(|| find_best_circle_fit(&candidate.points, cols, rows, &grid))?;
    candidate.circle = fit;
    candidate.regenerate_from_circle(params.roi.padding);
    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use soccer_vision_core::{Camera, CameraFrame};
    use std::sync::Arc;

    fn region_from_rows(rows: &[&str]) -> Region {
        let w = rows[0].len();
        let luma = rows
            .iter()
            .flat_map(|r| r.bytes().map(|b| if b == b'#' { 220 } else { 30 }))
            .collect();
        let frame = CameraFrame::from_luma(Camera::Bottom, w, rows.len(), luma, 128).unwrap();
        Region::whole_frame(Arc::new(frame), 1)
    }

    #[test]
    fn solid_run_is_a_simple_blob() {
        let region = region_from_rows(&["..######..", "..######..", "...####..."]);
        assert!(is_simple_blob(&region, 0.01));
    }

    #[test]
    fn split_row_is_not_a_simple_blob() {
        let region = region_from_rows(&["..######..", ".###..###.", "...####..."]);
        assert!(!is_simple_blob(&region, 0.01));
        // A 40% second-run requirement rejects the 3-pixel runs.
        assert!(is_simple_blob(&region, 0.4));
    }

    #[test]
    fn average_brightness_uses_white_pixels_only() {
        let region = region_from_rows(&["##..", "#..."]);
        assert_eq!(average_white_brightness(&region), 220);
        let dark = region_from_rows(&["....", "...."]);
        assert_eq!(average_white_brightness(&dark), 0);
    }

    #[test]
    fn patches_must_be_dense_and_square() {
        let mut rows = vec![String::from("#").repeat(30); 20];
        // 4x4 dark square: extents 3x3, 16 pixels, density 16/9.
        for row in rows.iter_mut().take(8).skip(4) {
            row.replace_range(4..8, "....");
        }
        // 1x12 dark bar: aspect far from square.
        rows[15].replace_range(10..22, "............");
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        let region = region_from_rows(&refs);
        let mut scratch = CcaScratch::new();
        let (patches, densest) = ball_patches(&mut scratch, &region, &RoiParams::default());
        assert_eq!(patches.len(), 1, "bar must be filtered by aspect");
        assert_eq!(densest, 0);
        assert_eq!((patches[0].min_x, patches[0].min_y), (4, 4));
    }

    #[test]
    fn zero_extent_patch_has_finite_density() {
        let mut rows = vec![String::from("#").repeat(30); 20];
        rows[1].replace_range(20..21, ".");
        for row in rows.iter_mut().take(8).skip(4) {
            row.replace_range(4..8, "....");
        }
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        let region = region_from_rows(&refs);
        let roi = RoiParams {
            blob_min_pixels: 0,
            ..RoiParams::default()
        };
        let mut scratch = CcaScratch::new();
        let (patches, densest) = ball_patches(&mut scratch, &region, &roi);
        // Single pixel counts as 1x1 with density 1, below the square's 16/9.
        assert_eq!(patches.len(), 2);
        assert_eq!((patches[0].min_x, patches[0].min_y), (20, 1));
        assert_eq!(densest, 1);
    }
}
