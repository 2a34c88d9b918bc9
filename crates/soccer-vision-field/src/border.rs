//! Region border scan.
//!
//! The rectangle's perimeter is flattened into one circular sequence: top
//! row left to right, right column downwards, bottom row right to left and
//! left column upwards. Corner pixels appear once. An *end* is a maximal
//! white run on that sequence; short dark gaps inside a run are bridged so
//! that speckle does not split one line into two ends.

use nalgebra::Point2;

use soccer_vision_core::Region;

use crate::params::BorderParams;

/// A white run where a feature leaves the region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionEnd {
    /// Border index of the run centre.
    pub index: usize,
    /// Run centre in local pixels.
    pub centre: Point2<i32>,
    /// Run length with trailing debounce pixels removed.
    pub size: usize,
    /// First and last border index of the run.
    pub span: (usize, usize),
    /// `span` in local pixels.
    pub span_xy: (Point2<i32>, Point2<i32>),
}

/// White flags along a region's perimeter.
#[derive(Clone, Debug)]
pub struct RegionBorder {
    cols: usize,
    rows: usize,
    white: Vec<bool>,
}

impl RegionBorder {
    /// `None` for regions less than two pixels wide or tall.
    pub fn of(region: &Region) -> Option<Self> {
        let (cols, rows) = (region.cols(), region.rows());
        if cols < 2 || rows < 2 {
            return None;
        }
        let len = 2 * cols + 2 * rows - 4;
        let white = (0..len)
            .map(|i| {
                let p = border_point(cols, rows, i);
                region.is_white(p.x as usize, p.y as usize)
            })
            .collect();
        Some(Self { cols, rows, white })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.white.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.white.is_empty()
    }

    #[inline]
    pub fn point(&self, index: usize) -> Point2<i32> {
        border_point(self.cols, self.rows, index)
    }

    pub fn switch_rate(&self, params: &BorderParams) -> usize {
        params
            .min_switch_rate
            .max(self.len() / params.switch_rate_divisor.max(1))
    }

    /// Start of the first dark run longer than `switch_rate`; `None` when
    /// the border never goes convincingly dark.
    pub fn first_black(&self, switch_rate: usize) -> Option<usize> {
        let mut blacks = 0;
        for (i, &white) in self.white.iter().enumerate() {
            if white {
                blacks = 0;
            } else {
                blacks += 1;
            }
            if blacks == switch_rate + 1 {
                return Some(i - switch_rate);
            }
        }
        None
    }

    /// Walk once around the border from the first definite dark pixel and
    /// collect every white run.
    pub fn ends(&self, params: &BorderParams) -> Vec<RegionEnd> {
        let mut ends = Vec::new();
        let s = self.switch_rate(params);
        let Some(start) = self.first_black(s) else {
            return ends;
        };
        let len = self.len() as i64;
        let si = s as i64;

        let mut was_white = false;
        let mut whites: i64 = 0;
        let mut blacks: usize = 1;
        let mut passed_zero = false;
        let mut pixel = start;
        while pixel != start || !passed_zero {
            pixel += 1;
            if pixel == self.len() {
                pixel = 0;
                passed_zero = true;
            }

            let still_white = pixel != start
                && (self.white[pixel] || (was_white && blacks < s));
            if still_white {
                whites += 1;
                was_white = true;
                if self.white[pixel] {
                    blacks = 0;
                } else {
                    blacks += 1;
                }
                continue;
            }

            if was_white {
                let p = pixel as i64;
                // Runs closed by the debounce carry `s` dark pixels at the
                // tail; a run closed at the start pixel does not.
                let (actual, centre, first, last) = if pixel == 0 {
                    let actual = whites - si;
                    (actual, p - whites + actual / 2, p - actual - si, p - si - 1)
                } else if pixel == start {
                    (whites, p - whites / 2, p - whites, p - 1)
                } else {
                    let probe = if passed_zero { len - si } else { p - si };
                    let actual = if self.white[wrap(len, probe)] {
                        whites
                    } else {
                        whites - si
                    };
                    (actual, p - whites + actual / 2, p - actual - si, p - si - 1)
                };
                if actual >= params.min_end_size as i64 {
                    let centre = wrap(len, centre);
                    let span = (wrap(len, first), wrap(len, last));
                    ends.push(RegionEnd {
                        index: centre,
                        centre: self.point(centre),
                        size: actual as usize,
                        span,
                        span_xy: (self.point(span.0), self.point(span.1)),
                    });
                }
            }
            was_white = false;
            whites = 0;
            blacks += 1;
        }
        ends
    }
}

/// Ends of `region`; empty for degenerate regions.
pub fn region_ends(region: &Region, params: &BorderParams) -> Vec<RegionEnd> {
    RegionBorder::of(region)
        .map(|border| border.ends(params))
        .unwrap_or_default()
}

/// Local pixel of border index `p`.
pub fn border_point(cols: usize, rows: usize, p: usize) -> Point2<i32> {
    let (c, r, p) = (cols as i32, rows as i32, p as i32);
    if p < c {
        Point2::new(p, 0)
    } else if p < c + r - 1 {
        Point2::new(c - 1, p - c + 1)
    } else if p < 2 * c + r - 2 {
        Point2::new(c - (p - c - r + 3), r - 1)
    } else {
        Point2::new(0, r - (p - 2 * c - r + 4))
    }
}

fn wrap(len: i64, index: i64) -> usize {
    index.rem_euclid(len) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use soccer_vision_core::{Camera, CameraFrame};
    use std::sync::Arc;

    /// 20 x 12 frame, white where `white(x, y)`.
    fn region(white: impl Fn(usize, usize) -> bool) -> Region {
        let (w, h) = (20, 12);
        let mut luma = vec![0u8; w * h];
        for y in 0..h {
            for x in 0..w {
                if white(x, y) {
                    luma[y * w + x] = 255;
                }
            }
        }
        let frame = CameraFrame::from_luma(Camera::Bottom, w, h, luma, 128).unwrap();
        Region::whole_frame(Arc::new(frame), 1)
    }

    #[test]
    fn border_indices_walk_clockwise() {
        assert_eq!(border_point(20, 12, 0), Point2::new(0, 0));
        assert_eq!(border_point(20, 12, 19), Point2::new(19, 0));
        assert_eq!(border_point(20, 12, 30), Point2::new(19, 11));
        assert_eq!(border_point(20, 12, 31), Point2::new(18, 11));
        assert_eq!(border_point(20, 12, 49), Point2::new(0, 11));
        assert_eq!(border_point(20, 12, 59), Point2::new(0, 1));
    }

    #[test]
    fn run_on_one_side_and_run_around_a_corner() {
        let r = region(|x, y| (y == 0 && (8..12).contains(&x)) || (x == 19 && y >= 9) || (y == 11 && x >= 17));
        let ends = region_ends(&r, &BorderParams::default());
        assert_eq!(ends.len(), 2);

        assert_eq!(ends[0].centre, Point2::new(10, 0));
        assert_eq!(ends[0].size, 4);
        assert_eq!(ends[0].span_xy, (Point2::new(8, 0), Point2::new(11, 0)));

        assert_eq!(ends[1].centre, Point2::new(19, 11));
        assert_eq!(ends[1].size, 5);
        assert_eq!(ends[1].span, (28, 32));
        assert_eq!(ends[1].span_xy, (Point2::new(19, 9), Point2::new(17, 11)));
    }

    #[test]
    fn run_through_index_zero_is_one_end() {
        let r = region(|x, y| (y == 0 && x < 3) || (x == 0 && y < 4) || (x == 19 && (4..8).contains(&y)));
        let ends = region_ends(&r, &BorderParams::default());
        assert_eq!(ends.len(), 2);
        assert_eq!(ends[0].centre, Point2::new(19, 6));
        assert_eq!(ends[1].centre, Point2::new(0, 0));
        assert_eq!(ends[1].size, 6);
        assert_eq!(ends[1].span, (57, 2));
    }

    #[test]
    fn single_dark_pixel_does_not_split_a_run() {
        let r = region(|x, y| y == 0 && (5..15).contains(&x) && x != 9);
        let ends = region_ends(&r, &BorderParams::default());
        assert_eq!(ends.len(), 1);
        assert_eq!(ends[0].size, 10);
        assert_eq!(ends[0].centre, Point2::new(10, 0));
    }

    #[test]
    fn all_white_border_has_no_ends() {
        let r = region(|_, _| true);
        assert!(region_ends(&r, &BorderParams::default()).is_empty());
        let dark = region(|_, _| false);
        assert!(region_ends(&dark, &BorderParams::default()).is_empty());
    }
}
