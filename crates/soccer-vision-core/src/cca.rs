//! Connected-component analysis over region pixels.
//!
//! A single raster pass assigns provisional group ids and records which
//! groups touch through [`GroupLinks`]. Equivalences are then merged to a
//! fixed point and each group is folded into its lowest-id owner.

use log::warn;
use nalgebra::Point2;

use crate::group_links::GroupLinks;
use crate::region::Region;
use crate::CapacityError;

const NO_LABEL: u16 = u16::MAX;

/// Bounding statistics of one connected group, in local coordinates.
///
/// Folded (non-owner) groups keep `count == 0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Component {
    pub count: u32,
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Component {
    fn seed(x: usize, y: usize) -> Self {
        Self {
            count: 1,
            min_x: x as i32,
            max_x: x as i32,
            min_y: y as i32,
            max_y: y as i32,
        }
    }

    fn absorb_pixel(&mut self, x: usize, y: usize) {
        let (x, y) = (x as i32, y as i32);
        self.count += 1;
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    fn absorb(&mut self, other: &Component) {
        self.count += other.count;
        self.min_x = self.min_x.min(other.min_x);
        self.max_x = self.max_x.max(other.max_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// `max_x - min_x`.
    #[inline]
    pub fn x_extent(&self) -> i32 {
        self.max_x - self.min_x
    }

    /// `max_y - min_y`.
    #[inline]
    pub fn y_extent(&self) -> i32 {
        self.max_y - self.min_y
    }

    /// Midpoint of the bounding box.
    pub fn centre(&self) -> Point2<f32> {
        Point2::new(
            self.x_extent() as f32 * 0.5 + self.min_x as f32,
            self.y_extent() as f32 * 0.5 + self.min_y as f32,
        )
    }

    /// The four bounding-box corners.
    pub fn corners(&self) -> [Point2<i32>; 4] {
        [
            Point2::new(self.min_x, self.min_y),
            Point2::new(self.max_x, self.min_y),
            Point2::new(self.min_x, self.max_y),
            Point2::new(self.max_x, self.max_y),
        ]
    }
}

/// Circle restricting which pixels take part in an analysis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CircleMask {
    pub centre: Point2<f32>,
    pub radius: f32,
}

impl CircleMask {
    pub fn new(centre: Point2<f32>, radius: f32) -> Self {
        Self { centre, radius }
    }

    /// Inclusive column span of row `y` inside the circle, clipped to
    /// `0..cols`. `None` when the row misses the circle.
    pub fn row_span(&self, y: usize, cols: usize) -> Option<(usize, usize)> {
        if cols == 0 {
            return None;
        }
        let dy = y as f32 - self.centre.y;
        let rem = self.radius * self.radius - dy * dy;
        if rem < 0.0 {
            return None;
        }
        let half = rem.sqrt();
        let left = (self.centre.x - half).ceil().max(0.0);
        let right = (self.centre.x + half).floor().min((cols - 1) as f32);
        if left > right || left >= cols as f32 {
            return None;
        }
        Some((left as usize, right as usize))
    }
}

/// Result of one labelling pass.
#[derive(Debug)]
pub struct Labelling<'a> {
    /// One entry per provisional group; folded groups have `count == 0`.
    pub components: &'a [Component],
    /// Set when a capacity limit stopped the analysis early. The components
    /// are still valid for the part of the region that was scanned.
    pub truncated: Option<CapacityError>,
}

impl Labelling<'_> {
    /// Owner groups only.
    pub fn groups(&self) -> impl Iterator<Item = &Component> + '_ {
        self.components.iter().filter(|c| c.count > 0)
    }

    /// Number of provisional groups created, including folded ones.
    pub fn raw_group_count(&self) -> usize {
        self.components.len()
    }
}

/// Reusable buffers for [`CcaScratch::label`].
///
/// Owned by whichever detector runs the analysis so allocations survive
/// from frame to frame.
#[derive(Clone, Debug, Default)]
pub struct CcaScratch {
    links: GroupLinks,
    labels: Vec<u16>,
    roots: Vec<u16>,
    components: Vec<Component>,
}

impl CcaScratch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_groups: usize, max_links: usize) -> Self {
        Self {
            links: GroupLinks::with_limits(max_groups, max_links),
            ..Self::default()
        }
    }

    /// Label 4-connected pixels of a `cols x rows` grid for which
    /// `foreground(x, y)` holds. With a mask, only pixels inside the circle
    /// are considered, and out-of-mask neighbours never connect.
    pub fn label<F>(
        &mut self,
        cols: usize,
        rows: usize,
        mask: Option<&CircleMask>,
        foreground: F,
    ) -> Labelling<'_>
    where
        F: Fn(usize, usize) -> bool,
    {
        self.links.full_reset();
        self.components.clear();
        self.labels.clear();
        self.labels.resize(cols * rows, NO_LABEL);

        let mut truncated = self.raster_pass(cols, rows, mask, &foreground);
        if let Err(err) = self.merge_links() {
            truncated.get_or_insert(err);
        }
        self.fold_into_owners();

        if let Some(err) = &truncated {
            warn!("connected components truncated: {err}");
        }
        Labelling {
            components: &self.components,
            truncated,
        }
    }

    /// Label the non-white pixels of `region`.
    pub fn label_not_white(&mut self, region: &Region, mask: Option<&CircleMask>) -> Labelling<'_> {
        self.label(region.cols(), region.rows(), mask, |x, y| {
            !region.is_white(x, y)
        })
    }

    fn raster_pass<F>(
        &mut self,
        cols: usize,
        rows: usize,
        mask: Option<&CircleMask>,
        foreground: &F,
    ) -> Option<CapacityError>
    where
        F: Fn(usize, usize) -> bool,
    {
        if cols == 0 {
            return None;
        }
        let mut truncated = None;
        for y in 0..rows {
            let (x0, x1) = match mask {
                Some(m) => match m.row_span(y, cols) {
                    Some(span) => span,
                    None => continue,
                },
                None => (0, cols - 1),
            };
            for x in x0..=x1 {
                if !foreground(x, y) {
                    continue;
                }
                let idx = y * cols + x;
                let left = if x > 0 { self.labels[idx - 1] } else { NO_LABEL };
                let up = if y > 0 { self.labels[idx - cols] } else { NO_LABEL };

                if left == NO_LABEL && up == NO_LABEL {
                    match self.links.new_group() {
                        Ok(id) => {
                            self.labels[idx] = id;
                            self.components.push(Component::seed(x, y));
                        }
                        Err(err) => return Some(err),
                    }
                    continue;
                }

                // NO_LABEL is u16::MAX, so the lower id is always a real group.
                let (owner, other) = if up < left { (up, left) } else { (left, up) };
                self.labels[idx] = owner;
                self.components[owner as usize].absorb_pixel(x, y);
                if other != NO_LABEL && other != owner {
                    if let Err(err) = self.links.add_link(other, owner) {
                        truncated.get_or_insert(err);
                    }
                }
            }
        }
        truncated
    }

    /// Propagate every group's lowest link to the rest of its links until
    /// nothing changes, leaving each group linked to a single lower owner.
    fn merge_links(&mut self) -> Result<(), CapacityError> {
        let used = self.links.len();
        let mut first_err = None;
        // Links only ever point to lower ids, so a pass can only feed groups
        // it already visited. The bound is a guard, convergence is fast.
        for _ in 0..=used {
            let mut changed = false;
            for g in 0..used as u16 {
                let low = self.links.get(g, 0);
                for slot in 1..self.links.link_count(g) {
                    let other = self.links.get(g, slot);
                    if other == g || other == low {
                        continue;
                    }
                    match self.links.add_link(other, low) {
                        Ok(added) => changed |= added,
                        Err(err) => {
                            first_err.get_or_insert(err);
                        }
                    }
                }
                self.links.clear_high(g);
            }
            if !changed {
                break;
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn fold_into_owners(&mut self) {
        let used = self.links.len();
        self.roots.clear();
        self.roots.reserve(used);
        for g in 0..used {
            let low = self.links.get(g as u16, 0) as usize;
            let root = if low == g { g as u16 } else { self.roots[low] };
            self.roots.push(root);
        }
        for g in (0..used).rev() {
            let root = self.roots[g] as usize;
            if root != g {
                let folded = std::mem::take(&mut self.components[g]);
                self.components[root].absorb(&folded);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&str]) -> (usize, usize, Vec<bool>) {
        let cols = rows[0].len();
        let cells = rows
            .iter()
            .flat_map(|r| r.bytes().map(|b| b == b'#'))
            .collect();
        (cols, rows.len(), cells)
    }

    fn flood_fill(cols: usize, rows: usize, cells: &[bool]) -> Vec<Component> {
        let mut seen = vec![false; cells.len()];
        let mut out = Vec::new();
        for start in 0..cells.len() {
            if !cells[start] || seen[start] {
                continue;
            }
            seen[start] = true;
            let mut stack = vec![start];
            let mut comp = Component::seed(start % cols, start / cols);
            comp.count = 0;
            while let Some(i) = stack.pop() {
                let (x, y) = (i % cols, i / cols);
                comp.absorb_pixel(x, y);
                let mut push = |j: usize| {
                    if cells[j] && !seen[j] {
                        seen[j] = true;
                        stack.push(j);
                    }
                };
                if x > 0 {
                    push(i - 1);
                }
                if x + 1 < cols {
                    push(i + 1);
                }
                if y > 0 {
                    push(i - cols);
                }
                if y + 1 < rows {
                    push(i + cols);
                }
            }
            out.push(comp);
        }
        out.sort_by_key(|c| (c.min_y, c.min_x, c.count));
        out
    }

    fn sorted_groups(labelling: &Labelling<'_>) -> Vec<Component> {
        let mut groups: Vec<Component> = labelling.groups().copied().collect();
        groups.sort_by_key(|c| (c.min_y, c.min_x, c.count));
        groups
    }

    #[test]
    fn u_shape_merges_into_one_group() {
        let (cols, rows, cells) = grid(&[
            "#...#", //
            "#...#",
            "#####",
        ]);
        let mut scratch = CcaScratch::new();
        let labelling = scratch.label(cols, rows, None, |x, y| cells[y * cols + x]);
        assert!(labelling.truncated.is_none());
        assert_eq!(labelling.raw_group_count(), 2);
        let groups = sorted_groups(&labelling);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].count, 9);
        assert_eq!((groups[0].min_x, groups[0].max_x), (0, 4));
        assert_eq!((groups[0].min_y, groups[0].max_y), (0, 2));
    }

    #[test]
    fn comb_and_staircase_match_flood_fill() {
        let (cols, rows, cells) = grid(&[
            "#.#.#.#.#..#", //
            "#.#.#.#.#.##",
            "#.#.#.#.#.#.",
            "#########.#.",
            "..........##",
            "####.###...#",
            "...#.#.#####",
        ]);
        let mut scratch = CcaScratch::new();
        let labelling = scratch.label(cols, rows, None, |x, y| cells[y * cols + x]);
        assert_eq!(sorted_groups(&labelling), flood_fill(cols, rows, &cells));
    }

    #[test]
    fn scratch_reuse_gives_identical_results() {
        let (cols, rows, cells) = grid(&[
            "##..##", //
            ".#..#.",
            ".####.",
        ]);
        let mut scratch = CcaScratch::new();
        let first = sorted_groups(&scratch.label(cols, rows, None, |x, y| cells[y * cols + x]));
        let second = sorted_groups(&scratch.label(cols, rows, None, |x, y| cells[y * cols + x]));
        assert_eq!(first, second);
        assert_eq!(first, flood_fill(cols, rows, &cells));
    }

    #[test]
    fn mask_excludes_corners() {
        let cols = 9;
        let rows = 9;
        let mask = CircleMask::new(Point2::new(4.0, 4.0), 4.0);
        let mut scratch = CcaScratch::new();
        let labelling = scratch.label(cols, rows, Some(&mask), |_, _| true);
        let groups = sorted_groups(&labelling);
        assert_eq!(groups.len(), 1);
        // Rows 0 and 8 hold a single pixel, the corners are outside.
        let inside: u32 = (0..rows)
            .filter_map(|y| mask.row_span(y, cols))
            .map(|(l, r)| (r - l + 1) as u32)
            .sum();
        assert_eq!(groups[0].count, inside);
        assert!(inside < (cols * rows) as u32);
        assert_eq!(mask.row_span(0, cols), Some((4, 4)));
    }

    #[test]
    fn mask_row_outside_circle_is_skipped() {
        let mask = CircleMask::new(Point2::new(2.0, 2.0), 1.5);
        assert_eq!(mask.row_span(5, 10), None);
        assert_eq!(mask.row_span(2, 10), Some((1, 3)));
        let left_edge = CircleMask::new(Point2::new(-3.0, 2.0), 2.0);
        assert_eq!(left_edge.row_span(2, 10), None);
    }

    #[test]
    fn group_cap_reports_truncation() {
        // Isolated dots, one group each.
        let (cols, rows) = (10, 10);
        let mut scratch = CcaScratch::with_limits(5, 8);
        let labelling = scratch.label(cols, rows, None, |x, y| x % 2 == 0 && y % 2 == 0);
        assert_eq!(
            labelling.truncated,
            Some(CapacityError::GroupsExhausted { max: 5 })
        );
        assert_eq!(labelling.groups().count(), 5);
    }
}
