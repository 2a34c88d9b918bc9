//! Fixed-capacity link registry used by connected-component analysis.
//!
//! Every group owns a small sorted list of the groups it has been found to
//! touch. Slot 0 is always the lowest linked id, which makes it the group's
//! current owner candidate. Storage is kept across frames; `full_reset` only
//! touches the groups used since the previous reset.

use crate::CapacityError;

/// Default maximum number of groups per analysis.
pub const MAX_GROUPS: usize = 4000;
/// Default maximum number of links a single group may hold.
pub const MAX_LINKS: usize = 400;

#[derive(Clone, Debug)]
pub struct GroupLinks {
    max_groups: usize,
    max_links: usize,
    used: usize,
    links: Vec<Vec<u16>>,
}

impl Default for GroupLinks {
    fn default() -> Self {
        Self::with_limits(MAX_GROUPS, MAX_LINKS)
    }
}

impl GroupLinks {
    pub fn with_limits(max_groups: usize, max_links: usize) -> Self {
        // Ids must stay below the u16 "no label" sentinel.
        let max_groups = max_groups.min(u16::MAX as usize - 1);
        Self {
            max_groups,
            max_links: max_links.max(1),
            used: 0,
            links: Vec::new(),
        }
    }

    /// Register a fresh group linked only to itself.
    pub fn new_group(&mut self) -> Result<u16, CapacityError> {
        if self.used >= self.max_groups {
            return Err(CapacityError::GroupsExhausted {
                max: self.max_groups,
            });
        }
        let id = self.used as u16;
        if self.links.len() <= self.used {
            self.links.push(Vec::new());
        }
        let slot = &mut self.links[self.used];
        slot.clear();
        slot.push(id);
        self.used += 1;
        Ok(id)
    }

    /// Record that `group` touches `value`.
    ///
    /// Returns `Ok(false)` when the link already exists.
    pub fn add_link(&mut self, group: u16, value: u16) -> Result<bool, CapacityError> {
        let max_links = self.max_links;
        let list = &mut self.links[group as usize];
        match list.binary_search(&value) {
            Ok(_) => Ok(false),
            Err(_) if list.len() >= max_links => Err(CapacityError::LinksExhausted {
                group,
                max: max_links,
            }),
            Err(pos) => {
                list.insert(pos, value);
                Ok(true)
            }
        }
    }

    /// Link `slot` of `group`; slot 0 is the lowest linked id.
    #[inline]
    pub fn get(&self, group: u16, slot: usize) -> u16 {
        self.links[group as usize][slot]
    }

    #[inline]
    pub fn links(&self, group: u16) -> &[u16] {
        &self.links[group as usize]
    }

    /// Number of groups created since the last reset.
    #[inline]
    pub fn len(&self) -> usize {
        self.used
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Number of links held by `group`.
    #[inline]
    pub fn link_count(&self, group: u16) -> usize {
        self.links[group as usize].len()
    }

    /// Drop every link of `group` except the lowest one.
    pub fn clear_high(&mut self, group: u16) {
        self.links[group as usize].truncate(1);
    }

    /// Forget all groups. Cost is proportional to the groups used, not to
    /// the capacity.
    pub fn full_reset(&mut self) {
        for list in &mut self.links[..self.used] {
            list.clear();
        }
        self.used = 0;
    }
}
