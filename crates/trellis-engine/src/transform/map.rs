//! Position mapping across steps.
//!
//! A [`StepMap`] records which ranges of the old document one step replaced
//! and how large the replacements were. A [`Mapping`] chains step maps so a
//! position can be carried through a whole transaction.

const DEL_BEFORE: u8 = 1;
const DEL_AFTER: u8 = 2;
const DEL_ACROSS: u8 = 4;
const DEL_SIDE: u8 = 8;

/// Which side a position sticks to when content is inserted exactly at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    /// Stay before inserted content.
    Before,
    /// Move past inserted content.
    After,
}

/// A mapped position plus what happened around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,
    del_info: u8,
}

impl MapResult {
    /// The content on the side the position was associated with was deleted.
    pub fn deleted(&self) -> bool {
        self.del_info & DEL_SIDE > 0
    }

    /// The token before the position was deleted.
    pub fn deleted_before(&self) -> bool {
        self.del_info & (DEL_BEFORE | DEL_ACROSS) > 0
    }

    /// The token after the position was deleted.
    pub fn deleted_after(&self) -> bool {
        self.del_info & (DEL_AFTER | DEL_ACROSS) > 0
    }

    /// The position sat strictly inside a deleted range.
    pub fn deleted_across(&self) -> bool {
        self.del_info & DEL_ACROSS > 0
    }
}

/// Something positions can be mapped through.
pub trait Mappable {
    fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult;

    fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.map_result(pos, assoc).pos
    }
}

/// Replaced ranges of a single step as `(start, old_size, new_size)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepMap {
    ranges: Vec<(usize, usize, usize)>,
    inverted: bool,
}

impl StepMap {
    pub fn new(ranges: Vec<(usize, usize, usize)>) -> Self {
        Self {
            ranges,
            inverted: false,
        }
    }

    /// The identity map, used by steps that never change the token count.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn invert(&self) -> StepMap {
        StepMap {
            ranges: self.ranges.clone(),
            inverted: !self.inverted,
        }
    }

    fn sizes(&self, range: &(usize, usize, usize)) -> (usize, usize) {
        if self.inverted {
            (range.2, range.1)
        } else {
            (range.1, range.2)
        }
    }

    /// Calls `f(old_start, old_end, new_start, new_end)` for each changed range.
    pub fn for_each(&self, mut f: impl FnMut(usize, usize, usize, usize)) {
        let mut diff: isize = 0;
        for range in &self.ranges {
            let start = range.0;
            let (old_size, new_size) = self.sizes(range);
            let old_start = if self.inverted {
                offset(start, -diff)
            } else {
                start
            };
            let new_start = if self.inverted { start } else { offset(start, diff) };
            f(old_start, old_start + old_size, new_start, new_start + new_size);
            diff += new_size as isize - old_size as isize;
        }
    }

    /// True when `from..to` of the old document overlaps a replaced range
    /// or contains an insertion point strictly inside it.
    pub fn touches_range(&self, from: usize, to: usize) -> bool {
        let mut touched = false;
        self.for_each(|old_start, old_end, _, _| {
            let deletes_inside = old_end > old_start && old_start < to && old_end > from;
            let inserts_inside = old_start == old_end && old_start > from && old_start < to;
            touched |= deletes_inside || inserts_inside;
        });
        touched
    }
}

fn offset(pos: usize, diff: isize) -> usize {
    pos.saturating_add_signed(diff)
}

impl Mappable for StepMap {
    fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        let mut diff: isize = 0;
        for range in &self.ranges {
            let start = if self.inverted {
                offset(range.0, -diff)
            } else {
                range.0
            };
            if start > pos {
                break;
            }
            let (old_size, new_size) = self.sizes(range);
            let end = start + old_size;
            if pos <= end {
                let after = if old_size == 0 {
                    assoc == Assoc::After
                } else if pos == start {
                    false
                } else if pos == end {
                    true
                } else {
                    assoc == Assoc::After
                };
                let result = offset(start, diff) + if after { new_size } else { 0 };
                let mut del = if pos == start {
                    DEL_AFTER
                } else if pos == end {
                    DEL_BEFORE
                } else {
                    DEL_ACROSS
                };
                let off_side = match assoc {
                    Assoc::Before => pos != start,
                    Assoc::After => pos != end,
                };
                if off_side {
                    del |= DEL_SIDE;
                }
                return MapResult {
                    pos: result,
                    del_info: del,
                };
            }
            diff += new_size as isize - old_size as isize;
        }
        MapResult {
            pos: offset(pos, diff),
            del_info: 0,
        }
    }
}

/// A sequence of step maps applied in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_maps(maps: Vec<StepMap>) -> Self {
        Self { maps }
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    pub fn append_map(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn append_mapping(&mut self, other: &Mapping) {
        self.maps.extend(other.maps.iter().cloned());
    }

    /// The maps from index `from` onwards.
    pub fn slice(&self, from: usize) -> Mapping {
        Mapping {
            maps: self.maps[from.min(self.maps.len())..].to_vec(),
        }
    }

    /// The mapping that undoes this one.
    pub fn invert(&self) -> Mapping {
        Mapping {
            maps: self.maps.iter().rev().map(StepMap::invert).collect(),
        }
    }
}

impl Mappable for Mapping {
    fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        let mut del_info = 0;
        let mut pos = pos;
        for map in &self.maps {
            let result = map.map_result(pos, assoc);
            del_info |= result.del_info;
            pos = result.pos;
        }
        MapResult { pos, del_info }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, Assoc::After, 0)]
    #[case(2, Assoc::Before, 2)]
    #[case(2, Assoc::After, 5)]
    #[case(4, Assoc::After, 7)]
    fn test_insertion(#[case] pos: usize, #[case] assoc: Assoc, #[case] expected: usize) {
        let map = StepMap::new(vec![(2, 0, 3)]);
        assert_eq!(map.map(pos, assoc), expected);
    }

    #[test]
    fn test_deletion_flags() {
        let map = StepMap::new(vec![(2, 4, 0)]);
        let inside = map.map_result(4, Assoc::After);
        assert_eq!(inside.pos, 2);
        assert!(inside.deleted());
        assert!(inside.deleted_across());

        let at_start = map.map_result(2, Assoc::Before);
        assert!(!at_start.deleted());
        assert!(at_start.deleted_after());
        assert!(!at_start.deleted_before());

        assert_eq!(map.map(10, Assoc::After), 6);
    }

    #[test]
    fn test_inverted_map_restores_positions() {
        let map = StepMap::new(vec![(2, 4, 1)]);
        let inverse = map.invert();
        assert_eq!(inverse.map(map.map(8, Assoc::After), Assoc::After), 8);
        assert_eq!(inverse.map(3, Assoc::After), 6);
    }

    #[test]
    fn test_mapping_composes_in_order() {
        let first = StepMap::new(vec![(0, 0, 2)]);
        let second = StepMap::new(vec![(5, 1, 0)]);
        let mapping = Mapping::from_maps(vec![first.clone(), second.clone()]);
        for pos in 0..10 {
            let stepwise = second.map(first.map(pos, Assoc::After), Assoc::After);
            assert_eq!(mapping.map(pos, Assoc::After), stepwise, "pos {pos}");
        }
    }

    #[test]
    fn test_touches_range() {
        let insert_inside = StepMap::new(vec![(3, 0, 1)]);
        assert!(insert_inside.touches_range(2, 5));
        assert!(!insert_inside.touches_range(3, 5));
        let delete_overlap = StepMap::new(vec![(4, 3, 0)]);
        assert!(delete_overlap.touches_range(2, 5));
        assert!(!delete_overlap.touches_range(0, 4));
    }
}
