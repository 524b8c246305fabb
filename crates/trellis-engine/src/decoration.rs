//! Annotations over document ranges that live outside the tree.
//!
//! A decoration is a plain `(from, to, tag)` triple. It holds no reference
//! to a particular document version; after every transaction the set is
//! re-projected through the transaction's mapping.

use serde::Serialize;

use crate::transform::{Assoc, Mappable, Mapping};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecorationTag {
    /// The paragraph currently typed as a slash command.
    SlashMatch,
    /// A slash command the user dismissed.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Decoration {
    pub from: usize,
    pub to: usize,
    pub tag: DecorationTag,
}

impl Decoration {
    pub fn new(from: usize, to: usize, tag: DecorationTag) -> Self {
        Self { from, to, tag }
    }

    /// Overlap test with inclusive ends, so an empty query range at a
    /// decoration's edge still finds it.
    pub fn overlaps(&self, from: usize, to: usize) -> bool {
        self.from <= to && self.to >= from
    }

    /// The range this decoration covers after `mapping`, or `None` when
    /// it collapsed or an edit landed inside it.
    ///
    /// The start is biased forward and the end backward, so text typed
    /// at either edge stays outside.
    pub fn map(&self, mapping: &Mapping) -> Option<Decoration> {
        let (mut from, mut to) = (self.from, self.to);
        for map in mapping.maps() {
            if map.touches_range(from, to) {
                return None;
            }
            from = map.map(from, Assoc::After);
            to = map.map(to, Assoc::Before);
            if from >= to {
                return None;
            }
        }
        Some(Decoration { from, to, ..*self })
    }
}

/// An unordered collection of decorations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecorationSet {
    decorations: Vec<Decoration>,
}

impl DecorationSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.decorations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decoration> {
        self.decorations.iter()
    }

    /// A new set with `decoration` added. Collapsed decorations are
    /// ignored.
    pub fn add(&self, decoration: Decoration) -> DecorationSet {
        let mut decorations = self.decorations.clone();
        if decoration.from < decoration.to {
            decorations.push(decoration);
        }
        DecorationSet { decorations }
    }

    /// Decorations overlapping `from..=to`.
    pub fn find(&self, from: usize, to: usize) -> Vec<&Decoration> {
        self.decorations.iter().filter(|d| d.overlaps(from, to)).collect()
    }

    /// Re-projects every decoration through `mapping`, dropping the ones
    /// that collapsed or were edited.
    pub fn map(&self, mapping: &Mapping) -> DecorationSet {
        DecorationSet {
            decorations: self.decorations.iter().filter_map(|d| d.map(mapping)).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DecorationSet {
    type Item = &'a Decoration;
    type IntoIter = std::slice::Iter<'a, Decoration>;

    fn into_iter(self) -> Self::IntoIter {
        self.decorations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use crate::transform::Transform;
    use pretty_assertions::assert_eq;

    fn ignored(from: usize, to: usize) -> Decoration {
        Decoration::new(from, to, DecorationTag::Ignored)
    }

    #[test]
    fn test_find_overlapping() {
        let set = DecorationSet::empty().add(ignored(1, 3)).add(ignored(6, 8));
        assert_eq!(set.find(3, 3), vec![&ignored(1, 3)]);
        assert_eq!(set.find(4, 5).len(), 0);
        assert_eq!(set.find(0, 10).len(), 2);
    }

    #[test]
    fn test_collapsed_decoration_is_not_added() {
        assert!(DecorationSet::empty().add(ignored(2, 2)).is_empty());
    }

    #[test]
    fn test_edit_elsewhere_moves_decoration() {
        let d = doc(vec![p("ab"), p("/x")]);
        let start = pos_of(&d, "/x");
        let set = DecorationSet::empty().add(ignored(start, start + 2));
        let mut tr = Transform::new(d);
        tr.insert(1, txt("zz")).unwrap();
        let mapped = set.map(tr.mapping());
        assert_eq!(mapped.iter().collect::<Vec<_>>(), vec![&ignored(start + 2, start + 4)]);
        assert_eq!(tr.doc().text_between(start + 2, start + 4, "", ""), "/x");
    }

    #[test]
    fn test_typing_at_edges_stays_outside() {
        let d = doc(vec![p("/x")]);
        let set = DecorationSet::empty().add(ignored(1, 3));
        let mut tr = Transform::new(d);
        tr.insert(3, txt("y")).unwrap();
        tr.insert(1, txt("w")).unwrap();
        assert_eq!(set.map(tr.mapping()).iter().collect::<Vec<_>>(), vec![&ignored(2, 4)]);
    }

    #[test]
    fn test_edit_inside_drops_decoration() {
        let d = doc(vec![p("/xy")]);
        let set = DecorationSet::empty().add(ignored(1, 4));
        let mut tr = Transform::new(d);
        tr.insert(3, txt("z")).unwrap();
        assert!(set.map(tr.mapping()).is_empty());
    }

    #[test]
    fn test_deleted_range_drops_decoration() {
        let d = doc(vec![p("a"), p("/x")]);
        let set = DecorationSet::empty().add(ignored(4, 6));
        let mut tr = Transform::new(d);
        tr.delete(3, 7).unwrap();
        assert!(set.map(tr.mapping()).is_empty());
    }
}
