//! Content grammar automaton.
//!
//! Every grammar in the schema is a sequence of slots, each accepting a set
//! of node types with a repetition range. A [`ContentMatch`] is a position
//! in that sequence: the current slot and how many nodes it has taken.
//! Counts of unbounded slots are capped at the slot minimum so that states
//! which accept the same continuations compare equal.

use super::fragment::Fragment;
use super::schema::NodeType;

/// One term of a content expression: `types{min,max}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub types: &'static [NodeType],
    pub min: u8,
    pub max: Option<u8>,
}

impl Slot {
    pub const fn new(types: &'static [NodeType], min: u8, max: Option<u8>) -> Self {
        Self { types, min, max }
    }

    fn accepts(&self, ty: NodeType) -> bool {
        self.types.contains(&ty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentMatch {
    expr: &'static [Slot],
    slot: usize,
    count: u8,
}

impl ContentMatch {
    pub(crate) fn start(expr: &'static [Slot]) -> Self {
        Self {
            expr,
            slot: 0,
            count: 0,
        }
    }

    /// The state after consuming a node of type `ty`, if the grammar allows it here.
    pub fn match_type(&self, ty: NodeType) -> Option<ContentMatch> {
        let mut slot = self.slot;
        let mut count = self.count;
        while let Some(current) = self.expr.get(slot) {
            let room = current.max.is_none_or(|max| count < max);
            if room && current.accepts(ty) {
                let next = count.saturating_add(1);
                let count = match current.max {
                    Some(_) => next,
                    None => next.min(current.min),
                };
                return Some(Self {
                    expr: self.expr,
                    slot,
                    count,
                });
            }
            if count < current.min {
                return None;
            }
            slot += 1;
            count = 0;
        }
        None
    }

    /// Matches `fragment.child(start..end)` in sequence.
    pub fn match_fragment(
        &self,
        fragment: &Fragment,
        start: usize,
        end: usize,
    ) -> Option<ContentMatch> {
        let mut cur = *self;
        for i in start..end {
            cur = cur.match_type(fragment.child(i).node_type())?;
        }
        Some(cur)
    }

    /// Whether the grammar may end in this state.
    pub fn valid_end(&self) -> bool {
        match self.expr.get(self.slot) {
            None => true,
            Some(current) => {
                self.count >= current.min && self.expr[self.slot + 1..].iter().all(|s| s.min == 0)
            }
        }
    }

    /// Outgoing edges in grammar order: each acceptable type with the
    /// state it leads to.
    pub fn edges(&self) -> Vec<(NodeType, ContentMatch)> {
        let mut out: Vec<(NodeType, ContentMatch)> = Vec::new();
        for slot in &self.expr[self.slot.min(self.expr.len())..] {
            for &ty in slot.types {
                if out.iter().any(|(seen, _)| *seen == ty) {
                    continue;
                }
                if let Some(next) = self.match_type(ty) {
                    out.push((ty, next));
                }
            }
        }
        out
    }

    /// The first type that can be created without attributes here.
    pub fn default_type(&self) -> Option<NodeType> {
        self.edges()
            .into_iter()
            .map(|(ty, _)| ty)
            .find(|ty| !ty.is_text())
    }

    /// True when the two states share at least one acceptable type.
    pub fn compatible(&self, other: &ContentMatch) -> bool {
        let theirs = other.edges();
        self.edges()
            .iter()
            .any(|(ty, _)| theirs.iter().any(|(other_ty, _)| other_ty == ty))
    }

    /// Finds the nodes that must be inserted before `after[start_index..]`
    /// for the whole to match; with `to_end` the result must also reach a
    /// valid end. Nodes are created with [`NodeType::create_and_fill`].
    pub fn fill_before(
        &self,
        after: &Fragment,
        to_end: bool,
        start_index: usize,
    ) -> Option<Fragment> {
        let mut seen = vec![*self];
        let mut types = Vec::new();
        self.search_fill(after, to_end, start_index, &mut seen, &mut types)
    }

    fn search_fill(
        &self,
        after: &Fragment,
        to_end: bool,
        start_index: usize,
        seen: &mut Vec<ContentMatch>,
        types: &mut Vec<NodeType>,
    ) -> Option<Fragment> {
        if let Some(finished) = self.match_fragment(after, start_index, after.child_count())
            && (!to_end || finished.valid_end())
        {
            let nodes = types
                .iter()
                .map(|ty| ty.create_and_fill())
                .collect::<Option<Vec<_>>>()?;
            return Some(Fragment::from_vec(nodes));
        }
        for (ty, next) in self.edges() {
            if ty.is_text() || seen.contains(&next) {
                continue;
            }
            seen.push(next);
            types.push(ty);
            if let Some(found) = next.search_fill(after, to_end, start_index, seen, types) {
                return Some(found);
            }
            types.pop();
        }
        None
    }

    /// Breadth-first search for the shortest chain of wrapper types that
    /// lets `target` be placed here.
    pub fn find_wrapping(&self, target: NodeType) -> Option<Vec<NodeType>> {
        struct Entry {
            state: ContentMatch,
            ty: Option<NodeType>,
            via: Option<usize>,
        }

        let mut entries = vec![Entry {
            state: *self,
            ty: None,
            via: None,
        }];
        let mut seen: Vec<NodeType> = Vec::new();
        let mut cursor = 0;
        while cursor < entries.len() {
            let current = &entries[cursor];
            if current.state.match_type(target).is_some() {
                let mut result = Vec::new();
                let mut at = Some(cursor);
                while let Some(index) = at {
                    if let Some(ty) = entries[index].ty {
                        result.push(ty);
                    }
                    at = entries[index].via;
                }
                result.reverse();
                return Some(result);
            }
            let top_level = current.ty.is_none();
            let mut queued = Vec::new();
            for (ty, next) in current.state.edges() {
                if !ty.is_leaf() && !seen.contains(&ty) && (top_level || next.valid_end()) {
                    seen.push(ty);
                    queued.push(Entry {
                        state: ty.content_match(),
                        ty: Some(ty),
                        via: Some(cursor),
                    });
                }
            }
            entries.extend(queued);
            cursor += 1;
        }
        None
    }
}
