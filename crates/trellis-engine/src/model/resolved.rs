use std::fmt;

use super::error::ModelError;
use super::mark::MarkSet;
use super::node::Node;

#[derive(Clone)]
struct PathEntry {
    node: Node,
    index: usize,
    /// Absolute position where child `index` starts.
    offset: usize,
}

/// A position together with its chain of ancestors.
///
/// Depth 0 is the document. A resolved position belongs to exactly one tree
/// version; after an edit, map the integer position and resolve again.
#[derive(Clone)]
pub struct ResolvedPos {
    pos: usize,
    path: Vec<PathEntry>,
    parent_offset: usize,
}

impl ResolvedPos {
    pub fn resolve(doc: &Node, pos: usize) -> Result<ResolvedPos, ModelError> {
        if pos > doc.content_size() {
            return Err(ModelError::OutOfRange {
                pos,
                size: doc.content_size(),
            });
        }
        let mut path = Vec::new();
        let mut start = 0;
        let mut parent_offset = pos;
        let mut node = doc.clone();
        loop {
            let (index, offset) = node.content().find_index(parent_offset)?;
            let rem = parent_offset - offset;
            path.push(PathEntry {
                node: node.clone(),
                index,
                offset: start + offset,
            });
            if rem == 0 {
                break;
            }
            let child = node.child(index).clone();
            if child.is_text() {
                break;
            }
            parent_offset = rem - 1;
            start += offset + 1;
            node = child;
        }
        Ok(ResolvedPos {
            pos,
            path,
            parent_offset,
        })
    }

    /// The start (or end) of the document's content. Unlike
    /// [`ResolvedPos::resolve`] this cannot fail.
    pub(crate) fn doc_edge(doc: &Node, at_end: bool) -> ResolvedPos {
        let (index, pos) = if at_end {
            (doc.child_count(), doc.content_size())
        } else {
            (0, 0)
        };
        ResolvedPos {
            pos,
            path: vec![PathEntry {
                node: doc.clone(),
                index,
                offset: pos,
            }],
            parent_offset: pos,
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    /// Offset into the innermost ancestor's content.
    pub fn parent_offset(&self) -> usize {
        self.parent_offset
    }

    pub fn node(&self, depth: usize) -> &Node {
        &self.path[depth].node
    }

    pub fn parent(&self) -> &Node {
        self.node(self.depth())
    }

    pub fn doc(&self) -> &Node {
        self.node(0)
    }

    pub fn index(&self, depth: usize) -> usize {
        self.path[depth].index
    }

    pub fn index_after(&self, depth: usize) -> usize {
        let at_parent = depth == self.depth() && self.text_offset() == 0;
        self.index(depth) + if at_parent { 0 } else { 1 }
    }

    /// Start of the content of the ancestor at `depth`.
    pub fn start(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.path[depth - 1].offset + 1
        }
    }

    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// Position before the ancestor at `depth`. `depth` may be one past the
    /// innermost ancestor, which yields `pos` itself.
    pub fn before(&self, depth: usize) -> usize {
        assert!(depth > 0, "there is no position before the top-level node");
        if depth == self.depth() + 1 {
            self.pos
        } else {
            self.path[depth - 1].offset
        }
    }

    pub fn after(&self, depth: usize) -> usize {
        assert!(depth > 0, "there is no position after the top-level node");
        if depth == self.depth() + 1 {
            self.pos
        } else {
            self.path[depth - 1].offset + self.path[depth].node.node_size()
        }
    }

    /// Offset into the text node the position points into, or 0.
    pub fn text_offset(&self) -> usize {
        self.pos - self.path[self.depth()].offset
    }

    pub fn node_after(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        let child = parent.maybe_child(index)?;
        let offset = self.text_offset();
        Some(if offset > 0 {
            child.cut(offset, child.node_size())
        } else {
            child.clone()
        })
    }

    pub fn node_before(&self) -> Option<Node> {
        let index = self.index(self.depth());
        let offset = self.text_offset();
        if offset > 0 {
            return Some(self.parent().child(index).cut(0, offset));
        }
        if index == 0 {
            None
        } else {
            Some(self.parent().child(index - 1).clone())
        }
    }

    /// Position of child `index` inside the ancestor at `depth`.
    pub fn pos_at_index(&self, index: usize, depth: usize) -> usize {
        let node = self.node(depth);
        let mut pos = self.start(depth);
        for i in 0..index {
            pos += node.child(i).node_size();
        }
        pos
    }

    /// Marks that apply to content inserted here.
    pub fn marks(&self) -> MarkSet {
        let parent = self.parent();
        let index = self.index(self.depth());
        if parent.content_size() == 0 {
            return MarkSet::empty();
        }
        if self.text_offset() > 0 {
            return parent.child(index).marks().clone();
        }
        let (main, other) = match index.checked_sub(1).and_then(|i| parent.maybe_child(i)) {
            Some(before) => (Some(before), parent.maybe_child(index)),
            None => (parent.maybe_child(index), None),
        };
        let Some(main) = main else {
            return MarkSet::empty();
        };
        let mut marks = main.marks().clone();
        for mark in main.marks().iter() {
            let kept_by_other = other.is_some_and(|o| o.marks().contains(mark));
            if !mark.mark_type().inclusive() && !kept_by_other {
                marks = marks.remove(mark);
            }
        }
        marks
    }

    /// Deepest depth whose ancestor contains both this position and `pos`.
    pub fn shared_depth(&self, pos: usize) -> usize {
        (1..=self.depth())
            .rev()
            .find(|&depth| self.start(depth) <= pos && self.end(depth) >= pos)
            .unwrap_or(0)
    }

    /// The range around block content between this position and `other`,
    /// at the deepest ancestor accepted by `pred`.
    pub fn block_range(
        &self,
        other: &ResolvedPos,
        pred: impl Fn(&Node) -> bool,
    ) -> Option<NodeRange> {
        if other.pos < self.pos {
            return other.block_range(self, pred);
        }
        let skip = usize::from(self.parent().inline_content() || self.pos == other.pos);
        let top = self.depth().checked_sub(skip)?;
        (0..=top)
            .rev()
            .find(|&d| other.pos <= self.end(d) && pred(self.node(d)))
            .map(|d| NodeRange::new(self.clone(), other.clone(), d))
    }

    pub fn same_parent(&self, other: &ResolvedPos) -> bool {
        self.pos - self.parent_offset == other.pos - other.parent_offset
    }
}

impl fmt::Debug for ResolvedPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = (1..=self.depth())
            .map(|d| format!("{}_{}", self.node(d).node_type(), self.index(d - 1)))
            .collect();
        write!(f, "{}:{}", path.join("/"), self.parent_offset)
    }
}

/// A flat range of sibling block nodes inside the ancestor at `depth`.
#[derive(Clone, Debug)]
pub struct NodeRange {
    pub from: ResolvedPos,
    pub to: ResolvedPos,
    pub depth: usize,
}

impl NodeRange {
    pub fn new(from: ResolvedPos, to: ResolvedPos, depth: usize) -> Self {
        Self { from, to, depth }
    }

    pub fn start(&self) -> usize {
        self.from.before(self.depth + 1)
    }

    pub fn end(&self) -> usize {
        self.to.after(self.depth + 1)
    }

    pub fn parent(&self) -> &Node {
        self.from.node(self.depth)
    }

    pub fn start_index(&self) -> usize {
        self.from.index(self.depth)
    }

    pub fn end_index(&self) -> usize {
        self.to.index_after(self.depth)
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_every_position_round_trips() {
        let d = doc(vec![
            p("ab"),
            ul(vec![li(vec![p("c"), ol(vec![li(vec![p("de")])])])]),
            hr(),
        ]);
        for pos in 0..=d.content_size() {
            let resolved = d.resolve(pos).unwrap();
            assert_eq!(resolved.pos(), pos);
            let parent_start = resolved.start(resolved.depth());
            assert_eq!(parent_start + resolved.parent_offset(), pos);
        }
        assert!(d.resolve(d.content_size() + 1).is_err());
    }

    #[test]
    fn test_resolve_inside_nested_list() {
        // doc > bulleted_list > list_item > paragraph > "c"
        let d = doc(vec![ul(vec![li(vec![p("c")])])]);
        let pos = d.resolve(3).unwrap();
        assert_eq!(pos.depth(), 3);
        assert_eq!(pos.parent().node_type().name(), "paragraph");
        assert_eq!(pos.before(3), 2);
        assert_eq!(pos.after(3), 5);
        assert_eq!(pos.before(2), 1);
        assert_eq!(pos.after(1), 7);
        assert_eq!(pos.start(2), 2);
        assert_eq!(pos.end(2), 5);
        assert_eq!(format!("{pos:?}"), "bulleted_list_0/list_item_0/paragraph_0:0");
    }

    #[test]
    fn test_node_before_and_after_split_text() {
        let d = doc(vec![p("abc")]);
        let pos = d.resolve(2).unwrap();
        assert_eq!(pos.text_offset(), 1);
        assert_eq!(pos.node_before().unwrap().text(), Some("a"));
        assert_eq!(pos.node_after().unwrap().text(), Some("bc"));
    }

    #[test]
    fn test_block_range_with_predicate() {
        let d = doc(vec![ul(vec![li(vec![p("a")]), li(vec![p("b")])])]);
        let from = d.resolve(3).unwrap();
        let to = d.resolve(8).unwrap();
        let range = from
            .block_range(&to, |n| {
                n.first_child().is_some_and(|c| c.node_type().name() == "list_item")
            })
            .unwrap();
        assert_eq!(range.depth, 1);
        assert_eq!(range.start(), 1);
        assert_eq!(range.end(), 11);
        assert_eq!((range.start_index(), range.end_index()), (0, 2));
    }
}
