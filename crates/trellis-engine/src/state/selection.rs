use std::fmt;

use log::warn;

use crate::model::{Node, ResolvedPos};
use crate::transform::{Assoc, Mappable, Mapping};

use super::StateError;

/// Which way to search for a selectable position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Backward,
    Forward,
}

impl Direction {
    pub fn reverse(self) -> Direction {
        match self {
            Direction::Backward => Direction::Forward,
            Direction::Forward => Direction::Backward,
        }
    }
}

/// The selected part of a document.
///
/// A collapsed text selection is the cursor. Positions are resolved against
/// the document the selection was created for; use [`Selection::map`] to
/// carry one over to a newer version.
#[derive(Clone)]
pub enum Selection {
    /// A range of inline content, possibly spanning blocks.
    Text { anchor: ResolvedPos, head: ResolvedPos },
    /// A single node, `from` directly before it and `to` directly after.
    Node { from: ResolvedPos, to: ResolvedPos },
    /// The whole document.
    All { from: ResolvedPos, to: ResolvedPos },
}

impl Selection {
    /// A collapsed cursor at `pos`.
    pub fn cursor(doc: &Node, pos: usize) -> Result<Selection, StateError> {
        Self::text(doc, pos, pos)
    }

    pub fn text(doc: &Node, anchor: usize, head: usize) -> Result<Selection, StateError> {
        let anchor = doc.resolve(anchor)?;
        let head = if head == anchor.pos() {
            anchor.clone()
        } else {
            doc.resolve(head)?
        };
        Ok(Selection::Text { anchor, head })
    }

    /// Selects the node directly after `pos`.
    pub fn node(doc: &Node, pos: usize) -> Result<Selection, StateError> {
        let from = doc.resolve(pos)?;
        let node = from.node_after().ok_or(StateError::NoNodeAt(pos))?;
        let to = doc.resolve(pos + node.node_size())?;
        Ok(Selection::Node { from, to })
    }

    pub fn all(doc: &Node) -> Selection {
        Selection::All {
            from: ResolvedPos::doc_edge(doc, false),
            to: ResolvedPos::doc_edge(doc, true),
        }
    }

    /// The first valid cursor or node selection in the document.
    pub fn at_start(doc: &Node) -> Selection {
        find_from(&ResolvedPos::doc_edge(doc, false), Direction::Forward, false)
            .unwrap_or_else(|| Selection::all(doc))
    }

    /// The valid selection closest to `rpos`, preferring `dir`.
    pub fn near(rpos: &ResolvedPos, dir: Direction) -> Selection {
        find_from(rpos, dir, false)
            .or_else(|| find_from(rpos, dir.reverse(), false))
            .unwrap_or_else(|| Selection::all(rpos.doc()))
    }

    /// The first selectable position starting at `rpos` and moving in
    /// `dir`. With `text_only`, node selections are skipped.
    pub fn find_from(rpos: &ResolvedPos, dir: Direction, text_only: bool) -> Option<Selection> {
        find_from(rpos, dir, text_only)
    }

    pub fn anchor(&self) -> usize {
        match self {
            Selection::Text { anchor, .. } => anchor.pos(),
            Selection::Node { from, .. } | Selection::All { from, .. } => from.pos(),
        }
    }

    pub fn head(&self) -> usize {
        match self {
            Selection::Text { head, .. } => head.pos(),
            Selection::Node { to, .. } | Selection::All { to, .. } => to.pos(),
        }
    }

    pub fn from(&self) -> usize {
        self.rfrom().pos()
    }

    pub fn to(&self) -> usize {
        self.rto().pos()
    }

    /// The lower bound, resolved.
    pub fn rfrom(&self) -> &ResolvedPos {
        match self {
            Selection::Text { anchor, head } => {
                if head.pos() < anchor.pos() {
                    head
                } else {
                    anchor
                }
            }
            Selection::Node { from, .. } | Selection::All { from, .. } => from,
        }
    }

    /// The upper bound, resolved.
    pub fn rto(&self) -> &ResolvedPos {
        match self {
            Selection::Text { anchor, head } => {
                if head.pos() < anchor.pos() {
                    anchor
                } else {
                    head
                }
            }
            Selection::Node { to, .. } | Selection::All { to, .. } => to,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.from() == self.to()
    }

    /// The cursor position when this is a collapsed text selection.
    pub fn as_cursor(&self) -> Option<&ResolvedPos> {
        match self {
            Selection::Text { anchor, head } if anchor.pos() == head.pos() => Some(head),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Selection::Text { .. })
    }

    /// The selected node of a node selection.
    pub fn selected_node(&self) -> Option<Node> {
        match self {
            Selection::Node { from, .. } => from.node_after(),
            _ => None,
        }
    }

    /// Carries the selection over to `doc`, the result of applying
    /// `mapping` to the document this selection belongs to.
    pub fn map(&self, doc: &Node, mapping: &Mapping) -> Selection {
        let resolve = |pos: usize| match doc.resolve(pos) {
            Ok(rpos) => Some(rpos),
            Err(err) => {
                warn!("selection position {pos} lost in mapping: {err}");
                None
            }
        };
        match self {
            Selection::Text { anchor, head } => {
                let Some(new_head) = resolve(mapping.map(head.pos(), Assoc::After)) else {
                    return Selection::at_start(doc);
                };
                if !new_head.parent().inline_content() {
                    return Selection::near(&new_head, Direction::Forward);
                }
                let new_anchor = resolve(mapping.map(anchor.pos(), Assoc::After))
                    .filter(|a| a.parent().inline_content())
                    .unwrap_or_else(|| new_head.clone());
                Selection::Text {
                    anchor: new_anchor,
                    head: new_head,
                }
            }
            Selection::Node { from, .. } => {
                let result = mapping.map_result(from.pos(), Assoc::After);
                let Some(rpos) = resolve(result.pos) else {
                    return Selection::at_start(doc);
                };
                if result.deleted() {
                    return Selection::near(&rpos, Direction::Forward);
                }
                Selection::node(doc, rpos.pos())
                    .unwrap_or_else(|_| Selection::near(&rpos, Direction::Forward))
            }
            Selection::All { .. } => Selection::all(doc),
        }
    }
}

fn find_from(rpos: &ResolvedPos, dir: Direction, text_only: bool) -> Option<Selection> {
    let doc = rpos.doc();
    if rpos.parent().inline_content() {
        return Selection::cursor(doc, rpos.pos()).ok();
    }
    let depth = rpos.depth();
    let index = rpos.index(depth);
    if let Some(found) = find_selection_in(doc, rpos.parent(), rpos.pos(), index, dir, text_only) {
        return Some(found);
    }
    for d in (0..depth).rev() {
        let found = match dir {
            Direction::Backward => {
                let (node, pos) = (rpos.node(d), rpos.before(d + 1));
                find_selection_in(doc, node, pos, rpos.index(d), dir, text_only)
            }
            Direction::Forward => {
                let (node, pos) = (rpos.node(d), rpos.after(d + 1));
                find_selection_in(doc, node, pos, rpos.index(d) + 1, dir, text_only)
            }
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Searches the children of `node` (whose child `index` starts at `pos`)
/// for a selectable position.
fn find_selection_in(
    doc: &Node,
    node: &Node,
    pos: usize,
    index: usize,
    dir: Direction,
    text_only: bool,
) -> Option<Selection> {
    if node.inline_content() {
        return Selection::cursor(doc, pos).ok();
    }
    let mut pos = pos;
    match dir {
        Direction::Forward => {
            for child in node.content().nodes().iter().skip(index) {
                if !child.is_atom() {
                    if let Some(found) = find_selection_in(doc, child, pos + 1, 0, dir, text_only) {
                        return Some(found);
                    }
                } else if !text_only && child.node_type().is_selectable() {
                    return Selection::node(doc, pos).ok();
                }
                pos += child.node_size();
            }
        }
        Direction::Backward => {
            for child in node.content().nodes()[..index].iter().rev() {
                if !child.is_atom() {
                    let last = child.child_count();
                    let found = find_selection_in(doc, child, pos - 1, last, dir, text_only);
                    if let Some(found) = found {
                        return Some(found);
                    }
                } else if !text_only && child.node_type().is_selectable() {
                    return Selection::node(doc, pos - child.node_size()).ok();
                }
                pos -= child.node_size();
            }
        }
    }
    None
}

impl PartialEq for Selection {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Selection::Text { .. }, Selection::Text { .. })
            | (Selection::Node { .. }, Selection::Node { .. })
            | (Selection::All { .. }, Selection::All { .. }) => {
                self.anchor() == other.anchor() && self.head() == other.head()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Text { anchor, head } if anchor.pos() == head.pos() => {
                write!(f, "Cursor({})", head.pos())
            }
            Selection::Text { anchor, head } => write!(f, "Text({}, {})", anchor.pos(), head.pos()),
            Selection::Node { from, .. } => write!(f, "Node({})", from.pos()),
            Selection::All { .. } => write!(f, "All"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use crate::transform::Transform;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cursor_and_range_bounds() {
        let d = doc(vec![p("abc")]);
        let sel = Selection::text(&d, 3, 1).unwrap();
        assert_eq!(sel.from(), 1);
        assert_eq!(sel.to(), 3);
        assert_eq!(sel.anchor(), 3);
        assert!(sel.as_cursor().is_none());
        assert!(Selection::cursor(&d, 2).unwrap().as_cursor().is_some());
    }

    #[test]
    fn test_node_selection_requires_a_node() {
        let d = doc(vec![p("a"), hr()]);
        let sel = Selection::node(&d, 3).unwrap();
        assert_eq!(sel.to(), 4);
        assert_eq!(
            sel.selected_node().map(|n| n.node_type()),
            Some(crate::model::NodeType::HorizontalRule)
        );
        assert!(matches!(Selection::node(&d, 4), Err(StateError::NoNodeAt(4))));
    }

    #[test]
    fn test_at_start_enters_first_textblock() {
        let d = doc(vec![ul(vec![item("a")])]);
        assert_eq!(Selection::at_start(&d), Selection::cursor(&d, 3).unwrap());
    }

    #[test]
    fn test_near_selects_rule_between_blocks() {
        let d = doc(vec![hr(), p("a")]);
        let rpos = d.resolve(0).unwrap();
        assert_eq!(Selection::near(&rpos, Direction::Forward), Selection::node(&d, 0).unwrap());
        let rpos = d.resolve(1).unwrap();
        assert_eq!(Selection::near(&rpos, Direction::Forward), Selection::cursor(&d, 2).unwrap());
        assert_eq!(Selection::near(&rpos, Direction::Backward), Selection::node(&d, 0).unwrap());
    }

    #[test]
    fn test_hard_break_is_not_node_selectable() {
        let d = doc(vec![p_with(vec![txt("a"), br()])]);
        assert!(!d.child(0).child(1).node_type().is_selectable());
    }

    #[test]
    fn test_map_cursor_through_insertion() {
        let d = doc(vec![p("ab")]);
        let sel = Selection::cursor(&d, 2).unwrap();
        let mut tr = Transform::new(d);
        tr.insert(1, txt("xy")).unwrap();
        assert_eq!(sel.map(tr.doc(), tr.mapping()), Selection::cursor(tr.doc(), 4).unwrap());
    }

    #[test]
    fn test_map_node_selection_falls_back_when_deleted() {
        let d = doc(vec![p("a"), hr(), p("b")]);
        let sel = Selection::node(&d, 3).unwrap();
        let mut tr = Transform::new(d);
        tr.delete(3, 4).unwrap();
        let mapped = sel.map(tr.doc(), tr.mapping());
        assert!(mapped.as_cursor().is_some());
    }
}
