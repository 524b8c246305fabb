//! Structural queries: whether a range can be lifted, wrapped, split or
//! joined, and where. These never change a document; the matching edits
//! live on [`super::Transform`].

use crate::model::{Fragment, Node, NodeKind, NodeRange, NodeType, ResolvedPos, Slice};

use super::step::Step;

fn can_cut(node: &Node, start: usize, end: usize) -> bool {
    (start == 0 || node.can_replace(start, node.child_count(), &Fragment::empty()))
        && (end == node.child_count() || node.can_replace(0, end, &Fragment::empty()))
}

/// The depth a range can be lifted to, or `None` when no ancestor accepts
/// its content. Lifting never crosses an isolating node.
pub fn lift_target(range: &NodeRange) -> Option<usize> {
    let content = range
        .parent()
        .content()
        .cut_by_index(range.start_index(), range.end_index());
    let mut depth = range.depth;
    loop {
        let node = range.from.node(depth);
        let index = range.from.index(depth);
        let end_index = range.to.index_after(depth);
        if depth < range.depth && node.can_replace(index, end_index, &content) {
            return Some(depth);
        }
        if depth == 0 || node.node_type().is_isolating() || !can_cut(node, index, end_index) {
            return None;
        }
        depth -= 1;
    }
}

/// The wrapper chain needed to wrap `range` in a node of `ty`, outermost
/// first, ending with `ty` itself.
pub fn find_wrapping(range: &NodeRange, ty: NodeType) -> Option<Vec<NodeType>> {
    let around = find_wrapping_outside(range, ty)?;
    let inner = find_wrapping_inside(range, ty)?;
    let mut wrappers = around;
    wrappers.push(ty);
    wrappers.extend(inner);
    Some(wrappers)
}

fn find_wrapping_outside(range: &NodeRange, ty: NodeType) -> Option<Vec<NodeType>> {
    let parent = range.parent();
    let around = parent.content_match_at(range.start_index())?.find_wrapping(ty)?;
    let outer = around.first().copied().unwrap_or(ty);
    parent
        .can_replace_with(range.start_index(), range.end_index(), outer)
        .then_some(around)
}

fn find_wrapping_inside(range: &NodeRange, ty: NodeType) -> Option<Vec<NodeType>> {
    let parent = range.parent();
    let inner = parent.maybe_child(range.start_index())?;
    let inside = ty.content_match().find_wrapping(inner.node_type())?;
    let last = inside.last().copied().unwrap_or(ty);
    let mut matched = Some(last.content_match());
    for i in range.start_index()..range.end_index() {
        matched = matched.and_then(|m| m.match_type(parent.child(i).node_type()));
    }
    matched.filter(|m| m.valid_end()).map(|_| inside)
}

/// Whether splitting at `pos`, `depth` levels deep, yields valid nodes.
/// `types_after` optionally overrides the kind of each node after the
/// split, outermost first.
pub fn can_split(doc: &Node, pos: usize, depth: usize, types_after: &[Option<NodeKind>]) -> bool {
    let Ok(rpos) = doc.resolve(pos) else {
        return false;
    };
    if depth == 0 || depth > rpos.depth() {
        return false;
    }
    let base = rpos.depth() - depth;
    let after_type =
        |i: usize| types_after.get(i).and_then(|k| k.as_ref()).map(NodeKind::node_type);

    let parent = rpos.parent();
    let index = rpos.index(rpos.depth());
    let inner_type = after_type(depth - 1).unwrap_or(parent.node_type());
    if parent.node_type().is_isolating()
        || !parent.can_replace(index, parent.child_count(), &Fragment::empty())
        || !inner_type.valid_content(&parent.content().cut_by_index(index, parent.child_count()))
    {
        return false;
    }

    // d runs from the parent's parent out to just above `base`, with i
    // indexing `types_after` for the node split at that level
    for (d, i) in ((base + 1)..rpos.depth()).rev().zip((0..depth - 1).rev()) {
        let node = rpos.node(d);
        let index = rpos.index(d);
        if node.node_type().is_isolating() {
            return false;
        }
        let mut rest = node.content().cut_by_index(index, node.child_count());
        if let Some(Some(kind)) = types_after.get(i + 1) {
            rest = rest.replace_child(0, Node::branch(kind.clone(), Fragment::empty()));
        }
        let after = after_type(i).unwrap_or(node.node_type());
        if !node.can_replace(index + 1, node.child_count(), &Fragment::empty())
            || !after.valid_content(&rest)
        {
            return false;
        }
    }
    let index = rpos.index_after(base);
    let base_type = after_type(0).unwrap_or(rpos.node(base + 1).node_type());
    rpos.node(base).can_replace_with(index, index, base_type)
}

/// Whether the nodes on both sides of `pos` can be joined into one.
pub fn can_join(doc: &Node, pos: usize) -> bool {
    let Ok(rpos) = doc.resolve(pos) else {
        return false;
    };
    let index = rpos.index(rpos.depth());
    let joinable = match (rpos.node_before(), rpos.node_after()) {
        (Some(before), Some(after)) => !before.is_leaf() && before.can_append(&after),
        _ => false,
    };
    joinable && rpos.parent().can_replace(index, index + 1, &Fragment::empty())
}

/// Whether the `depth` levels of nodes meeting at `pos` have matching
/// types and merging them produces a valid document.
pub fn joinable(doc: &Node, pos: usize, depth: usize) -> bool {
    let Ok(rpos) = doc.resolve(pos) else {
        return false;
    };
    if depth == 0 || pos < depth || pos + depth > doc.content_size() {
        return false;
    }
    let (mut before, mut after) = (rpos.node_before(), rpos.node_after());
    for _ in 0..depth {
        match (before, after) {
            (Some(b), Some(a))
                if b.node_type() == a.node_type() && !b.is_leaf() && !a.is_leaf() =>
            {
                before = b.last_child().cloned();
                after = a.first_child().cloned();
            }
            _ => return false,
        }
    }
    Step::structural(pos - depth, pos + depth, Slice::empty())
        .apply(doc)
        .is_ok()
}

/// A position near `pos` where a node of `ty` could be inserted, moving out
/// of the parent when `pos` sits at its start or end.
pub fn insert_point(doc: &Node, pos: usize, ty: NodeType) -> Option<usize> {
    let rpos = doc.resolve(pos).ok()?;
    let index = rpos.index(rpos.depth());
    if rpos.parent().can_replace_with(index, index, ty) {
        return Some(pos);
    }
    if rpos.parent_offset() == 0 {
        for d in (0..rpos.depth()).rev() {
            let index = rpos.index(d);
            if rpos.node(d).can_replace_with(index, index, ty) {
                return Some(rpos.before(d + 1));
            }
            if index > 0 {
                return None;
            }
        }
    }
    if rpos.parent_offset() == rpos.parent().content_size() {
        for d in (0..rpos.depth()).rev() {
            let index = rpos.index_after(d);
            if rpos.node(d).can_replace_with(index, index, ty) {
                return Some(rpos.after(d + 1));
            }
            if index < rpos.node(d).child_count() {
                return None;
            }
        }
    }
    None
}

/// Depths, innermost first, at which `from..to` covers the whole content
/// of a shared ancestor.
pub(crate) fn covered_depths(from: &ResolvedPos, to: &ResolvedPos) -> Vec<usize> {
    let mut result = Vec::new();
    let min_depth = from.depth().min(to.depth());
    for d in (0..=min_depth).rev() {
        let start = from.start(d);
        if start + (from.depth() - d) < from.pos()
            || to.end(d) > to.pos() + (to.depth() - d)
            || from.node(d).node_type().is_isolating()
            || to.node(d).node_type().is_isolating()
        {
            break;
        }
        let same_textblock_pair = d == from.depth()
            && d == to.depth()
            && from.parent().inline_content()
            && to.parent().inline_content()
            && d > 0
            && to.start(d - 1) + 1 == start;
        if start == to.start(d) || same_textblock_pair {
            result.push(d);
        }
    }
    result
}
