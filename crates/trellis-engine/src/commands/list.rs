//! Structural editing of nested ordered and bulleted lists.
//!
//! Every command here reads the state, decides whether it applies, and only
//! then builds a transaction. Declining is normal: the command chain moves
//! on to the generic commands in [`super::base`].

use crate::model::{Fragment, Node, NodeKind, NodeRange, NodeType, ResolvedPos, Slice};
use crate::state::{Direction, EditorState, Selection, Transaction};
use crate::transform::{Step, StepError, can_split, lift_target};

use super::built;

fn is_item(node: &Node) -> bool {
    node.node_type() == NodeType::ListItem
}

/// Ranges of list items sit in a node whose first child is an item.
fn holds_items(node: &Node) -> bool {
    node.first_child().is_some_and(is_item)
}

/// The range of list items covered by a text selection.
fn selected_items(state: &EditorState) -> Option<NodeRange> {
    let selection = state.selection();
    if !selection.is_text() {
        return None;
    }
    selection.rfrom().block_range(selection.rto(), holds_items)
}

fn crosses_isolating(rpos: &ResolvedPos, from_depth: usize) -> bool {
    (from_depth..=rpos.depth()).any(|d| rpos.node(d).node_type().is_isolating())
}

/// Enter inside a list item.
///
/// In an empty last item of a nested list the item moves out one level;
/// anywhere else the item is split in two at the cursor.
pub fn split_list_item(state: &EditorState) -> Option<Transaction> {
    let cursor = state.selection().as_cursor()?;
    let depth = cursor.depth();
    if depth < 2 {
        return None;
    }
    let item = cursor.node(depth - 1);
    if !is_item(item) {
        return None;
    }

    if cursor.parent().content_size() == 0 && item.child_count() == cursor.index_after(depth - 1) {
        // only a nested tail item is handled here; a top-level one is
        // lifted out of its list by the commands after this one
        if depth < 3
            || !is_item(cursor.node(depth - 3))
            || cursor.index(depth - 2) + 1 != cursor.node(depth - 2).child_count()
        {
            return None;
        }
        let depth_before = if cursor.index(depth - 1) > 0 {
            1
        } else if cursor.index(depth - 2) > 0 {
            2
        } else {
            3
        };
        // empty copies of the structure from the outer item down
        let mut wrap = Fragment::empty();
        for d in (depth - 3..=depth - depth_before).rev() {
            wrap = Fragment::from_node(cursor.node(d).copy(wrap));
        }
        let depth_after = if cursor.index_after(depth - 1) < cursor.node(depth - 2).child_count() {
            1
        } else if cursor.index_after(depth - 2) < cursor.node(depth - 3).child_count() {
            2
        } else {
            3
        };
        wrap = wrap.add_to_end(NodeType::ListItem.create_and_fill()?);
        let start = cursor.before(depth - (depth_before - 1));
        let mut tr = state.tr();
        built(
            "split_list_item",
            tr.replace(
                start,
                cursor.after(depth - depth_after),
                Slice::new(wrap, 4 - depth_before, 0),
            )
            .map(|_| ()),
        )?;

        let doc = tr.doc().clone();
        let mut empty_block = None;
        doc.nodes_between(start, doc.content_size(), &mut |node, pos, _, _| {
            if empty_block.is_some() {
                return false;
            }
            if node.is_textblock() && node.content_size() == 0 {
                empty_block = Some(pos + 1);
            }
            true
        });
        if let Some(pos) = empty_block {
            let rpos = built("split_list_item", doc.resolve(pos).map_err(StepError::from))?;
            tr.set_selection(Selection::near(&rpos, Direction::Forward));
        }
        return Some(tr);
    }

    let at_end = cursor.pos() == cursor.end(depth);
    let next_type = item.content_match_at(0).and_then(|m| m.default_type());
    let types: Vec<Option<NodeKind>> = match next_type {
        Some(next) if at_end => vec![None, Some(next.default_kind())],
        _ => Vec::new(),
    };
    if !can_split(state.doc(), cursor.pos(), 2, &types) {
        return None;
    }
    let mut tr = state.tr();
    built("split_list_item", tr.split(cursor.pos(), 2, &types).map(|_| ()))?;
    Some(tr)
}

/// Shift-Tab: moves the selected items one level out, or out of the list
/// entirely at the top level.
pub fn lift_list_item(state: &EditorState) -> Option<Transaction> {
    let range = selected_items(state)?;
    let mut tr = state.tr();
    built("lift_list_item", lift_items(&mut tr, &range))?.then_some(tr)
}

/// Tab: moves the selected items into a sub-list of the item before them.
pub fn sink_list_item(state: &EditorState) -> Option<Transaction> {
    let range = selected_items(state)?;
    let mut tr = state.tr();
    built("sink_list_item", sink_items(&mut tr, &range))?.then_some(tr)
}

/// Backspace at the start of a list item.
///
/// Joins with the previous item, moves into the previous item's sub-list,
/// or outdents the first item of a list.
pub fn join_list_backward(state: &EditorState) -> Option<Transaction> {
    let cursor = state.selection().as_cursor()?;
    let depth = cursor.depth();
    if cursor.parent_offset() != 0
        || depth < 2
        || !is_item(cursor.node(depth - 1))
        || cursor.index(depth - 1) != 0
    {
        return None;
    }
    if crosses_isolating(cursor, depth - 2) {
        return None;
    }
    let list_depth = depth - 2;
    let index = cursor.index(list_depth);
    let mut tr = state.tr();
    if index > 0 {
        let item_before = cursor.node(list_depth).child(index - 1);
        if item_before.child_count() == 1 {
            return built("join_list_backward", tr.join(cursor.before(depth - 1), 2))?.then_some(tr);
        }
        let range = cursor.block_range(cursor, holds_items)?;
        return built("join_list_backward", sink_items(&mut tr, &range))?.then_some(tr);
    }
    let range = cursor.block_range(cursor, holds_items)?;
    built("join_list_backward", lift_items(&mut tr, &range))?.then_some(tr)
}

/// Delete at the end of a list item's paragraph.
///
/// Joins the next item into this one, pulls the next item of an enclosing
/// list in as a sibling, or lifts the first sub-item and joins it into this
/// item.
pub fn join_list_forward(state: &EditorState) -> Option<Transaction> {
    let cursor = state.selection().as_cursor()?;
    let depth = cursor.depth();
    if cursor.parent_offset() != cursor.parent().content_size()
        || depth < 2
        || !is_item(cursor.node(depth - 1))
    {
        return None;
    }
    if crosses_isolating(cursor, depth - 2) {
        return None;
    }
    let doc = state.doc();
    let item = cursor.node(depth - 1);
    let mut tr = state.tr();

    if item.child_count() == 1 {
        let list_depth = depth - 2;
        if cursor.index(list_depth) + 1 < cursor.node(list_depth).child_count() {
            return built("join_list_forward", tr.join(cursor.after(depth - 1), 2))?.then_some(tr);
        }

        // the nearest enclosing item whose list continues after it
        let mut item_depth = depth - 1;
        let merge_depth = loop {
            if item_depth <= 1 || !is_item(cursor.node(item_depth)) {
                return None;
            }
            let list = cursor.node(item_depth - 1);
            if cursor.index(item_depth - 1) + 1 < list.child_count() {
                break item_depth;
            }
            item_depth -= 2;
        };
        let item_before = cursor.after(merge_depth);
        let next = cursor
            .node(merge_depth - 1)
            .child(cursor.index(merge_depth - 1) + 1);
        let item_after = item_before + next.node_size();
        let range = NodeRange::new(
            doc.resolve(item_before).ok()?,
            doc.resolve(item_after).ok()?,
            merge_depth - 1,
        );
        return built("join_list_forward", sink_items(&mut tr, &range))?.then_some(tr);
    }

    let sub_item_start = cursor.after(depth) + 1;
    let sub_item = item.last_child().and_then(Node::first_child)?;
    let rstart = doc.resolve(sub_item_start).ok()?;
    let rend = doc.resolve(sub_item_start + sub_item.node_size()).ok()?;
    let range = rstart.block_range(&rend, |_| true)?;
    if !built("join_list_forward", lift_to_outer_list(&mut tr, &range))? {
        return None;
    }
    let joined = tr
        .doc()
        .resolve(cursor.pos())
        .map_err(StepError::from)
        .and_then(|rpos| tr.join(rpos.after(depth - 1), 2));
    built("join_list_forward", joined)?;
    Some(tr)
}

/// Lifts the items of `range` one level: into the enclosing list when the
/// list is nested, out of the list otherwise.
fn lift_items(tr: &mut Transaction, range: &NodeRange) -> Result<bool, StepError> {
    if range.depth > 0 && is_item(range.from.node(range.depth - 1)) {
        lift_to_outer_list(tr, range)
    } else {
        lift_out_of_list(tr, range)
    }
}

/// Moves items of a nested list into the enclosing list, right after the
/// item that contained them. Items following the range stay nested, now
/// under the last lifted item.
fn lift_to_outer_list(tr: &mut Transaction, range: &NodeRange) -> Result<bool, StepError> {
    let end = range.end();
    let end_of_list = range.to.end(range.depth);
    let mut range = range.clone();
    if end < end_of_list {
        let last_item = range.parent().child(range.end_index() - 1);
        let sub_list = last_item.last_child().filter(|child| child.node_type().is_list());
        let step = match sub_list {
            Some(sub_list) => {
                let content = Node::branch(
                    NodeKind::ListItem,
                    Fragment::from_node(sub_list.copy(Fragment::empty())),
                );
                let slice = Slice::new(Fragment::from_node(content), 2, 0);
                Step::replace_around(end - 2, end_of_list, end, end_of_list, slice, 0, true)
            }
            None => {
                let list = range.parent().copy(Fragment::empty());
                let content = Node::branch(NodeKind::ListItem, Fragment::from_node(list));
                let slice = Slice::new(Fragment::from_node(content), 1, 0);
                Step::replace_around(end - 1, end_of_list, end, end_of_list, slice, 1, true)
            }
        };
        tr.step(step)?;
        range = NodeRange::new(
            tr.doc().resolve(range.from.pos())?,
            tr.doc().resolve(end_of_list)?,
            range.depth,
        );
    }
    let Some(target) = lift_target(&range) else {
        return Ok(false);
    };
    tr.lift(&range, target)?;
    Ok(true)
}

/// Unwraps the items of a top-level list range into their parent,
/// splitting the list around them.
fn lift_out_of_list(tr: &mut Transaction, range: &NodeRange) -> Result<bool, StepError> {
    let list_depth = range.depth;
    if list_depth == 0 {
        return Ok(false);
    }
    let mut starts = Vec::with_capacity(range.end_index() - range.start_index());
    let mut pos = range.start();
    for i in range.start_index()..range.end_index() {
        starts.push(pos);
        pos += range.parent().child(i).node_size();
    }
    // last item first, so the positions of earlier items stay valid
    for &start in starts.iter().rev() {
        let rstart = tr.doc().resolve(start)?;
        let list = rstart.node(list_depth).clone();
        let index = rstart.index(list_depth);
        let item = list.child(index).clone();
        let at_start = index == 0;
        let at_end = index + 1 == list.child_count();
        let parent = rstart.node(list_depth - 1);
        let index_before = rstart.index(list_depth - 1);
        let rest = if at_end {
            Fragment::empty()
        } else {
            Fragment::from_node(list.copy(Fragment::empty()))
        };
        let from_index = index_before + usize::from(!at_start);
        if !parent.can_replace(from_index, index_before + 1, &item.content().append(&rest)) {
            return Ok(false);
        }
        let end = start + item.node_size();
        let mut wrap = Fragment::empty();
        if !at_start {
            wrap = wrap.add_to_end(list.copy(Fragment::empty()));
        }
        if !at_end {
            wrap = wrap.add_to_end(list.copy(Fragment::empty()));
        }
        let slice = Slice::new(wrap, usize::from(!at_start), usize::from(!at_end));
        tr.step(Step::replace_around(
            start - usize::from(at_start),
            end + usize::from(at_end),
            start + 1,
            end - 1,
            slice,
            usize::from(!at_start),
            false,
        ))?;
    }
    Ok(true)
}

/// Moves the items of `range` into a sub-list of the item before them,
/// appending to that item's sub-list when it already has one.
fn sink_items(tr: &mut Transaction, range: &NodeRange) -> Result<bool, StepError> {
    let start_index = range.start_index();
    if start_index == 0 {
        return Ok(false);
    }
    let parent = range.parent();
    let item_before = parent.child(start_index - 1);
    if !is_item(item_before) {
        return Ok(false);
    }
    let nested_before = item_before
        .last_child()
        .filter(|child| child.node_type().is_list());
    let (list, open) = match nested_before {
        Some(sub_list) => {
            let inner = Node::branch(NodeKind::ListItem, Fragment::empty());
            (sub_list.copy(Fragment::from_node(inner)), 3)
        }
        None => (Node::branch(parent.node_type().default_kind(), Fragment::empty()), 1),
    };
    let content = Node::branch(NodeKind::ListItem, Fragment::from_node(list));
    let (before, after) = (range.start(), range.end());
    tr.step(Step::replace_around(
        before - open,
        after,
        before,
        after,
        Slice::new(Fragment::from_node(content), open, 0),
        1,
        true,
    ))?;
    Ok(true)
}
