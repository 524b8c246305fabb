//! General editing commands: deleting, joining and splitting blocks
//! outside of any list-specific handling, and toggling inline marks.

use crate::model::{
    ContentMatch, Fragment, Mark, MarkType, Node, NodeKind, NodeType, ResolvedPos, Slice,
};
use crate::state::{Direction, EditorState, Selection, Transaction};
use crate::transform::{Assoc, Mappable, Step, can_join, can_split, lift_target};

use super::built;

/// Deletes a non-empty selection.
pub fn delete_selection(state: &EditorState) -> Option<Transaction> {
    if state.selection().is_empty() {
        return None;
    }
    let mut tr = state.tr();
    built("delete_selection", tr.delete_selection().map(|_| ()))?;
    Some(tr)
}

/// Turns an empty non-paragraph textblock back into a paragraph.
pub fn set_paragraph(state: &EditorState) -> Option<Transaction> {
    let cursor = state.selection().as_cursor()?;
    let parent = cursor.parent();
    if parent.node_type() == NodeType::Paragraph || parent.content_size() > 0 {
        return None;
    }
    let depth = cursor.depth();
    let mut tr = state.tr();
    built(
        "set_paragraph",
        tr.set_block_type(cursor.before(depth), cursor.after(depth), &NodeKind::Paragraph)
            .map(|_| ()),
    )?;
    Some(tr)
}

/// Backspace at the start of a textblock: join it with the block before,
/// lift it out of its parent, or delete an atom before it.
pub fn join_backward(state: &EditorState) -> Option<Transaction> {
    let cursor = state.selection().as_cursor()?;
    if cursor.parent_offset() > 0 {
        return None;
    }
    let Some(cut) = find_cut_before(cursor) else {
        let range = cursor.block_range(cursor, |_| true)?;
        let target = lift_target(&range)?;
        let mut tr = state.tr();
        built("join_backward", tr.lift(&range, target).map(|_| ()))?;
        return Some(tr);
    };
    let before = cut.node_before()?;

    if !before.node_type().is_isolating()
        && let Some(tr) = delete_barrier(state, &cut)
    {
        return Some(tr);
    }

    let depth = cursor.depth();
    if cursor.parent().content_size() == 0
        && (textblock_at(&before, Side::End) || is_selectable(&before))
    {
        let mut tr = state.tr();
        built(
            "join_backward",
            tr.delete_range(cursor.before(depth), cursor.after(depth)).map(|_| ()),
        )?;
        let selection = if textblock_at(&before, Side::End) {
            let pos = tr.mapping().map(cut.pos(), Assoc::Before);
            let rpos = built("join_backward", tr.doc().resolve(pos).map_err(Into::into))?;
            Selection::find_from(&rpos, Direction::Backward, false)?
        } else {
            Selection::node(tr.doc(), cut.pos() - before.node_size()).ok()?
        };
        tr.set_selection(selection);
        return Some(tr);
    }

    if before.is_atom() && cut.depth() + 1 == depth {
        let mut tr = state.tr();
        built(
            "join_backward",
            tr.delete(cut.pos() - before.node_size(), cut.pos()).map(|_| ()),
        )?;
        return Some(tr);
    }
    None
}

/// Delete at the end of a textblock: pull the next block into this one,
/// or delete an atom after it.
pub fn join_forward(state: &EditorState) -> Option<Transaction> {
    let cursor = state.selection().as_cursor()?;
    if cursor.parent_offset() < cursor.parent().content_size() {
        return None;
    }
    let cut = find_cut_after(cursor)?;
    let after = cut.node_after()?;

    if let Some(tr) = delete_barrier(state, &cut) {
        return Some(tr);
    }

    let depth = cursor.depth();
    if cursor.parent().content_size() == 0
        && (textblock_at(&after, Side::Start) || is_selectable(&after))
    {
        let mut tr = state.tr();
        built(
            "join_forward",
            tr.delete_range(cursor.before(depth), cursor.after(depth)).map(|_| ()),
        )?;
        let pos = tr.mapping().map(cut.pos(), Assoc::After);
        let selection = if textblock_at(&after, Side::Start) {
            let rpos = built("join_forward", tr.doc().resolve(pos).map_err(Into::into))?;
            Selection::find_from(&rpos, Direction::Forward, false)?
        } else {
            Selection::node(tr.doc(), pos).ok()?
        };
        tr.set_selection(selection);
        return Some(tr);
    }

    if after.is_atom() && cut.depth() + 1 == depth {
        let mut tr = state.tr();
        built(
            "join_forward",
            tr.delete(cut.pos(), cut.pos() + after.node_size()).map(|_| ()),
        )?;
        return Some(tr);
    }
    None
}

/// Selects the selectable node before a cursor at the start of its
/// textblock.
pub fn select_node_backward(state: &EditorState) -> Option<Transaction> {
    let selection = state.selection();
    if !selection.is_empty() {
        return None;
    }
    let head = selection.rfrom();
    let cut = if head.parent().is_textblock() {
        if head.parent_offset() > 0 {
            return None;
        }
        find_cut_before(head)?
    } else {
        head.clone()
    };
    let node = cut.node_before().filter(is_selectable)?;
    let selection = Selection::node(state.doc(), cut.pos() - node.node_size()).ok()?;
    let mut tr = state.tr();
    tr.set_selection(selection);
    Some(tr)
}

/// Selects the selectable node after a cursor at the end of its
/// textblock.
pub fn select_node_forward(state: &EditorState) -> Option<Transaction> {
    let selection = state.selection();
    if !selection.is_empty() {
        return None;
    }
    let head = selection.rfrom();
    let cut = if head.parent().is_textblock() {
        if head.parent_offset() < head.parent().content_size() {
            return None;
        }
        find_cut_after(head)?
    } else {
        head.clone()
    };
    cut.node_after().filter(is_selectable)?;
    let selection = Selection::node(state.doc(), cut.pos()).ok()?;
    let mut tr = state.tr();
    tr.set_selection(selection);
    Some(tr)
}

/// Enter inside a code block inserts a newline.
pub fn newline_in_code(state: &EditorState) -> Option<Transaction> {
    let selection = state.selection();
    let (from, to) = (selection.rfrom(), selection.rto());
    if !from.parent().node_type().is_code() || !from.same_parent(to) {
        return None;
    }
    let mut tr = state.tr();
    built("newline_in_code", tr.insert_text("\n").map(|_| ()))?;
    Some(tr)
}

/// Leaves a code block, creating an empty paragraph after it.
pub fn exit_code(state: &EditorState) -> Option<Transaction> {
    let selection = state.selection();
    let head = selection.rto();
    if !head.parent().node_type().is_code() || !head.same_parent(selection.rfrom()) {
        return None;
    }
    let depth = head.depth();
    let above = head.node(depth - 1);
    let after = head.index_after(depth - 1);
    let ty = default_block_at(above.content_match_at(after)?)?;
    if !above.can_replace_with(after, after, ty) {
        return None;
    }
    let pos = head.after(depth);
    let mut tr = state.tr();
    built("exit_code", tr.insert(pos, ty.create_and_fill()?).map(|_| ()))?;
    let rpos = built("exit_code", tr.doc().resolve(pos).map_err(Into::into))?;
    tr.set_selection(Selection::near(&rpos, Direction::Forward));
    Some(tr)
}

/// With a block node selected, opens an empty paragraph next to it.
pub fn create_paragraph_near(state: &EditorState) -> Option<Transaction> {
    let selection = state.selection();
    let (from, to) = (selection.rfrom(), selection.rto());
    if matches!(selection, Selection::All { .. })
        || from.parent().inline_content()
        || to.parent().inline_content()
    {
        return None;
    }
    let ty = default_block_at(to.parent().content_match_at(to.index_after(to.depth()))?)?;
    let side = if from.parent_offset() == 0 && to.index(to.depth()) < to.parent().child_count() {
        from.pos()
    } else {
        to.pos()
    };
    let mut tr = state.tr();
    built("create_paragraph_near", tr.insert(side, ty.create_and_fill()?).map(|_| ()))?;
    let cursor = Selection::cursor(tr.doc(), side + 1).ok()?;
    tr.set_selection(cursor);
    Some(tr)
}

/// In an empty textblock: split the parent when the block is not its
/// last child, otherwise lift the block out.
pub fn lift_empty_block(state: &EditorState) -> Option<Transaction> {
    let cursor = state.selection().as_cursor()?;
    if cursor.parent().content_size() > 0 {
        return None;
    }
    let depth = cursor.depth();
    if depth > 1 && cursor.after(depth) != cursor.end(depth - 1) {
        let before = cursor.before(depth);
        if can_split(state.doc(), before, 1, &[]) {
            let mut tr = state.tr();
            built("lift_empty_block", tr.split(before, 1, &[]).map(|_| ()))?;
            return Some(tr);
        }
    }
    let range = cursor.block_range(cursor, |_| true)?;
    let target = lift_target(&range)?;
    let mut tr = state.tr();
    built("lift_empty_block", tr.lift(&range, target).map(|_| ()))?;
    Some(tr)
}

/// Splits the textblock at the selection, deleting selected content
/// first. The new block becomes the default block type when the split is
/// at the end.
pub fn split_block(state: &EditorState) -> Option<Transaction> {
    let selection = state.selection();
    let from = selection.rfrom();
    if let Selection::Node { .. } = selection {
        let node = selection.selected_node()?;
        if !node.is_block()
            || from.parent_offset() == 0
            || !can_split(state.doc(), from.pos(), 1, &[])
        {
            return None;
        }
        let mut tr = state.tr();
        built("split_block", tr.split(from.pos(), 1, &[]).map(|_| ()))?;
        return Some(tr);
    }
    let depth = from.depth();
    if depth == 0 {
        return None;
    }
    let node = from.node(depth);
    let at_end = from.end(depth) == from.pos();
    let at_start = from.start(depth) == from.pos();
    let default = from
        .node(depth - 1)
        .content_match_at(from.index_after(depth - 1))
        .and_then(default_block_at);

    let mut tr = state.tr();
    built("split_block", tr.delete_selection().map(|_| ()))?;
    let split_pos = tr.mapping().map(from.pos(), Assoc::After);
    let mut types = vec![default.filter(|_| at_end).map(NodeType::default_kind)];
    if !can_split(tr.doc(), split_pos, 1, &types) {
        types = vec![default.map(NodeType::default_kind)];
        if !can_split(tr.doc(), split_pos, 1, &types) {
            return None;
        }
    }
    built("split_block", tr.split(split_pos, 1, &types).map(|_| ()))?;

    if let Some(default) = default
        && !at_end
        && at_start
        && node.node_type() != default
    {
        let first = tr.mapping().map(from.before(depth), Assoc::After);
        let rfirst = built("split_block", tr.doc().resolve(first).map_err(Into::into))?;
        let index = rfirst.index(rfirst.depth());
        if from.node(depth - 1).can_replace_with(index, index + 1, default) {
            built(
                "split_block",
                tr.set_node_markup(first, Some(default.default_kind()), None).map(|_| ()),
            )?;
        }
    }
    Some(tr)
}

/// Tries the ways two blocks meeting at `cut` can be merged: a plain
/// join, clearing an empty block, moving the right block into the left
/// one, or lifting it.
fn delete_barrier(state: &EditorState, cut: &ResolvedPos) -> Option<Transaction> {
    let before = cut.node_before()?;
    let after = cut.node_after()?;
    if before.node_type().is_isolating() || after.node_type().is_isolating() {
        return None;
    }
    if let Some(tr) = join_maybe_clear(state, cut, &before, &after) {
        return Some(tr);
    }

    let parent = cut.parent();
    let index = cut.index(cut.depth());
    if parent.can_replace(index, index + 1, &Fragment::empty())
        && let Some(matched) = before.content_match_at(before.child_count())
        && let Some(conn) = matched.find_wrapping(after.node_type())
        && matched
            .match_type(conn.first().copied().unwrap_or(after.node_type()))
            .is_some_and(|m| m.valid_end())
    {
        let end = cut.pos() + after.node_size();
        let mut wrap = Fragment::empty();
        for ty in conn.iter().rev() {
            wrap = Fragment::from_node(Node::branch(ty.default_kind(), wrap));
        }
        let wrap = Fragment::from_node(before.copy(wrap));
        let mut tr = state.tr();
        built(
            "delete_barrier",
            tr.step(Step::replace_around(
                cut.pos() - 1,
                end,
                cut.pos(),
                end,
                Slice::new(wrap, 1, 0),
                conn.len(),
                true,
            ))
            .map(|_| ()),
        )?;
        let join_at = end + 2 * conn.len();
        if can_join(tr.doc(), join_at) {
            tr.maybe_step(Step::structural(join_at - 1, join_at + 1, Slice::empty()));
        }
        let merge_at = cut.pos() - 1;
        let depth = conn.len() + 1;
        if can_join(tr.doc(), merge_at) && merge_at >= depth {
            tr.maybe_step(Step::structural(merge_at - depth, merge_at + depth, Slice::empty()));
        }
        return Some(tr);
    }

    let sel_after = Selection::find_from(cut, Direction::Forward, false)?;
    let range = sel_after.rfrom().block_range(sel_after.rto(), |_| true)?;
    let target = lift_target(&range)?;
    if target < cut.depth() {
        return None;
    }
    let mut tr = state.tr();
    built("delete_barrier", tr.lift(&range, target).map(|_| ()))?;
    Some(tr)
}

fn join_maybe_clear(
    state: &EditorState,
    cut: &ResolvedPos,
    before: &Node,
    after: &Node,
) -> Option<Transaction> {
    if !before.node_type().compatible_content(after.node_type()) {
        return None;
    }
    let parent = cut.parent();
    let index = cut.index(cut.depth());
    if before.content_size() == 0
        && index > 0
        && parent.can_replace(index - 1, index, &Fragment::empty())
    {
        let mut tr = state.tr();
        built(
            "join_maybe_clear",
            tr.delete(cut.pos() - before.node_size(), cut.pos()).map(|_| ()),
        )?;
        return Some(tr);
    }
    if !parent.can_replace(index, index + 1, &Fragment::empty())
        || !(after.is_textblock() || can_join(state.doc(), cut.pos()))
    {
        return None;
    }
    let mut depth = 1;
    let (mut before_child, mut after_child) = (Some(before.clone()), Some(after.clone()));
    while let (Some(b), Some(a)) = (&before_child, &after_child) {
        if b.is_textblock() || a.is_textblock() {
            break;
        }
        let next = (b.last_child().cloned(), a.first_child().cloned());
        (before_child, after_child) = next;
        depth += 1;
    }
    let mut tr = state.tr();
    built(
        "join_maybe_clear",
        tr.clear_incompatible(
            cut.pos(),
            before.node_type(),
            before.content_match_at(before.child_count()),
        )
        .map(|_| ()),
    )?;
    built("join_maybe_clear", tr.join_unchecked(cut.pos(), depth).map(|_| ()))?;
    Some(tr)
}

/// The position before the closest preceding sibling block of an ancestor,
/// stopping at isolating nodes.
pub(crate) fn find_cut_before(rpos: &ResolvedPos) -> Option<ResolvedPos> {
    if rpos.parent().node_type().is_isolating() {
        return None;
    }
    for d in (0..rpos.depth()).rev() {
        if rpos.index(d) > 0 {
            return rpos.doc().resolve(rpos.before(d + 1)).ok();
        }
        if rpos.node(d).node_type().is_isolating() {
            break;
        }
    }
    None
}

/// The position after the closest ancestor that has a following sibling,
/// stopping at isolating nodes.
pub(crate) fn find_cut_after(rpos: &ResolvedPos) -> Option<ResolvedPos> {
    if rpos.parent().node_type().is_isolating() {
        return None;
    }
    for d in (0..rpos.depth()).rev() {
        let parent = rpos.node(d);
        if rpos.index(d) + 1 < parent.child_count() {
            return rpos.doc().resolve(rpos.after(d + 1)).ok();
        }
        if parent.node_type().is_isolating() {
            break;
        }
    }
    None
}

/// Whether marks of type `ty` are active: the stored marks or the marks
/// at a cursor, any inline content of a range.
pub fn mark_active(state: &EditorState, ty: MarkType) -> bool {
    let selection = state.selection();
    if !selection.is_empty() {
        return state.doc().range_has_mark(selection.from(), selection.to(), ty);
    }
    match state.stored_marks() {
        Some(marks) => marks.find(ty).is_some(),
        None => selection.rfrom().marks().find(ty).is_some(),
    }
}

fn mark_applies(doc: &Node, from: usize, to: usize, ty: MarkType) -> bool {
    let mut applies = false;
    doc.nodes_between(from, to, &mut |node: &Node, _: usize, _: Option<&Node>, _: usize| {
        applies = applies || (node.inline_content() && node.node_type().allows_mark_type(ty));
        !applies
    });
    applies
}

/// Removes `mark`'s type from a range that has it anywhere, otherwise adds
/// `mark` to the whole range. At a cursor only the stored marks change.
pub fn toggle_mark(state: &EditorState, mark: &Mark) -> Option<Transaction> {
    let ty = mark.mark_type();
    let selection = state.selection();
    if let Some(cursor) = selection.as_cursor() {
        let parent = cursor.parent();
        if !parent.inline_content() || !parent.node_type().allows_mark_type(ty) {
            return None;
        }
        let marks = state.stored_marks().cloned().unwrap_or_else(|| cursor.marks());
        let marks = match marks.find(ty) {
            Some(_) => marks.remove_type(ty),
            None => marks.add(mark),
        };
        let mut tr = state.tr();
        tr.set_stored_marks(Some(marks));
        return Some(tr);
    }

    let (from, to) = (selection.from(), selection.to());
    if !mark_applies(state.doc(), from, to, ty) {
        return None;
    }
    let mut tr = state.tr();
    if state.doc().range_has_mark(from, to, ty) {
        built("toggle_mark", tr.remove_mark(from, to, ty).map(|_| ()))?;
    } else {
        built("toggle_mark", tr.add_mark(from, to, mark.clone()).map(|_| ()))?;
    }
    Some(tr)
}

/// Links the selected text to `href`, replacing any link it had.
pub fn set_link(state: &EditorState, href: &str, title: Option<&str>) -> Option<Transaction> {
    let selection = state.selection();
    let (from, to) = (selection.from(), selection.to());
    if selection.is_empty() || !mark_applies(state.doc(), from, to, MarkType::Link) {
        return None;
    }
    let link = Mark::Link {
        href: href.to_string(),
        title: title.map(str::to_string),
    };
    let mut tr = state.tr();
    built("set_link", tr.add_mark(from, to, link).map(|_| ()))?;
    Some(tr)
}

/// The link run around a cursor, as `(from, to)`.
fn link_around(cursor: &ResolvedPos) -> Option<(usize, usize)> {
    let mut pos = cursor.start(cursor.depth());
    let mut run: Option<(usize, usize, &Mark)> = None;
    for child in cursor.parent().content().nodes() {
        let end = pos + child.node_size();
        run = match (run, child.marks().find(MarkType::Link)) {
            (Some((from, _, current)), Some(link)) if current == link => Some((from, end, current)),
            (Some((from, to, _)), _) if from <= cursor.pos() && cursor.pos() <= to => break,
            (_, Some(link)) => Some((pos, end, link)),
            (_, None) => None,
        };
        pos = end;
    }
    run.map(|(from, to, _)| (from, to))
        .filter(|&(from, to)| from <= cursor.pos() && cursor.pos() <= to)
}

/// Removes links from the selection, or the whole link a cursor sits in.
pub fn unset_link(state: &EditorState) -> Option<Transaction> {
    let selection = state.selection();
    let (from, to) = match selection.as_cursor() {
        Some(cursor) => link_around(cursor)?,
        None => (selection.from(), selection.to()),
    };
    if !state.doc().range_has_mark(from, to, MarkType::Link) {
        return None;
    }
    let mut tr = state.tr();
    built("unset_link", tr.remove_mark(from, to, MarkType::Link).map(|_| ()))?;
    Some(tr)
}

/// Unlinks a linked selection, otherwise links it to `href`.
pub fn toggle_link(state: &EditorState, href: &str) -> Option<Transaction> {
    unset_link(state).or_else(|| set_link(state, href, None))
}

#[derive(Clone, Copy)]
enum Side {
    Start,
    End,
}

fn textblock_at(node: &Node, side: Side) -> bool {
    let mut current = Some(node);
    while let Some(node) = current {
        if node.is_textblock() {
            return true;
        }
        current = match side {
            Side::Start => node.first_child(),
            Side::End => node.last_child(),
        };
    }
    false
}

fn is_selectable(node: &Node) -> bool {
    node.node_type().is_selectable()
}

/// The first textblock type allowed at `matched`.
fn default_block_at(matched: ContentMatch) -> Option<NodeType> {
    matched
        .edges()
        .into_iter()
        .map(|(ty, _)| ty)
        .find(|ty| ty.is_textblock())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use pretty_assertions::assert_eq;

    fn run(
        command: fn(&EditorState) -> Option<Transaction>,
        state: &EditorState,
    ) -> Option<EditorState> {
        command(state).map(|tr| state.apply(&tr).unwrap())
    }

    #[test]
    fn test_delete_selection_declines_for_cursor() {
        let state = state_at(doc(vec![p("ab")]), 2);
        assert!(delete_selection(&state).is_none());
    }

    #[test]
    fn test_set_paragraph_on_empty_heading() {
        let state = state_at(doc(vec![h(1, "")]), 1);
        let next = run(set_paragraph, &state).unwrap();
        assert_eq!(next.doc(), &doc(vec![p("")]));
        assert!(set_paragraph(&state_at(doc(vec![h(1, "a")]), 1)).is_none());
    }

    #[test]
    fn test_join_backward_merges_paragraphs() {
        let d = doc(vec![p("ab"), p("cd")]);
        let state = state_at(d.clone(), pos_of(&d, "cd"));
        let next = run(join_backward, &state).unwrap();
        assert_eq!(next.doc(), &doc(vec![p("abcd")]));
        assert_eq!(next.selection().head(), 3);
    }

    #[test]
    fn test_join_backward_merges_heading_into_paragraph() {
        let d = doc(vec![p("ab"), h(2, "cd")]);
        let state = state_at(d.clone(), pos_of(&d, "cd"));
        let next = run(join_backward, &state).unwrap();
        assert_eq!(next.doc(), &doc(vec![p("abcd")]));
    }

    #[test]
    fn test_join_backward_lifts_out_of_blockquote() {
        let state = state_at(doc(vec![blockquote(vec![p("a")])]), 2);
        let next = run(join_backward, &state).unwrap();
        assert_eq!(next.doc(), &doc(vec![p("a")]));
    }

    #[test]
    fn test_join_backward_merges_paragraph_into_quote() {
        let d = doc(vec![blockquote(vec![p("a")]), p("b")]);
        let state = state_at(d.clone(), pos_of(&d, "b"));
        let next = run(join_backward, &state).unwrap();
        assert_eq!(next.doc(), &doc(vec![blockquote(vec![p("ab")])]));
        assert_eq!(next.selection().head(), 3);
    }

    #[test]
    fn test_join_backward_deletes_rule() {
        let d = doc(vec![hr(), p("b")]);
        let state = state_at(d.clone(), pos_of(&d, "b"));
        let next = run(join_backward, &state).unwrap();
        assert_eq!(next.doc(), &doc(vec![p("b")]));
    }

    #[test]
    fn test_join_backward_stops_at_figure() {
        let d = doc(vec![figure("cap"), p("b")]);
        let state = state_at(d.clone(), pos_of(&d, "b"));
        assert!(join_backward(&state).is_none());
    }

    #[test]
    fn test_join_forward_pulls_next_paragraph() {
        let d = doc(vec![p("ab"), p("cd")]);
        let state = state_at(d.clone(), pos_after(&d, "ab"));
        let next = run(join_forward, &state).unwrap();
        assert_eq!(next.doc(), &doc(vec![p("abcd")]));
    }

    #[test]
    fn test_join_forward_at_document_end_declines() {
        let d = doc(vec![p("ab")]);
        assert!(join_forward(&state_at(d, 3)).is_none());
    }

    #[test]
    fn test_select_node_backward_selects_rule() {
        let d = doc(vec![hr(), p("b")]);
        let state = state_at(d.clone(), pos_of(&d, "b"));
        let next = run(select_node_backward, &state).unwrap();
        assert_eq!(next.selection(), &Selection::node(next.doc(), 0).unwrap());
    }

    #[test]
    fn test_select_node_forward_selects_figure() {
        let d = doc(vec![p("a"), figure("cap")]);
        let state = state_at(d.clone(), 2);
        let next = run(select_node_forward, &state).unwrap();
        assert_eq!(next.selection(), &Selection::node(next.doc(), 3).unwrap());
    }

    #[test]
    fn test_newline_in_code() {
        let d = doc(vec![code_block("ab")]);
        let next = run(newline_in_code, &state_at(d, 2)).unwrap();
        assert_eq!(next.doc(), &doc(vec![code_block("a\nb")]));
        assert!(newline_in_code(&state_at(doc(vec![p("ab")]), 2)).is_none());
    }

    #[test]
    fn test_exit_code_adds_paragraph_after() {
        let d = doc(vec![code_block("ab")]);
        let next = run(exit_code, &state_at(d, 2)).unwrap();
        assert_eq!(next.doc(), &doc(vec![code_block("ab"), p("")]));
        assert_eq!(next.selection().head(), 5);
    }

    #[test]
    fn test_create_paragraph_near_selected_rule() {
        let d = doc(vec![p("a"), hr()]);
        let state = EditorState::new(d.clone(), Selection::node(&d, 3).unwrap());
        let next = run(create_paragraph_near, &state).unwrap();
        assert_eq!(next.doc(), &doc(vec![p("a"), hr(), p("")]));
        assert_eq!(next.selection().head(), 5);
    }

    #[test]
    fn test_lift_empty_block_splits_quote() {
        let d = doc(vec![blockquote(vec![p("a"), p(""), p("b")])]);
        let empty = pos_after(&d, "a") + 2;
        let next = run(lift_empty_block, &state_at(d, empty)).unwrap();
        assert_eq!(
            next.doc(),
            &doc(vec![blockquote(vec![p("a")]), blockquote(vec![p(""), p("b")])])
        );
    }

    #[test]
    fn test_lift_empty_block_leaves_list() {
        let d = doc(vec![ul(vec![item("a"), item("")])]);
        let empty = pos_after(&d, "a") + 4;
        let next = run(lift_empty_block, &state_at(d, empty)).unwrap();
        assert_eq!(next.doc(), &doc(vec![ul(vec![item("a")]), p("")]));
    }

    #[test]
    fn test_split_block_in_middle() {
        let d = doc(vec![p("ab")]);
        let next = run(split_block, &state_at(d, 2)).unwrap();
        assert_eq!(next.doc(), &doc(vec![p("a"), p("b")]));
        assert_eq!(next.selection().head(), 4);
    }

    #[test]
    fn test_split_block_at_heading_end_opens_paragraph() {
        let d = doc(vec![h(1, "ab")]);
        let next = run(split_block, &state_at(d, 3)).unwrap();
        assert_eq!(next.doc(), &doc(vec![h(1, "ab"), p("")]));
    }

    #[test]
    fn test_split_block_at_heading_start_pushes_paragraph_above() {
        let d = doc(vec![h(1, "ab")]);
        let next = run(split_block, &state_at(d, 1)).unwrap();
        assert_eq!(next.doc(), &doc(vec![p(""), h(1, "ab")]));
    }

    #[test]
    fn test_split_block_declines_in_figure() {
        let d = doc(vec![figure("cap")]);
        assert!(split_block(&state_at(d, 2)).is_none());
    }
}
