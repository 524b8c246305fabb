//! Fitting a slice into a document.
//!
//! [`replace_step`] turns "replace `from..to` with this slice" into a step
//! that produces a valid document. The slice is placed node by node into a
//! frontier of open nodes along the left side of the cut. Nodes that do not
//! fit are opened further, wrapped, or dropped; once everything is placed
//! the frontier is closed against the content after `to`.

use crate::model::{
    ContentMatch, Fragment, MarkSet, ModelError, Node, NodeKind, NodeType, ResolvedPos, Slice,
};

use super::step::{Step, StepError};

/// Builds the step that replaces `from..to` with `slice`. Returns
/// `Ok(None)` when the replacement would change nothing and an error when
/// the slice cannot be made to fit.
pub fn replace_step(
    doc: &Node,
    from: usize,
    to: usize,
    slice: &Slice,
) -> Result<Option<Step>, StepError> {
    if from == to && slice.size() == 0 {
        return Ok(None);
    }
    let rfrom = doc.resolve(from)?;
    let rto = doc.resolve(to)?;
    if fits_trivially(&rfrom, &rto, slice) {
        return Ok(Some(Step::replace(from, to, slice.clone())));
    }
    Fitter::new(&rfrom, &rto, slice.clone())?.fit()
}

fn fits_trivially(from: &ResolvedPos, to: &ResolvedPos, slice: &Slice) -> bool {
    slice.open_start == 0
        && slice.open_end == 0
        && from.start(from.depth()) == to.start(to.depth())
        && from
            .parent()
            .can_replace(from.index(from.depth()), to.index(to.depth()), &slice.content)
}

#[derive(Debug, Clone)]
struct Frontier {
    ty: NodeType,
    matched: ContentMatch,
}

struct Fittable {
    slice_depth: usize,
    frontier_depth: usize,
    parent: Option<Node>,
    inject: Option<Fragment>,
    wrap: Option<Vec<NodeType>>,
}

struct CloseLevel {
    depth: usize,
    fit: Fragment,
    target: ResolvedPos,
}

struct Fitter<'a> {
    from: &'a ResolvedPos,
    to: &'a ResolvedPos,
    unplaced: Slice,
    frontier: Vec<Frontier>,
    placed: Fragment,
}

impl<'a> Fitter<'a> {
    fn new(from: &'a ResolvedPos, to: &'a ResolvedPos, unplaced: Slice) -> Result<Self, StepError> {
        let mut frontier = Vec::with_capacity(from.depth() + 1);
        for d in 0..=from.depth() {
            let node = from.node(d);
            let matched = node
                .content_match_at(from.index_after(d))
                .ok_or(ModelError::InvalidContent(node.node_type()))?;
            frontier.push(Frontier {
                ty: node.node_type(),
                matched,
            });
        }
        let mut placed = Fragment::empty();
        for d in (1..=from.depth()).rev() {
            placed = Fragment::from_node(from.node(d).copy(placed));
        }
        Ok(Self {
            from,
            to,
            unplaced,
            frontier,
            placed,
        })
    }

    fn depth(&self) -> usize {
        self.frontier.len() - 1
    }

    fn fit(mut self) -> Result<Option<Step>, StepError> {
        while self.unplaced.size() > 0 {
            if let Some(fittable) = self.find_fittable() {
                self.place_nodes(fittable);
            } else if !self.open_more() {
                self.drop_node();
            }
        }

        let move_inline = self.must_move_inline();
        let placed_size = self.placed.size() - self.depth() - self.from.depth();
        let close_at = match move_inline {
            Some(pos) => self.from.doc().resolve(pos)?,
            None => self.to.clone(),
        };
        let to = self
            .close(close_at)
            .ok_or_else(|| {
                ModelError::ReplacementInvalid("slice does not fit around the cut".into())
            })?;

        let mut content = self.placed.clone();
        let (mut open_start, mut open_end) = (self.from.depth(), to.depth());
        while open_start > 0 && open_end > 0 && content.child_count() == 1 {
            content = content.child(0).content().clone();
            open_start -= 1;
            open_end -= 1;
        }
        let slice = Slice::new(content, open_start, open_end);
        if let Some(pos) = move_inline {
            return Ok(Some(Step::replace_around(
                self.from.pos(),
                pos,
                self.to.pos(),
                self.to.end(self.to.depth()),
                slice,
                placed_size,
                false,
            )));
        }
        if slice.size() > 0 || self.from.pos() != self.to.pos() {
            return Ok(Some(Step::replace(self.from.pos(), to.pos(), slice)));
        }
        Ok(None)
    }

    fn find_fittable(&self) -> Option<Fittable> {
        let mut start_depth = self.unplaced.open_start;
        let mut cur = self.unplaced.content.clone();
        let mut open_end = self.unplaced.open_end;
        for d in 0..start_depth {
            let node = cur.first_child()?.clone();
            if cur.child_count() > 1 {
                open_end = 0;
            }
            if node.node_type().is_isolating() && open_end <= d {
                start_depth = d;
                break;
            }
            cur = node.content().clone();
        }

        for pass in 1..=2 {
            let top = if pass == 1 { start_depth } else { self.unplaced.open_start };
            for slice_depth in (0..=top).rev() {
                let (fragment, parent) = if slice_depth > 0 {
                    let parent =
                        content_at(&self.unplaced.content, slice_depth - 1).first_child()?.clone();
                    (parent.content().clone(), Some(parent))
                } else {
                    (self.unplaced.content.clone(), None)
                };
                let first = fragment.first_child();
                for frontier_depth in (0..=self.depth()).rev() {
                    let Frontier { ty, matched } = &self.frontier[frontier_depth];
                    if pass == 1 {
                        let fits = match first {
                            Some(first) => {
                                if matched.match_type(first.node_type()).is_some() {
                                    Some(None)
                                } else {
                                    matched
                                        .fill_before(&Fragment::from_node(first.clone()), false, 0)
                                        .map(Some)
                                }
                            }
                            None => parent
                                .as_ref()
                                .filter(|p| ty.compatible_content(p.node_type()))
                                .map(|_| None),
                        };
                        if let Some(inject) = fits {
                            return Some(Fittable {
                                slice_depth,
                                frontier_depth,
                                parent,
                                inject,
                                wrap: None,
                            });
                        }
                    } else if let Some(first) = first
                        && let Some(wrap) = matched.find_wrapping(first.node_type())
                    {
                        return Some(Fittable {
                            slice_depth,
                            frontier_depth,
                            parent,
                            inject: None,
                            wrap: Some(wrap),
                        });
                    }
                    if let Some(p) = &parent
                        && matched.match_type(p.node_type()).is_some()
                    {
                        break;
                    }
                }
            }
        }
        None
    }

    fn open_more(&mut self) -> bool {
        let Slice {
            content,
            open_start,
            open_end,
        } = &self.unplaced;
        let inner = content_at(content, *open_start);
        match inner.first_child() {
            Some(first) if !first.is_leaf() => {}
            _ => return false,
        }
        let reaches_end = inner.size() + open_start >= content.size() - open_end;
        let new_open_end = (*open_end).max(if reaches_end { open_start + 1 } else { 0 });
        self.unplaced = Slice::new(content.clone(), open_start + 1, new_open_end);
        true
    }

    fn drop_node(&mut self) {
        let Slice {
            content,
            open_start,
            open_end,
        } = &self.unplaced;
        let inner = content_at(content, *open_start);
        self.unplaced = if inner.child_count() <= 1 && *open_start > 0 {
            let open_at_end = content.size() - open_start <= open_start + inner.size();
            Slice::new(
                drop_first_in_slice(content, open_start - 1, 1),
                open_start - 1,
                if open_at_end { open_start - 1 } else { *open_end },
            )
        } else {
            Slice::new(drop_first_in_slice(content, *open_start, 1), *open_start, *open_end)
        };
    }

    fn place_nodes(&mut self, fittable: Fittable) {
        let Fittable {
            slice_depth,
            frontier_depth,
            parent,
            inject,
            wrap,
        } = fittable;
        while self.depth() > frontier_depth {
            self.close_frontier_node();
        }
        if let Some(wrap) = &wrap {
            for ty in wrap {
                self.open_frontier_node(ty.default_kind(), Fragment::empty());
            }
        }

        let slice = self.unplaced.clone();
        let fragment = parent.as_ref().map_or(&slice.content, |p| p.content()).clone();
        let open_start = slice.open_start as isize - slice_depth as isize;
        let mut taken = 0;
        let mut add = Vec::new();
        let frontier_depth = self.depth();
        let Frontier { ty, mut matched } = self.frontier[frontier_depth].clone();
        if let Some(inject) = &inject {
            add.extend(inject.iter().cloned());
            if let Some(m) = matched.match_fragment(inject, 0, inject.child_count()) {
                matched = m;
            }
        }
        let mut open_end_count = (fragment.size() + slice_depth) as isize
            - (slice.content.size() as isize - slice.open_end as isize);
        while taken < fragment.child_count() {
            let next = fragment.child(taken);
            let Some(matches) = matched.match_type(next.node_type()) else {
                break;
            };
            taken += 1;
            if taken > 1 || open_start == 0 || next.content_size() > 0 {
                matched = matches;
                let allowed =
                    next.marks().iter().filter(|m| ty.allows_mark_type(m.mark_type())).cloned();
                let node = next.mark(MarkSet::from_marks(allowed));
                add.push(close_node_start(
                    node,
                    if taken == 1 { open_start } else { 0 },
                    if taken == fragment.child_count() { open_end_count } else { -1 },
                ));
            }
        }
        let to_end = taken == fragment.child_count();
        if !to_end {
            open_end_count = -1;
        }
        self.placed = add_to_fragment(&self.placed, frontier_depth, &Fragment::from_vec(add));
        self.frontier[frontier_depth].matched = matched;

        if to_end
            && open_end_count < 0
            && let Some(p) = &parent
            && p.node_type() == self.frontier[self.depth()].ty
            && self.frontier.len() > 1
        {
            self.close_frontier_node();
        }

        let mut cur = fragment.clone();
        for _ in 0..open_end_count.max(0) {
            let Some(node) = cur.last_child().cloned() else {
                break;
            };
            if let Some(matched) = node.content_match_at(node.child_count()) {
                self.frontier.push(Frontier {
                    ty: node.node_type(),
                    matched,
                });
            }
            cur = node.content().clone();
        }

        self.unplaced = if !to_end {
            Slice::new(
                drop_first_in_slice(&slice.content, slice_depth, taken),
                slice.open_start,
                slice.open_end,
            )
        } else if slice_depth == 0 {
            Slice::empty()
        } else {
            Slice::new(
                drop_first_in_slice(&slice.content, slice_depth - 1, 1),
                slice_depth - 1,
                if open_end_count < 0 { slice.open_end } else { slice_depth - 1 },
            )
        };
    }

    /// When the cut ends inside a textblock whose trailing content could
    /// not be joined onto the placed content, the position the rest of that
    /// textblock gets moved to.
    fn must_move_inline(&self) -> Option<usize> {
        if !self.to.parent().is_textblock() {
            return None;
        }
        let top = &self.frontier[self.depth()];
        if !top.ty.is_textblock()
            || content_after_fits(self.to, self.to.depth(), top.ty, &top.matched, false).is_none()
        {
            return None;
        }
        if self.to.depth() == self.depth()
            && self
                .find_close_level(self.to)
                .is_some_and(|level| level.depth == self.depth())
        {
            return None;
        }
        let mut depth = self.to.depth();
        let mut after = self.to.after(depth);
        while depth > 1 {
            depth -= 1;
            if after != self.to.end(depth) {
                break;
            }
            after += 1;
        }
        Some(after)
    }

    fn find_close_level(&self, to: &ResolvedPos) -> Option<CloseLevel> {
        'scan: for i in (0..=self.depth().min(to.depth())).rev() {
            let Frontier { ty, matched } = &self.frontier[i];
            let drop_inner = i < to.depth() && to.end(i + 1) == to.pos() + (to.depth() - (i + 1));
            let Some(fit) = content_after_fits(to, i, *ty, matched, drop_inner) else {
                continue;
            };
            for d in (0..i).rev() {
                let Frontier { ty, matched } = &self.frontier[d];
                match content_after_fits(to, d, *ty, matched, true) {
                    Some(m) if m.child_count() == 0 => {}
                    _ => continue 'scan,
                }
            }
            let target = if drop_inner {
                to.doc().resolve(to.after(i + 1)).ok()?
            } else {
                to.clone()
            };
            return Some(CloseLevel { depth: i, fit, target });
        }
        None
    }

    fn close(&mut self, to: ResolvedPos) -> Option<ResolvedPos> {
        let close = self.find_close_level(&to)?;
        while self.depth() > close.depth {
            self.close_frontier_node();
        }
        if close.fit.child_count() > 0 {
            self.placed = add_to_fragment(&self.placed, close.depth, &close.fit);
        }
        let to = close.target;
        for d in (close.depth + 1)..=to.depth() {
            let node = to.node(d);
            let add = node
                .node_type()
                .content_match()
                .fill_before(node.content(), true, to.index(d))
                .unwrap_or_default();
            self.open_frontier_node(node.kind().clone(), add);
        }
        Some(to)
    }

    fn open_frontier_node(&mut self, kind: NodeKind, content: Fragment) {
        let ty = kind.node_type();
        let depth = self.depth();
        let top = &mut self.frontier[depth];
        if let Some(next) = top.matched.match_type(ty) {
            top.matched = next;
        }
        let wrapped = Fragment::from_node(Node::branch(kind, content));
        self.placed = add_to_fragment(&self.placed, depth, &wrapped);
        self.frontier.push(Frontier {
            ty,
            matched: ty.content_match(),
        });
    }

    fn close_frontier_node(&mut self) {
        let Some(open) = self.frontier.pop() else {
            return;
        };
        let add = open
            .matched
            .fill_before(&Fragment::empty(), true, 0)
            .unwrap_or_default();
        if add.child_count() > 0 {
            self.placed = add_to_fragment(&self.placed, self.frontier.len(), &add);
        }
    }
}

fn drop_first_in_slice(fragment: &Fragment, depth: usize, count: usize) -> Fragment {
    if depth == 0 {
        return fragment.cut_by_index(count, fragment.child_count());
    }
    match fragment.first_child() {
        Some(first) => fragment.replace_child(
            0,
            first.copy(drop_first_in_slice(first.content(), depth - 1, count)),
        ),
        None => fragment.clone(),
    }
}

fn add_to_fragment(fragment: &Fragment, depth: usize, content: &Fragment) -> Fragment {
    if depth == 0 {
        return fragment.append(content);
    }
    match fragment.last_child() {
        Some(last) => fragment.replace_child(
            fragment.child_count() - 1,
            last.copy(add_to_fragment(last.content(), depth - 1, content)),
        ),
        None => fragment.clone(),
    }
}

fn content_at(fragment: &Fragment, depth: usize) -> Fragment {
    let mut fragment = fragment.clone();
    for _ in 0..depth {
        match fragment.first_child() {
            Some(first) => fragment = first.content().clone(),
            None => break,
        }
    }
    fragment
}

/// Closes the open start of a node taken from a slice, filling in content
/// its grammar requires before (and, when not open at the end, after) it.
fn close_node_start(node: Node, open_start: isize, open_end: isize) -> Node {
    if open_start <= 0 {
        return node;
    }
    let mut frag = node.content().clone();
    if open_start > 1
        && let Some(first) = frag.first_child().cloned()
    {
        let inner_end = if frag.child_count() == 1 { open_end - 1 } else { 0 };
        frag = frag.replace_child(0, close_node_start(first, open_start - 1, inner_end));
    }
    let start = node.node_type().content_match();
    frag = start
        .fill_before(&frag, false, 0)
        .unwrap_or_default()
        .append(&frag);
    if open_end <= 0
        && let Some(end_fill) = start
            .match_fragment(&frag, 0, frag.child_count())
            .and_then(|m| m.fill_before(&Fragment::empty(), true, 0))
    {
        frag = frag.append(&end_fill);
    }
    node.copy(frag)
}

fn content_after_fits(
    to: &ResolvedPos,
    depth: usize,
    ty: NodeType,
    matched: &ContentMatch,
    open: bool,
) -> Option<Fragment> {
    let node = to.node(depth);
    let index = if open { to.index_after(depth) } else { to.index(depth) };
    if index == node.child_count() && !ty.compatible_content(node.node_type()) {
        return None;
    }
    let fit = matched.fill_before(node.content(), true, index)?;
    let marks_ok = (index..node.child_count()).all(|i| {
        node.child(i)
            .marks()
            .iter()
            .all(|m| ty.allows_mark_type(m.mark_type()))
    });
    marks_ok.then_some(fit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use pretty_assertions::assert_eq;

    fn apply(doc: &Node, from: usize, to: usize, slice: Slice) -> Node {
        replace_step(doc, from, to, &slice)
            .unwrap()
            .expect("replacement should produce a step")
            .apply(doc)
            .unwrap()
    }

    #[test]
    fn test_empty_replacement_is_a_no_op() {
        let d = doc(vec![p("a")]);
        assert!(replace_step(&d, 1, 1, &Slice::empty()).unwrap().is_none());
    }

    #[test]
    fn test_inline_insert_fits_trivially() {
        let d = doc(vec![p("ac")]);
        let out = apply(&d, 2, 2, Slice::new(Fragment::from_node(txt("b")), 0, 0));
        assert_eq!(out, doc(vec![p("abc")]));
    }

    #[test]
    fn test_delete_across_list_items() {
        let d = doc(vec![ul(vec![item("ab"), item("cd")])]);
        let from = pos_after(&d, "a");
        let to = pos_after(&d, "c");
        let out = apply(&d, from, to, Slice::empty());
        assert_eq!(out, doc(vec![ul(vec![item("ad")])]));
    }

    #[test]
    fn test_list_item_inserted_between_paragraphs_gets_wrapped() {
        let d = doc(vec![p("a"), p("b")]);
        let out = apply(&d, 3, 3, Slice::new(Fragment::from_node(item("x")), 0, 0));
        assert_eq!(out, doc(vec![p("a"), ol(vec![item("x")]), p("b")]));
    }

    #[test]
    fn test_block_inserted_mid_paragraph_splits_it() {
        let d = doc(vec![p("ab")]);
        let out = apply(&d, 2, 2, Slice::new(Fragment::from_node(hr()), 0, 0));
        assert_eq!(out, doc(vec![p("a"), hr(), p("b")]));
    }

    #[test]
    fn test_delete_from_paragraph_into_quote() {
        let d = doc(vec![p("ab"), blockquote(vec![p("cd")])]);
        let from = pos_after(&d, "a");
        let to = pos_after(&d, "c");
        let out = apply(&d, from, to, Slice::empty());
        assert_eq!(out, doc(vec![p("ad")]));
    }
}
