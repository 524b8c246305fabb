use log::trace;

use crate::model::{
    ContentMatch, Fragment, Mark, MarkSet, MarkType, ModelError, Node, NodeKind, NodeRange,
    NodeType, Slice,
};

use super::fit::replace_step;
use super::map::{Assoc, Mappable, Mapping};
use super::step::{Step, StepError};
use super::structure::{covered_depths, joinable};

/// An ordered list of steps applied to a starting document, with the
/// document after each step and the combined position mapping.
#[derive(Debug, Clone)]
pub struct Transform {
    doc: Node,
    steps: Vec<Step>,
    docs: Vec<Node>,
    mapping: Mapping,
}

impl Transform {
    pub fn new(doc: Node) -> Self {
        Self {
            doc,
            steps: Vec::new(),
            docs: Vec::new(),
            mapping: Mapping::new(),
        }
    }

    /// The current document.
    pub fn doc(&self) -> &Node {
        &self.doc
    }

    /// The document before any step was applied.
    pub fn before(&self) -> &Node {
        self.docs.first().unwrap_or(&self.doc)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The document each step was applied to.
    pub fn docs(&self) -> &[Node] {
        &self.docs
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Applies a step, failing without changes if it does not apply.
    pub fn step(&mut self, step: Step) -> Result<&mut Self, StepError> {
        let doc = step.apply(&self.doc)?;
        self.add_step(step, doc);
        Ok(self)
    }

    /// Like [`Transform::step`] but for steps that may legitimately not
    /// apply; returns whether it did.
    pub fn maybe_step(&mut self, step: Step) -> bool {
        match step.apply(&self.doc) {
            Ok(doc) => {
                self.add_step(step, doc);
                true
            }
            Err(err) => {
                trace!("step skipped: {err}");
                false
            }
        }
    }

    fn add_step(&mut self, step: Step, doc: Node) {
        trace!("step {:?}", step);
        self.mapping.append_map(step.get_map());
        self.docs.push(std::mem::replace(&mut self.doc, doc));
        self.steps.push(step);
    }

    /// Replaces `from..to` with `slice`, fitting the slice into the
    /// surrounding structure.
    pub fn replace(
        &mut self,
        from: usize,
        to: usize,
        slice: Slice,
    ) -> Result<&mut Self, StepError> {
        if let Some(step) = replace_step(&self.doc, from, to, &slice)? {
            self.step(step)?;
        }
        Ok(self)
    }

    pub fn replace_with(
        &mut self,
        from: usize,
        to: usize,
        content: impl Into<Fragment>,
    ) -> Result<&mut Self, StepError> {
        self.replace(from, to, Slice::new(content.into(), 0, 0))
    }

    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self, StepError> {
        self.replace(from, to, Slice::empty())
    }

    pub fn insert(
        &mut self,
        pos: usize,
        content: impl Into<Fragment>,
    ) -> Result<&mut Self, StepError> {
        self.replace_with(pos, pos, content)
    }

    /// Deletes `from..to`, widening the range to whole nodes when it covers
    /// all of their content.
    pub fn delete_range(&mut self, from: usize, to: usize) -> Result<&mut Self, StepError> {
        let rfrom = self.doc.resolve(from)?;
        let rto = self.doc.resolve(to)?;
        let covered = covered_depths(&rfrom, &rto);
        for (i, &depth) in covered.iter().enumerate() {
            let last = i == covered.len() - 1;
            if (last && depth == 0) || rfrom.node(depth).node_type().content_match().valid_end() {
                return self.delete(rfrom.start(depth), rto.end(depth));
            }
            if depth > 0
                && (last
                    || rfrom.node(depth - 1).can_replace(
                        rfrom.index(depth - 1),
                        rto.index_after(depth - 1),
                        &Fragment::empty(),
                    ))
            {
                return self.delete(rfrom.before(depth), rto.after(depth));
            }
        }
        for d in 1..=rfrom.depth().min(rto.depth()) {
            if from - rfrom.start(d) == rfrom.depth() - d
                && to > rfrom.end(d)
                && rto.end(d) - to != rto.depth() - d
                && rfrom.start(d - 1) == rto.start(d - 1)
                && rfrom
                    .node(d - 1)
                    .can_replace(rfrom.index(d - 1), rto.index(d - 1), &Fragment::empty())
            {
                return self.delete(rfrom.before(d), to);
            }
        }
        self.delete(from, to)
    }

    /// Merges the `depth` levels of nodes meeting at `pos` when they have
    /// the same types and the result is valid. Returns whether it joined.
    pub fn join(&mut self, pos: usize, depth: usize) -> Result<bool, StepError> {
        if pos > self.doc.content_size() {
            return Err(ModelError::OutOfRange {
                pos,
                size: self.doc.content_size(),
            }
            .into());
        }
        if !joinable(&self.doc, pos, depth) {
            return Ok(false);
        }
        self.join_unchecked(pos, depth)?;
        Ok(true)
    }

    /// Removes the `depth` boundary tokens on each side of `pos` without
    /// comparing node types, so a heading can merge into a paragraph.
    pub fn join_unchecked(&mut self, pos: usize, depth: usize) -> Result<&mut Self, StepError> {
        let from = pos.checked_sub(depth).ok_or(ModelError::OutOfRange {
            pos,
            size: self.doc.content_size(),
        })?;
        self.step(Step::structural(from, pos + depth, Slice::empty()))
    }

    /// Moves the range out of its ancestors up to `target` depth, splitting
    /// them around it as needed.
    pub fn lift(&mut self, range: &NodeRange, target: usize) -> Result<&mut Self, StepError> {
        let (from, to, depth) = (&range.from, &range.to, range.depth);
        let gap_start = from.before(depth + 1);
        let gap_end = to.after(depth + 1);
        let (mut start, mut end) = (gap_start, gap_end);

        let mut before = Fragment::empty();
        let mut open_start = 0;
        let mut splitting = false;
        for d in ((target + 1)..=depth).rev() {
            if splitting || from.index(d) > 0 {
                splitting = true;
                before = Fragment::from_node(from.node(d).copy(before));
                open_start += 1;
            } else {
                start -= 1;
            }
        }
        let mut after = Fragment::empty();
        let mut open_end = 0;
        let mut splitting = false;
        for d in ((target + 1)..=depth).rev() {
            if splitting || to.after(d + 1) < to.end(d) {
                splitting = true;
                after = Fragment::from_node(to.node(d).copy(after));
                open_end += 1;
            } else {
                end += 1;
            }
        }
        let insert = before.size() - open_start;
        let slice = Slice::new(before.append(&after), open_start, open_end);
        self.step(Step::replace_around(start, end, gap_start, gap_end, slice, insert, true))
    }

    /// Wraps the range in nodes of the given kinds, outermost first.
    pub fn wrap(
        &mut self,
        range: &NodeRange,
        wrappers: &[NodeKind],
    ) -> Result<&mut Self, StepError> {
        let mut content = Fragment::empty();
        for kind in wrappers.iter().rev() {
            if content.size() > 0 && !kind.node_type().valid_content(&content) {
                return Err(StepError::InvalidWrapper);
            }
            content = Fragment::from_node(Node::branch(kind.clone(), content));
        }
        let (start, end) = (range.start(), range.end());
        self.step(Step::replace_around(
            start,
            end,
            start,
            end,
            Slice::new(content, 0, 0),
            wrappers.len(),
            true,
        ))
    }

    /// Splits the node at `pos` and `depth - 1` of its ancestors.
    /// `types_after` overrides the kinds of the new nodes, outermost first.
    pub fn split(
        &mut self,
        pos: usize,
        depth: usize,
        types_after: &[Option<NodeKind>],
    ) -> Result<&mut Self, StepError> {
        let rpos = self.doc.resolve(pos)?;
        if depth == 0 || depth > rpos.depth() {
            let message = format!("cannot split {depth} levels at {pos}");
            return Err(ModelError::ReplacementInvalid(message).into());
        }
        let mut before = Fragment::empty();
        let mut after = Fragment::empty();
        for (i, d) in ((rpos.depth() - depth + 1)..=rpos.depth()).rev().enumerate() {
            let type_index = depth - 1 - i;
            before = Fragment::from_node(rpos.node(d).copy(before));
            after = Fragment::from_node(match types_after.get(type_index) {
                Some(Some(kind)) => Node::branch(kind.clone(), after),
                _ => rpos.node(d).copy(after),
            });
        }
        let slice = Slice::new(before.append(&after), depth, depth);
        self.step(Step::structural(pos, pos, slice))
    }

    /// Turns every textblock in `from..to` into `kind`, dropping content
    /// the new type does not allow.
    pub fn set_block_type(
        &mut self,
        from: usize,
        to: usize,
        kind: &NodeKind,
    ) -> Result<&mut Self, StepError> {
        let ty = kind.node_type();
        if !ty.is_textblock() {
            return Err(StepError::NotTextblock(ty));
        }
        let map_from = self.steps.len();
        let mut targets = Vec::new();
        self.doc
            .nodes_between(from, to, &mut |node: &Node, pos: usize, _: Option<&Node>, _: usize| {
                if node.is_textblock() {
                    if !node.has_markup(kind, node.marks()) {
                        targets.push((pos, node.node_size()));
                    }
                    return false;
                }
                true
            });
        for (pos, size) in targets {
            let mapping = self.mapping.slice(map_from);
            let start = mapping.map(pos, Assoc::After);
            let rpos = self.doc.resolve(start)?;
            let index = rpos.index(rpos.depth());
            if !rpos.parent().can_replace_with(index, index + 1, ty) {
                continue;
            }
            self.clear_incompatible(start, ty, None)?;
            let mapping = self.mapping.slice(map_from);
            let start = mapping.map(pos, Assoc::After);
            let end = mapping.map(pos + size, Assoc::After);
            let marks = self.doc.node_at(start).map(|n| n.marks().clone()).unwrap_or_default();
            let wrapper = Node::with_parts(kind.clone(), Fragment::empty(), marks);
            self.step(Step::replace_around(
                start,
                end,
                start + 1,
                end - 1,
                Slice::new(Fragment::from_node(wrapper), 0, 0),
                1,
                true,
            ))?;
        }
        Ok(self)
    }

    /// Changes the kind or marks of the node at `pos`, keeping its content.
    pub fn set_node_markup(
        &mut self,
        pos: usize,
        kind: Option<NodeKind>,
        marks: Option<MarkSet>,
    ) -> Result<&mut Self, StepError> {
        let node = self.doc.node_at(pos).cloned().ok_or(StepError::NoNodeAt(pos))?;
        let kind = kind.unwrap_or_else(|| node.kind().clone());
        let marks = marks.unwrap_or_else(|| node.marks().clone());
        let ty = kind.node_type();
        if node.is_leaf() {
            let replacement = Node::with_parts(kind, Fragment::empty(), marks);
            return self.replace_with(pos, pos + node.node_size(), replacement);
        }
        if !ty.valid_content(node.content()) {
            return Err(ModelError::InvalidContent(ty).into());
        }
        let wrapper = Node::with_parts(kind, Fragment::empty(), marks);
        self.step(Step::replace_around(
            pos,
            pos + node.node_size(),
            pos + 1,
            pos + node.node_size() - 1,
            Slice::new(Fragment::from_node(wrapper), 0, 0),
            1,
            true,
        ))
    }

    /// Removes the children and marks of the node at `pos` that would not
    /// be valid inside a node of `parent_type`, then fills in any content
    /// that type requires.
    pub fn clear_incompatible(
        &mut self,
        pos: usize,
        parent_type: NodeType,
        start: Option<ContentMatch>,
    ) -> Result<&mut Self, StepError> {
        let node = self.doc.node_at(pos).cloned().ok_or(StepError::NoNodeAt(pos))?;
        let mut matched = start.unwrap_or_else(|| parent_type.content_match());
        let mut deletions = Vec::new();
        let mut cur = pos + 1;
        for child in node.content() {
            let end = cur + child.node_size();
            match matched.match_type(child.node_type()) {
                None => deletions.push(Step::replace(cur, end, Slice::empty())),
                Some(next) => {
                    matched = next;
                    for mark in child.marks().iter() {
                        if !parent_type.allows_mark_type(mark.mark_type()) {
                            self.step(Step::remove_mark(cur, end, mark.clone()))?;
                        }
                    }
                }
            }
            cur = end;
        }
        if !matched.valid_end()
            && let Some(fill) = matched.fill_before(&Fragment::empty(), true, 0)
        {
            self.replace(cur, cur, Slice::new(fill, 0, 0))?;
        }
        for step in deletions.into_iter().rev() {
            self.step(step)?;
        }
        Ok(self)
    }

    /// Adds `mark` to the inline content in `from..to`, replacing marks of
    /// the same type.
    pub fn add_mark(&mut self, from: usize, to: usize, mark: Mark) -> Result<&mut Self, StepError> {
        let mut removed: Vec<(usize, usize, Mark)> = Vec::new();
        let mut added: Vec<(usize, usize)> = Vec::new();
        self.doc.nodes_between(
            from,
            to,
            &mut |node: &Node, pos: usize, parent: Option<&Node>, _: usize| {
                if !node.is_inline() {
                    return true;
                }
                let allowed =
                    parent.is_some_and(|p| p.node_type().allows_mark_type(mark.mark_type()));
                if node.marks().contains(&mark) || !allowed {
                    return true;
                }
                let start = pos.max(from);
                let end = (pos + node.node_size()).min(to);
                let new_set = node.marks().add(&mark);
                for old in node.marks().iter().filter(|m| !new_set.contains(m)) {
                    match removed.last_mut() {
                        Some(last) if last.1 == start && &last.2 == old => last.1 = end,
                        _ => removed.push((start, end, old.clone())),
                    }
                }
                match added.last_mut() {
                    Some(last) if last.1 == start => last.1 = end,
                    _ => added.push((start, end)),
                }
                true
            },
        );
        for (start, end, old) in removed {
            self.step(Step::remove_mark(start, end, old))?;
        }
        for (start, end) in added {
            self.step(Step::add_mark(start, end, mark.clone()))?;
        }
        Ok(self)
    }

    /// Removes every mark of type `ty` from the inline content in `from..to`.
    pub fn remove_mark(
        &mut self,
        from: usize,
        to: usize,
        ty: MarkType,
    ) -> Result<&mut Self, StepError> {
        struct Run {
            mark: Mark,
            from: usize,
            to: usize,
            seen: usize,
        }
        let mut runs: Vec<Run> = Vec::new();
        let mut inline_count = 0;
        self.doc
            .nodes_between(from, to, &mut |node: &Node, pos: usize, _: Option<&Node>, _: usize| {
                if !node.is_inline() {
                    return true;
                }
                inline_count += 1;
                if let Some(mark) = node.marks().find(ty) {
                    let end = (pos + node.node_size()).min(to);
                    match runs
                        .iter_mut()
                        .find(|r| r.seen + 1 == inline_count && &r.mark == mark)
                    {
                        Some(run) => {
                            run.to = end;
                            run.seen = inline_count;
                        }
                        None => runs.push(Run {
                            mark: mark.clone(),
                            from: pos.max(from),
                            to: end,
                            seen: inline_count,
                        }),
                    }
                }
                true
            });
        for run in runs {
            self.step(Step::remove_mark(run.from, run.to, run.mark))?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use crate::transform::{find_wrapping, lift_target};
    use pretty_assertions::assert_eq;

    fn range(doc: &Node, from: usize, to: usize) -> NodeRange {
        let rfrom = doc.resolve(from).unwrap();
        let rto = doc.resolve(to).unwrap();
        rfrom.block_range(&rto, |_| true).unwrap()
    }

    #[test]
    fn test_steps_and_docs_are_recorded() {
        let d = doc(vec![p("ab")]);
        let mut tr = Transform::new(d.clone());
        tr.insert(3, txt("c")).unwrap().delete(1, 2).unwrap();
        assert_eq!(tr.steps().len(), 2);
        assert_eq!(tr.docs()[0], d);
        assert_eq!(tr.before(), &d);
        assert_eq!(tr.doc(), &doc(vec![p("bc")]));
        assert_eq!(tr.mapping().map(3, Assoc::After), 3);
    }

    #[test]
    fn test_failed_step_leaves_transform_unchanged() {
        let d = doc(vec![p("ab"), p("cd")]);
        let mut tr = Transform::new(d.clone());
        let err = tr.step(Step::structural(2, 6, Slice::empty())).unwrap_err();
        assert_eq!(err, StepError::StructureOverwrite);
        assert!(!tr.doc_changed());
        assert_eq!(tr.doc(), &d);
    }

    #[test]
    fn test_split_list_item() {
        let d = doc(vec![ul(vec![item("ab")])]);
        let mut tr = Transform::new(d.clone());
        tr.split(pos_of(&d, "b"), 2, &[]).unwrap();
        assert_eq!(tr.doc(), &doc(vec![ul(vec![item("a"), item("b")])]));
    }

    #[test]
    fn test_split_with_type_after() {
        let d = doc(vec![h(1, "ab")]);
        let mut tr = Transform::new(d);
        tr.split(3, 1, &[Some(NodeKind::Paragraph)]).unwrap();
        assert_eq!(tr.doc(), &doc(vec![h(1, "ab"), p("")]));
    }

    #[test]
    fn test_join_merges_list_items() {
        let d = doc(vec![ul(vec![item("a"), item("b")])]);
        let mut tr = Transform::new(d);
        // between the two items
        assert!(tr.join(6, 2).unwrap());
        assert_eq!(tr.doc(), &doc(vec![ul(vec![item("ab")])]));
    }

    #[test]
    fn test_join_rejects_mismatched_lists() {
        let d = doc(vec![ul(vec![item("a")]), ol(vec![item("b")])]);
        let mut tr = Transform::new(d.clone());
        assert!(!tr.join(7, 1).unwrap());
        assert_eq!(tr.doc(), &d);
    }

    #[test]
    fn test_join_unchecked_merges_heading_into_paragraph() {
        let d = doc(vec![p("a"), h(2, "b")]);
        let mut tr = Transform::new(d);
        tr.join_unchecked(3, 1).unwrap();
        assert_eq!(tr.doc(), &doc(vec![p("ab")]));
    }

    #[test]
    fn test_lift_out_of_blockquote() {
        let d = doc(vec![blockquote(vec![p("a"), p("b"), p("c")])]);
        let r = range(&d, pos_of(&d, "b"), pos_of(&d, "b"));
        let target = lift_target(&r).unwrap();
        let mut tr = Transform::new(d);
        tr.lift(&r, target).unwrap();
        assert_eq!(
            tr.doc(),
            &doc(vec![blockquote(vec![p("a")]), p("b"), blockquote(vec![p("c")])])
        );
    }

    #[test]
    fn test_wrap_in_list() {
        let d = doc(vec![p("a"), p("b")]);
        let single = range(&d, 1, 1);
        let wrappers: Vec<NodeKind> = find_wrapping(&single, NodeType::BulletedList)
            .unwrap()
            .into_iter()
            .map(NodeType::default_kind)
            .collect();
        let mut tr = Transform::new(d.clone());
        // a single item cannot hold two paragraphs
        let both = range(&d, 1, 4);
        assert_eq!(tr.wrap(&both, &wrappers).unwrap_err(), StepError::GapMismatch);
        tr.wrap(&single, &wrappers).unwrap();
        assert_eq!(tr.doc(), &doc(vec![ul(vec![item("a")]), p("b")]));
    }

    #[test]
    fn test_set_block_type_drops_marks_in_code() {
        let d = doc(vec![p_with(vec![txt("a"), bold("b")])]);
        let mut tr = Transform::new(d);
        tr.set_block_type(1, 1, &NodeKind::CodeBlock { lang: None }).unwrap();
        assert_eq!(tr.doc(), &doc(vec![code_block("ab")]));
    }

    #[test]
    fn test_set_block_type_rejects_non_textblock() {
        let mut tr = Transform::new(doc(vec![p("a")]));
        assert_eq!(
            tr.set_block_type(1, 1, &NodeKind::Blockquote).unwrap_err(),
            StepError::NotTextblock(NodeType::Blockquote)
        );
    }

    #[test]
    fn test_set_node_markup_changes_heading_level() {
        let d = doc(vec![h(1, "a")]);
        let mut tr = Transform::new(d);
        tr.set_node_markup(0, Some(NodeKind::Heading { level: 3 }), None)
            .unwrap();
        assert_eq!(tr.doc(), &doc(vec![h(3, "a")]));
    }

    #[test]
    fn test_add_and_remove_mark() {
        let d = doc(vec![p_with(vec![txt("a"), italic("bc")])]);
        let mut tr = Transform::new(d.clone());
        tr.add_mark(1, 3, Mark::Bold).unwrap();
        let bold_italic =
            Node::new_text("b", MarkSet::from_marks([Mark::Italic, Mark::Bold])).unwrap();
        assert_eq!(
            tr.doc(),
            &doc(vec![p_with(vec![bold("a"), bold_italic, italic("c")])])
        );
        tr.remove_mark(1, 4, MarkType::Bold).unwrap();
        assert_eq!(tr.doc(), &d);
    }

    #[test]
    fn test_delete_range_removes_whole_item() {
        let d = doc(vec![ul(vec![item("a"), item("b")])]);
        let mut tr = Transform::new(d);
        // the whole content of the second item's paragraph
        tr.delete_range(8, 9).unwrap();
        assert_eq!(tr.doc(), &doc(vec![ul(vec![item("a"), item("")])]));
    }
}
