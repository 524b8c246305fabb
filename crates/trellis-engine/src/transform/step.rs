//! Atomic document changes.
//!
//! Every edit is expressed as a sequence of [`Step`]s. A step applies to a
//! document or fails without side effects, reports how it moves positions
//! through its [`StepMap`], and can produce its own inverse.

use thiserror::Error;

use crate::model::{Fragment, Mark, MarkSet, ModelError, Node, NodeType, Slice};

use super::map::{Assoc, Mappable, Mapping, StepMap};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("Structure replace would overwrite content")]
    StructureOverwrite,
    #[error("Structure gap-replace would overwrite content")]
    GapOverwrite,
    #[error("Gap is not a flat range")]
    GapNotFlat,
    #[error("Content does not fit in gap")]
    GapMismatch,
    #[error("No node at position {0}")]
    NoNodeAt(usize),
    #[error("Wrapper types do not form valid content")]
    InvalidWrapper,
    #[error("{0} is not a textblock type")]
    NotTextblock(NodeType),
}

/// Replaces `from..to` with a slice. A structural step refuses to
/// overwrite content; it may only move node boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceStep {
    pub from: usize,
    pub to: usize,
    pub slice: Slice,
    pub structure: bool,
}

/// Replaces `from..to` with a slice while keeping `gap_from..gap_to`,
/// which is re-inserted into the slice at offset `insert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceAroundStep {
    pub from: usize,
    pub to: usize,
    pub gap_from: usize,
    pub gap_to: usize,
    pub slice: Slice,
    pub insert: usize,
    pub structure: bool,
}

/// Adds or removes one mark on the inline content of a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkStep {
    pub from: usize,
    pub to: usize,
    pub mark: Mark,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Replace(ReplaceStep),
    ReplaceAround(ReplaceAroundStep),
    AddMark(MarkStep),
    RemoveMark(MarkStep),
}

impl Step {
    pub fn replace(from: usize, to: usize, slice: Slice) -> Step {
        Step::Replace(ReplaceStep {
            from,
            to,
            slice,
            structure: false,
        })
    }

    pub fn structural(from: usize, to: usize, slice: Slice) -> Step {
        Step::Replace(ReplaceStep {
            from,
            to,
            slice,
            structure: true,
        })
    }

    pub fn replace_around(
        from: usize,
        to: usize,
        gap_from: usize,
        gap_to: usize,
        slice: Slice,
        insert: usize,
        structure: bool,
    ) -> Step {
        Step::ReplaceAround(ReplaceAroundStep {
            from,
            to,
            gap_from,
            gap_to,
            slice,
            insert,
            structure,
        })
    }

    pub fn add_mark(from: usize, to: usize, mark: Mark) -> Step {
        Step::AddMark(MarkStep { from, to, mark })
    }

    pub fn remove_mark(from: usize, to: usize, mark: Mark) -> Step {
        Step::RemoveMark(MarkStep { from, to, mark })
    }

    pub fn apply(&self, doc: &Node) -> Result<Node, StepError> {
        match self {
            Step::Replace(s) => {
                if s.structure && content_between(doc, s.from, s.to)? {
                    return Err(StepError::StructureOverwrite);
                }
                replace_checked(doc, s.from, s.to, &s.slice)
            }
            Step::ReplaceAround(s) => {
                if s.structure
                    && (content_between(doc, s.from, s.gap_from)?
                        || content_between(doc, s.gap_to, s.to)?)
                {
                    return Err(StepError::GapOverwrite);
                }
                let gap = doc.slice(s.gap_from, s.gap_to)?;
                if gap.open_start > 0 || gap.open_end > 0 {
                    return Err(StepError::GapNotFlat);
                }
                let inserted = s
                    .slice
                    .insert_at(s.insert, &gap.content)
                    .ok_or(StepError::GapMismatch)?;
                replace_checked(doc, s.from, s.to, &inserted)
            }
            Step::AddMark(s) => apply_mark(doc, s, |marks, mark| marks.add(mark)),
            Step::RemoveMark(s) => apply_mark(doc, s, |marks, mark| marks.remove(mark)),
        }
    }

    pub fn get_map(&self) -> StepMap {
        match self {
            Step::Replace(s) => StepMap::new(vec![(s.from, s.to - s.from, s.slice.size())]),
            Step::ReplaceAround(s) => StepMap::new(vec![
                (s.from, s.gap_from - s.from, s.insert),
                (s.gap_to, s.to - s.gap_to, s.slice.size() - s.insert),
            ]),
            Step::AddMark(_) | Step::RemoveMark(_) => StepMap::empty(),
        }
    }

    /// The step that undoes this one, given the document it was applied to.
    pub fn invert(&self, doc: &Node) -> Result<Step, StepError> {
        Ok(match self {
            Step::Replace(s) => Step::Replace(ReplaceStep {
                from: s.from,
                to: s.from + s.slice.size(),
                slice: doc.slice(s.from, s.to)?,
                structure: false,
            }),
            Step::ReplaceAround(s) => {
                let gap = s.gap_to - s.gap_from;
                let slice = doc
                    .slice(s.from, s.to)?
                    .remove_between(s.gap_from - s.from, s.gap_to - s.from)?;
                Step::replace_around(
                    s.from,
                    s.from + s.slice.size() + gap,
                    s.from + s.insert,
                    s.from + s.insert + gap,
                    slice,
                    s.gap_from - s.from,
                    s.structure,
                )
            }
            Step::AddMark(s) => Step::RemoveMark(s.clone()),
            Step::RemoveMark(s) => Step::AddMark(s.clone()),
        })
    }

    /// This step carried through `mapping`, or `None` when the content it
    /// applied to was deleted.
    pub fn map(&self, mapping: &Mapping) -> Option<Step> {
        match self {
            Step::Replace(s) => {
                let from = mapping.map_result(s.from, Assoc::After);
                let to = mapping.map_result(s.to, Assoc::Before);
                if from.deleted_across() && to.deleted_across() {
                    return None;
                }
                Some(Step::Replace(ReplaceStep {
                    from: from.pos,
                    to: from.pos.max(to.pos),
                    slice: s.slice.clone(),
                    structure: s.structure,
                }))
            }
            Step::ReplaceAround(s) => {
                let from = mapping.map_result(s.from, Assoc::After);
                let to = mapping.map_result(s.to, Assoc::Before);
                let gap_from = if s.from == s.gap_from {
                    from.pos
                } else {
                    mapping.map(s.gap_from, Assoc::Before)
                };
                let gap_to = if s.to == s.gap_to {
                    to.pos
                } else {
                    mapping.map(s.gap_to, Assoc::After)
                };
                if (from.deleted_across() && to.deleted_across())
                    || gap_from < from.pos
                    || gap_to > to.pos
                {
                    return None;
                }
                Some(Step::replace_around(
                    from.pos,
                    to.pos,
                    gap_from,
                    gap_to,
                    s.slice.clone(),
                    s.insert,
                    s.structure,
                ))
            }
            Step::AddMark(s) | Step::RemoveMark(s) => {
                let from = mapping.map_result(s.from, Assoc::After);
                let to = mapping.map_result(s.to, Assoc::Before);
                if (from.deleted() && to.deleted()) || from.pos >= to.pos {
                    return None;
                }
                let mapped = MarkStep {
                    from: from.pos,
                    to: to.pos,
                    mark: s.mark.clone(),
                };
                Some(match self {
                    Step::AddMark(_) => Step::AddMark(mapped),
                    _ => Step::RemoveMark(mapped),
                })
            }
        }
    }
}

fn replace_checked(doc: &Node, from: usize, to: usize, slice: &Slice) -> Result<Node, StepError> {
    if from > to {
        let message = format!("range {from}..{to} is reversed");
        return Err(ModelError::ReplacementInvalid(message).into());
    }
    Ok(doc.replace(from, to, slice)?)
}

/// Whether `from..to` covers anything besides node boundaries.
fn content_between(doc: &Node, from: usize, to: usize) -> Result<bool, StepError> {
    let rfrom = doc.resolve(from)?;
    let mut dist = to.saturating_sub(from);
    let mut depth = rfrom.depth();
    while dist > 0 && depth > 0 && rfrom.index_after(depth) == rfrom.node(depth).child_count() {
        depth -= 1;
        dist -= 1;
    }
    if dist > 0 {
        let mut next = rfrom.node(depth).maybe_child(rfrom.index_after(depth)).cloned();
        while dist > 0 {
            match next {
                Some(node) if !node.is_leaf() => next = node.first_child().cloned(),
                _ => return Ok(true),
            }
            dist -= 1;
        }
    }
    Ok(false)
}

fn apply_mark(
    doc: &Node,
    step: &MarkStep,
    update: impl Fn(&MarkSet, &Mark) -> MarkSet,
) -> Result<Node, StepError> {
    let old = doc.slice(step.from, step.to)?;
    let rfrom = doc.resolve(step.from)?;
    let parent = rfrom.node(rfrom.shared_depth(step.to)).clone();
    let ty = step.mark.mark_type();
    let content = map_inline(&old.content, &parent, &mut |node: &Node, parent: &Node| {
        if !node.is_atom() || !parent.node_type().allows_mark_type(ty) {
            return node.clone();
        }
        node.mark(update(node.marks(), &step.mark))
    });
    replace_checked(doc, step.from, step.to, &Slice::new(content, old.open_start, old.open_end))
}

fn map_inline(
    fragment: &Fragment,
    parent: &Node,
    f: &mut impl FnMut(&Node, &Node) -> Node,
) -> Fragment {
    let mapped = fragment
        .iter()
        .map(|child| {
            let mut child = child.clone();
            if child.content_size() > 0 {
                child = child.copy(map_inline(child.content(), &child, f));
            }
            if child.is_inline() { f(&child, parent) } else { child }
        })
        .collect();
    Fragment::from_vec(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;
    use crate::tests::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_replace_step_and_inverse() {
        let d = doc(vec![p("hello")]);
        let step = Step::replace(2, 4, Slice::new(Fragment::from_node(txt("EY")), 0, 0));
        let out = step.apply(&d).unwrap();
        assert_eq!(out, doc(vec![p("hEYlo")]));
        let back = step.invert(&d).unwrap().apply(&out).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_structural_step_refuses_to_drop_text() {
        let d = doc(vec![p("ab"), p("cd")]);
        let join = Step::structural(3, 5, Slice::empty());
        assert_eq!(join.apply(&d).unwrap(), doc(vec![p("abcd")]));
        let lossy = Step::structural(2, 6, Slice::empty());
        assert_eq!(lossy.apply(&d).unwrap_err(), StepError::StructureOverwrite);
    }

    #[test]
    fn test_replace_around_wraps_content() {
        let d = doc(vec![p("a")]);
        let quote = Node::branch(NodeKind::Blockquote, Fragment::empty());
        let wrapper = Slice::new(Fragment::from_node(quote), 0, 0);
        let step = Step::replace_around(0, 3, 0, 3, wrapper, 1, true);
        let out = step.apply(&d).unwrap();
        assert_eq!(out, doc(vec![blockquote(vec![p("a")])]));
        assert_eq!(step.get_map().map(1, Assoc::After), 2);
        let back = step.invert(&d).unwrap().apply(&out).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_mark_steps() {
        let d = doc(vec![p("abc")]);
        let add = Step::add_mark(2, 3, Mark::Bold);
        let out = add.apply(&d).unwrap();
        assert_eq!(out, doc(vec![p_with(vec![txt("a"), bold("b"), txt("c")])]));
        assert_eq!(add.invert(&d).unwrap().apply(&out).unwrap(), d);
    }

    #[test]
    fn test_marks_skipped_in_code_block() {
        let d = doc(vec![code_block("abc")]);
        let out = Step::add_mark(1, 4, Mark::Bold).apply(&d).unwrap();
        assert_eq!(out, d);
    }

    #[test]
    fn test_map_drops_step_over_deleted_range() {
        let step = Step::replace(3, 5, Slice::empty());
        let deleted = Mapping::from_maps(vec![StepMap::new(vec![(1, 6, 0)])]);
        assert!(step.map(&deleted).is_none());
        let shifted = Mapping::from_maps(vec![StepMap::new(vec![(0, 0, 2)])]);
        assert_eq!(step.map(&shifted), Some(Step::replace(5, 7, Slice::empty())));
    }
}
