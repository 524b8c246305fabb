//! Raw replacement.
//!
//! Replaces the range between two resolved positions with a slice, joining
//! the slice's open edges onto the nodes around the cut. Nodes are joined
//! only when their content is compatible and every node that gets closed
//! is checked against its grammar. Finding a slice that *fits* is the job
//! of the fitter in `transform::fit`; this module only assembles.

use super::error::ModelError;
use super::fragment::Fragment;
use super::node::{Node, check_content};
use super::resolved::ResolvedPos;
use super::slice::Slice;

pub(crate) fn replace(
    from: &ResolvedPos,
    to: &ResolvedPos,
    slice: &Slice,
) -> Result<Node, ModelError> {
    if slice.open_start > from.depth() {
        return Err(invalid("inserted content deeper than insertion position"));
    }
    if slice.open_end > to.depth()
        || from.depth() - slice.open_start != to.depth() - slice.open_end
    {
        return Err(invalid("inconsistent open depths"));
    }
    replace_outer(from, to, slice, 0)
}

fn invalid(msg: impl Into<String>) -> ModelError {
    ModelError::ReplacementInvalid(msg.into())
}

fn replace_outer(
    from: &ResolvedPos,
    to: &ResolvedPos,
    slice: &Slice,
    depth: usize,
) -> Result<Node, ModelError> {
    let index = from.index(depth);
    let node = from.node(depth);
    if index == to.index(depth) && depth < from.depth() - slice.open_start {
        let inner = replace_outer(from, to, slice, depth + 1)?;
        Ok(node.copy(node.content().replace_child(index, inner)))
    } else if slice.content.size() == 0 {
        close(node, replace_two_way(from, to, depth)?)
    } else if slice.open_start == 0
        && slice.open_end == 0
        && from.depth() == depth
        && to.depth() == depth
    {
        // flat insertion into a single parent
        let parent = from.parent();
        let content = parent.content();
        close(
            parent,
            content
                .cut(0, from.parent_offset())
                .append(&slice.content)
                .append(&content.cut(to.parent_offset(), content.size())),
        )
    } else {
        let (start, end) = prepare_slice_for_replace(slice, from)?;
        close(node, replace_three_way(from, &start, &end, to, depth)?)
    }
}

fn check_join(main: &Node, sub: &Node) -> Result<(), ModelError> {
    if !sub.node_type().compatible_content(main.node_type()) {
        return Err(invalid(format!(
            "cannot join {} onto {}",
            sub.node_type(),
            main.node_type()
        )));
    }
    Ok(())
}

fn joinable(before: &ResolvedPos, after: &ResolvedPos, depth: usize) -> Result<Node, ModelError> {
    let node = before.node(depth);
    check_join(node, after.node(depth))?;
    Ok(node.clone())
}

fn add_node(child: Node, target: &mut Vec<Node>) {
    if let Some(last) = target.last_mut()
        && child.is_text()
        && child.same_markup(last)
    {
        let joined = format!(
            "{}{}",
            last.text().unwrap_or_default(),
            child.text().unwrap_or_default()
        );
        *last = last.with_text(joined);
        return;
    }
    target.push(child);
}

fn add_range(
    start: Option<&ResolvedPos>,
    end: Option<&ResolvedPos>,
    depth: usize,
    target: &mut Vec<Node>,
) {
    let Some(node) = end.or(start).map(|p| p.node(depth)) else {
        return;
    };
    let mut start_index = 0;
    let end_index = end.map_or(node.child_count(), |e| e.index(depth));
    if let Some(start) = start {
        start_index = start.index(depth);
        if start.depth() > depth {
            start_index += 1;
        } else if start.text_offset() > 0 {
            if let Some(after) = start.node_after() {
                add_node(after, target);
            }
            start_index += 1;
        }
    }
    for i in start_index..end_index {
        add_node(node.child(i).clone(), target);
    }
    if let Some(end) = end
        && end.depth() == depth
        && end.text_offset() > 0
        && let Some(before) = end.node_before()
    {
        add_node(before, target);
    }
}

fn close(node: &Node, content: Fragment) -> Result<Node, ModelError> {
    check_content(node.node_type(), &content)?;
    Ok(node.copy(content))
}

fn replace_three_way(
    from: &ResolvedPos,
    start: &ResolvedPos,
    end: &ResolvedPos,
    to: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ModelError> {
    let open_start = if from.depth() > depth {
        Some(joinable(from, start, depth + 1)?)
    } else {
        None
    };
    let open_end = if to.depth() > depth {
        Some(joinable(end, to, depth + 1)?)
    } else {
        None
    };

    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);
    match (&open_start, &open_end) {
        (Some(os), Some(oe)) if start.index(depth) == end.index(depth) => {
            check_join(os, oe)?;
            let inner = replace_three_way(from, start, end, to, depth + 1)?;
            add_node(close(os, inner)?, &mut content);
        }
        _ => {
            if let Some(os) = &open_start {
                add_node(close(os, replace_two_way(from, start, depth + 1)?)?, &mut content);
            }
            add_range(Some(start), Some(end), depth, &mut content);
            if let Some(oe) = &open_end {
                add_node(close(oe, replace_two_way(end, to, depth + 1)?)?, &mut content);
            }
        }
    }
    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::from_vec(content))
}

fn replace_two_way(
    from: &ResolvedPos,
    to: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ModelError> {
    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);
    if from.depth() > depth {
        let ty = joinable(from, to, depth + 1)?;
        add_node(close(&ty, replace_two_way(from, to, depth + 1)?)?, &mut content);
    }
    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::from_vec(content))
}

/// Wraps the slice in copies of the ancestors of `along` so that its open
/// edges can be addressed with resolved positions.
fn prepare_slice_for_replace(
    slice: &Slice,
    along: &ResolvedPos,
) -> Result<(ResolvedPos, ResolvedPos), ModelError> {
    let extra = along.depth() - slice.open_start;
    let parent = along.node(extra);
    let mut node = parent.copy(slice.content.clone());
    for i in (0..extra).rev() {
        node = along.node(i).copy(Fragment::from_node(node));
    }
    let start = node.resolve(slice.open_start + extra)?;
    let end = node.resolve(node.content_size() - slice.open_end - extra)?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use crate::model::{Fragment, ModelError, Slice};
    use crate::tests::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_delete_across_paragraphs_joins_them() {
        let d = doc(vec![p("ab"), p("cd")]);
        let out = d.replace(2, 6, &Slice::empty()).unwrap();
        assert_eq!(out, doc(vec![p("ad")]));
    }

    #[test]
    fn test_insert_open_slice_splits_paragraph() {
        let d = doc(vec![p("abcd")]);
        let slice = Slice::new(Fragment::from_vec(vec![p("x"), p("y")]), 1, 1);
        let out = d.replace(3, 3, &slice).unwrap();
        assert_eq!(out, doc(vec![p("abx"), p("ycd")]));
    }

    #[test]
    fn test_replace_rejects_grammar_violation() {
        let d = doc(vec![ul(vec![li(vec![p("a")])])]);
        // a bare paragraph straight inside the list
        let slice = Slice::new(Fragment::from_node(p("x")), 0, 0);
        let err = d.replace(1, 1, &slice).unwrap_err();
        assert_eq!(err, ModelError::InvalidContent(crate::model::NodeType::BulletedList));
    }

    #[test]
    fn test_joining_incompatible_nodes_fails() {
        let d = doc(vec![p("ab"), blockquote(vec![p("c")])]);
        // from inside the paragraph to the start of the quote's content
        let err = d.replace(2, 5, &Slice::empty()).unwrap_err();
        assert!(matches!(err, ModelError::ReplacementInvalid(_)));
    }

    #[test]
    fn test_inconsistent_open_depths() {
        let d = doc(vec![p("ab")]);
        let slice = Slice::new(Fragment::from_node(p("x")), 1, 0);
        assert!(matches!(
            d.replace(2, 2, &slice),
            Err(ModelError::ReplacementInvalid(_))
        ));
    }
}
