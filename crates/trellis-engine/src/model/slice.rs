use std::fmt;

use super::error::ModelError;
use super::fragment::Fragment;
use super::node::Node;

/// A piece cut out of a document: a fragment plus how many levels are left
/// open on either side.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Slice {
    pub content: Fragment,
    pub open_start: usize,
    pub open_end: usize,
}

impl Slice {
    pub fn new(content: Fragment, open_start: usize, open_end: usize) -> Self {
        Self {
            content,
            open_start,
            open_end,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Tokens this slice adds when inserted.
    pub fn size(&self) -> usize {
        self.content.size() - self.open_start - self.open_end
    }

    /// Opens the slice as far as its first and last children allow,
    /// optionally stopping at isolating nodes.
    pub fn max_open(content: Fragment, open_isolating: bool) -> Slice {
        let opens = |n: &Node| !n.is_leaf() && (open_isolating || !n.node_type().is_isolating());
        let mut open_start = 0;
        let mut node = content.first_child().cloned();
        while let Some(n) = node.filter(|n| opens(n)) {
            open_start += 1;
            node = n.first_child().cloned();
        }
        let mut open_end = 0;
        let mut node = content.last_child().cloned();
        while let Some(n) = node.filter(|n| opens(n)) {
            open_end += 1;
            node = n.last_child().cloned();
        }
        Slice::new(content, open_start, open_end)
    }

    /// Inserts `fragment` at slice position `pos`, if the grammar of the
    /// receiving node allows it.
    pub fn insert_at(&self, pos: usize, fragment: &Fragment) -> Option<Slice> {
        let content = insert_into(&self.content, pos + self.open_start, fragment, None)?;
        Some(Slice::new(content, self.open_start, self.open_end))
    }

    pub fn remove_between(&self, from: usize, to: usize) -> Result<Slice, ModelError> {
        let content = remove_range(&self.content, from + self.open_start, to + self.open_start)?;
        Ok(Slice::new(content, self.open_start, self.open_end))
    }
}

fn remove_range(content: &Fragment, from: usize, to: usize) -> Result<Fragment, ModelError> {
    let (index, offset) = content.find_index(from)?;
    let (index_to, offset_to) = content.find_index(to)?;
    let child = content.maybe_child(index);
    if offset == from || child.is_some_and(Node::is_text) {
        if offset_to != to && !content.child(index_to).is_text() {
            return Err(ModelError::NonFlatRange);
        }
        return Ok(content.cut(0, from).append(&content.cut(to, content.size())));
    }
    let child = child.ok_or(ModelError::NonFlatRange)?;
    if index != index_to {
        return Err(ModelError::NonFlatRange);
    }
    let inner = remove_range(child.content(), from - offset - 1, to - offset - 1)?;
    Ok(content.replace_child(index, child.copy(inner)))
}

fn insert_into(
    content: &Fragment,
    dist: usize,
    insert: &Fragment,
    parent: Option<&Node>,
) -> Option<Fragment> {
    let (index, offset) = content.find_index(dist).ok()?;
    let child = content.maybe_child(index);
    if offset == dist || child.is_some_and(Node::is_text) {
        if let Some(parent) = parent
            && !parent.can_replace(index, index, insert)
        {
            return None;
        }
        return Some(
            content
                .cut(0, dist)
                .append(insert)
                .append(&content.cut(dist, content.size())),
        );
    }
    let child = child?;
    let inner = insert_into(child.content(), dist - offset - 1, insert, Some(child))?;
    Some(content.replace_child(index, child.copy(inner)))
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.content, self.open_start, self.open_end)
    }
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slice_of_nested_list() {
        let d = doc(vec![ul(vec![li(vec![p("ab")]), li(vec![p("cd")])])]);
        // from inside "ab" to inside "cd"
        let slice = d.slice(4, 10).unwrap();
        assert_eq!(slice.open_start, 2);
        assert_eq!(slice.open_end, 2);
        assert_eq!(
            slice.to_string(),
            r#"<list_item(paragraph("b")), list_item(paragraph("c"))>(2,2)"#
        );
        assert_eq!(slice.size(), 6);
    }

    #[test]
    fn test_max_open_stops_at_isolating() {
        let content = Fragment::from_node(figure("cap"));
        assert_eq!(Slice::max_open(content.clone(), true).open_start, 1);
        assert_eq!(Slice::max_open(content, false).open_start, 0);
    }

    #[test]
    fn test_insert_at_respects_grammar() {
        let slice = Slice::new(Fragment::from_node(li(vec![p("a")])), 0, 0);
        // inside the list item, after its paragraph
        let list = Fragment::from_node(ul(vec![li(vec![p("x")])]));
        let nested = slice.insert_at(4, &list).unwrap();
        assert_eq!(
            nested.to_string(),
            r#"<list_item(paragraph("a"), bulleted_list(list_item(paragraph("x"))))>(0,0)"#
        );
        let para = Fragment::from_node(p("y"));
        assert!(slice.insert_at(4, &para).is_none());
    }

    #[test]
    fn test_remove_between() {
        let slice = Slice::new(Fragment::from_node(p("abcd")), 1, 1);
        let removed = slice.remove_between(1, 3).unwrap();
        assert_eq!(removed.to_string(), r#"<paragraph("ad")>(1,1)"#);
    }
}
