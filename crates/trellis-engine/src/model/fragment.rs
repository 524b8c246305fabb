use std::fmt;

use super::error::ModelError;
use super::node::{Node, char_slice};

/// An ordered run of sibling nodes with a cached token size.
///
/// Adjacent text nodes with the same marks never appear next to each other;
/// every constructor merges them.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Fragment {
    nodes: Vec<Node>,
    size: usize,
}

impl Fragment {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_node(node: Node) -> Self {
        let size = node.node_size();
        Self {
            nodes: vec![node],
            size,
        }
    }

    pub fn from_vec(nodes: Vec<Node>) -> Self {
        let mut merged: Vec<Node> = Vec::with_capacity(nodes.len());
        let mut size = 0;
        for node in nodes {
            size += node.node_size();
            push_merging(&mut merged, node);
        }
        Self {
            nodes: merged,
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn child_count(&self) -> usize {
        self.nodes.len()
    }

    /// Panics if `index` is out of range.
    pub fn child(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.nodes.last()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn append(&self, other: &Fragment) -> Fragment {
        if other.size == 0 {
            return self.clone();
        }
        if self.size == 0 {
            return other.clone();
        }
        let mut nodes = self.nodes.clone();
        for node in &other.nodes {
            push_merging(&mut nodes, node.clone());
        }
        Fragment {
            nodes,
            size: self.size + other.size,
        }
    }

    /// The part of this fragment between two content positions.
    pub fn cut(&self, from: usize, to: usize) -> Fragment {
        if from == 0 && to == self.size {
            return self.clone();
        }
        let mut result = Vec::new();
        let mut size = 0;
        if to > from {
            let mut pos = 0;
            for child in &self.nodes {
                if pos >= to {
                    break;
                }
                let end = pos + child.node_size();
                if end > from {
                    let child = if pos < from || end > to {
                        if child.is_text() {
                            child.cut(from.saturating_sub(pos), (to - pos).min(child.node_size()))
                        } else {
                            child.cut(
                                from.saturating_sub(pos + 1),
                                (to - pos - 1).min(child.content().size()),
                            )
                        }
                    } else {
                        child.clone()
                    };
                    size += child.node_size();
                    result.push(child);
                }
                pos = end;
            }
        }
        Fragment {
            nodes: result,
            size,
        }
    }

    pub fn cut_by_index(&self, from: usize, to: usize) -> Fragment {
        if from == to {
            return Fragment::empty();
        }
        if from == 0 && to == self.nodes.len() {
            return self.clone();
        }
        Fragment::from_vec(self.nodes[from..to].to_vec())
    }

    pub fn replace_child(&self, index: usize, node: Node) -> Fragment {
        let current = &self.nodes[index];
        if current.ptr_eq(&node) {
            return self.clone();
        }
        let size = self.size + node.node_size() - current.node_size();
        let mut nodes = self.nodes.clone();
        nodes[index] = node;
        Fragment { nodes, size }
    }

    pub fn add_to_start(&self, node: Node) -> Fragment {
        Fragment::from_node(node).append(self)
    }

    pub fn add_to_end(&self, node: Node) -> Fragment {
        self.append(&Fragment::from_node(node))
    }

    /// Finds the child index at content position `pos`, rounding towards
    /// the child that starts at or contains it, and that child's offset.
    pub fn find_index(&self, pos: usize) -> Result<(usize, usize), ModelError> {
        if pos == 0 {
            return Ok((0, 0));
        }
        if pos == self.size {
            return Ok((self.nodes.len(), pos));
        }
        if pos > self.size {
            return Err(ModelError::OutOfRange {
                pos,
                size: self.size,
            });
        }
        let mut cur = 0;
        for (i, child) in self.nodes.iter().enumerate() {
            let end = cur + child.node_size();
            if end >= pos {
                if end == pos {
                    return Ok((i + 1, end));
                }
                return Ok((i, cur));
            }
            cur = end;
        }
        Err(ModelError::OutOfRange {
            pos,
            size: self.size,
        })
    }

    /// Calls `f(node, pos, parent, index)` for every node overlapping
    /// `from..to`, descending into a node only when `f` returns true.
    pub fn nodes_between<F>(
        &self,
        from: usize,
        to: usize,
        f: &mut F,
        node_start: usize,
        parent: Option<&Node>,
    )
    where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        let mut pos = 0;
        for (i, child) in self.nodes.iter().enumerate() {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from && f(child, node_start + pos, parent, i) && child.content().size() > 0 {
                let start = pos + 1;
                child.content().nodes_between(
                    from.saturating_sub(start),
                    child.content().size().min(to - start),
                    f,
                    node_start + start,
                    Some(child),
                );
            }
            pos = end;
        }
    }

    pub fn descendants<F>(&self, f: &mut F)
    where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        self.nodes_between(0, self.size, f, 0, None);
    }

    /// Text between two content positions. `block_separator` is inserted
    /// between textblocks, `leaf_text` stands in for non-text leaves.
    pub fn text_between(
        &self,
        from: usize,
        to: usize,
        block_separator: &str,
        leaf_text: &str,
    ) -> String {
        let mut text = String::new();
        let mut first = true;
        self.nodes_between(
            from,
            to,
            &mut |node: &Node, pos: usize, _: Option<&Node>, _: usize| {
                let node_text = match node.text() {
                    Some(s) => char_slice(s, from.max(pos) - pos, to - pos),
                    None if node.is_leaf() => leaf_text,
                    None => "",
                };
                if node.is_block()
                    && ((node.is_leaf() && !node_text.is_empty()) || node.is_textblock())
                    && !block_separator.is_empty()
                {
                    if first {
                        first = false;
                    } else {
                        text.push_str(block_separator);
                    }
                }
                text.push_str(node_text);
                true
            },
            0,
            None,
        );
        text
    }

    pub(crate) fn write_inner(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{node}")?;
        }
        Ok(())
    }
}

fn push_merging(nodes: &mut Vec<Node>, node: Node) {
    if let Some(last) = nodes.last_mut()
        && node.is_text()
        && last.is_text()
        && last.same_markup(&node)
    {
        let joined = format!(
            "{}{}",
            last.text().unwrap_or_default(),
            node.text().unwrap_or_default()
        );
        *last = last.with_text(joined);
        return;
    }
    nodes.push(node);
}

impl<'a> IntoIterator for &'a Fragment {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

impl From<Node> for Fragment {
    fn from(node: Node) -> Self {
        Fragment::from_node(node)
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<")?;
        self.write_inner(f)?;
        f.write_str(">")
    }
}

impl fmt::Debug for Fragment {
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
    fn test_size_counts_boundaries() {
        let d = doc(vec![p("ab"), ul(vec![li(vec![p("c")])])]);
        assert_eq!(d.content().size(), 4 + 7);
    }

    #[test]
    fn test_cut_inside_nested_nodes() {
        let d = doc(vec![p("hello"), p("world")]);
        let cut = d.content().cut(3, 10);
        assert_eq!(cut.to_string(), r#"<paragraph("llo"), paragraph("wo")>"#);
    }

    #[test]
    fn test_append_merges_text() {
        let a = Fragment::from_node(txt("ab"));
        let b = Fragment::from_node(txt("cd"));
        let joined = a.append(&b);
        assert_eq!(joined.child_count(), 1);
        assert_eq!(joined.size(), 4);
    }

    #[test]
    fn test_find_index() {
        let d = doc(vec![p("ab"), p("cd")]);
        assert_eq!(d.content().find_index(0), Ok((0, 0)));
        assert_eq!(d.content().find_index(2), Ok((0, 0)));
        assert_eq!(d.content().find_index(4), Ok((1, 4)));
        assert_eq!(d.content().find_index(8), Ok((2, 8)));
        assert!(d.content().find_index(9).is_err());
    }

    #[test]
    fn test_text_between_with_separator() {
        let d = doc(vec![p("one"), ul(vec![li(vec![p("two")])]), p("three")]);
        let size = d.content().size();
        assert_eq!(d.text_between(0, size, "|", ""), "one|two|three");
        assert_eq!(d.text_between(2, 5, "", ""), "ne");
    }
}
