use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

use super::content::ContentMatch;
use super::error::ModelError;
use super::fragment::Fragment;
use super::mark::{MarkSet, MarkType};
use super::replace;
use super::resolved::ResolvedPos;
use super::schema::{NodeKind, NodeType};
use super::slice::Slice;

/// An immutable, cheaply clonable tree node.
///
/// Text nodes hold their string and marks; every other node holds a
/// [`Fragment`] of children. Nodes are never mutated: edits build new
/// nodes that share untouched subtrees with the old ones.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

#[derive(PartialEq, Eq)]
struct NodeInner {
    kind: NodeKind,
    marks: MarkSet,
    content: Fragment,
    text: Option<TextContent>,
}

#[derive(PartialEq, Eq)]
struct TextContent {
    value: Box<str>,
    chars: usize,
}

impl Node {
    /// Creates a non-text node, validating `content` against the schema.
    pub fn new(kind: NodeKind, content: Fragment) -> Result<Node, ModelError> {
        let ty = kind.node_type();
        if ty.is_text() {
            return Err(ModelError::InvalidContent(ty));
        }
        check_content(ty, &content)?;
        Ok(Node::branch(kind, content))
    }

    /// Creates a text node. Text nodes may not be empty.
    pub fn new_text(text: impl Into<String>, marks: MarkSet) -> Result<Node, ModelError> {
        let text = text.into();
        if text.is_empty() {
            return Err(ModelError::EmptyText);
        }
        Ok(Node::text_node(text, marks))
    }

    pub(crate) fn branch(kind: NodeKind, content: Fragment) -> Node {
        Node::with_parts(kind, content, MarkSet::empty())
    }

    pub(crate) fn with_parts(kind: NodeKind, content: Fragment, marks: MarkSet) -> Node {
        Node(Arc::new(NodeInner {
            kind,
            marks,
            content,
            text: None,
        }))
    }

    pub(crate) fn text_node(text: String, marks: MarkSet) -> Node {
        let chars = text.chars().count();
        Node(Arc::new(NodeInner {
            kind: NodeKind::Text,
            marks,
            content: Fragment::empty(),
            text: Some(TextContent {
                value: text.into_boxed_str(),
                chars,
            }),
        }))
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    pub fn node_type(&self) -> NodeType {
        self.0.kind.node_type()
    }

    pub fn marks(&self) -> &MarkSet {
        &self.0.marks
    }

    pub fn content(&self) -> &Fragment {
        &self.0.content
    }

    pub fn text(&self) -> Option<&str> {
        self.0.text.as_ref().map(|t| t.value.as_ref())
    }

    /// Same allocation. Used to prove that read-only queries did not rebuild.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of tokens this node occupies in its parent.
    pub fn node_size(&self) -> usize {
        match &self.0.text {
            Some(text) => text.chars,
            None if self.is_leaf() => 1,
            None => self.0.content.size() + 2,
        }
    }

    pub fn content_size(&self) -> usize {
        self.0.content.size()
    }

    pub fn child_count(&self) -> usize {
        self.0.content.child_count()
    }

    pub fn child(&self, index: usize) -> &Node {
        self.0.content.child(index)
    }

    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.0.content.maybe_child(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.0.content.first_child()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.0.content.last_child()
    }

    pub fn is_text(&self) -> bool {
        self.0.text.is_some()
    }

    pub fn is_leaf(&self) -> bool {
        self.node_type().is_leaf()
    }

    pub fn is_atom(&self) -> bool {
        self.node_type().is_atom()
    }

    pub fn is_inline(&self) -> bool {
        self.node_type().is_inline()
    }

    pub fn is_block(&self) -> bool {
        self.node_type().is_block()
    }

    pub fn is_textblock(&self) -> bool {
        self.node_type().is_textblock()
    }

    pub fn inline_content(&self) -> bool {
        self.node_type().inline_content()
    }

    pub fn same_markup(&self, other: &Node) -> bool {
        self.has_markup(other.kind(), other.marks())
    }

    pub fn has_markup(&self, kind: &NodeKind, marks: &MarkSet) -> bool {
        self.kind() == kind && self.marks() == marks
    }

    /// Same markup, new content.
    pub(crate) fn copy(&self, content: Fragment) -> Node {
        if self.0.content == content && !self.is_text() {
            return self.clone();
        }
        Node::with_parts(self.0.kind.clone(), content, self.0.marks.clone())
    }

    /// Same node, different marks.
    pub(crate) fn mark(&self, marks: MarkSet) -> Node {
        if *self.marks() == marks {
            return self.clone();
        }
        match self.text() {
            Some(text) => Node::text_node(text.to_string(), marks),
            None => Node::with_parts(self.0.kind.clone(), self.0.content.clone(), marks),
        }
    }

    pub(crate) fn with_text(&self, text: String) -> Node {
        if self.text() == Some(text.as_str()) {
            return self.clone();
        }
        Node::text_node(text, self.0.marks.clone())
    }

    /// Cuts a text node by character offsets or a branch node by content
    /// positions.
    pub fn cut(&self, from: usize, to: usize) -> Node {
        match self.text() {
            Some(text) => {
                if from == 0 && to == self.node_size() {
                    return self.clone();
                }
                self.with_text(char_slice(text, from, to).to_string())
            }
            None => {
                if from == 0 && to == self.content_size() {
                    return self.clone();
                }
                self.copy(self.0.content.cut(from, to))
            }
        }
    }

    /// The slice between two positions, open as deep as the positions go
    /// below their shared ancestor.
    pub fn slice(&self, from: usize, to: usize) -> Result<Slice, ModelError> {
        if from == to {
            return Ok(Slice::empty());
        }
        let rfrom = self.resolve(from)?;
        let rto = self.resolve(to)?;
        let depth = rfrom.shared_depth(to);
        let start = rfrom.start(depth);
        let node = rfrom.node(depth);
        let content = node.content().cut(rfrom.pos() - start, rto.pos() - start);
        Ok(Slice::new(content, rfrom.depth() - depth, rto.depth() - depth))
    }

    /// Replaces `from..to` with `slice`, joining open sides. Every node
    /// the replacement closes is checked against the grammar.
    pub fn replace(&self, from: usize, to: usize, slice: &Slice) -> Result<Node, ModelError> {
        replace::replace(&self.resolve(from)?, &self.resolve(to)?, slice)
    }

    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos, ModelError> {
        ResolvedPos::resolve(self, pos)
    }

    /// The node starting directly at content position `pos`.
    pub fn node_at(&self, pos: usize) -> Option<&Node> {
        let mut node = self;
        let mut pos = pos;
        loop {
            let (index, offset) = node.content().find_index(pos).ok()?;
            let child = node.maybe_child(index)?;
            if offset == pos || child.is_text() {
                return Some(child);
            }
            pos -= offset + 1;
            node = child;
        }
    }

    pub fn nodes_between<F>(&self, from: usize, to: usize, f: &mut F)
    where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        self.0.content.nodes_between(from, to, f, 0, Some(self));
    }

    pub fn descendants<F>(&self, f: &mut F)
    where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        self.nodes_between(0, self.content_size(), f);
    }

    pub fn text_between(
        &self,
        from: usize,
        to: usize,
        block_separator: &str,
        leaf_text: &str,
    ) -> String {
        self.0.content.text_between(from, to, block_separator, leaf_text)
    }

    /// Whether any inline node in `from..to` carries a mark of type `ty`.
    pub fn range_has_mark(&self, from: usize, to: usize, ty: MarkType) -> bool {
        let mut found = false;
        if to > from {
            self.nodes_between(from, to, &mut |node: &Node, _: usize, _: Option<&Node>, _: usize| {
                found = found || node.marks().find(ty).is_some();
                !found
            });
        }
        found
    }

    pub fn text_content(&self) -> String {
        match self.text() {
            Some(text) => text.to_string(),
            None => self.text_between(0, self.content_size(), "", ""),
        }
    }

    /// Grammar state after the first `index` children.
    pub fn content_match_at(&self, index: usize) -> Option<ContentMatch> {
        self.node_type()
            .content_match()
            .match_fragment(self.content(), 0, index)
    }

    /// Whether replacing children `from..to` with
    /// `replacement[start..end]` leaves this node valid.
    pub fn can_replace_range(
        &self,
        from: usize,
        to: usize,
        replacement: &Fragment,
        start: usize,
        end: usize,
    ) -> bool {
        let Some(one) = self
            .content_match_at(from)
            .and_then(|m| m.match_fragment(replacement, start, end))
        else {
            return false;
        };
        let Some(two) = one.match_fragment(self.content(), to, self.child_count()) else {
            return false;
        };
        if !two.valid_end() {
            return false;
        }
        (start..end).all(|i| self.allows_marks(replacement.child(i).marks()))
    }

    pub fn can_replace(&self, from: usize, to: usize, replacement: &Fragment) -> bool {
        self.can_replace_range(from, to, replacement, 0, replacement.child_count())
    }

    /// Whether children `from..to` could be replaced by one node of `ty`.
    pub fn can_replace_with(&self, from: usize, to: usize, ty: NodeType) -> bool {
        self.content_match_at(from)
            .and_then(|m| m.match_type(ty))
            .and_then(|m| m.match_fragment(self.content(), to, self.child_count()))
            .is_some_and(|m| m.valid_end())
    }

    /// Whether `other`'s content could be appended to this node's content.
    pub fn can_append(&self, other: &Node) -> bool {
        if other.content_size() > 0 {
            self.can_replace(self.child_count(), self.child_count(), other.content())
        } else {
            self.node_type().compatible_content(other.node_type())
        }
    }

    pub(crate) fn allows_marks(&self, marks: &MarkSet) -> bool {
        marks.iter().all(|m| self.node_type().allows_mark_type(m.mark_type()))
    }

    /// Validates this subtree against the schema.
    pub fn check(&self) -> Result<(), ModelError> {
        if self.is_text() {
            return Ok(());
        }
        check_content(self.node_type(), self.content())?;
        self.content().iter().try_for_each(Node::check)
    }
}

/// Grammar and mark check for a node's direct children.
pub(crate) fn check_content(ty: NodeType, content: &Fragment) -> Result<(), ModelError> {
    if !ty.valid_content(content) {
        return Err(ModelError::InvalidContent(ty));
    }
    let marks_ok = content
        .iter()
        .all(|child| child.marks().iter().all(|m| ty.allows_mark_type(m.mark_type())));
    if !marks_ok {
        return Err(ModelError::InvalidContent(ty));
    }
    Ok(())
}

/// Slices `s` by character offsets, clamping to its length.
pub(crate) fn char_slice(s: &str, from: usize, to: usize) -> &str {
    let byte_at = |n: usize| s.char_indices().nth(n).map_or(s.len(), |(i, _)| i);
    let start = byte_at(from);
    let end = byte_at(to).max(start);
    &s[start..end]
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0 == *other.0
    }
}

impl Eq for Node {}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marks: Vec<_> = self.marks().iter().collect();
        for mark in &marks {
            write!(f, "{mark}(")?;
        }
        match self.text() {
            Some(text) => write!(f, "{text:?}")?,
            None => {
                f.write_str(self.node_type().name())?;
                if self.content_size() > 0 {
                    f.write_str("(")?;
                    self.content().write_inner(f)?;
                    f.write_str(")")?;
                }
            }
        }
        for _ in &marks {
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Serialize, Deserialize)]
struct NodeRepr {
    #[serde(flatten)]
    kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "MarkSet::is_empty")]
    marks: MarkSet,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    content: Vec<Node>,
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NodeRepr {
            kind: self.kind().clone(),
            text: self.text().map(str::to_string),
            marks: self.marks().clone(),
            content: self.content().nodes().to_vec(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = NodeRepr::deserialize(deserializer)?;
        let node = match repr.kind {
            NodeKind::Text => Node::new_text(repr.text.unwrap_or_default(), repr.marks),
            kind => Node::new(kind, Fragment::from_vec(repr.content)).map(|n| n.mark(repr.marks)),
        };
        node.map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_rejects_invalid_content() {
        let err = Node::new(NodeKind::ListItem, Fragment::from_node(ul(vec![li(vec![p("a")])])))
            .unwrap_err();
        assert_eq!(err, ModelError::InvalidContent(NodeType::ListItem));
        assert_eq!(Node::new_text("", MarkSet::empty()).unwrap_err(), ModelError::EmptyText);
    }

    #[test]
    fn test_display_nests_marks() {
        let node = p_with(vec![txt("a"), bold("b")]);
        assert_eq!(node.to_string(), r#"paragraph("a", bold("b"))"#);
    }

    #[test]
    fn test_node_size_counts_chars() {
        let node = txt("héllo");
        assert_eq!(node.node_size(), 5);
        assert_eq!(node.cut(1, 3).text(), Some("él"));
    }

    #[test]
    fn test_node_at() {
        let d = doc(vec![p("ab"), hr(), p("c")]);
        assert_eq!(d.node_at(0).unwrap().node_type(), NodeType::Paragraph);
        assert_eq!(d.node_at(1).unwrap().text(), Some("ab"));
        assert_eq!(d.node_at(4).unwrap().node_type(), NodeType::HorizontalRule);
        assert!(d.node_at(8).is_none());
    }

    #[test]
    fn test_range_has_mark() {
        let d = doc(vec![p_with(vec![txt("a"), bold("b"), txt("c")])]);
        assert!(d.range_has_mark(1, 4, MarkType::Bold));
        assert!(d.range_has_mark(2, 3, MarkType::Bold));
        assert!(!d.range_has_mark(1, 2, MarkType::Bold));
        assert!(!d.range_has_mark(1, 4, MarkType::Italic));
        assert!(!d.range_has_mark(2, 2, MarkType::Bold));
    }

    #[test]
    fn test_can_replace_with_is_pure() {
        let d = doc(vec![ul(vec![li(vec![p("a")])])]);
        let before = d.clone();
        let list = d.child(0);
        assert!(!list.can_replace_with(0, 1, NodeType::Paragraph));
        assert!(list.can_replace_with(0, 1, NodeType::ListItem));
        assert!(d.ptr_eq(&before));
    }

    #[test]
    fn test_json_shape() {
        let node = p_with(vec![txt("a"), bold("b")]);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "paragraph",
                "content": [
                    { "type": "text", "text": "a" },
                    { "type": "text", "text": "b", "marks": [{ "type": "bold" }] }
                ]
            })
        );
        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_json_rejects_invalid_tree() {
        let json = serde_json::json!({
            "type": "bulleted_list",
            "content": [{ "type": "paragraph" }]
        });
        assert!(serde_json::from_value::<Node>(json).is_err());
    }
}
