//! Tree builders and position helpers shared by unit tests.

use crate::model::{Fragment, Image, Mark, MarkSet, Node, NodeKind};
use crate::state::{EditorState, Selection};

fn node(kind: NodeKind, children: Vec<Node>) -> Node {
    Node::new(kind, Fragment::from_vec(children)).expect("test tree must satisfy the schema")
}

fn marked(text: &str, marks: Vec<Mark>) -> Node {
    Node::new_text(text, MarkSet::from_marks(marks)).expect("test text must not be empty")
}

pub fn doc(children: Vec<Node>) -> Node {
    node(NodeKind::Doc, children)
}

/// Paragraph with plain text; `""` builds an empty paragraph.
pub fn p(text: &str) -> Node {
    p_with(if text.is_empty() { vec![] } else { vec![txt(text)] })
}

pub fn p_with(inline: Vec<Node>) -> Node {
    node(NodeKind::Paragraph, inline)
}

pub fn h(level: u8, text: &str) -> Node {
    let inline = if text.is_empty() { vec![] } else { vec![txt(text)] };
    node(NodeKind::Heading { level }, inline)
}

pub fn blockquote(children: Vec<Node>) -> Node {
    node(NodeKind::Blockquote, children)
}

pub fn code_block(text: &str) -> Node {
    let inline = if text.is_empty() { vec![] } else { vec![txt(text)] };
    node(NodeKind::CodeBlock { lang: None }, inline)
}

pub fn figure(caption: &str) -> Node {
    let inline = if caption.is_empty() { vec![] } else { vec![txt(caption)] };
    node(NodeKind::Figure { image: None }, inline)
}

pub fn figure_with(src: &str, caption: &str) -> Node {
    let inline = if caption.is_empty() { vec![] } else { vec![txt(caption)] };
    node(
        NodeKind::Figure {
            image: Some(Image {
                src: src.to_string(),
                title: None,
            }),
        },
        inline,
    )
}

pub fn hr() -> Node {
    node(NodeKind::HorizontalRule, vec![])
}

pub fn br() -> Node {
    node(NodeKind::HardBreak, vec![])
}

pub fn ul(items: Vec<Node>) -> Node {
    node(NodeKind::BulletedList, items)
}

pub fn ol(items: Vec<Node>) -> Node {
    ol_from(1, items)
}

pub fn ol_from(start: u32, items: Vec<Node>) -> Node {
    node(NodeKind::OrderedList { start }, items)
}

pub fn li(children: Vec<Node>) -> Node {
    node(NodeKind::ListItem, children)
}

/// List item holding a single paragraph.
pub fn item(text: &str) -> Node {
    li(vec![p(text)])
}

pub fn txt(text: &str) -> Node {
    marked(text, vec![])
}

pub fn bold(text: &str) -> Node {
    marked(text, vec![Mark::Bold])
}

pub fn italic(text: &str) -> Node {
    marked(text, vec![Mark::Italic])
}

pub fn code(text: &str) -> Node {
    marked(text, vec![Mark::Code])
}

pub fn link(href: &str, text: &str) -> Node {
    marked(
        text,
        vec![Mark::Link {
            href: href.to_string(),
            title: None,
        }],
    )
}

/// Position directly before the first occurrence of `needle` inside a
/// single text node.
pub fn pos_of(doc: &Node, needle: &str) -> usize {
    let mut found = None;
    doc.descendants(&mut |n: &Node, pos: usize, _: Option<&Node>, _: usize| {
        if found.is_none()
            && let Some(text) = n.text()
            && let Some(byte) = text.find(needle)
        {
            found = Some(pos + text[..byte].chars().count());
        }
        found.is_none()
    });
    found.unwrap_or_else(|| panic!("{needle:?} not found in {doc}"))
}

/// Position directly after the first occurrence of `needle`.
pub fn pos_after(doc: &Node, needle: &str) -> usize {
    pos_of(doc, needle) + needle.chars().count()
}

/// State with a collapsed cursor at `pos`.
pub fn state_at(doc: Node, pos: usize) -> EditorState {
    let selection = Selection::cursor(&doc, pos).expect("cursor position must resolve");
    EditorState::new(doc, selection)
}

/// State with a text selection from `anchor` to `head`.
pub fn state_between(doc: Node, anchor: usize, head: usize) -> EditorState {
    let selection = Selection::text(&doc, anchor, head).expect("selection must resolve");
    EditorState::new(doc, selection)
}
