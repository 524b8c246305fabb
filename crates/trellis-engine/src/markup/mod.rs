/*!
# Markup boundary

Documents enter and leave the engine as text:

- [`from_markdown`] parses CommonMark with `pulldown-cmark` and fits the
  result into the document grammar,
- [`to_markdown`] writes a document back out,
- [`to_html`] renders the same markup the browser editor produced,
- [`to_json`] and [`from_json`] use the `serde` shape of [`Node`].

Parsing is lenient. Markdown that has no place in the grammar is folded
into something that does: tight list text gets a paragraph, extra blocks
inside a list item join the item's paragraph, and an image standing alone
in a paragraph becomes a figure. An image inside running text keeps only
its alt text.
*/

mod html;
mod markdown;

use thiserror::Error;

use crate::model::{ModelError, Node, NodeType};

pub use html::to_html;
pub use markdown::{MarkdownOptions, from_markdown, to_markdown};

#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("Markdown does not fit the document grammar: {0}")]
    Model(#[from] ModelError),
    #[error("Unbalanced markdown events at {0}")]
    Unbalanced(&'static str),
    #[error("Invalid document JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Expected a doc node, found {0:?}")]
    NotADoc(NodeType),
}

pub fn to_json(doc: &Node) -> Result<String, MarkupError> {
    Ok(serde_json::to_string_pretty(doc)?)
}

/// Parses a document from JSON. The root must be a `doc` node.
pub fn from_json(json: &str) -> Result<Node, MarkupError> {
    let node: Node = serde_json::from_str(json)?;
    match node.node_type() {
        NodeType::Doc => Ok(node),
        other => Err(MarkupError::NotADoc(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_round_trip() {
        let d = doc(vec![
            h(2, "Title"),
            ul(vec![item("a"), li(vec![p("b"), ol(vec![item("c")])])]),
        ]);
        let json = to_json(&d).unwrap();
        assert_eq!(from_json(&json).unwrap(), d);
    }

    #[test]
    fn test_json_root_must_be_doc() {
        let err = from_json(r#"{"type":"paragraph"}"#).unwrap_err();
        assert!(matches!(err, MarkupError::NotADoc(NodeType::Paragraph)));
    }

    #[test]
    fn test_json_content_is_checked() {
        let err = from_json(r#"{"type":"doc","content":[{"type":"list_item"}]}"#).unwrap_err();
        assert!(matches!(err, MarkupError::Json(_)));
    }
}
