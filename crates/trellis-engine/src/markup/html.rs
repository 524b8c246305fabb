use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::model::{Mark, Node, NodeKind};

/// Renders `doc` as the HTML the browser editor serialized: no
/// whitespace between elements, marks nested in rank order.
pub fn to_html(doc: &Node) -> String {
    let mut out = String::new();
    write_children(doc, &mut out);
    out
}

fn write_children(node: &Node, out: &mut String) {
    if node.inline_content() {
        write_inline(node, out);
    } else {
        for child in node.content().nodes() {
            write_node(child, out);
        }
    }
}

fn wrap(tag: &str, attrs: &str, node: &Node, out: &mut String) {
    out.push_str(&format!("<{tag}{attrs}>"));
    write_children(node, out);
    out.push_str(&format!("</{tag}>"));
}

fn attr(name: &str, value: Option<&str>) -> String {
    value
        .map(|value| format!(" {name}=\"{}\"", encode_double_quoted_attribute(value)))
        .unwrap_or_default()
}

fn write_node(node: &Node, out: &mut String) {
    match node.kind() {
        NodeKind::Paragraph => wrap("p", "", node, out),
        NodeKind::Blockquote => wrap("blockquote", "", node, out),
        NodeKind::HorizontalRule => out.push_str("<hr>"),
        NodeKind::Heading { level } => wrap(&format!("h{level}"), "", node, out),
        NodeKind::CodeBlock { lang } => {
            let class = lang.as_deref().map(|lang| format!("language-{lang}"));
            out.push_str(&format!("<pre{}><code>", attr("class", class.as_deref())));
            out.push_str(&encode_text(&node.text_content()));
            out.push_str("</code></pre>");
        }
        NodeKind::Figure { image } => {
            out.push_str("<figure><img");
            if let Some(image) = image {
                out.push_str(&attr("src", Some(image.src.as_str())));
                out.push_str(&attr("title", image.title.as_deref()));
            }
            out.push('>');
            wrap("figcaption", "", node, out);
            out.push_str("</figure>");
        }
        NodeKind::OrderedList { start } if *start != 1 => {
            wrap("ol", &format!(" start=\"{start}\""), node, out);
        }
        NodeKind::OrderedList { .. } => wrap("ol", "", node, out),
        NodeKind::BulletedList => wrap("ul", "", node, out),
        NodeKind::ListItem => wrap("li", "", node, out),
        NodeKind::Doc => write_children(node, out),
        NodeKind::Text | NodeKind::HardBreak => write_inline_node(node, out),
    }
}

fn open_tag(mark: &Mark) -> String {
    match mark {
        Mark::Link { href, title } => format!(
            "<a{}{}>",
            attr("href", Some(href.as_str())),
            attr("title", title.as_deref())
        ),
        Mark::Italic => "<em>".to_string(),
        Mark::Bold => "<strong>".to_string(),
        Mark::Code => "<code>".to_string(),
    }
}

fn close_tag(mark: &Mark) -> &'static str {
    match mark {
        Mark::Link { .. } => "</a>",
        Mark::Italic => "</em>",
        Mark::Bold => "</strong>",
        Mark::Code => "</code>",
    }
}

fn write_inline_node(node: &Node, out: &mut String) {
    match node.text() {
        Some(text) => out.push_str(&encode_text(text)),
        None => out.push_str("<br>"),
    }
}

/// Writes inline children, keeping a mark's element open across
/// neighbouring nodes that share it.
fn write_inline(block: &Node, out: &mut String) {
    let mut open: Vec<&Mark> = Vec::new();
    for child in block.content().nodes() {
        let marks: Vec<&Mark> = child.marks().iter().collect();
        let keep = open.iter().zip(&marks).take_while(|(a, b)| a == b).count();
        while open.len() > keep {
            if let Some(mark) = open.pop() {
                out.push_str(close_tag(mark));
            }
        }
        for mark in &marks[keep..] {
            out.push_str(&open_tag(mark));
            open.push(*mark);
        }
        write_inline_node(child, out);
    }
    while let Some(mark) = open.pop() {
        out.push_str(close_tag(mark));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Fragment, MarkSet};
    use crate::tests::*;
    use insta::assert_snapshot;

    #[test]
    fn test_blocks() {
        let d = doc(vec![
            h(2, "a < b"),
            blockquote(vec![p("q")]),
            hr(),
            ol_from(3, vec![item("x")]),
            ul(vec![li(vec![p("y"), ol(vec![item("z")])])]),
        ]);
        assert_snapshot!(
            to_html(&d),
            @"<h2>a &lt; b</h2><blockquote><p>q</p></blockquote><hr><ol start=\"3\"><li><p>x</p></li></ol><ul><li><p>y</p><ol><li><p>z</p></li></ol></li></ul>"
        );
    }

    #[test]
    fn test_code_block_and_figure() {
        let code = Node::new(
            NodeKind::CodeBlock {
                lang: Some("rust".to_string()),
            },
            Fragment::from_node(txt("a && b")),
        )
        .unwrap();
        let d = doc(vec![code, figure_with("/i.png", "cap"), figure("")]);
        assert_snapshot!(
            to_html(&d),
            @"<pre class=\"language-rust\"><code>a &amp;&amp; b</code></pre><figure><img src=\"/i.png\"><figcaption>cap</figcaption></figure><figure><img><figcaption></figcaption></figure>"
        );
    }

    #[test]
    fn test_marks_share_elements() {
        let both = Node::new_text("b", MarkSet::from_marks([Mark::Italic, Mark::Bold])).unwrap();
        let d = doc(vec![p_with(vec![
            italic("a"),
            both,
            txt(" "),
            link("http://x.org?a=1&b=2", "l"),
            br(),
            code("c"),
        ])]);
        assert_snapshot!(
            to_html(&d),
            @"<p><em>a<strong>b</strong></em> <a href=\"http://x.org?a=1&amp;b=2\">l</a><br><code>c</code></p>"
        );
    }
}
