use pulldown_cmark::{CodeBlockKind, CowStr, Event, Parser, Tag, TagEnd};

use super::MarkupError;
use crate::model::{Fragment, Image, Mark, MarkSet, MarkType, Node, NodeKind, NodeType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownOptions {
    /// Bullet for bulleted lists. A list right after another bulleted
    /// list switches to the other of `-` and `*` so the two stay apart.
    pub bullet: char,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self { bullet: '-' }
    }
}

impl MarkdownOptions {
    fn alternate_bullet(&self) -> char {
        if self.bullet == '*' { '-' } else { '*' }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parses CommonMark into a `doc` node.
pub fn from_markdown(markdown: &str) -> Result<Node, MarkupError> {
    let mut builder = Builder::new();
    for event in Parser::new(markdown) {
        builder.event(event)?;
    }
    builder.finish()
}

#[derive(Debug)]
enum Piece {
    Node(Node),
    Image { image: Image, alt: String },
}

#[derive(Debug)]
struct Frame {
    kind: NodeKind,
    /// Opened for inline content that arrived directly in a container,
    /// as in tight list items.
    implicit: bool,
    pieces: Vec<Piece>,
}

impl Frame {
    fn new(kind: NodeKind, implicit: bool) -> Self {
        Self {
            kind,
            implicit,
            pieces: Vec::new(),
        }
    }

    fn takes_inline(&self) -> bool {
        self.kind.node_type().inline_content()
    }

    fn plain_text(&self) -> String {
        self.pieces
            .iter()
            .map(|piece| match piece {
                Piece::Node(node) => node.text_content(),
                Piece::Image { alt, .. } => alt.clone(),
            })
            .collect()
    }

    fn into_nodes(self) -> Vec<Node> {
        self.pieces
            .into_iter()
            .filter_map(|piece| match piece {
                Piece::Node(node) => Some(node),
                Piece::Image { alt, .. } => Node::new_text(alt, MarkSet::empty()).ok(),
            })
            .collect()
    }

    fn build(self) -> Result<Node, MarkupError> {
        let kind = self.kind.clone();
        let node = match kind.node_type() {
            NodeType::Paragraph if matches!(self.pieces.as_slice(), [Piece::Image { .. }]) => {
                match self.pieces.into_iter().next() {
                    Some(Piece::Image { image, alt }) => figure(image, &alt)?,
                    _ => return Err(MarkupError::Unbalanced("figure")),
                }
            }
            NodeType::CodeBlock => {
                let mut text = self.plain_text();
                if text.ends_with('\n') {
                    text.pop();
                }
                Node::new(kind, plain_text(text))?
            }
            NodeType::ListItem => fold_item(self.into_nodes())?,
            NodeType::Doc | NodeType::Blockquote => {
                let mut blocks = self.into_nodes();
                if blocks.is_empty() {
                    blocks.push(Node::new(NodeKind::Paragraph, Fragment::empty())?);
                }
                Node::new(kind, Fragment::from_vec(blocks))?
            }
            _ => Node::new(kind, Fragment::from_vec(self.into_nodes()))?,
        };
        Ok(node)
    }
}

fn plain_text(text: String) -> Fragment {
    match Node::new_text(text, MarkSet::empty()) {
        Ok(node) => Fragment::from_node(node),
        Err(_) => Fragment::empty(),
    }
}

fn figure(image: Image, caption: &str) -> Result<Node, MarkupError> {
    let image = (!image.src.is_empty()).then_some(image);
    Ok(Node::new(NodeKind::Figure { image }, plain_text(caption.to_string()))?)
}

/// A list item holds one paragraph and at most one list. Every other
/// block's inline content joins the paragraph after a hard break; later
/// lists lend their items to the first one.
fn fold_item(blocks: Vec<Node>) -> Result<Node, MarkupError> {
    let mut inline: Vec<Node> = Vec::new();
    let mut list: Option<(NodeKind, Vec<Node>)> = None;
    for block in blocks {
        if block.node_type().is_list() {
            let items = block.content().nodes().iter().cloned();
            match &mut list {
                Some((_, existing)) => existing.extend(items),
                None => list = Some((block.kind().clone(), items.collect())),
            }
            continue;
        }
        let mut textblocks = Vec::new();
        collect_textblocks(&block, &mut textblocks);
        for textblock in textblocks {
            if textblock.content_size() == 0 {
                continue;
            }
            if !inline.is_empty() {
                inline.push(Node::new(NodeKind::HardBreak, Fragment::empty())?);
            }
            inline.extend(textblock.content().nodes().iter().cloned());
        }
    }
    let mut children = vec![Node::new(NodeKind::Paragraph, Fragment::from_vec(inline))?];
    if let Some((kind, items)) = list {
        children.push(Node::new(kind, Fragment::from_vec(items))?);
    }
    Ok(Node::new(NodeKind::ListItem, Fragment::from_vec(children))?)
}

fn collect_textblocks<'a>(node: &'a Node, out: &mut Vec<&'a Node>) {
    if node.is_textblock() {
        out.push(node);
    } else {
        for child in node.content().nodes() {
            collect_textblocks(child, out);
        }
    }
}

struct Builder {
    frames: Vec<Frame>,
    marks: Vec<Mark>,
}

impl Builder {
    fn new() -> Self {
        Self {
            frames: vec![Frame::new(NodeKind::Doc, false)],
            marks: Vec::new(),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), MarkupError> {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                self.text(&text, self.current_marks())
            }
            Event::Code(text) => self.text(&text, self.current_marks().add(&Mark::Code)),
            Event::SoftBreak => self.text(" ", self.current_marks()),
            Event::HardBreak => {
                if self.top()?.kind.node_type() == NodeType::Figure {
                    return self.text(" ", MarkSet::empty());
                }
                self.inline(Piece::Node(Node::new(NodeKind::HardBreak, Fragment::empty())?))
            }
            Event::Rule => {
                self.close_implicit()?;
                let rule = Node::new(NodeKind::HorizontalRule, Fragment::empty())?;
                self.top()?.pieces.push(Piece::Node(rule));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn start(&mut self, tag: Tag<'_>) -> Result<(), MarkupError> {
        match tag {
            Tag::Paragraph => self.open(NodeKind::Paragraph),
            Tag::Heading { level, .. } => self.open(NodeKind::Heading { level: level as u8 }),
            Tag::BlockQuote(_) => self.open(NodeKind::Blockquote),
            Tag::CodeBlock(CodeBlockKind::Fenced(info)) => self.open(NodeKind::CodeBlock {
                lang: info.split_whitespace().next().map(str::to_string),
            }),
            Tag::CodeBlock(CodeBlockKind::Indented) => {
                self.open(NodeKind::CodeBlock { lang: None })
            }
            Tag::HtmlBlock => self.open(NodeKind::CodeBlock {
                lang: Some("html".to_string()),
            }),
            Tag::List(Some(start)) => self.open(NodeKind::OrderedList {
                start: u32::try_from(start).unwrap_or(u32::MAX),
            }),
            Tag::List(None) => self.open(NodeKind::BulletedList),
            Tag::Item => self.open(NodeKind::ListItem),
            Tag::Emphasis => {
                self.marks.push(Mark::Italic);
                Ok(())
            }
            Tag::Strong => {
                self.marks.push(Mark::Bold);
                Ok(())
            }
            Tag::Link { dest_url, title, .. } => {
                self.marks.push(Mark::Link {
                    href: dest_url.to_string(),
                    title: non_empty(title),
                });
                Ok(())
            }
            Tag::Image { dest_url, title, .. } => {
                let image = Image {
                    src: dest_url.to_string(),
                    title: non_empty(title),
                };
                self.frames.push(Frame::new(NodeKind::Figure { image: Some(image) }, false));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn end(&mut self, tag: TagEnd) -> Result<(), MarkupError> {
        match tag {
            TagEnd::Paragraph
            | TagEnd::Heading(_)
            | TagEnd::BlockQuote(_)
            | TagEnd::CodeBlock
            | TagEnd::HtmlBlock
            | TagEnd::List(_)
            | TagEnd::Item => {
                self.close_implicit()?;
                self.close()
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Link => {
                self.marks.pop();
                Ok(())
            }
            TagEnd::Image => {
                let frame = self.frames.pop().ok_or(MarkupError::Unbalanced("image end"))?;
                let alt = frame.plain_text();
                let NodeKind::Figure { image: Some(image) } = frame.kind else {
                    return Err(MarkupError::Unbalanced("image end"));
                };
                self.inline(Piece::Image { image, alt })
            }
            _ => Ok(()),
        }
    }

    fn current_marks(&self) -> MarkSet {
        MarkSet::from_marks(self.marks.iter().cloned())
    }

    fn top(&mut self) -> Result<&mut Frame, MarkupError> {
        self.frames.last_mut().ok_or(MarkupError::Unbalanced("empty stack"))
    }

    fn open(&mut self, kind: NodeKind) -> Result<(), MarkupError> {
        self.close_implicit()?;
        self.frames.push(Frame::new(kind, false));
        Ok(())
    }

    /// Builds the innermost frame and hands the node to its parent.
    fn close(&mut self) -> Result<(), MarkupError> {
        if self.frames.len() < 2 {
            return Err(MarkupError::Unbalanced("block end"));
        }
        let frame = self.frames.pop().ok_or(MarkupError::Unbalanced("block end"))?;
        let node = frame.build()?;
        self.top()?.pieces.push(Piece::Node(node));
        Ok(())
    }

    fn close_implicit(&mut self) -> Result<(), MarkupError> {
        if self.frames.last().is_some_and(|frame| frame.implicit) {
            self.close()?;
        }
        Ok(())
    }

    fn inline(&mut self, piece: Piece) -> Result<(), MarkupError> {
        if !self.top()?.takes_inline() {
            self.frames.push(Frame::new(NodeKind::Paragraph, true));
        }
        self.top()?.pieces.push(piece);
        Ok(())
    }

    fn text(&mut self, text: &str, marks: MarkSet) -> Result<(), MarkupError> {
        if text.is_empty() {
            return Ok(());
        }
        let plain = self.frames.last().is_some_and(|frame| {
            matches!(frame.kind.node_type(), NodeType::CodeBlock | NodeType::Figure)
        });
        let marks = if plain { MarkSet::empty() } else { marks };
        self.inline(Piece::Node(Node::new_text(text, marks)?))
    }

    fn finish(mut self) -> Result<Node, MarkupError> {
        self.close_implicit()?;
        match (self.frames.pop(), self.frames.is_empty()) {
            (Some(root), true) => root.build(),
            _ => Err(MarkupError::Unbalanced("end of input")),
        }
    }
}

fn non_empty(text: CowStr<'_>) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Writes `doc` as CommonMark. Blocks are separated by a blank line, lists
/// are written tight. Empty paragraphs outside list items are left out.
pub fn to_markdown(doc: &Node, options: &MarkdownOptions) -> String {
    let mut out = blocks(doc, options).join("\n");
    out.push('\n');
    out
}

fn blocks(container: &Node, options: &MarkdownOptions) -> Vec<String> {
    let mut lines = Vec::new();
    let mut previous: Option<(NodeType, bool)> = None;
    for child in container.content().nodes() {
        let ty = child.node_type();
        if ty == NodeType::Paragraph && child.content_size() == 0 {
            continue;
        }
        let alternate = ty.is_list() && previous == Some((ty, false));
        previous = Some((ty, alternate));
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.extend(block(child, options, alternate));
    }
    lines
}

fn block(node: &Node, options: &MarkdownOptions, alternate: bool) -> Vec<String> {
    match node.kind() {
        NodeKind::Paragraph => split_lines(&inline(node, "\\\n")),
        NodeKind::Heading { level } => {
            let text = inline(node, " ");
            let hashes = "#".repeat(usize::from(*level));
            vec![if text.is_empty() { hashes } else { format!("{hashes} {text}") }]
        }
        NodeKind::CodeBlock { lang } => {
            let text = node.text_content();
            let fence = "`".repeat(longest_run(&text, '`').max(2) + 1);
            let mut lines = vec![format!("{fence}{}", lang.as_deref().unwrap_or_default())];
            if !text.is_empty() {
                lines.extend(split_lines(&text));
            }
            lines.push(fence);
            lines
        }
        NodeKind::Blockquote => {
            let inner = blocks(node, options);
            if inner.is_empty() {
                return vec![">".to_string()];
            }
            inner
                .into_iter()
                .map(|line| if line.is_empty() { ">".to_string() } else { format!("> {line}") })
                .collect()
        }
        NodeKind::HorizontalRule => vec!["---".to_string()],
        NodeKind::Figure { image } => {
            let caption = escape(&node.text_content(), false);
            let (src, title) = match image {
                Some(image) => (link_destination(&image.src), link_title(image.title.as_deref())),
                None => (String::new(), String::new()),
            };
            vec![format!("![{caption}]({src}{title})")]
        }
        NodeKind::BulletedList => {
            let bullet = if alternate { options.alternate_bullet() } else { options.bullet };
            node.content()
                .nodes()
                .iter()
                .flat_map(|item| list_item(item, &bullet.to_string(), options))
                .collect()
        }
        NodeKind::OrderedList { start } => {
            let delimiter = if alternate { ')' } else { '.' };
            node.content()
                .nodes()
                .iter()
                .enumerate()
                .flat_map(|(i, item)| {
                    let marker = format!("{}{delimiter}", *start as usize + i);
                    list_item(item, &marker, options)
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

fn list_item(item: &Node, marker: &str, options: &MarkdownOptions) -> Vec<String> {
    let indent = " ".repeat(marker.len() + 1);
    let mut lines: Vec<String> = Vec::new();
    let mut after_text = false;
    for child in item.content().nodes() {
        if after_text && needs_blank_line(child) {
            lines.push(String::new());
        }
        after_text = child.node_type() == NodeType::Paragraph && child.content_size() > 0;
        for line in block(child, options, false) {
            let line = match (lines.is_empty(), line.is_empty()) {
                (true, true) => marker.to_string(),
                (true, false) => format!("{marker} {line}"),
                (false, true) => line,
                (false, false) => format!("{indent}{line}"),
            };
            lines.push(line);
        }
    }
    if lines.is_empty() {
        lines.push(marker.to_string());
    }
    lines
}

/// A list can only interrupt a paragraph when its first item has text
/// and, for ordered lists, starts at 1.
fn needs_blank_line(list: &Node) -> bool {
    let empty_first = list
        .first_child()
        .and_then(Node::first_child)
        .is_some_and(|paragraph| paragraph.content_size() == 0);
    let late_start = matches!(list.kind(), NodeKind::OrderedList { start } if *start != 1);
    list.node_type().is_list() && (empty_first || late_start)
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}

fn longest_run(text: &str, ch: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        current = if c == ch { current + 1 } else { 0 };
        longest = longest.max(current);
    }
    longest
}

fn link_destination(href: &str) -> String {
    if href.chars().any(|c| c.is_whitespace() || c == '(' || c == ')' || c == '<' || c == '>') {
        format!("<{}>", href.replace('<', "%3C").replace('>', "%3E"))
    } else {
        href.to_string()
    }
}

fn link_title(title: Option<&str>) -> String {
    title
        .map(|title| format!(" \"{}\"", title.replace('\\', "\\\\").replace('"', "\\\"")))
        .unwrap_or_default()
}

fn open_delimiter(mark: &Mark) -> &'static str {
    match mark {
        Mark::Link { .. } => "[",
        Mark::Italic => "*",
        Mark::Bold => "**",
        Mark::Code => "`",
    }
}

fn close_delimiter(mark: &Mark) -> String {
    match mark {
        Mark::Link { href, title } => format!(
            "]({}{})",
            link_destination(href),
            link_title(title.as_deref())
        ),
        other => open_delimiter(other).to_string(),
    }
}

/// Closes marks down to `keep` open ones. Whitespace written last moves
/// outside the closing delimiters.
fn close_marks(out: &mut String, open: &mut Vec<Mark>, keep: usize) {
    if open.len() <= keep {
        return;
    }
    let trimmed = out.trim_end_matches(' ').len();
    let trailing = out.split_off(trimmed);
    while open.len() > keep {
        if let Some(mark) = open.pop() {
            out.push_str(&close_delimiter(&mark));
        }
    }
    out.push_str(&trailing);
}

fn code_span(text: &str) -> String {
    let ticks = "`".repeat(longest_run(text, '`') + 1);
    if text.starts_with('`') || text.ends_with('`') {
        format!("{ticks} {text} {ticks}")
    } else {
        format!("{ticks}{text}{ticks}")
    }
}

fn inline(block: &Node, hard_break: &str) -> String {
    let mut out = String::new();
    let mut open: Vec<Mark> = Vec::new();
    for child in block.content().nodes() {
        // Code spans are written whole and never stay open.
        let marks: Vec<&Mark> = child.marks().iter().filter(|m| **m != Mark::Code).collect();
        let keep = open.iter().zip(&marks).take_while(|(a, b)| a == *b).count();
        close_marks(&mut out, &mut open, keep);

        let Some(text) = child.text() else {
            if child.node_type() == NodeType::HardBreak {
                close_marks(&mut out, &mut open, 0);
                out.push_str(hard_break);
            }
            continue;
        };
        let body = text.trim_start_matches(' ');
        if body.is_empty() {
            out.push_str(text);
            continue;
        }
        out.push_str(&text[..text.len() - body.len()]);
        for mark in &marks[keep..] {
            out.push_str(open_delimiter(mark));
            open.push((*mark).clone());
        }
        if child.marks().find(MarkType::Code).is_some() {
            out.push_str(&code_span(body));
        } else {
            let at_line_start = out.is_empty() || out.ends_with('\n');
            out.push_str(&escape(body, at_line_start));
        }
    }
    close_marks(&mut out, &mut open, 0);
    out
}

/// Backslash-escapes characters that would otherwise be read as markup.
fn escape(text: &str, at_line_start: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let leading_digits = chars.iter().take_while(|c| c.is_ascii_digit()).count();
    for (i, &c) in chars.iter().enumerate() {
        let special = matches!(c, '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '>' | '&')
            || (at_line_start && i == 0 && matches!(c, '#' | '+' | '-' | '=' | '~'))
            || (at_line_start
                && leading_digits > 0
                && i == leading_digits
                && matches!(c, '.' | ')'));
        if special {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
