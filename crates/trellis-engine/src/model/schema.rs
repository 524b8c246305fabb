//! The fixed document schema.
//!
//! Node kinds are a closed set. Each [`NodeType`] carries a static
//! [`NodeSpec`] describing its content grammar and behavioural flags, and
//! each [`NodeKind`] is the attribute-carrying variant stored in the tree.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::content::{ContentMatch, Slot};
use super::fragment::Fragment;
use super::mark::MarkType;
use super::node::Node;

/// Fieldless node type, used for grammar checks and comparisons where
/// attributes do not matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Doc,
    Paragraph,
    Blockquote,
    HorizontalRule,
    Heading,
    CodeBlock,
    Text,
    Figure,
    HardBreak,
    OrderedList,
    BulletedList,
    ListItem,
}

/// Which marks the inline children of a node may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkPolicy {
    All,
    None,
}

/// Static description of a node type.
#[derive(Debug)]
pub struct NodeSpec {
    pub name: &'static str,
    pub content: &'static [Slot],
    pub inline: bool,
    pub atom: bool,
    pub isolating: bool,
    pub defining: bool,
    pub code: bool,
    pub selectable: bool,
    pub marks: MarkPolicy,
}

use NodeType::*;

/// Members of the `block` group, in schema order.
pub(crate) const BLOCK: &[NodeType] = &[
    Paragraph,
    Blockquote,
    HorizontalRule,
    Heading,
    CodeBlock,
    Figure,
    OrderedList,
    BulletedList,
];
/// Members of the `inline` group, in schema order.
pub(crate) const INLINE: &[NodeType] = &[Text, HardBreak];
const TEXT: &[NodeType] = &[Text];
const PARAGRAPH: &[NodeType] = &[Paragraph];
const LISTS: &[NodeType] = &[OrderedList, BulletedList];
const ITEMS: &[NodeType] = &[ListItem];

const BLOCK_PLUS: &[Slot] = &[Slot::new(BLOCK, 1, None)];
const INLINE_STAR: &[Slot] = &[Slot::new(INLINE, 0, None)];
const TEXT_STAR: &[Slot] = &[Slot::new(TEXT, 0, None)];
const ITEM_PLUS: &[Slot] = &[Slot::new(ITEMS, 1, None)];
const ITEM_CONTENT: &[Slot] = &[Slot::new(PARAGRAPH, 1, Some(1)), Slot::new(LISTS, 0, Some(1))];
const LEAF: &[Slot] = &[];

const fn spec(name: &'static str, content: &'static [Slot]) -> NodeSpec {
    NodeSpec {
        name,
        content,
        inline: false,
        atom: false,
        isolating: false,
        defining: false,
        code: false,
        selectable: true,
        marks: MarkPolicy::None,
    }
}

static DOC: NodeSpec = spec("doc", BLOCK_PLUS);
static PARAGRAPH_SPEC: NodeSpec = NodeSpec {
    marks: MarkPolicy::All,
    ..spec("paragraph", INLINE_STAR)
};
static BLOCKQUOTE: NodeSpec = NodeSpec {
    defining: true,
    ..spec("blockquote", BLOCK_PLUS)
};
static HORIZONTAL_RULE: NodeSpec = spec("horizontal_rule", LEAF);
static HEADING: NodeSpec = NodeSpec {
    defining: true,
    marks: MarkPolicy::All,
    ..spec("heading", INLINE_STAR)
};
static CODE_BLOCK: NodeSpec = NodeSpec {
    code: true,
    defining: true,
    ..spec("code_block", TEXT_STAR)
};
static TEXT_SPEC: NodeSpec = NodeSpec {
    inline: true,
    ..spec("text", LEAF)
};
static FIGURE: NodeSpec = NodeSpec {
    isolating: true,
    ..spec("figure", TEXT_STAR)
};
static HARD_BREAK: NodeSpec = NodeSpec {
    inline: true,
    selectable: false,
    ..spec("hard_break", LEAF)
};
static ORDERED_LIST: NodeSpec = spec("ordered_list", ITEM_PLUS);
static BULLETED_LIST: NodeSpec = spec("bulleted_list", ITEM_PLUS);
static LIST_ITEM: NodeSpec = NodeSpec {
    defining: true,
    ..spec("list_item", ITEM_CONTENT)
};

impl NodeType {
    /// Every node type in schema order.
    pub const ALL: [NodeType; 12] = [
        Doc,
        Paragraph,
        Blockquote,
        HorizontalRule,
        Heading,
        CodeBlock,
        Text,
        Figure,
        HardBreak,
        OrderedList,
        BulletedList,
        ListItem,
    ];

    pub fn spec(self) -> &'static NodeSpec {
        match self {
            Doc => &DOC,
            Paragraph => &PARAGRAPH_SPEC,
            Blockquote => &BLOCKQUOTE,
            HorizontalRule => &HORIZONTAL_RULE,
            Heading => &HEADING,
            CodeBlock => &CODE_BLOCK,
            Text => &TEXT_SPEC,
            Figure => &FIGURE,
            HardBreak => &HARD_BREAK,
            OrderedList => &ORDERED_LIST,
            BulletedList => &BULLETED_LIST,
            ListItem => &LIST_ITEM,
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// The start state of this type's content grammar.
    pub fn content_match(self) -> ContentMatch {
        ContentMatch::start(self.spec().content)
    }

    pub fn is_text(self) -> bool {
        self == Text
    }

    pub fn is_inline(self) -> bool {
        self.spec().inline
    }

    pub fn is_block(self) -> bool {
        !self.spec().inline
    }

    pub fn is_leaf(self) -> bool {
        self.spec().content.is_empty()
    }

    pub fn is_atom(self) -> bool {
        self.is_leaf() || self.spec().atom
    }

    /// Whether a node of this type can be the target of a node selection.
    pub fn is_selectable(self) -> bool {
        self != Text && self.spec().selectable
    }

    pub fn is_isolating(self) -> bool {
        self.spec().isolating
    }

    pub fn is_defining(self) -> bool {
        self.spec().defining
    }

    pub fn is_code(self) -> bool {
        self.spec().code
    }

    pub fn is_list(self) -> bool {
        LISTS.contains(&self)
    }

    /// True when the first thing the grammar accepts is inline content.
    pub fn inline_content(self) -> bool {
        self.spec()
            .content
            .first()
            .and_then(|slot| slot.types.first())
            .is_some_and(|ty| ty.is_inline())
    }

    pub fn is_textblock(self) -> bool {
        self.is_block() && self.inline_content()
    }

    pub fn allows_mark_type(self, _mark: MarkType) -> bool {
        self.spec().marks == MarkPolicy::All
    }

    /// Two types have compatible content when they share any grammar edge.
    pub fn compatible_content(self, other: NodeType) -> bool {
        self == other || self.content_match().compatible(&other.content_match())
    }

    pub fn valid_content(self, content: &Fragment) -> bool {
        self.content_match()
            .match_fragment(content, 0, content.child_count())
            .is_some_and(|m| m.valid_end())
    }

    /// The attribute-carrying kind with default attributes.
    pub fn default_kind(self) -> NodeKind {
        match self {
            Doc => NodeKind::Doc,
            Paragraph => NodeKind::Paragraph,
            Blockquote => NodeKind::Blockquote,
            HorizontalRule => NodeKind::HorizontalRule,
            Heading => NodeKind::Heading { level: 1 },
            CodeBlock => NodeKind::CodeBlock { lang: None },
            Text => NodeKind::Text,
            Figure => NodeKind::Figure { image: None },
            HardBreak => NodeKind::HardBreak,
            OrderedList => NodeKind::OrderedList { start: 1 },
            BulletedList => NodeKind::BulletedList,
            ListItem => NodeKind::ListItem,
        }
    }

    /// Creates a node of this type with default attributes, filling in
    /// the minimal content its grammar requires.
    pub fn create_and_fill(self) -> Option<Node> {
        self.default_kind().create_and_fill(Fragment::empty())
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Image attributes of a figure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Image {
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A node's type together with its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Doc,
    Paragraph,
    Blockquote,
    HorizontalRule,
    Heading {
        level: u8,
    },
    CodeBlock {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
    },
    Text,
    Figure {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image: Option<Image>,
    },
    HardBreak,
    OrderedList {
        #[serde(default = "default_start")]
        start: u32,
    },
    BulletedList,
    ListItem,
}

fn default_start() -> u32 {
    1
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Doc => Doc,
            NodeKind::Paragraph => Paragraph,
            NodeKind::Blockquote => Blockquote,
            NodeKind::HorizontalRule => HorizontalRule,
            NodeKind::Heading { .. } => Heading,
            NodeKind::CodeBlock { .. } => CodeBlock,
            NodeKind::Text => Text,
            NodeKind::Figure { .. } => Figure,
            NodeKind::HardBreak => HardBreak,
            NodeKind::OrderedList { .. } => OrderedList,
            NodeKind::BulletedList => BulletedList,
            NodeKind::ListItem => ListItem,
        }
    }

    /// Like [`NodeType::create_and_fill`], keeping these attributes and
    /// completing `content` on both sides until the grammar is satisfied.
    pub fn create_and_fill(self, content: Fragment) -> Option<Node> {
        let ty = self.node_type();
        let start = ty.content_match();
        let before = start.fill_before(&content, false, 0)?;
        let content = before.append(&content);
        let after = start
            .match_fragment(&content, 0, content.child_count())?
            .fill_before(&Fragment::empty(), true, 0)?;
        Some(Node::branch(self, content.append(&after)))
    }
}
