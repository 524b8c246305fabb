/*!
# Document model

Documents are immutable trees of [`Node`]s. Every node has a [`NodeKind`]
(type plus attributes); text nodes carry a string and a [`MarkSet`], every
other node carries a [`Fragment`] of children that must satisfy the content
grammar of its [`NodeType`].

## Positions

A document is addressed by a flat sequence of integer positions. Walking
the tree in order:

- each character of text occupies one token,
- each non-text leaf (`horizontal_rule`, `hard_break`) occupies one token,
- every other node contributes an opening token before its content and a
  closing token after it.

```text
doc(paragraph("ab"), bulleted_list(list_item(paragraph("c"))))

0 <p> 1 a 2 b 3 </p> 4 <ul> 5 <li> 6 <p> 7 c 8 </p> 9 </li> 10 </ul> 11
```

Position 0 is the start of the document content, position 1 is inside the
first paragraph before `a`, position 4 is between the paragraph and the
list. [`ResolvedPos`] turns a position into its ancestor chain.

## Editing

Nothing here mutates. [`Node::replace`] builds a new tree from an old one
and a [`Slice`], sharing every untouched subtree. Higher-level edits go
through steps and transforms in [`crate::transform`].
*/

pub mod content;
pub mod error;
pub mod fragment;
pub mod mark;
pub mod node;
mod replace;
pub mod resolved;
pub mod schema;
pub mod slice;

pub use content::ContentMatch;
pub use error::ModelError;
pub use fragment::Fragment;
pub use mark::{Mark, MarkSet, MarkType};
pub use node::Node;
pub use resolved::{NodeRange, ResolvedPos};
pub use schema::{Image, NodeKind, NodeType};
pub use slice::Slice;
