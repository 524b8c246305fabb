pub mod block_menu;
pub mod commands;
pub mod decoration;
pub mod editor;
pub mod history;
pub mod input_rules;
pub mod markup;
pub mod model;
pub mod state;
pub mod transform;
pub mod upload;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use commands::{Intent, NamedCommand, chain, run_chain};
pub use decoration::{Decoration, DecorationSet, DecorationTag};
pub use editor::{Editor, EditorError, Patch};
pub use history::History;
pub use markup::{MarkdownOptions, MarkupError, from_markdown, to_html, to_markdown};
pub use model::{
    Fragment, Image, Mark, MarkSet, MarkType, ModelError, Node, NodeKind, NodeType, Slice,
};
pub use state::{EditorState, Selection, StateError, Transaction};
pub use transform::{Mapping, Step, StepError, Transform};
pub use upload::{UploadError, UploadId};
