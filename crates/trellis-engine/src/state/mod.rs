/*!
# Editor state

An [`EditorState`] is one immutable document version plus a [`Selection`].
Edits are proposed as [`Transaction`]s built from a state and applied with
[`EditorState::apply`], which yields the next state. A transaction only
applies to the exact version it was started from.
*/

mod editor_state;
mod selection;
mod transaction;

use thiserror::Error;

use crate::model::ModelError;

pub use editor_state::EditorState;
pub use selection::{Direction, Selection};
pub use transaction::Transaction;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("No node after position {0}")]
    NoNodeAt(usize),
    #[error("Transaction was built against a different document version")]
    StaleTransaction,
}
