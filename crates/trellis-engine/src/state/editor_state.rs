use crate::model::{MarkSet, Node};

use super::StateError;
use super::selection::Selection;
use super::transaction::Transaction;

/// A document version together with the selection in it.
#[derive(Debug, Clone)]
pub struct EditorState {
    doc: Node,
    selection: Selection,
    stored_marks: Option<MarkSet>,
}

impl EditorState {
    /// `selection` must be resolved against `doc`.
    pub fn new(doc: Node, selection: Selection) -> Self {
        Self {
            doc,
            selection,
            stored_marks: None,
        }
    }

    /// A state with the selection at the start of `doc`.
    pub fn from_doc(doc: Node) -> Self {
        let selection = Selection::at_start(&doc);
        Self::new(doc, selection)
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Marks the next typed text will get, when set explicitly.
    pub fn stored_marks(&self) -> Option<&MarkSet> {
        self.stored_marks.as_ref()
    }

    /// Starts a transaction from this state.
    pub fn tr(&self) -> Transaction {
        Transaction::new(self)
    }

    /// The state after `tr`. Fails when `tr` was started from a different
    /// document version.
    pub fn apply(&self, tr: &Transaction) -> Result<EditorState, StateError> {
        if !tr.before().ptr_eq(&self.doc) {
            return Err(StateError::StaleTransaction);
        }
        let selection = tr.selection();
        let stored_marks = selection.as_cursor().and(tr.stored_marks()).cloned();
        Ok(EditorState {
            doc: tr.doc().clone(),
            selection,
            stored_marks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_apply_produces_new_version() {
        let state = state_at(doc(vec![p("a")]), 2);
        let mut tr = state.tr();
        tr.insert_text("b").unwrap();
        let next = state.apply(&tr).unwrap();
        assert_eq!(next.doc(), &doc(vec![p("ab")]));
        assert_eq!(next.selection().head(), 3);
        assert_eq!(state.doc(), &doc(vec![p("a")]));
    }

    #[test]
    fn test_apply_rejects_stale_transaction() {
        let state = state_at(doc(vec![p("a")]), 2);
        let mut tr = state.tr();
        tr.insert_text("b").unwrap();
        let next = state.apply(&tr).unwrap();
        assert_eq!(next.apply(&tr).unwrap_err(), StateError::StaleTransaction);
    }

    #[test]
    fn test_stored_marks_survive_until_next_step() {
        let state = state_at(doc(vec![p_with(vec![bold("ab")])]), 3);
        let mut tr = state.tr();
        tr.remove_stored_mark(crate::model::MarkType::Bold);
        let next = state.apply(&tr).unwrap();
        assert_eq!(next.stored_marks(), Some(&MarkSet::empty()));

        let mut tr = next.tr();
        tr.insert_text("c").unwrap();
        let after = next.apply(&tr).unwrap();
        assert_eq!(after.doc(), &doc(vec![p_with(vec![bold("ab"), txt("c")])]));
        assert_eq!(after.stored_marks(), None);
    }

    #[test]
    fn test_from_doc_places_cursor_in_first_textblock() {
        let state = EditorState::from_doc(doc(vec![blockquote(vec![p("a")])]));
        assert_eq!(state.selection().head(), 2);
    }
}
