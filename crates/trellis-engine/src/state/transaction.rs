use std::ops::{Deref, DerefMut};

use crate::model::{Fragment, MarkSet, MarkType, Node, Slice};
use crate::transform::{Step, StepError, Transform, insert_point};

use super::editor_state::EditorState;
use super::selection::{Direction, Selection};

/// A [`Transform`] started from an editor state, tracking the selection
/// through its steps.
///
/// Until [`Transaction::set_selection`] is called, the selection is the
/// state's selection mapped through every step added so far.
#[derive(Debug, Clone)]
pub struct Transaction {
    tr: Transform,
    selection: Selection,
    /// Number of steps `selection` already accounts for.
    selection_for: usize,
    selection_set: bool,
    /// Marks the next typed text gets, valid until another step is added.
    stored_marks: Option<MarkSet>,
    stored_for: usize,
    add_to_history: bool,
    history_replay: bool,
}

impl Transaction {
    pub fn new(state: &EditorState) -> Self {
        Self {
            tr: Transform::new(state.doc().clone()),
            selection: state.selection().clone(),
            selection_for: 0,
            selection_set: false,
            stored_marks: state.stored_marks().cloned(),
            stored_for: 0,
            add_to_history: true,
            history_replay: false,
        }
    }

    /// The selection resolved against the current document.
    pub fn selection(&self) -> Selection {
        if self.selection_for < self.tr.steps().len() {
            self.selection
                .map(self.tr.doc(), &self.tr.mapping().slice(self.selection_for))
        } else {
            self.selection.clone()
        }
    }

    /// Replaces the selection. `selection` must be resolved against the
    /// current document.
    pub fn set_selection(&mut self, selection: Selection) -> &mut Self {
        self.selection = selection;
        self.selection_for = self.tr.steps().len();
        self.selection_set = true;
        self.stored_marks = None;
        self
    }

    /// Marks to apply to the next inserted text instead of the marks at
    /// the cursor. Cleared by any later step or selection change.
    pub fn stored_marks(&self) -> Option<&MarkSet> {
        if self.stored_for == self.tr.steps().len() {
            self.stored_marks.as_ref()
        } else {
            None
        }
    }

    pub fn set_stored_marks(&mut self, marks: Option<MarkSet>) -> &mut Self {
        self.stored_marks = marks;
        self.stored_for = self.tr.steps().len();
        self
    }

    /// Stops the next typed text from continuing marks of type `ty`.
    pub fn remove_stored_mark(&mut self, ty: MarkType) -> &mut Self {
        let marks = match self.stored_marks() {
            Some(marks) => marks.clone(),
            None => self.selection().rto().marks(),
        };
        self.set_stored_marks(Some(marks.remove_type(ty)))
    }

    /// Whether the selection was set explicitly rather than mapped.
    pub fn selection_set(&self) -> bool {
        self.selection_set
    }

    pub fn add_to_history(&self) -> bool {
        self.add_to_history
    }

    /// Keeps this transaction out of the undo history.
    pub fn without_history(&mut self) -> &mut Self {
        self.add_to_history = false;
        self
    }

    /// Whether this transaction is an undo or redo built by the history.
    pub fn is_history_replay(&self) -> bool {
        self.history_replay
    }

    pub(crate) fn mark_history_replay(&mut self) -> &mut Self {
        self.history_replay = true;
        self.without_history()
    }

    /// Replaces the selection with `text`, taking the stored marks or else
    /// the marks at the selection start. Empty text deletes the selection.
    pub fn insert_text(&mut self, text: &str) -> Result<&mut Self, StepError> {
        if text.is_empty() {
            return self.delete_selection();
        }
        match self.stored_marks().cloned() {
            Some(marks) => {
                let node = Node::new_text(text, marks)?;
                self.replace_selection(node, false)
            }
            None => self.replace_selection_with(Node::new_text(text, MarkSet::empty())?),
        }
    }

    /// Deletes the selected content and puts the cursor where it was.
    pub fn delete_selection(&mut self) -> Result<&mut Self, StepError> {
        let selection = self.selection();
        let start_len = self.tr.steps().len();
        self.tr.delete_range(selection.from(), selection.to())?;
        self.selection_to_insertion_end(start_len, Direction::Forward);
        Ok(self)
    }

    /// Replaces the selection with `node`. Inline nodes take the marks at
    /// the selection start; block nodes inserted at a collapsed cursor
    /// move out of the textblock when the cursor is at its edge.
    pub fn replace_selection_with(&mut self, node: Node) -> Result<&mut Self, StepError> {
        self.replace_selection(node, true)
    }

    fn replace_selection(
        &mut self,
        node: Node,
        inherit_marks: bool,
    ) -> Result<&mut Self, StepError> {
        let selection = self.selection();
        let (mut from, mut to) = (selection.from(), selection.to());
        let start_len = self.tr.steps().len();
        let node = if !inherit_marks {
            node
        } else if node.is_inline() {
            let rfrom = selection.rfrom();
            let marks = if rfrom.parent().allows_marks(&rfrom.marks()) {
                rfrom.marks()
            } else {
                Default::default()
            };
            node.mark(marks)
        } else {
            if from == to && rfrom_has_content(&selection)
                && let Some(point) = insert_point(self.tr.doc(), from, node.node_type())
            {
                from = point;
                to = point;
            }
            node
        };
        let bias = if node.is_inline() {
            Direction::Backward
        } else {
            Direction::Forward
        };
        self.tr.replace(from, to, Slice::new(Fragment::from_node(node), 0, 0))?;
        self.selection_to_insertion_end(start_len, bias);
        Ok(self)
    }

    /// Puts a cursor near the end of the content inserted by the last
    /// replace step, if one was added after `start_len` steps.
    fn selection_to_insertion_end(&mut self, start_len: usize, bias: Direction) {
        let steps = self.tr.steps();
        let Some(last) = steps.len().checked_sub(1).filter(|&last| last >= start_len) else {
            return;
        };
        if !matches!(steps[last], Step::Replace(_) | Step::ReplaceAround(_)) {
            return;
        }
        let mut end = None;
        self.tr.mapping().maps()[last].for_each(|_, _, _, new_to| {
            end.get_or_insert(new_to);
        });
        let Some(end) = end else {
            return;
        };
        if let Ok(rpos) = self.tr.doc().resolve(end) {
            let selection = Selection::near(&rpos, bias);
            self.set_selection(selection);
        }
    }

    pub fn into_transform(self) -> Transform {
        self.tr
    }
}

fn rfrom_has_content(selection: &Selection) -> bool {
    selection.rfrom().parent().content_size() > 0
}

impl Deref for Transaction {
    type Target = Transform;

    fn deref(&self) -> &Transform {
        &self.tr
    }
}

impl DerefMut for Transaction {
    fn deref_mut(&mut self) -> &mut Transform {
        &mut self.tr
    }
}
