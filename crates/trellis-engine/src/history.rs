//! Undo and redo.
//!
//! Every transaction that changes the document and is meant for history
//! becomes one entry: the inverses of its steps, last step first, and the
//! selection to restore. Changes kept out of history (upload results)
//! carry the recorded entries along through their mapping. Undo and redo
//! transactions move entries between the stacks themselves and are not
//! recorded.

use log::{trace, warn};

use crate::model::Node;
use crate::state::{EditorState, Selection, Transaction};
use crate::transform::{Mapping, Step};

pub const DEFAULT_DEPTH: usize = 100;

#[derive(Debug, Clone)]
struct Entry {
    steps: Vec<Step>,
    selection: Selection,
}

#[derive(Debug, Clone)]
pub struct History {
    done: Vec<Entry>,
    undone: Vec<Entry>,
    depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_DEPTH)
    }
}

impl History {
    /// A history keeping at most `depth` undo entries.
    pub fn new(depth: usize) -> Self {
        Self {
            done: Vec::new(),
            undone: Vec::new(),
            depth: depth.max(1),
        }
    }

    pub fn undo_depth(&self) -> usize {
        self.done.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.undone.len()
    }

    /// Records `tr`, which was applied to `before`.
    pub fn record(&mut self, before: &EditorState, tr: &Transaction) {
        if !tr.doc_changed() || tr.is_history_replay() {
            return;
        }
        if !tr.add_to_history() {
            self.rebase(tr.doc(), tr.mapping());
            return;
        }
        let Some(steps) = inverted_steps(tr) else {
            return;
        };
        self.done.push(Entry {
            steps,
            selection: before.selection().clone(),
        });
        if self.done.len() > self.depth {
            self.done.remove(0);
        }
        self.undone.clear();
    }

    /// The transaction undoing the last recorded change. It is kept out of
    /// history; the change moves to the redo stack.
    pub fn undo(&mut self, state: &EditorState) -> Option<Transaction> {
        let entry = self.done.pop()?;
        let (tr, reverse) = replay(state, entry)?;
        self.undone.push(reverse);
        Some(tr)
    }

    /// The transaction re-applying the last undone change.
    pub fn redo(&mut self, state: &EditorState) -> Option<Transaction> {
        let entry = self.undone.pop()?;
        let (tr, reverse) = replay(state, entry)?;
        self.done.push(reverse);
        Some(tr)
    }

    /// Carries the undo entries over a change made outside history. The
    /// redo stack does not survive it.
    fn rebase(&mut self, doc: &Node, mapping: &Mapping) {
        for entry in &mut self.done {
            entry.steps = entry.steps.iter().filter_map(|step| step.map(mapping)).collect();
            entry.selection = entry.selection.map(doc, mapping);
        }
        self.done.retain(|entry| !entry.steps.is_empty());
        self.undone.clear();
    }
}

fn inverted_steps(tr: &Transaction) -> Option<Vec<Step>> {
    let mut inverted = Vec::with_capacity(tr.steps().len());
    for (step, doc) in tr.steps().iter().zip(tr.docs()).rev() {
        match step.invert(doc) {
            Ok(step) => inverted.push(step),
            Err(err) => {
                warn!("change left out of history, step cannot be inverted: {err}");
                return None;
            }
        }
    }
    Some(inverted)
}

/// Applies an entry's steps to `state`, returning the transaction and the
/// entry that reverses it.
fn replay(state: &EditorState, entry: Entry) -> Option<(Transaction, Entry)> {
    let mut tr = state.tr();
    for step in entry.steps {
        if let Err(err) = tr.step(step) {
            warn!("history step no longer applies: {err}");
        }
    }
    if !tr.doc_changed() {
        return None;
    }
    trace!("replaying {} history steps", tr.steps().len());
    let reverse = Entry {
        steps: inverted_steps(&tr)?,
        selection: state.selection().clone(),
    };
    let selection = entry.selection.map(tr.doc(), &Mapping::new());
    tr.set_selection(selection).mark_history_replay();
    Some((tr, reverse))
}
