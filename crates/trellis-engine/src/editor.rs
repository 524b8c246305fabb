/*!
# Editor controller

[`Editor`] owns the one long-lived mutable value, the current
[`EditorState`], together with everything that has to follow it through
edits: undo history, the slash-command menu and its ignored ranges, and
pending figure uploads.

Every change goes through [`Editor::dispatch`]:

1. apply the transaction, producing the next state,
2. record it in history (or carry history over it when untracked),
3. re-project pending upload positions through its mapping,
4. re-project decorations and recompute the slash-command match,
5. bump the version and report what changed as a [`Patch`].
*/

use std::ops::Range;

use log::{debug, trace};
use serde::Serialize;
use thiserror::Error;

use crate::block_menu::BlockMenu;
use crate::commands::{self, Intent, chain, run_chain};
use crate::decoration::DecorationSet;
use crate::history::History;
use crate::input_rules::handle_text_input;
use crate::markup::{self, MarkdownOptions, MarkupError};
use crate::model::{Image, Mark, MarkType, Node};
use crate::state::{EditorState, Selection, StateError, Transaction};
use crate::transform::{Assoc, Mappable, Mapping, StepError};
use crate::upload::{UploadError, UploadId, Uploads};

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Step(#[from] StepError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Markup(#[from] MarkupError),
}

/// What a dispatched transaction did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Patch {
    /// Command or rule that produced the transaction, if any.
    pub source: Option<&'static str>,
    /// Ranges of the new document that were inserted or rewritten.
    pub changed: Vec<Range<usize>>,
    pub selection: Range<usize>,
    pub version: u64,
}

/// Ranges of the final document touched by `mapping`'s steps.
fn changed_ranges(mapping: &Mapping) -> Vec<Range<usize>> {
    let mut changed = Vec::new();
    for (i, map) in mapping.maps().iter().enumerate() {
        let rest = mapping.slice(i + 1);
        map.for_each(|_, _, new_start, new_end| {
            let start = rest.map(new_start, Assoc::Before);
            let end = rest.map(new_end, Assoc::After);
            changed.push(start..end);
        });
    }
    changed
}

#[derive(Debug, Clone)]
pub struct Editor {
    state: EditorState,
    history: History,
    block_menu: BlockMenu,
    uploads: Uploads,
    version: u64,
}

impl Editor {
    /// An editor on `doc` with the cursor at the first text position.
    pub fn new(doc: Node) -> Self {
        Self::with_state(EditorState::from_doc(doc))
    }

    pub fn with_state(state: EditorState) -> Self {
        let mut block_menu = BlockMenu::default();
        block_menu.update(&state);
        Self {
            state,
            history: History::default(),
            block_menu,
            uploads: Uploads::new(),
            version: 0,
        }
    }

    pub fn from_markdown(markdown: &str) -> Result<Self, EditorError> {
        Ok(Self::new(markup::from_markdown(markdown)?))
    }

    /// Replaces the undo history, e.g. to set a configured depth.
    pub fn with_history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn doc(&self) -> &Node {
        self.state.doc()
    }

    pub fn selection(&self) -> &Selection {
        self.state.selection()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn block_menu(&self) -> &BlockMenu {
        &self.block_menu
    }

    pub fn uploads(&self) -> &Uploads {
        &self.uploads
    }

    /// Ignored slash-command ranges plus the active match.
    pub fn decorations(&self) -> DecorationSet {
        self.block_menu.decorations()
    }

    pub fn to_markdown(&self, options: &MarkdownOptions) -> String {
        markup::to_markdown(self.doc(), options)
    }

    pub fn to_html(&self) -> String {
        markup::to_html(self.doc())
    }

    pub fn dispatch(&mut self, tr: Transaction) -> Result<Patch, EditorError> {
        self.dispatch_from(None, tr)
    }

    fn dispatch_from(
        &mut self,
        source: Option<&'static str>,
        tr: Transaction,
    ) -> Result<Patch, EditorError> {
        let next = self.state.apply(&tr)?;
        trace!("dispatch {} steps from {source:?}", tr.steps().len());
        self.history.record(&self.state, &tr);
        self.uploads.map(next.doc(), tr.mapping());
        self.state = next;
        self.block_menu.apply(tr.mapping(), &self.state);
        self.version += 1;

        let selection = self.state.selection();
        Ok(Patch {
            source,
            changed: changed_ranges(tr.mapping()),
            selection: selection.from()..selection.to(),
            version: self.version,
        })
    }

    /// Runs the command chain for `intent`. While the slash-command menu
    /// is open, Enter picks the selected item instead.
    ///
    /// Backspace and Delete inside text remove a single character when no
    /// command applies.
    pub fn handle_intent(&mut self, intent: Intent) -> Result<Option<Patch>, EditorError> {
        if intent == Intent::Enter
            && let Some(tr) = self.block_menu.execute_selected(&self.state)
        {
            return self.dispatch_from(Some("block_menu"), tr).map(Some);
        }
        if let Some((name, tr)) = run_chain(&self.state, chain(intent)) {
            return self.dispatch_from(Some(name), tr).map(Some);
        }
        let fallback = match intent {
            Intent::Backspace => self.delete_char(false)?.map(|tr| ("delete_char_backward", tr)),
            Intent::Delete => self.delete_char(true)?.map(|tr| ("delete_char_forward", tr)),
            _ => None,
        };
        match fallback {
            Some((name, tr)) => self.dispatch_from(Some(name), tr).map(Some),
            None => {
                debug!("{intent} did nothing");
                Ok(None)
            }
        }
    }

    fn delete_char(&self, forward: bool) -> Result<Option<Transaction>, EditorError> {
        let Some(cursor) = self.state.selection().as_cursor() else {
            return Ok(None);
        };
        let offset = cursor.parent_offset();
        let pos = cursor.pos();
        let range = if forward {
            (offset < cursor.parent().content_size()).then_some(pos..pos + 1)
        } else {
            (offset > 0).then(|| pos - 1..pos)
        };
        let Some(range) = range else {
            return Ok(None);
        };
        let mut tr = self.state.tr();
        tr.delete(range.start, range.end)?;
        Ok(Some(tr))
    }

    /// Inserts typed text, letting input rules replace the insertion.
    pub fn type_text(&mut self, text: &str) -> Result<Patch, EditorError> {
        if let Some((name, tr)) = handle_text_input(&self.state, text) {
            return self.dispatch_from(Some(name), tr);
        }
        let mut tr = self.state.tr();
        tr.insert_text(text)?;
        self.dispatch_from(None, tr)
    }

    pub fn set_selection(&mut self, anchor: usize, head: usize) -> Result<Patch, EditorError> {
        let selection = Selection::text(self.doc(), anchor, head)?;
        let mut tr = self.state.tr();
        tr.set_selection(selection);
        self.dispatch_from(None, tr)
    }

    pub fn select_node(&mut self, pos: usize) -> Result<Patch, EditorError> {
        let selection = Selection::node(self.doc(), pos)?;
        let mut tr = self.state.tr();
        tr.set_selection(selection);
        self.dispatch_from(None, tr)
    }

    pub fn undo(&mut self) -> Result<Option<Patch>, EditorError> {
        match self.history.undo(&self.state) {
            Some(tr) => self.dispatch_from(Some("undo"), tr).map(Some),
            None => Ok(None),
        }
    }

    pub fn redo(&mut self) -> Result<Option<Patch>, EditorError> {
        match self.history.redo(&self.state) {
            Some(tr) => self.dispatch_from(Some("redo"), tr).map(Some),
            None => Ok(None),
        }
    }

    /// Whether marks of type `ty` apply at the selection.
    pub fn mark_active(&self, ty: MarkType) -> bool {
        commands::mark_active(&self.state, ty)
    }

    /// Toggles `mark` on the selection, or on the next typed text at a
    /// cursor. `None` when the mark cannot go there.
    pub fn toggle_mark(&mut self, mark: Mark) -> Result<Option<Patch>, EditorError> {
        self.run_command("toggle_mark", commands::toggle_mark(&self.state, &mark))
    }

    pub fn set_link(
        &mut self,
        href: &str,
        title: Option<&str>,
    ) -> Result<Option<Patch>, EditorError> {
        self.run_command("set_link", commands::set_link(&self.state, href, title))
    }

    pub fn unset_link(&mut self) -> Result<Option<Patch>, EditorError> {
        self.run_command("unset_link", commands::unset_link(&self.state))
    }

    pub fn toggle_link(&mut self, href: &str) -> Result<Option<Patch>, EditorError> {
        self.run_command("toggle_link", commands::toggle_link(&self.state, href))
    }

    fn run_command(
        &mut self,
        name: &'static str,
        tr: Option<Transaction>,
    ) -> Result<Option<Patch>, EditorError> {
        match tr {
            Some(tr) => self.dispatch_from(Some(name), tr).map(Some),
            None => {
                debug!("{name} did nothing");
                Ok(None)
            }
        }
    }

    pub fn menu_next(&mut self) {
        self.block_menu.select_next();
    }

    pub fn menu_prev(&mut self) {
        self.block_menu.select_prev();
    }

    /// Closes the slash-command menu. Returns whether it was open.
    pub fn dismiss_menu(&mut self) -> bool {
        self.block_menu.dismiss()
    }

    pub fn start_upload(&mut self, figure_pos: usize) -> Result<UploadId, EditorError> {
        Ok(self.uploads.start(self.state.doc(), figure_pos)?)
    }

    pub fn set_progress(&mut self, id: UploadId, percent: u8) -> Result<u8, EditorError> {
        Ok(self.uploads.set_progress(id, percent)?)
    }

    /// Delivers the uploaded image to its figure. The change is kept out
    /// of undo history.
    pub fn set_attributes(&mut self, id: UploadId, image: Image) -> Result<Patch, EditorError> {
        let tr = self.uploads.set_attributes(&self.state, id, image)?;
        self.dispatch_from(Some("upload"), tr)
    }
}
