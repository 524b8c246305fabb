//! Figure uploads in flight.
//!
//! An uploader outside the engine receives an [`UploadId`] for a figure,
//! reports progress any number of times and finally delivers the image
//! attributes once. Meanwhile the figure's position is re-projected
//! through every transaction; an upload whose figure is deleted is
//! dropped.

use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{Image, Node, NodeKind, NodeType};
use crate::state::{EditorState, Transaction};
use crate::transform::{Assoc, Mappable, Mapping, StepError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UploadId(Uuid);

impl UploadId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum UploadError {
    #[error("No figure at position {0}")]
    NotAFigure(usize),
    #[error("No pending upload {0}")]
    Unknown(UploadId),
    #[error(transparent)]
    Step(#[from] StepError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingUpload {
    /// Position directly before the figure.
    pub pos: usize,
    /// Percent complete, 0 to 100.
    pub progress: u8,
}

#[derive(Debug, Clone, Default)]
pub struct Uploads {
    pending: HashMap<UploadId, PendingUpload>,
}

fn is_figure(doc: &Node, pos: usize) -> bool {
    doc.node_at(pos).is_some_and(|node| node.node_type() == NodeType::Figure)
}

impl Uploads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn get(&self, id: UploadId) -> Option<&PendingUpload> {
        self.pending.get(&id)
    }

    /// Registers an upload for the figure at `pos`.
    pub fn start(&mut self, doc: &Node, pos: usize) -> Result<UploadId, UploadError> {
        if !is_figure(doc, pos) {
            return Err(UploadError::NotAFigure(pos));
        }
        let id = UploadId::new();
        debug!("upload {id} started for figure at {pos}");
        self.pending.insert(id, PendingUpload { pos, progress: 0 });
        Ok(id)
    }

    /// Moves every pending figure position to `doc`, the result of
    /// `mapping`, dropping uploads whose figure went away.
    pub fn map(&mut self, doc: &Node, mapping: &Mapping) {
        self.pending.retain(|id, upload| {
            let result = mapping.map_result(upload.pos, Assoc::After);
            if result.deleted() || !is_figure(doc, result.pos) {
                warn!("upload {id} dropped, its figure was removed");
                return false;
            }
            upload.pos = result.pos;
            true
        });
    }

    /// Records progress, clamped to 100. Returns the stored value.
    pub fn set_progress(&mut self, id: UploadId, percent: u8) -> Result<u8, UploadError> {
        let upload = self.pending.get_mut(&id).ok_or(UploadError::Unknown(id))?;
        upload.progress = percent.min(100);
        Ok(upload.progress)
    }

    /// Completes the upload: the transaction sets `image` on the figure.
    /// The upload is forgotten either way.
    pub fn set_attributes(
        &mut self,
        state: &EditorState,
        id: UploadId,
        image: Image,
    ) -> Result<Transaction, UploadError> {
        let upload = self.pending.remove(&id).ok_or(UploadError::Unknown(id))?;
        if !is_figure(state.doc(), upload.pos) {
            return Err(UploadError::NotAFigure(upload.pos));
        }
        let mut tr = state.tr();
        tr.set_node_markup(upload.pos, Some(NodeKind::Figure { image: Some(image) }), None)?;
        tr.without_history();
        Ok(tr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use crate::transform::Transform;
    use pretty_assertions::assert_eq;

    fn image(src: &str) -> Image {
        Image {
            src: src.to_string(),
            title: None,
        }
    }

    #[test]
    fn test_start_requires_figure() {
        let d = doc(vec![p("a"), figure("cap")]);
        let mut uploads = Uploads::new();
        assert_eq!(uploads.start(&d, 0), Err(UploadError::NotAFigure(0)));
        assert!(uploads.start(&d, 3).is_ok());
    }

    #[test]
    fn test_progress_is_clamped() {
        let d = doc(vec![figure("")]);
        let mut uploads = Uploads::new();
        let id = uploads.start(&d, 0).unwrap();
        assert_eq!(uploads.set_progress(id, 40), Ok(40));
        assert_eq!(uploads.set_progress(id, 250), Ok(100));
        assert_eq!(uploads.get(id).map(|u| u.progress), Some(100));
    }

    #[test]
    fn test_position_follows_edits() {
        let d = doc(vec![p("a"), figure("cap")]);
        let mut uploads = Uploads::new();
        let id = uploads.start(&d, 3).unwrap();
        let mut tr = Transform::new(d);
        tr.insert(1, txt("xyz")).unwrap();
        uploads.map(tr.doc(), tr.mapping());
        assert_eq!(uploads.get(id).map(|u| u.pos), Some(6));
    }

    #[test]
    fn test_deleted_figure_drops_upload() {
        let d = doc(vec![p("a"), figure("cap")]);
        let mut uploads = Uploads::new();
        let id = uploads.start(&d, 3).unwrap();
        let mut tr = Transform::new(d);
        tr.delete(3, 8).unwrap();
        uploads.map(tr.doc(), tr.mapping());
        assert!(uploads.get(id).is_none());
        assert!(uploads.is_empty());
    }

    #[test]
    fn test_set_attributes_completes_once() {
        let d = doc(vec![figure("cap")]);
        let state = state_at(d.clone(), 1);
        let mut uploads = Uploads::new();
        let id = uploads.start(&d, 0).unwrap();
        let tr = uploads.set_attributes(&state, id, image("/a.png")).unwrap();
        assert!(!tr.add_to_history());
        let next = state.apply(&tr).unwrap();
        assert_eq!(next.doc(), &doc(vec![figure_with("/a.png", "cap")]));
        assert_eq!(
            uploads.set_attributes(&next, id, image("/b.png")).unwrap_err(),
            UploadError::Unknown(id)
        );
    }
}
