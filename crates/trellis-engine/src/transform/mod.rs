/*!
# Steps and transforms

Documents change through [`Step`]s. Each step either applies cleanly,
producing a new document, or fails and leaves nothing behind. A
[`Transform`] accumulates steps together with the intermediate documents
and a [`Mapping`] that carries positions from the starting document to the
current one.

Steps come in four kinds:

- replace: swap a range for a slice,
- replace-around: swap the edges of a range while keeping a gap in the
  middle (wrapping, lifting and retyping nodes),
- add-mark and remove-mark: change marks on inline content.

The structural helpers in [`structure`] answer "can this be lifted,
wrapped, split or joined?" without touching the document; the
corresponding [`Transform`] methods perform the edit.
*/

mod fit;
pub mod map;
mod ops;
pub mod step;
pub mod structure;

pub use fit::replace_step;
pub use map::{Assoc, MapResult, Mappable, Mapping, StepMap};
pub use ops::Transform;
pub use step::{MarkStep, ReplaceAroundStep, ReplaceStep, Step, StepError};
pub use structure::{can_join, can_split, find_wrapping, insert_point, joinable, lift_target};
