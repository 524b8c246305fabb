/*!
# Editing commands

A command looks at an [`EditorState`] and either proposes a [`Transaction`]
or declines with `None`. Declining is the normal outcome: a key press
runs an ordered chain of commands and the first one that applies wins.

```rust
use trellis_engine::commands::{Intent, chain, run_chain};
use trellis_engine::markup::from_markdown;
use trellis_engine::state::{EditorState, Selection};

let doc = from_markdown("- a\n- b\n").unwrap();
// cursor at the start of "b"
let state = EditorState::new(doc.clone(), Selection::cursor(&doc, 8).unwrap());
let (name, tr) = run_chain(&state, chain(Intent::Backspace)).unwrap();
assert_eq!(name, "join_list_backward");
assert_eq!(
    state.apply(&tr).unwrap().doc().to_string(),
    r#"doc(bulleted_list(list_item(paragraph("ab"))))"#
);
```

## Chains

| intent | commands, in order |
|---|---|
| Enter | `newline_in_code`, `split_list_item`, `create_paragraph_near`, `lift_empty_block`, `split_block`, `set_paragraph` |
| Mod-Enter | `exit_code` |
| Backspace | `delete_selection`, `join_list_backward`, `set_paragraph`, `join_backward`, `select_node_backward` |
| Delete | `delete_selection`, `join_list_forward`, `join_forward`, `select_node_forward` |
| Tab | `sink_list_item` |
| Shift-Tab | `lift_list_item` |

List commands come before the generic ones so that list structure is
handled before plain block joining gets a chance to flatten it.
*/

pub mod base;
pub mod list;

use std::fmt;
use std::str::FromStr;

use log::{debug, error};

use crate::state::{EditorState, Transaction};
use crate::transform::StepError;

pub use base::{
    create_paragraph_near, delete_selection, exit_code, join_backward, join_forward,
    lift_empty_block, mark_active, newline_in_code, select_node_backward, select_node_forward,
    set_link, set_paragraph, split_block, toggle_link, toggle_mark, unset_link,
};
pub use list::{
    join_list_backward, join_list_forward, lift_list_item, sink_list_item, split_list_item,
};

pub type Command = fn(&EditorState) -> Option<Transaction>;

/// A command with the name it is reported under.
#[derive(Clone, Copy)]
pub struct NamedCommand {
    pub name: &'static str,
    pub run: Command,
}

impl fmt::Debug for NamedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

macro_rules! named {
    ($($command:ident),* $(,)?) => {
        &[$(NamedCommand { name: stringify!($command), run: $command }),*]
    };
}

const ENTER: &[NamedCommand] = named![
    newline_in_code,
    split_list_item,
    create_paragraph_near,
    lift_empty_block,
    split_block,
    set_paragraph,
];
const MOD_ENTER: &[NamedCommand] = named![exit_code];
const BACKSPACE: &[NamedCommand] = named![
    delete_selection,
    join_list_backward,
    set_paragraph,
    join_backward,
    select_node_backward,
];
const DELETE: &[NamedCommand] = named![
    delete_selection,
    join_list_forward,
    join_forward,
    select_node_forward,
];
const TAB: &[NamedCommand] = named![sink_list_item];
const SHIFT_TAB: &[NamedCommand] = named![lift_list_item];

/// An editing key, independent of how a front end binds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Enter,
    ModEnter,
    Backspace,
    Delete,
    Tab,
    ShiftTab,
}

impl Intent {
    pub const ALL: [Intent; 6] = [
        Intent::Enter,
        Intent::ModEnter,
        Intent::Backspace,
        Intent::Delete,
        Intent::Tab,
        Intent::ShiftTab,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Intent::Enter => "enter",
            Intent::ModEnter => "mod-enter",
            Intent::Backspace => "backspace",
            Intent::Delete => "delete",
            Intent::Tab => "tab",
            Intent::ShiftTab => "shift-tab",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownIntent(pub String);

impl fmt::Display for UnknownIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown editing intent '{}'", self.0)
    }
}

impl std::error::Error for UnknownIntent {}

impl FromStr for Intent {
    type Err = UnknownIntent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intent::ALL
            .into_iter()
            .find(|intent| intent.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownIntent(s.to_string()))
    }
}

/// The ordered command chain for an intent.
pub fn chain(intent: Intent) -> &'static [NamedCommand] {
    match intent {
        Intent::Enter => ENTER,
        Intent::ModEnter => MOD_ENTER,
        Intent::Backspace => BACKSPACE,
        Intent::Delete => DELETE,
        Intent::Tab => TAB,
        Intent::ShiftTab => SHIFT_TAB,
    }
}

/// Runs `chain` top to bottom and returns the first transaction proposed,
/// with the name of the command that proposed it.
pub fn run_chain(
    state: &EditorState,
    chain: &[NamedCommand],
) -> Option<(&'static str, Transaction)> {
    for command in chain {
        if let Some(tr) = (command.run)(state) {
            debug!("{} applied with {} steps", command.name, tr.steps().len());
            return Some((command.name, tr));
        }
    }
    debug!("no command applied at {:?}", state.selection());
    None
}

/// Unwraps the result of a step a command decided to build. A failure here
/// means the command's own checks were wrong: it is logged and the command
/// declines.
pub(crate) fn built<T>(command: &str, result: Result<T, StepError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            error!("{command} built an invalid step: {err}");
            debug_assert!(false, "{command} built an invalid step: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn press(intent: Intent, state: &EditorState) -> Option<(&'static str, EditorState)> {
        run_chain(state, chain(intent)).map(|(name, tr)| (name, state.apply(&tr).unwrap()))
    }

    #[rstest]
    #[case("enter", Intent::Enter)]
    #[case("Mod-Enter", Intent::ModEnter)]
    #[case("shift-tab", Intent::ShiftTab)]
    fn test_intent_from_name(#[case] name: &str, #[case] intent: Intent) {
        assert_eq!(name.parse::<Intent>(), Ok(intent));
    }

    #[test]
    fn test_unknown_intent() {
        assert_eq!("escape".parse::<Intent>(), Err(UnknownIntent("escape".into())));
    }

    #[test]
    fn test_chains_are_ordered_tables() {
        let names: Vec<_> = chain(Intent::Backspace).iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            [
                "delete_selection",
                "join_list_backward",
                "set_paragraph",
                "join_backward",
                "select_node_backward"
            ]
        );
        let names: Vec<_> = chain(Intent::Delete).iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            ["delete_selection", "join_list_forward", "join_forward", "select_node_forward"]
        );
        assert_eq!(chain(Intent::Enter).len(), 6);
    }

    #[test]
    fn test_backspace_in_list_uses_list_join() {
        let d = doc(vec![ul(vec![item("a"), item("b")])]);
        let (name, next) = press(Intent::Backspace, &state_at(d.clone(), pos_of(&d, "b"))).unwrap();
        assert_eq!(name, "join_list_backward");
        assert_eq!(next.doc(), &doc(vec![ul(vec![item("ab")])]));
    }

    #[test]
    fn test_backspace_between_paragraphs_falls_through() {
        let d = doc(vec![p("a"), p("b")]);
        let (name, next) = press(Intent::Backspace, &state_at(d.clone(), pos_of(&d, "b"))).unwrap();
        assert_eq!(name, "join_backward");
        assert_eq!(next.doc(), &doc(vec![p("ab")]));
    }

    #[test]
    fn test_enter_on_empty_top_level_item_lifts_it() {
        let d = doc(vec![ul(vec![item("a"), item("")])]);
        let empty = pos_after(&d, "a") + 4;
        let (name, next) = press(Intent::Enter, &state_at(d, empty)).unwrap();
        assert_eq!(name, "lift_empty_block");
        assert_eq!(next.doc(), &doc(vec![ul(vec![item("a")]), p("")]));
    }

    #[test]
    fn test_enter_in_code_inserts_newline() {
        let d = doc(vec![code_block("ab")]);
        let (name, next) = press(Intent::Enter, &state_at(d, 2)).unwrap();
        assert_eq!(name, "newline_in_code");
        assert_eq!(next.doc(), &doc(vec![code_block("a\nb")]));
    }

    #[test]
    fn test_tab_then_shift_tab_restores_list() {
        let d = doc(vec![ol(vec![item("a"), item("b")])]);
        let (_, sunk) = press(Intent::Tab, &state_at(d.clone(), pos_of(&d, "b"))).unwrap();
        let (name, lifted) = press(Intent::ShiftTab, &sunk).unwrap();
        assert_eq!(name, "lift_list_item");
        assert_eq!(lifted.doc(), &d);
    }

    #[test]
    fn test_delete_at_document_end_does_nothing() {
        let d = doc(vec![p("a")]);
        assert!(press(Intent::Delete, &state_at(d, 2)).is_none());
    }
}
