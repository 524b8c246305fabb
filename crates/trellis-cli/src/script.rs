//! Edit scripts: one action per line, replayed against an [`Editor`].
//!
//! ```text
//! # comments and blank lines are skipped
//! select 4
//! enter
//! type hello
//! select 1 6
//! mark bold
//! link https://example.org
//! tab
//! undo
//! ```

use anyhow::{Context, Result, bail};
use trellis_engine::{Editor, Intent, Mark};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Intent(Intent),
    Type(String),
    Select { anchor: usize, head: usize },
    SelectNode(usize),
    ToggleMark(Mark),
    Link(String),
    Unlink,
    Undo,
    Redo,
    MenuNext,
    MenuPrev,
    MenuDismiss,
}

fn position(word: Option<&str>, line: &str) -> Result<usize> {
    let word = word.with_context(|| format!("Missing position in '{line}'"))?;
    word.parse().with_context(|| format!("Invalid position '{word}' in '{line}'"))
}

impl Action {
    pub fn parse(line: &str) -> Result<Self> {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let mut words = rest.split_whitespace();
        let action = match command {
            // Everything after the first space is typed, spaces included.
            "type" => Action::Type(rest.to_string()),
            "select" => {
                let anchor = position(words.next(), line)?;
                let head = match words.next() {
                    Some(word) => position(Some(word), line)?,
                    None => anchor,
                };
                Action::Select { anchor, head }
            }
            "node" => Action::SelectNode(position(words.next(), line)?),
            "mark" => Action::ToggleMark(match words.next() {
                Some("bold") => Mark::Bold,
                Some("italic") => Mark::Italic,
                Some("code") => Mark::Code,
                other => bail!("Unknown mark {other:?} in '{line}'"),
            }),
            "link" => {
                let href = words.next().with_context(|| format!("Missing href in '{line}'"))?;
                Action::Link(href.to_string())
            }
            "unlink" => Action::Unlink,
            "undo" => Action::Undo,
            "redo" => Action::Redo,
            "menu" => match words.next() {
                Some("next") => Action::MenuNext,
                Some("prev") => Action::MenuPrev,
                Some("dismiss") => Action::MenuDismiss,
                other => bail!("Unknown menu action {other:?} in '{line}'"),
            },
            intent => Action::Intent(intent.parse()?),
        };
        Ok(action)
    }

    /// Applies the action, returning the name of whatever handled it.
    pub fn apply(&self, editor: &mut Editor) -> Result<Option<&'static str>> {
        let source = match self {
            Action::Intent(intent) => editor.handle_intent(*intent)?.and_then(|patch| patch.source),
            Action::Type(text) => editor.type_text(text)?.source,
            Action::Select { anchor, head } => editor.set_selection(*anchor, *head)?.source,
            Action::SelectNode(pos) => editor.select_node(*pos)?.source,
            Action::ToggleMark(mark) => {
                editor.toggle_mark(mark.clone())?.and_then(|patch| patch.source)
            }
            Action::Link(href) => editor.toggle_link(href)?.and_then(|patch| patch.source),
            Action::Unlink => editor.unset_link()?.and_then(|patch| patch.source),
            Action::Undo => editor.undo()?.and_then(|patch| patch.source),
            Action::Redo => editor.redo()?.and_then(|patch| patch.source),
            Action::MenuNext => {
                editor.menu_next();
                None
            }
            Action::MenuPrev => {
                editor.menu_prev();
                None
            }
            Action::MenuDismiss => {
                editor.dismiss_menu();
                None
            }
        };
        Ok(source)
    }
}

pub fn parse_script(script: &str) -> Result<Vec<Action>> {
    script
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .map(|(i, line)| {
            Action::parse(line.trim_start()).with_context(|| format!("Script line {}", i + 1))
        })
        .collect()
}

pub fn run(editor: &mut Editor, actions: &[Action]) -> Result<()> {
    for action in actions {
        match action.apply(editor)? {
            Some(source) => log::debug!("{action:?} handled by {source}"),
            None => log::debug!("{action:?} changed nothing"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use trellis_engine::MarkdownOptions;

    #[rstest]
    #[case("enter", Action::Intent(Intent::Enter))]
    #[case("Shift-Tab", Action::Intent(Intent::ShiftTab))]
    #[case("type a b ", Action::Type("a b ".to_string()))]
    #[case("select 3", Action::Select { anchor: 3, head: 3 })]
    #[case("select 1 5", Action::Select { anchor: 1, head: 5 })]
    #[case("node 0", Action::SelectNode(0))]
    #[case("menu dismiss", Action::MenuDismiss)]
    #[case("mark italic", Action::ToggleMark(Mark::Italic))]
    #[case("link https://x.org", Action::Link("https://x.org".to_string()))]
    #[case("undo", Action::Undo)]
    fn test_parse(#[case] line: &str, #[case] expected: Action) {
        assert_eq!(Action::parse(line).unwrap(), expected);
    }

    #[rstest]
    #[case("jump")]
    #[case("select")]
    #[case("select x")]
    #[case("menu up")]
    #[case("mark strike")]
    #[case("link")]
    fn test_parse_rejects(#[case] line: &str) {
        assert!(Action::parse(line).is_err());
    }

    #[test]
    fn test_parse_script_skips_comments() {
        let actions = parse_script("# split\n\nselect 4\n  enter\n").unwrap();
        assert_eq!(
            actions,
            vec![Action::Select { anchor: 4, head: 4 }, Action::Intent(Intent::Enter)]
        );
    }

    #[test]
    fn test_parse_script_reports_line() {
        let err = parse_script("enter\nfly\n").unwrap_err();
        assert_eq!(err.to_string(), "Script line 2");
    }

    #[test]
    fn test_run_splits_list_item() {
        let mut editor = Editor::from_markdown("- ab\n").unwrap();
        let actions = parse_script("select 4\nenter\ntype c\n").unwrap();
        run(&mut editor, &actions).unwrap();
        assert_eq!(editor.to_markdown(&MarkdownOptions::default()), "- a\n- cb\n");
    }

    #[test]
    fn test_run_marks_selection() {
        let mut editor = Editor::from_markdown("ab\n").unwrap();
        let actions = parse_script("select 1 2\nmark bold\nselect 2 3\nlink /b\n").unwrap();
        run(&mut editor, &actions).unwrap();
        assert_eq!(editor.to_markdown(&MarkdownOptions::default()), "**a**[b](/b)\n");
    }
}
