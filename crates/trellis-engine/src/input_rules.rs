//! Markdown-style shortcuts applied while typing.
//!
//! Each rule is a pattern anchored at the cursor. Before typed text is
//! inserted, the text of the current textblock up to the cursor plus the
//! typed text is matched against the rules in order; the first rule that
//! matches and applies replaces the plain insertion.

use std::sync::LazyLock;

use log::debug;
use regex::{Captures, Regex};

use crate::model::{Mark, Node, NodeKind};
use crate::state::{EditorState, Transaction};
use crate::transform::{can_join, find_wrapping};

/// Longest stretch of text before the cursor a rule can see.
const MAX_MATCH: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    /// Turn the textblock into a heading with as many levels as `#`s.
    Heading,
    CodeBlock,
    Blockquote,
    /// Wrap in an ordered list starting at the typed number, joining a
    /// list right before it when the numbering continues.
    OrderedList,
    BulletedList,
    Bold,
    Code,
}

#[derive(Debug)]
pub struct InputRule {
    pub name: &'static str,
    pub pattern: Regex,
    pub action: RuleAction,
}

fn rule(name: &'static str, pattern: &str, action: RuleAction) -> InputRule {
    InputRule {
        name,
        pattern: Regex::new(pattern).expect("valid input rule pattern"),
        action,
    }
}

static RULES: LazyLock<Vec<InputRule>> = LazyLock::new(|| {
    vec![
        rule("heading", r"^(#{1,6})\s$", RuleAction::Heading),
        rule("code_block", r"^```\s$", RuleAction::CodeBlock),
        rule("blockquote", r"^>\s$", RuleAction::Blockquote),
        rule("ordered_list", r"^(\d+)\.\s$", RuleAction::OrderedList),
        rule("bulleted_list", r"^\s*([-+*])\s$", RuleAction::BulletedList),
        rule("bold", r"\*\*([^*]+)\*\*$", RuleAction::Bold),
        rule("code", r"`([^`]+)`$", RuleAction::Code),
    ]
});

pub fn rules() -> &'static [InputRule] {
    &RULES
}

/// The transaction replacing the insertion of `text` at the cursor, when
/// a rule fires. Code blocks never trigger rules.
pub fn handle_text_input(state: &EditorState, text: &str) -> Option<(&'static str, Transaction)> {
    let cursor = state.selection().as_cursor()?;
    let parent = cursor.parent();
    if parent.node_type().is_code() || !parent.inline_content() {
        return None;
    }
    let offset = cursor.parent_offset();
    let before = parent
        .content()
        .text_between(offset.saturating_sub(MAX_MATCH), offset, "", "\u{fffc}");
    let text_before = format!("{before}{text}");
    let typed = text.chars().count();
    let to = cursor.pos();

    rules().iter().find_map(|rule| {
        let captures = rule.pattern.captures(&text_before)?;
        let matched = captures.get(0)?.as_str().chars().count();
        let from = to.checked_sub(matched.checked_sub(typed)?)?;
        let tr = apply_rule(state, rule.action, &captures, from, to)?;
        debug!("input rule {} fired at {from}..{to}", rule.name);
        Some((rule.name, tr))
    })
}

fn apply_rule(
    state: &EditorState,
    action: RuleAction,
    captures: &Captures,
    from: usize,
    to: usize,
) -> Option<Transaction> {
    match action {
        RuleAction::Heading => {
            let level = captures.get(1)?.as_str().len() as u8;
            set_block_type(state, from, to, NodeKind::Heading { level })
        }
        RuleAction::CodeBlock => {
            set_block_type(state, from, to, NodeKind::CodeBlock { lang: None })
        }
        RuleAction::Blockquote => wrap_in(state, from, to, NodeKind::Blockquote, |_| true),
        RuleAction::OrderedList => {
            let start: u32 = captures.get(1)?.as_str().parse().ok()?;
            wrap_in(state, from, to, NodeKind::OrderedList { start }, |before| match before.kind() {
                NodeKind::OrderedList { start: prev } => {
                    before.child_count() as u32 + prev == start
                }
                _ => false,
            })
        }
        RuleAction::BulletedList => wrap_in(state, from, to, NodeKind::BulletedList, |_| true),
        RuleAction::Bold => mark_text(state, captures, from, to, Mark::Bold),
        RuleAction::Code => mark_text(state, captures, from, to, Mark::Code),
    }
}

/// Deletes the matched prefix and retypes the textblock.
fn set_block_type(
    state: &EditorState,
    from: usize,
    to: usize,
    kind: NodeKind,
) -> Option<Transaction> {
    let rstart = state.doc().resolve(from).ok()?;
    let depth = rstart.depth();
    if depth == 0 {
        return None;
    }
    let container = rstart.node(depth - 1);
    if !container.can_replace_with(
        rstart.index(depth - 1),
        rstart.index_after(depth - 1),
        kind.node_type(),
    ) {
        return None;
    }
    let mut tr = state.tr();
    tr.delete(from, to).ok()?;
    tr.set_block_type(from, from, &kind).ok()?;
    Some(tr)
}

/// Deletes the matched prefix and wraps the textblock in `kind`, joining
/// with an identical node right before it when `join` allows.
fn wrap_in(
    state: &EditorState,
    from: usize,
    to: usize,
    kind: NodeKind,
    join: impl Fn(&Node) -> bool,
) -> Option<Transaction> {
    let mut tr = state.tr();
    tr.delete(from, to).ok()?;
    let rstart = tr.doc().resolve(from).ok()?;
    let range = rstart.block_range(&rstart, |_| true)?;
    let target = kind.node_type();
    let wrappers: Vec<NodeKind> = find_wrapping(&range, target)?
        .into_iter()
        .map(|ty| if ty == target { kind.clone() } else { ty.default_kind() })
        .collect();
    tr.wrap(&range, &wrappers).ok()?;

    let join_at = from.checked_sub(1)?;
    let before = tr.doc().resolve(join_at).ok()?.node_before();
    if let Some(before) = before
        && before.node_type() == target
        && can_join(tr.doc(), join_at)
        && join(&before)
    {
        tr.join(join_at, 1).ok()?;
    }
    Some(tr)
}

/// Strips the delimiters around the captured text and marks it.
fn mark_text(
    state: &EditorState,
    captures: &Captures,
    from: usize,
    to: usize,
    mark: Mark,
) -> Option<Transaction> {
    let whole = captures.get(0)?;
    let inner = captures.get(1)?;
    let inner_len = inner.as_str().chars().count();
    let text_start = from + whole.as_str()[..inner.start() - whole.start()].chars().count();
    let text_end = text_start + inner_len;
    let mut tr = state.tr();
    if text_end < to {
        tr.delete(text_end, to).ok()?;
    }
    if text_start > from {
        tr.delete(from, text_start).ok()?;
    }
    let ty = mark.mark_type();
    tr.add_mark(from, from + inner_len, mark).ok()?;
    tr.remove_stored_mark(ty);
    Some(tr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MarkSet;
    use crate::tests::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn type_at(state: &EditorState, text: &str) -> Option<(&'static str, EditorState)> {
        handle_text_input(state, text).map(|(name, tr)| (name, state.apply(&tr).unwrap()))
    }

    #[rstest]
    #[case("#", 1)]
    #[case("###", 3)]
    fn test_hashes_make_heading(#[case] hashes: &str, #[case] level: u8) {
        let d = doc(vec![p(hashes)]);
        let state = state_at(d, 1 + hashes.len());
        let (name, next) = type_at(&state, " ").unwrap();
        assert_eq!(name, "heading");
        assert_eq!(next.doc(), &doc(vec![h(level, "")]));
    }

    #[test]
    fn test_too_many_hashes_do_nothing() {
        let state = state_at(doc(vec![p("#######")]), 8);
        assert!(handle_text_input(&state, " ").is_none());
    }

    #[test]
    fn test_backticks_make_code_block() {
        let state = state_at(doc(vec![p("```")]), 4);
        let (_, next) = type_at(&state, " ").unwrap();
        assert_eq!(next.doc(), &doc(vec![code_block("")]));
    }

    #[test]
    fn test_dash_wraps_in_bulleted_list() {
        let state = state_at(doc(vec![p("-")]), 2);
        let (name, next) = type_at(&state, " ").unwrap();
        assert_eq!(name, "bulleted_list");
        assert_eq!(next.doc(), &doc(vec![ul(vec![item("")])]));
        assert_eq!(next.selection().head(), 3);
    }

    #[test]
    fn test_quote_marker_wraps_in_blockquote() {
        let state = state_at(doc(vec![p(">")]), 2);
        let (_, next) = type_at(&state, " ").unwrap();
        assert_eq!(next.doc(), &doc(vec![blockquote(vec![p("")])]));
    }

    #[test]
    fn test_number_starts_ordered_list() {
        let state = state_at(doc(vec![p("3.")]), 3);
        let (_, next) = type_at(&state, " ").unwrap();
        assert_eq!(next.doc(), &doc(vec![ol_from(3, vec![item("")])]));
    }

    #[test]
    fn test_continued_numbering_joins_previous_list() {
        let d = doc(vec![ol(vec![item("a")]), p("2.")]);
        let state = state_at(d.clone(), d.content_size() - 1);
        let (_, next) = type_at(&state, " ").unwrap();
        assert_eq!(next.doc(), &doc(vec![ol(vec![item("a"), item("")])]));
    }

    #[test]
    fn test_restarted_numbering_keeps_lists_apart() {
        let d = doc(vec![ol(vec![item("a")]), p("1.")]);
        let state = state_at(d.clone(), d.content_size() - 1);
        let (_, next) = type_at(&state, " ").unwrap();
        assert_eq!(next.doc(), &doc(vec![ol(vec![item("a")]), ol(vec![item("")])]));
    }

    #[test]
    fn test_double_asterisks_make_bold() {
        let state = state_at(doc(vec![p("a **b*")]), 7);
        let (name, next) = type_at(&state, "*").unwrap();
        assert_eq!(name, "bold");
        assert_eq!(next.doc(), &doc(vec![p_with(vec![txt("a "), bold("b")])]));
        assert_eq!(next.stored_marks(), Some(&MarkSet::empty()));
    }

    #[test]
    fn test_backticks_make_inline_code() {
        let state = state_at(doc(vec![p("`x")]), 3);
        let (_, next) = type_at(&state, "`").unwrap();
        assert_eq!(next.doc(), &doc(vec![p_with(vec![code("x")])]));
    }

    #[test]
    fn test_rules_ignore_code_blocks() {
        let state = state_at(doc(vec![code_block("#")]), 2);
        assert!(handle_text_input(&state, " ").is_none());
    }

    #[test]
    fn test_plain_text_does_not_fire() {
        let state = state_at(doc(vec![p("ab")]), 3);
        assert!(handle_text_input(&state, "c").is_none());
    }
}
