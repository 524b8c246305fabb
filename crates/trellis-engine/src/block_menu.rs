//! The slash-command block menu.
//!
//! Typing `/` into an otherwise empty top-level paragraph opens a menu of
//! block types; the text after the slash filters it. The paragraph is the
//! trigger: while its whole text still reads `/query` the menu stays
//! open, and executing an item replaces the paragraph with the chosen
//! block.
//!
//! Dismissing the menu remembers the trigger range as an ignored
//! [`Decoration`] so the same text does not reopen it. The ignored range
//! moves with edits elsewhere and is forgotten once its own text is
//! edited.

use std::sync::LazyLock;

use log::debug;
use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::decoration::{Decoration, DecorationSet, DecorationTag};
use crate::model::{Fragment, NodeKind, NodeType};
use crate::state::{Direction, EditorState, Selection, Transaction};
use crate::transform::Mapping;

static TRIGGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/((?-u:\w)*)$").expect("valid trigger pattern"));

/// The paragraph currently being typed as a slash command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlashMatch {
    /// Text after the slash.
    pub query: String,
    /// Whole paragraph text, slash included.
    pub text: String,
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub label: &'static str,
    pub description: &'static str,
    pub kind: NodeKind,
}

impl MenuItem {
    /// Case-insensitive fuzzy match: the query's characters appear in
    /// order in the label or the description.
    pub fn matches(&self, query: &str) -> bool {
        let pattern: String = query
            .chars()
            .map(|c| regex::escape(c.encode_utf8(&mut [0; 4])))
            .collect::<Vec<_>>()
            .join(".*");
        match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(fuzzy) => fuzzy.is_match(self.label) || fuzzy.is_match(self.description),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuGroup {
    pub label: &'static str,
    pub items: Vec<MenuItem>,
}

pub fn default_menu() -> Vec<MenuGroup> {
    let item = |label, description, kind| MenuItem {
        label,
        description,
        kind,
    };
    vec![MenuGroup {
        label: "Basic",
        items: vec![
            item("Heading 1", "Big section heading", NodeKind::Heading { level: 1 }),
            item("Heading 2", "Medium section heading", NodeKind::Heading { level: 2 }),
            item("Heading 3", "Small section heading", NodeKind::Heading { level: 3 }),
            item("Blockquote", "Quote content", NodeKind::Blockquote),
            item("Code", "Source code snippet", NodeKind::CodeBlock { lang: None }),
            item("Image", "Image with caption", NodeKind::Figure { image: None }),
            item("Divider", "Horizontal rule", NodeKind::HorizontalRule),
        ],
    }]
}

/// The trigger under the cursor, unless the cursor is elsewhere or the
/// trigger was dismissed.
pub fn find_match(state: &EditorState, ignored: &DecorationSet) -> Option<SlashMatch> {
    let cursor = state.selection().as_cursor()?;
    if cursor.depth() != 1 || cursor.parent().node_type() != NodeType::Paragraph {
        return None;
    }
    let (from, to) = (cursor.start(1), cursor.end(1));
    if !ignored.find(from, to).is_empty() {
        return None;
    }
    let text = state.doc().text_between(from, to, "", "");
    let query = TRIGGER.captures(&text)?.get(1)?.as_str().to_string();
    Some(SlashMatch { query, text, from, to })
}

/// Replaces the textblock around the cursor with a fresh block of `kind`
/// and puts the cursor at its start.
pub fn add_block_type(state: &EditorState, kind: &NodeKind) -> Option<Transaction> {
    let cursor = state.selection().as_cursor()?;
    let depth = cursor.depth();
    if depth == 0 {
        return None;
    }
    let block = kind.clone().create_and_fill(Fragment::empty())?;
    let mut tr = state.tr();
    tr.replace_with(cursor.before(depth), cursor.after(depth), block).ok()?;
    let start = tr.doc().resolve(cursor.start(depth)).ok()?;
    tr.set_selection(Selection::near(&start, Direction::Forward));
    Some(tr)
}

/// Menu state carried between transactions.
#[derive(Debug, Clone)]
pub struct BlockMenu {
    groups: Vec<MenuGroup>,
    ignored: DecorationSet,
    active: Option<SlashMatch>,
    /// `(group, item)` indices of the items passing the current query.
    visible: Vec<(usize, usize)>,
    selected: Option<usize>,
}

impl Default for BlockMenu {
    fn default() -> Self {
        Self::new(default_menu())
    }
}

impl BlockMenu {
    pub fn new(groups: Vec<MenuGroup>) -> Self {
        Self {
            groups,
            ignored: DecorationSet::empty(),
            active: None,
            visible: Vec::new(),
            selected: None,
        }
    }

    /// Brings the menu up to date with a state produced by a transaction
    /// with `mapping`.
    pub fn apply(&mut self, mapping: &Mapping, state: &EditorState) {
        self.ignored = self.ignored.map(mapping);
        self.update(state);
    }

    /// Recomputes the match against `state` without mapping anything.
    pub fn update(&mut self, state: &EditorState) {
        let next = find_match(state, &self.ignored);
        match &next {
            Some(found) => {
                let query_changed = self.active.as_ref().is_none_or(|m| m.query != found.query);
                if query_changed {
                    debug!("block menu query {:?}", found.query);
                    self.visible = self.filter(&found.query);
                }
                self.selected = (!self.visible.is_empty()).then_some(0);
            }
            None => {
                self.visible.clear();
                self.selected = None;
            }
        }
        self.active = next;
    }

    fn filter(&self, query: &str) -> Vec<(usize, usize)> {
        let mut visible = Vec::new();
        for (g, group) in self.groups.iter().enumerate() {
            for (i, item) in group.items.iter().enumerate() {
                if query.is_empty() || item.matches(query) {
                    visible.push((g, i));
                }
            }
        }
        visible
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn current_match(&self) -> Option<&SlashMatch> {
        self.active.as_ref()
    }

    /// Items passing the current query, grouped, in menu order. Groups
    /// with no matching item are left out.
    pub fn visible_groups(&self) -> Vec<(&'static str, Vec<&MenuItem>)> {
        let mut groups: Vec<(&'static str, Vec<&MenuItem>)> = Vec::new();
        for &(g, i) in &self.visible {
            let group = &self.groups[g];
            let item = &group.items[i];
            match groups.last_mut() {
                Some((label, items)) if *label == group.label => items.push(item),
                _ => groups.push((group.label, vec![item])),
            }
        }
        groups
    }

    pub fn items(&self) -> Vec<&MenuItem> {
        self.visible.iter().map(|&(g, i)| &self.groups[g].items[i]).collect()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_item(&self) -> Option<&MenuItem> {
        let (g, i) = *self.visible.get(self.selected?)?;
        Some(&self.groups[g].items[i])
    }

    pub fn select_next(&mut self) {
        if let Some(index) = self.selected {
            self.selected = Some(if index + 1 < self.visible.len() { index + 1 } else { 0 });
        }
    }

    pub fn select_prev(&mut self) {
        if let Some(index) = self.selected {
            self.selected = Some(if index > 0 { index - 1 } else { self.visible.len() - 1 });
        }
    }

    /// The transaction turning the trigger paragraph into the selected
    /// block type.
    pub fn execute_selected(&self, state: &EditorState) -> Option<Transaction> {
        self.active.as_ref()?;
        add_block_type(state, &self.selected_item()?.kind)
    }

    /// Closes the menu and ignores the current trigger until it is edited.
    pub fn dismiss(&mut self) -> bool {
        let Some(found) = self.active.take() else {
            return false;
        };
        self.ignored = self
            .ignored
            .add(Decoration::new(found.from, found.to, DecorationTag::Ignored));
        self.visible.clear();
        self.selected = None;
        true
    }

    pub fn ignored(&self) -> &DecorationSet {
        &self.ignored
    }

    /// Ignored ranges plus the active trigger.
    pub fn decorations(&self) -> DecorationSet {
        match &self.active {
            Some(found) => self
                .ignored
                .add(Decoration::new(found.from, found.to, DecorationTag::SlashMatch)),
            None => self.ignored.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn labels(menu: &BlockMenu) -> Vec<&'static str> {
        menu.items().iter().map(|item| item.label).collect()
    }

    #[rstest]
    #[case("/", Some(""))]
    #[case("/head", Some("head"))]
    #[case("/two words", None)]
    #[case("x/", None)]
    #[case("/é", None)]
    fn test_find_match_requires_whole_paragraph(#[case] text: &str, #[case] query: Option<&str>) {
        let d = doc(vec![p(text)]);
        let end = 1 + text.chars().count();
        let found = find_match(&state_at(d, end), &DecorationSet::empty());
        assert_eq!(found.as_ref().map(|m| m.query.as_str()), query);
        if let Some(found) = found {
            assert_eq!((found.from, found.to), (1, end));
            assert_eq!(found.text, text);
        }
    }

    #[test]
    fn test_find_match_only_in_top_level_paragraphs() {
        let d = doc(vec![blockquote(vec![p("/h")])]);
        assert_eq!(find_match(&state_at(d, 4), &DecorationSet::empty()), None);
        let d = doc(vec![h(1, "/h")]);
        assert_eq!(find_match(&state_at(d, 3), &DecorationSet::empty()), None);
    }

    #[rstest]
    #[case("", 7)]
    #[case("h1", 1)]
    #[case("HEAD", 3)]
    #[case("quote", 1)]
    #[case("rule", 1)]
    #[case("zzz", 0)]
    fn test_menu_filters_by_fuzzy_query(#[case] query: &str, #[case] count: usize) {
        let d = doc(vec![p(&format!("/{query}"))]);
        let mut menu = BlockMenu::default();
        menu.update(&state_at(d.clone(), d.content_size() - 1));
        assert!(menu.is_active());
        assert_eq!(menu.items().len(), count);
        assert_eq!(menu.selected_index(), (count > 0).then_some(0));
    }

    #[test]
    fn test_selection_wraps_around() {
        let d = doc(vec![p("/head")]);
        let mut menu = BlockMenu::default();
        menu.update(&state_at(d, 6));
        assert_eq!(labels(&menu), ["Heading 1", "Heading 2", "Heading 3"]);
        menu.select_prev();
        assert_eq!(menu.selected_item().map(|i| i.label), Some("Heading 3"));
        menu.select_next();
        assert_eq!(menu.selected_index(), Some(0));
        menu.select_next();
        assert_eq!(menu.selected_item().map(|i| i.label), Some("Heading 2"));
    }

    #[test]
    fn test_execute_replaces_trigger_paragraph() {
        let d = doc(vec![p("a"), p("/h2")]);
        let state = state_at(d.clone(), d.content_size() - 1);
        let mut menu = BlockMenu::default();
        menu.update(&state);
        assert_eq!(menu.selected_item().map(|i| i.label), Some("Heading 2"));
        let next = state.apply(&menu.execute_selected(&state).unwrap()).unwrap();
        assert_eq!(next.doc(), &doc(vec![p("a"), h(2, "")]));
        assert_eq!(next.selection().head(), 4);
    }

    #[test]
    fn test_add_divider_moves_cursor_past_rule() {
        let d = doc(vec![p("/"), p("b")]);
        let state = state_at(d, 2);
        let tr = add_block_type(&state, &NodeKind::HorizontalRule).unwrap();
        let next = state.apply(&tr).unwrap();
        assert_eq!(next.doc(), &doc(vec![hr(), p("b")]));
        assert_eq!(next.selection().head(), 2);
    }

    #[test]
    fn test_dismissed_trigger_stays_ignored_after_other_edits() {
        let d = doc(vec![p("a"), p("/x")]);
        let state = state_at(d.clone(), d.content_size() - 1);
        let mut menu = BlockMenu::default();
        menu.update(&state);
        assert!(menu.dismiss());
        assert!(!menu.is_active());

        let mut tr = state.tr();
        tr.insert(1, txt("zz")).unwrap();
        let next = state.apply(&tr).unwrap();
        menu.apply(tr.mapping(), &next);
        assert!(!menu.is_active());
        let ignored: Vec<_> = menu.ignored().iter().collect();
        assert_eq!(ignored, vec![&Decoration::new(6, 8, DecorationTag::Ignored)]);
        assert_eq!(next.doc().text_between(6, 8, "", ""), "/x");
    }

    #[test]
    fn test_editing_ignored_trigger_reopens_menu() {
        let d = doc(vec![p("/xy")]);
        let state = state_at(d, 4);
        let mut menu = BlockMenu::default();
        menu.update(&state);
        menu.dismiss();

        let mut tr = state.tr();
        tr.delete(3, 4).unwrap();
        let next = state.apply(&tr).unwrap();
        menu.apply(tr.mapping(), &next);
        assert!(menu.ignored().is_empty());
        assert_eq!(menu.current_match().map(|m| m.query.as_str()), Some("x"));
    }

    #[test]
    fn test_decorations_include_active_match() {
        let d = doc(vec![p("/")]);
        let mut menu = BlockMenu::default();
        menu.update(&state_at(d, 2));
        let decorations: Vec<_> = menu.decorations().iter().cloned().collect();
        assert_eq!(decorations, vec![Decoration::new(1, 2, DecorationTag::SlashMatch)]);
    }
}
