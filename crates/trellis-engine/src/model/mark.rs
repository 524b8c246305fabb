use serde::{Deserialize, Serialize};
use std::fmt;

/// Mark types in rank order. A mark set is always sorted by rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkType {
    Link,
    Italic,
    Bold,
    Code,
}

impl MarkType {
    pub fn name(self) -> &'static str {
        match self {
            MarkType::Link => "link",
            MarkType::Italic => "italic",
            MarkType::Bold => "bold",
            MarkType::Code => "code",
        }
    }

    /// Whether typing at the end of a marked range continues the mark.
    pub fn inclusive(self) -> bool {
        !matches!(self, MarkType::Link)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mark {
    Link {
        href: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Italic,
    Bold,
    Code,
}

impl Mark {
    pub fn mark_type(&self) -> MarkType {
        match self {
            Mark::Link { .. } => MarkType::Link,
            Mark::Italic => MarkType::Italic,
            Mark::Bold => MarkType::Bold,
            Mark::Code => MarkType::Code,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mark_type().name())
    }
}

/// An ordered set of marks holding at most one mark per type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkSet(Vec<Mark>);

impl MarkSet {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn from_marks(marks: impl IntoIterator<Item = Mark>) -> Self {
        marks.into_iter().fold(Self::empty(), |set, mark| set.add(&mark))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mark> {
        self.0.iter()
    }

    /// Adds `mark`, replacing any mark of the same type.
    pub fn add(&self, mark: &Mark) -> Self {
        let mut marks: Vec<Mark> = self
            .0
            .iter()
            .filter(|m| m.mark_type() != mark.mark_type())
            .cloned()
            .collect();
        let at = marks
            .iter()
            .position(|m| m.mark_type() > mark.mark_type())
            .unwrap_or(marks.len());
        marks.insert(at, mark.clone());
        Self(marks)
    }

    pub fn remove(&self, mark: &Mark) -> Self {
        Self(self.0.iter().filter(|m| *m != mark).cloned().collect())
    }

    pub fn remove_type(&self, ty: MarkType) -> Self {
        Self(self.0.iter().filter(|m| m.mark_type() != ty).cloned().collect())
    }

    pub fn contains(&self, mark: &Mark) -> bool {
        self.0.contains(mark)
    }

    pub fn find(&self, ty: MarkType) -> Option<&Mark> {
        self.0.iter().find(|m| m.mark_type() == ty)
    }
}
