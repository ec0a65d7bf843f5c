//! Shared domain enumerations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Entity kinds that own a cached snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Site,
    Review,
    Comment,
    Article,
    Share,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::User,
        EntityKind::Site,
        EntityKind::Review,
        EntityKind::Comment,
        EntityKind::Article,
        EntityKind::Share,
    ];

    /// Name used inside cache keys.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Site => "site",
            EntityKind::Review => "review",
            EntityKind::Comment => "comment",
            EntityKind::Article => "article",
            EntityKind::Share => "share",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entity addressed by kind and id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }

    pub fn user(id: i64) -> Self {
        Self::new(EntityKind::User, id)
    }

    pub fn site(id: i64) -> Self {
        Self::new(EntityKind::Site, id)
    }

    pub fn review(id: i64) -> Self {
        Self::new(EntityKind::Review, id)
    }

    pub fn article(id: i64) -> Self {
        Self::new(EntityKind::Article, id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Tri-state filter over the review `selected` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    #[default]
    Any,
    Selected,
    Unselected,
}

impl Selection {
    pub const ALL: [Selection; 3] = [Selection::Any, Selection::Selected, Selection::Unselected];

    pub fn as_str(self) -> &'static str {
        match self {
            Selection::Any => "any",
            Selection::Selected => "yes",
            Selection::Unselected => "no",
        }
    }

    /// Returns true when a review with the given flag belongs to the selection.
    pub fn admits(self, selected: bool) -> bool {
        match self {
            Selection::Any => true,
            Selection::Selected => selected,
            Selection::Unselected => !selected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_parses_case_insensitively() {
        assert_eq!(EntityKind::parse("Site"), Some(EntityKind::Site));
        assert_eq!(EntityKind::parse(" review "), Some(EntityKind::Review));
        assert_eq!(EntityKind::parse("brand"), None);
    }

    #[test]
    fn selection_admits() {
        assert!(Selection::Any.admits(true));
        assert!(Selection::Any.admits(false));
        assert!(Selection::Selected.admits(true));
        assert!(!Selection::Selected.admits(false));
        assert!(Selection::Unselected.admits(false));
        assert!(!Selection::Unselected.admits(true));
    }
}
