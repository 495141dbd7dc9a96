//! Selection filters.

use serde::{Deserialize, Serialize};

use drover_core::MigrationId;

/// What the caller asked to operate on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionFilter {
    /// Explicitly named migrations (compared case-insensitively).
    pub ids: Vec<MigrationId>,
    /// Group values; an empty string matches every group.
    pub groups: Vec<String>,
    /// Tag values; an empty string matches every migration.
    pub tags: Vec<String>,
    /// No id restriction.
    pub all: bool,
}

impl SelectionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every migration in the registry.
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    pub fn ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = MigrationId>,
    {
        Self {
            ids: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Build a filter from comma-separated option values.
    ///
    /// Blank entries in the id list are dropped; blank group/tag entries are
    /// kept because they act as match-anything values.
    pub fn from_lists(
        migration_ids: Option<&str>,
        group: Option<&str>,
        tag: Option<&str>,
        all: bool,
    ) -> Self {
        Self {
            ids: split_list(migration_ids)
                .into_iter()
                .filter_map(|id| MigrationId::new(id).ok())
                .collect(),
            groups: split_list(group),
            tags: split_list(tag),
            all,
        }
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }

    /// False when no ids, groups, tags or `all` were given.
    pub fn has_criteria(&self) -> bool {
        self.all || !self.ids.is_empty() || !self.groups.is_empty() || !self.tags.is_empty()
    }

    /// True when `id` was explicitly requested.
    pub fn names(&self, id: &MigrationId) -> bool {
        self.ids.contains(id)
    }
}

/// Split a comma-separated option value. Missing or empty input yields no values.
pub fn split_list(value: Option<&str>) -> Vec<String> {
    match value {
        Some(v) if !v.is_empty() => v.split(',').map(|s| s.trim().to_string()).collect(),
        _ => Vec::new(),
    }
}
