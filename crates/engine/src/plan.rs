//! Grouped execution plans produced by the selector.

use drover_core::{GroupId, MigrationId};

use crate::migration::MigrationHandle;

/// One selected migration.
#[derive(Clone)]
pub struct PlanEntry {
    pub id: MigrationId,
    pub migration: MigrationHandle,
}

impl std::fmt::Debug for PlanEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanEntry").field("id", &self.id).finish()
    }
}

/// Selected migrations of one group, in registry order.
#[derive(Debug, Clone)]
pub struct PlanGroup {
    pub group: GroupId,
    pub entries: Vec<PlanEntry>,
}

impl PlanGroup {
    pub fn ids(&self) -> Vec<MigrationId> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }
}

/// Ordered mapping from group to selected migrations.
#[derive(Debug, Clone, Default)]
pub struct GroupedPlan {
    groups: Vec<PlanGroup>,
    unmatched: Vec<MigrationId>,
}

impl GroupedPlan {
    /// Group handles by their group, keeping first-seen group order and the
    /// input order within each group.
    pub fn from_handles(handles: impl IntoIterator<Item = MigrationHandle>) -> Self {
        let mut groups: Vec<PlanGroup> = Vec::new();

        for migration in handles {
            let definition = migration.definition();
            let entry = PlanEntry {
                id: definition.id,
                migration,
            };
            match groups.iter_mut().find(|g| g.group == definition.group) {
                Some(group) => group.entries.push(entry),
                None => groups.push(PlanGroup {
                    group: definition.group,
                    entries: vec![entry],
                }),
            }
        }

        Self {
            groups,
            unmatched: Vec::new(),
        }
    }

    /// Record explicitly requested ids that matched nothing.
    pub fn with_unmatched(mut self, unmatched: Vec<MigrationId>) -> Self {
        self.unmatched = unmatched;
        self
    }

    pub fn groups(&self) -> &[PlanGroup] {
        &self.groups
    }

    pub fn group(&self, group: &GroupId) -> Option<&PlanGroup> {
        self.groups.iter().find(|g| &g.group == group)
    }

    /// All entries in execution order.
    pub fn entries(&self) -> impl Iterator<Item = &PlanEntry> {
        self.groups.iter().flat_map(|g| g.entries.iter())
    }

    /// Entries in rollback order: groups in plan order, each group reversed.
    pub fn rollback_entries(&self) -> impl Iterator<Item = &PlanEntry> {
        self.groups.iter().flat_map(|g| g.entries.iter().rev())
    }

    pub fn unmatched_ids(&self) -> &[MigrationId] {
        &self.unmatched
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &MigrationId) -> bool {
        self.entries().any(|e| &e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::memory::InMemoryMigration;

    fn handle(id: &str, group: Option<&str>) -> MigrationHandle {
        let mut m = InMemoryMigration::new(MigrationId::new(id).unwrap());
        if let Some(g) = group {
            m = m.with_group(GroupId::new(g).unwrap());
        }
        Arc::new(m)
    }

    fn names<'a>(entries: impl Iterator<Item = &'a PlanEntry>) -> Vec<String> {
        entries.map(|e| e.id.to_string()).collect()
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let plan = GroupedPlan::from_handles([
            handle("a", Some("g2")),
            handle("b", None),
            handle("c", Some("g2")),
            handle("d", Some("g1")),
        ]);

        let groups: Vec<_> = plan.groups().iter().map(|g| g.group.to_string()).collect();
        assert_eq!(groups, ["g2", "default", "g1"]);
        assert_eq!(names(plan.entries()), ["a", "c", "b", "d"]);
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn rollback_order_reverses_each_group_only() {
        let plan = GroupedPlan::from_handles([
            handle("a", Some("g1")),
            handle("b", Some("g1")),
            handle("c", Some("g1")),
            handle("x", Some("g2")),
            handle("y", Some("g2")),
        ]);

        assert_eq!(names(plan.rollback_entries()), ["c", "b", "a", "y", "x"]);
        // canonical order untouched
        assert_eq!(names(plan.entries()), ["a", "b", "c", "x", "y"]);
    }
}
