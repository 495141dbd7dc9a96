//! Resolves a [`SelectionFilter`] against the registry into a [`GroupedPlan`].

use tracing::debug;

use drover_core::{GroupId, MigrationId};

use crate::config::FilterSemantics;
use crate::error::SelectionError;
use crate::filter::SelectionFilter;
use crate::migration::{MigrationDefinition, MigrationHandle};
use crate::plan::GroupedPlan;
use crate::registry::MigrationRegistry;

/// Filterable property of a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Property {
    Group,
    Tags,
}

impl Property {
    fn values(self, definition: &MigrationDefinition) -> Vec<&str> {
        match self {
            Property::Group => vec![definition.group.as_str()],
            Property::Tags => definition.tags.iter().map(String::as_str).collect(),
        }
    }
}

/// A single requested value matches when it is blank, present on the
/// migration, or the implicit `"default"` value.
fn value_matches(search: &str, configured: &[&str]) -> bool {
    search.is_empty() || configured.contains(&search) || search == GroupId::DEFAULT
}

fn property_matches(
    property: Property,
    values: &[String],
    definition: &MigrationDefinition,
) -> bool {
    if values.is_empty() {
        return true;
    }
    let configured = property.values(definition);
    values.iter().any(|v| value_matches(v, &configured))
}

/// Turns filters into plans.
pub struct Selector<'a, R: MigrationRegistry + ?Sized> {
    registry: &'a R,
    semantics: FilterSemantics,
}

impl<'a, R: MigrationRegistry + ?Sized> Selector<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self {
            registry,
            semantics: FilterSemantics::default(),
        }
    }

    pub fn with_semantics(mut self, semantics: FilterSemantics) -> Self {
        self.semantics = semantics;
        self
    }

    /// Resolve `filter` into a grouped plan.
    ///
    /// Fails with [`SelectionError::NoCriteria`] when the filter is empty.
    /// Zero matches is not an error here: the plan is simply empty.
    pub fn select(&self, filter: &SelectionFilter) -> Result<GroupedPlan, SelectionError> {
        if !filter.has_criteria() {
            return Err(SelectionError::NoCriteria);
        }

        let candidates = self.registry.create_instances(&filter.ids)?;
        let unmatched = unmatched_ids(&filter.ids, &candidates);
        if !unmatched.is_empty() {
            debug!(unmatched = ?unmatched, "requested migrations not found");
        }

        let selected = match self.semantics {
            FilterSemantics::Sequential => filter_sequential(filter, candidates),
            FilterSemantics::Intersection => filter_intersection(filter, candidates),
        };

        let plan = GroupedPlan::from_handles(selected).with_unmatched(unmatched);
        debug!(
            migrations = plan.len(),
            groups = plan.groups().len(),
            "selection resolved"
        );
        Ok(plan)
    }
}

fn unmatched_ids(requested: &[MigrationId], found: &[MigrationHandle]) -> Vec<MigrationId> {
    let found: Vec<MigrationId> = found.iter().map(|m| m.id()).collect();
    let mut unmatched: Vec<MigrationId> = Vec::new();
    for id in requested {
        if !found.contains(id) && !unmatched.contains(id) {
            unmatched.push(id.clone());
        }
    }
    unmatched
}

/// Group pass, then tag pass over what the group pass kept. An explicitly
/// named id is kept by every pass.
fn filter_sequential(
    filter: &SelectionFilter,
    candidates: Vec<MigrationHandle>,
) -> Vec<MigrationHandle> {
    if filter.groups.is_empty() && filter.tags.is_empty() {
        return candidates;
    }

    let mut matched: Vec<(MigrationDefinition, MigrationHandle)> = candidates
        .into_iter()
        .map(|m| (m.definition(), m))
        .collect();

    for (property, values) in [(Property::Group, &filter.groups), (Property::Tags, &filter.tags)] {
        if values.is_empty() {
            continue;
        }
        matched.retain(|(definition, _)| {
            property_matches(property, values, definition) || filter.names(&definition.id)
        });
    }

    matched.into_iter().map(|(_, m)| m).collect()
}

/// Every non-empty dimension must match; explicit ids get no escape.
fn filter_intersection(
    filter: &SelectionFilter,
    candidates: Vec<MigrationHandle>,
) -> Vec<MigrationHandle> {
    candidates
        .into_iter()
        .filter(|m| {
            let definition = m.definition();
            property_matches(Property::Group, &filter.groups, &definition)
                && property_matches(Property::Tags, &filter.tags, &definition)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use proptest::prelude::*;

    use crate::memory::InMemoryMigration;
    use crate::registry::InMemoryRegistry;

    fn id(s: &str) -> MigrationId {
        MigrationId::new(s).unwrap()
    }

    fn add(registry: &InMemoryRegistry, name: &str, group: Option<&str>, tags: &[&str]) {
        let mut m = InMemoryMigration::new(id(name)).with_tags(tags.iter().copied());
        if let Some(g) = group {
            m = m.with_group(GroupId::new(g).unwrap());
        }
        registry.register(Arc::new(m)).unwrap();
    }

    /// a(g1, [x]), b(g2, [y]), c(default, []), d(g1, [x, y])
    fn fixture() -> InMemoryRegistry {
        let registry = InMemoryRegistry::new();
        add(&registry, "a", Some("g1"), &["x"]);
        add(&registry, "b", Some("g2"), &["y"]);
        add(&registry, "c", None, &[]);
        add(&registry, "d", Some("g1"), &["x", "y"]);
        registry
    }

    fn selected(plan: &GroupedPlan) -> Vec<String> {
        plan.entries().map(|e| e.id.to_string()).collect()
    }

    #[test]
    fn empty_filter_is_a_usage_error() {
        let registry = fixture();
        let err = Selector::new(&registry)
            .select(&SelectionFilter::new())
            .unwrap_err();
        assert_eq!(err, SelectionError::NoCriteria);
    }

    #[test]
    fn all_groups_every_migration() {
        let registry = fixture();
        let plan = Selector::new(&registry)
            .select(&SelectionFilter::all())
            .unwrap();

        let groups: Vec<_> = plan.groups().iter().map(|g| g.group.to_string()).collect();
        assert_eq!(groups, ["g1", "g2", "default"]);
        assert_eq!(plan.group(&GroupId::new("g1").unwrap()).unwrap().ids(), [id("a"), id("d")]);
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn ids_restrict_and_drop_unknowns() {
        let registry = fixture();
        let filter = SelectionFilter::ids([id("A"), id("b"), id("z")]);
        let plan = Selector::new(&registry).select(&filter).unwrap();

        assert_eq!(selected(&plan), ["a", "b"]);
        assert_eq!(plan.unmatched_ids(), [id("z")]);
    }

    #[test]
    fn group_and_tag_filters_apply_in_sequence() {
        let registry = fixture();
        let selector = Selector::new(&registry);

        let plan = selector
            .select(&SelectionFilter::all().with_groups(["g1"]))
            .unwrap();
        assert_eq!(selected(&plan), ["a", "d"]);

        let plan = selector
            .select(&SelectionFilter::all().with_groups(["g1"]).with_tags(["y"]))
            .unwrap();
        assert_eq!(selected(&plan), ["d"]);

        let plan = selector
            .select(&SelectionFilter::all().with_tags(["y"]))
            .unwrap();
        assert_eq!(selected(&plan), ["b", "d"]);
    }

    #[test]
    fn explicit_id_escapes_group_and_tag_filters() {
        let registry = fixture();
        let filter = SelectionFilter::ids([id("b"), id("c")]).with_groups(["g1"]);
        let plan = Selector::new(&registry).select(&filter).unwrap();

        assert_eq!(selected(&plan), ["b", "c"]);
    }

    #[test]
    fn intersection_mode_gives_ids_no_escape() {
        let registry = fixture();
        let filter = SelectionFilter::ids([id("a"), id("b")]).with_groups(["g1"]);
        let plan = Selector::new(&registry)
            .with_semantics(FilterSemantics::Intersection)
            .select(&filter)
            .unwrap();

        assert_eq!(selected(&plan), ["a"]);
    }

    #[test]
    fn default_pseudo_value_and_blank_values_match_everything() {
        let registry = fixture();
        let selector = Selector::new(&registry);

        let plan = selector
            .select(&SelectionFilter::all().with_tags(["default"]))
            .unwrap();
        assert_eq!(plan.len(), 4);

        let plan = selector
            .select(&SelectionFilter::all().with_groups([""]))
            .unwrap();
        assert_eq!(plan.len(), 4);

        let plan = selector
            .select(&SelectionFilter::all().with_groups(["default"]))
            .unwrap();
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn zero_matches_is_an_empty_plan() {
        let registry = fixture();
        let plan = Selector::new(&registry)
            .select(&SelectionFilter::all().with_groups(["nope"]))
            .unwrap();
        assert!(plan.is_empty());
    }

    fn arb_registry() -> impl Strategy<Value = Vec<(Option<u8>, Vec<u8>)>> {
        prop::collection::vec(
            (prop::option::of(0u8..3), prop::collection::vec(0u8..3, 0..3)),
            1..12,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: every selected migration satisfies the filter, per-group
        /// order follows registry order, and named ids are always kept.
        #[test]
        fn plan_respects_filter_and_registry_order(
            jobs in arb_registry(),
            group in prop::option::of(0u8..3),
            tag in prop::option::of(0u8..3),
            named in prop::collection::vec(0usize..12, 0..3),
        ) {
            let registry = InMemoryRegistry::new();
            let mut order = Vec::new();
            for (i, (g, tags)) in jobs.iter().enumerate() {
                let name = format!("m{i}");
                let group_name = g.map(|g| format!("g{g}"));
                let tag_names: Vec<String> = tags.iter().map(|t| format!("t{t}")).collect();
                let tag_refs: Vec<&str> = tag_names.iter().map(String::as_str).collect();
                add(&registry, &name, group_name.as_deref(), &tag_refs);
                order.push(name);
            }

            let named_ids: Vec<MigrationId> = named
                .iter()
                .filter(|i| **i < jobs.len())
                .map(|i| id(&format!("m{i}")))
                .collect();
            let mut filter = SelectionFilter::ids(named_ids.clone()).with_all(true);
            if let Some(g) = group {
                filter = filter.with_groups([format!("g{g}")]);
            }
            if let Some(t) = tag {
                filter = filter.with_tags([format!("t{t}")]);
            }

            let plan = Selector::new(&registry).select(&filter).unwrap();

            for entry in plan.entries() {
                let def = entry.migration.definition();
                let is_named = filter.names(&def.id);
                if !named_ids.is_empty() {
                    prop_assert!(is_named);
                }
                if !is_named {
                    if let Some(g) = group {
                        let group_name = format!("g{g}");
                        prop_assert_eq!(def.group.as_str(), group_name.as_str());
                    }
                    if let Some(t) = tag {
                        let tag_name = format!("t{t}");
                        prop_assert!(def.has_tag(&tag_name));
                    }
                }
            }

            for named in &named_ids {
                prop_assert!(plan.contains(named));
            }

            for group in plan.groups() {
                let positions: Vec<usize> = group
                    .entries
                    .iter()
                    .map(|e| order.iter().position(|n| n == e.id.as_str()).unwrap())
                    .collect();
                prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }
}
