//! Drives a [`GroupedPlan`] through a lifecycle operation.
//!
//! Execution is sequential: groups in plan order, migrations in group order.
//! Every job-level failure is caught at the job boundary, logged with a
//! remediation hint, recorded in the report, and the loop moves on.

use std::collections::HashSet;

use tracing::{debug, error, info, info_span, warn};

use drover_core::{MigrationId, MigrationStatus, ResultCode};

use crate::config::{DependencyMode, EngineConfig};
use crate::error::{ExecutionFailure, JobExecutionError};
use crate::migration::{MigrationDefinition, MigrationHandle};
use crate::options::ExecutionOptions;
use crate::plan::GroupedPlan;
use crate::registry::MigrationRegistry;
use crate::report::{
    ExecutionEntry, ExecutionReport, Notice, NoticeReport, Operation, OperationReport, RowCount,
    RunId, StatusGroup, StatusReport, StatusRow,
};

/// Mutable state of one import run.
struct ImportRun {
    report: ExecutionReport,
    /// Migrations currently being resolved, outermost first.
    resolving: Vec<MigrationId>,
    /// Dependencies already executed in this run.
    attempted: HashSet<MigrationId>,
}

impl ImportRun {
    fn new() -> Self {
        Self {
            report: ExecutionReport::new(RunId::new(), Operation::Import),
            resolving: Vec::new(),
            attempted: HashSet::new(),
        }
    }
}

/// Executes plans against an injected registry.
pub struct Orchestrator<'a, R: MigrationRegistry + ?Sized> {
    registry: &'a R,
    config: &'a EngineConfig,
}

impl<'a, R: MigrationRegistry + ?Sized> Orchestrator<'a, R> {
    pub fn new(registry: &'a R, config: &'a EngineConfig) -> Self {
        Self { registry, config }
    }

    /// Run `operation` over every migration in `plan`.
    pub fn run(
        &self,
        plan: &GroupedPlan,
        operation: Operation,
        options: &ExecutionOptions,
    ) -> OperationReport {
        match operation {
            Operation::Import => OperationReport::Execution(self.import(plan, options)),
            Operation::Rollback => OperationReport::Execution(self.rollback(plan, options)),
            Operation::Reset => OperationReport::Notices(self.reset(plan)),
            Operation::Stop => OperationReport::Notices(self.stop(plan)),
        }
    }

    /// Import each migration, optionally running its requirements first.
    pub fn import(&self, plan: &GroupedPlan, options: &ExecutionOptions) -> ExecutionReport {
        let options = self.config.apply_defaults(options);
        let mut run = ImportRun::new();

        let span = info_span!("import", run_id = %run.report.run_id);
        let _guard = span.enter();

        for group in plan.groups() {
            debug!(group = %group.group, migrations = group.entries.len(), "importing group");
            for entry in &group.entries {
                self.import_migration(&entry.migration, &options, &mut run);
            }
        }

        info!(
            succeeded = run.report.succeeded(),
            failed = run.report.failed(),
            "import finished"
        );
        run.report
    }

    /// Roll back each group in reverse order.
    pub fn rollback(&self, plan: &GroupedPlan, options: &ExecutionOptions) -> ExecutionReport {
        let options = self.config.apply_defaults(options);
        let mut report = ExecutionReport::new(RunId::new(), Operation::Rollback);

        let span = info_span!("rollback", run_id = %report.run_id);
        let _guard = span.enter();

        for entry in plan.rollback_entries() {
            let result = entry.migration.rollback(&options);
            record(&mut report, entry.id.clone(), Operation::Rollback, result);
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "rollback finished"
        );
        report
    }

    /// Force every selected migration back to `Idle`.
    ///
    /// Only the status flag changes; row-level progress is untouched.
    pub fn reset(&self, plan: &GroupedPlan) -> NoticeReport {
        let mut report = NoticeReport::new(Operation::Reset);

        for entry in plan.entries() {
            report.push(reset_migration(&entry.migration));
        }
        for id in plan.unmatched_ids() {
            warn!(migration_id = %id, "migration does not exist");
            report.push(Notice::not_found(id.clone()));
        }

        report
    }

    /// Ask every selected running migration to stop.
    pub fn stop(&self, plan: &GroupedPlan) -> NoticeReport {
        let mut report = NoticeReport::new(Operation::Stop);

        for entry in plan.entries() {
            report.push(stop_migration(&entry.migration));
        }
        for id in plan.unmatched_ids() {
            warn!(migration_id = %id, "migration does not exist");
            report.push(Notice::not_found(id.clone()));
        }

        report
    }

    /// Aggregate per-migration progress, grouped like the plan.
    pub fn status(&self, plan: &GroupedPlan) -> StatusReport {
        let groups = plan
            .groups()
            .iter()
            .map(|group| StatusGroup {
                group: group.group.clone(),
                label: self.registry.group_label(&group.group),
                rows: group
                    .entries
                    .iter()
                    .map(|e| status_row(&e.migration))
                    .collect(),
            })
            .collect();

        StatusReport { groups }
    }

    fn import_migration(
        &self,
        migration: &MigrationHandle,
        options: &ExecutionOptions,
        run: &mut ImportRun,
    ) {
        let id = migration.id();

        run.resolving.push(id.clone());
        let result = self.try_import(migration, options, run);
        run.resolving.pop();

        record(&mut run.report, id, Operation::Import, result);
    }

    fn try_import(
        &self,
        migration: &MigrationHandle,
        options: &ExecutionOptions,
        run: &mut ImportRun,
    ) -> Result<(), JobExecutionError> {
        let definition = migration.definition();

        let dependencies = if options.execute_dependencies {
            self.import_dependencies(&definition, options, run)
        } else {
            Ok(())
        };

        // Forced runs drop their requirements even when resolution failed.
        if options.force {
            migration.set_requirements(Vec::new());
        }
        dependencies?;
        if !options.force {
            self.check_requirements(&migration.definition())?;
        }

        if options.update {
            migration.id_map().prepare_update();
        }

        debug!(
            migration_id = %definition.id,
            is_dependency = options.is_dependency,
            "importing"
        );
        migration.import(options)
    }

    fn import_dependencies(
        &self,
        definition: &MigrationDefinition,
        options: &ExecutionOptions,
        run: &mut ImportRun,
    ) -> Result<(), JobExecutionError> {
        if definition.requirements.is_empty() {
            return Ok(());
        }
        let dependency_options = options.as_dependency();

        for dependency in self.dependencies_to_run(definition)? {
            let dependency_id = dependency.id();
            if run.resolving.contains(&dependency_id) {
                let mut path = run.resolving.clone();
                path.push(dependency_id);
                return Err(JobExecutionError::new(
                    definition.id.clone(),
                    ExecutionFailure::DependencyCycle(path),
                ));
            }
            if !run.attempted.insert(dependency_id.clone()) {
                continue;
            }

            debug!(
                migration_id = %definition.id,
                dependency = %dependency_id,
                "executing dependency first"
            );
            self.import_migration(&dependency, &dependency_options, run);
        }

        Ok(())
    }

    /// Requirements to import first, in declaration order.
    fn dependencies_to_run(
        &self,
        definition: &MigrationDefinition,
    ) -> Result<Vec<MigrationHandle>, JobExecutionError> {
        let instances = self
            .registry
            .create_instances(&definition.requirements)
            .map_err(|e| JobExecutionError::new(definition.id.clone(), e.into()))?;

        Ok(definition
            .requirements
            .iter()
            .filter_map(|required| instances.iter().find(|m| &m.id() == required).cloned())
            .filter(|m| match self.config.dependency_mode {
                DependencyMode::Unmet => !m.all_rows_processed(),
                DependencyMode::All => true,
            })
            .collect())
    }

    /// Every requirement must exist and have processed all its rows.
    fn check_requirements(
        &self,
        definition: &MigrationDefinition,
    ) -> Result<(), JobExecutionError> {
        let mut missing = Vec::new();

        for required in &definition.requirements {
            let found = self
                .registry
                .get(required)
                .map_err(|e| JobExecutionError::new(definition.id.clone(), e.into()))?;
            match found {
                Some(m) if m.all_rows_processed() => {}
                _ => missing.push(required.clone()),
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(JobExecutionError::new(
                definition.id.clone(),
                ExecutionFailure::RequirementsUnmet(missing),
            ))
        }
    }
}

/// Turn a job result into a report entry; failures are logged, never propagated.
fn record(
    report: &mut ExecutionReport,
    id: MigrationId,
    operation: Operation,
    result: Result<(), JobExecutionError>,
) {
    match result {
        Ok(()) => {
            let entry = ExecutionEntry::success(id, operation);
            info!(migration_id = ?entry.migration_id, "{}", entry.detail);
            report.push(entry);
        }
        Err(err) => {
            let entry = ExecutionEntry::failed(&err, operation);
            error!(
                migration_id = %err.migration_id,
                error = %err.cause,
                "{}",
                entry.detail
            );
            report.push(entry);
        }
    }
}

pub(crate) fn reset_migration(migration: &MigrationHandle) -> Notice {
    let id = migration.id();
    let status = migration.status();

    if status == MigrationStatus::Idle {
        debug!(migration_id = %id, "already idle");
        return Notice::already_idle(id);
    }

    migration.set_status(MigrationStatus::Idle);
    info!(migration_id = %id, previous = %status, "reset to idle");
    Notice::reset(id)
}

pub(crate) fn stop_migration(migration: &MigrationHandle) -> Notice {
    let id = migration.id();

    match migration.status() {
        status @ (MigrationStatus::Idle | MigrationStatus::Disabled) => {
            warn!(migration_id = %id, %status, "migration is not running");
            Notice::already_inactive(id, status)
        }
        MigrationStatus::Stopping => {
            warn!(migration_id = %id, "migration is already stopping");
            Notice::already_stopping(id)
        }
        status => {
            migration.interrupt(ResultCode::Stopped);
            info!(migration_id = %id, %status, "stop requested");
            Notice::stop_requested(id)
        }
    }
}

fn status_row(migration: &MigrationHandle) -> StatusRow {
    let id = migration.id();
    let id_map = migration.id_map();

    let total = match migration.source().count() {
        Ok(count) => RowCount::Counted(count),
        Err(err) => {
            debug!(migration_id = %id, error = %err, "source is uncountable");
            RowCount::Uncountable
        }
    };
    let unprocessed = match total {
        RowCount::Counted(count) => {
            RowCount::Counted(count.saturating_sub(id_map.processed_count()))
        }
        RowCount::Uncountable => RowCount::Uncountable,
    };

    StatusRow {
        migration_id: id,
        status: migration.status(),
        total,
        imported: id_map.imported_count(),
        unprocessed,
        last_imported: id_map.last_imported(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use drover_core::GroupId;

    use crate::memory::{InMemoryMigration, SourceRow};
    use crate::registry::InMemoryRegistry;

    fn id(s: &str) -> MigrationId {
        MigrationId::new(s).unwrap()
    }

    fn rows(n: usize) -> Vec<SourceRow> {
        (1..=n)
            .map(|i| SourceRow::new(i.to_string(), serde_json::Value::Null))
            .collect()
    }

    fn plan_of(registry: &InMemoryRegistry) -> GroupedPlan {
        GroupedPlan::from_handles(registry.create_instances(&[]).unwrap())
    }

    #[test]
    fn reset_is_idempotent() {
        let registry = InMemoryRegistry::new();
        registry
            .register(Arc::new(
                InMemoryMigration::new(id("users")).with_status(MigrationStatus::Importing),
            ))
            .unwrap();
        let config = EngineConfig::default();
        let orchestrator = Orchestrator::new(&registry, &config);
        let plan = plan_of(&registry);

        let first = orchestrator.reset(&plan);
        let second = orchestrator.reset(&plan);

        assert_eq!(first.kinds(), [crate::report::NoticeKind::Reset]);
        assert_eq!(second.kinds(), [crate::report::NoticeKind::AlreadyIdle]);
        assert_eq!(second.notices[0].message, "Migration users is already Idle");
    }

    #[test]
    fn stop_notices_follow_status() {
        use crate::report::NoticeKind::*;

        let registry = InMemoryRegistry::new();
        for (name, status) in [
            ("idle", MigrationStatus::Idle),
            ("disabled", MigrationStatus::Disabled),
            ("stopping", MigrationStatus::Stopping),
            ("running", MigrationStatus::Importing),
        ] {
            registry
                .register(Arc::new(InMemoryMigration::new(id(name)).with_status(status)))
                .unwrap();
        }
        let config = EngineConfig::default();
        let orchestrator = Orchestrator::new(&registry, &config);

        let report = orchestrator.stop(&plan_of(&registry));

        assert_eq!(
            report.kinds(),
            [AlreadyInactive, AlreadyInactive, AlreadyStopping, StopRequested]
        );
        assert_eq!(report.notices[1].message, "Migration disabled is Disabled");

        let running = registry.get(&id("running")).unwrap().unwrap();
        assert_eq!(running.status(), MigrationStatus::Stopping);
        assert_eq!(running.result(), Some(ResultCode::Stopped));
    }

    #[test]
    fn status_degrades_uncountable_sources() {
        let registry = InMemoryRegistry::new();
        registry
            .register(Arc::new(
                InMemoryMigration::new(id("feed"))
                    .with_group(GroupId::new("remote").unwrap())
                    .uncountable(),
            ))
            .unwrap();
        registry
            .register(Arc::new(InMemoryMigration::new(id("users")).with_rows(rows(4))))
            .unwrap();
        registry.set_group_label(GroupId::new("remote").unwrap(), "Remote feeds");
        let config = EngineConfig::default();
        let orchestrator = Orchestrator::new(&registry, &config);

        let users = registry.get(&id("users")).unwrap().unwrap();
        users.import(&ExecutionOptions::new().with_limit(1)).unwrap();

        let report = orchestrator.status(&plan_of(&registry));

        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.groups[0].header(), "Group: Remote feeds (remote)");

        let feed = report.row(&id("feed")).unwrap();
        assert_eq!(feed.total, RowCount::Uncountable);
        assert_eq!(feed.unprocessed, RowCount::Uncountable);

        let users = report.row(&id("users")).unwrap();
        assert_eq!(users.total, RowCount::Counted(4));
        assert_eq!(users.imported, 1);
        assert_eq!(users.unprocessed, RowCount::Counted(3));
        assert_eq!(users.last_imported, None);
    }

    #[test]
    fn self_dependency_is_reported_as_cycle() {
        let registry = InMemoryRegistry::new();
        registry
            .register(Arc::new(
                InMemoryMigration::new(id("loop"))
                    .with_rows(rows(1))
                    .with_requirements(vec![id("loop")]),
            ))
            .unwrap();
        let config = EngineConfig::default();
        let orchestrator = Orchestrator::new(&registry, &config);

        let report = orchestrator.import(
            &plan_of(&registry),
            &ExecutionOptions::new().with_execute_dependencies(true),
        );

        assert_eq!(report.failed(), 1);
        assert!(report.entries[0].detail.contains("dependency cycle detected: loop -> loop"));
    }

    #[test]
    fn forced_cycle_still_clears_requirements() {
        let registry = InMemoryRegistry::new();
        registry
            .register(Arc::new(
                InMemoryMigration::new(id("loop"))
                    .with_rows(rows(1))
                    .with_requirements(vec![id("loop")]),
            ))
            .unwrap();
        let config = EngineConfig::default();
        let orchestrator = Orchestrator::new(&registry, &config);

        let report = orchestrator.import(
            &plan_of(&registry),
            &ExecutionOptions::new()
                .with_execute_dependencies(true)
                .with_force(true),
        );

        assert_eq!(report.failed(), 1);
        assert!(report.entries[0].detail.contains("dependency cycle detected"));
        let migration = registry.get(&id("loop")).unwrap().unwrap();
        assert!(migration.definition().requirements.is_empty());
    }

    #[test]
    fn run_dispatches_by_operation() {
        let registry = InMemoryRegistry::new();
        registry
            .register(Arc::new(InMemoryMigration::new(id("users")).with_rows(rows(2))))
            .unwrap();
        let config = EngineConfig::default();
        let orchestrator = Orchestrator::new(&registry, &config);
        let plan = plan_of(&registry);

        match orchestrator.run(&plan, Operation::Import, &ExecutionOptions::new()) {
            OperationReport::Execution(report) => assert_eq!(report.succeeded(), 1),
            other => panic!("unexpected report: {other:?}"),
        }
        match orchestrator.run(&plan, Operation::Reset, &ExecutionOptions::new()) {
            OperationReport::Notices(report) => assert_eq!(report.operation, Operation::Reset),
            other => panic!("unexpected report: {other:?}"),
        }
    }
}
