//! Caller-facing entry point tying selection, orchestration and inspection together.

use tracing::{info_span, warn};

use drover_core::MigrationId;

use crate::config::EngineConfig;
use crate::error::{RegistryError, SelectionError};
use crate::filter::SelectionFilter;
use crate::inspect;
use crate::options::ExecutionOptions;
use crate::orchestrator::Orchestrator;
use crate::plan::GroupedPlan;
use crate::registry::MigrationRegistry;
use crate::report::{
    ExecutionReport, FieldsReport, MessagesReport, NoticeReport, Operation, StatusReport,
};
use crate::selector::Selector;

/// Migration tooling over an injected registry.
///
/// ```
/// use std::sync::Arc;
/// use drover_core::MigrationId;
/// use drover_engine::{
///     EngineConfig, ExecutionOptions, InMemoryMigration, InMemoryRegistry, MigrateTools,
///     SelectionFilter,
/// };
///
/// let registry = InMemoryRegistry::new();
/// registry
///     .register(Arc::new(InMemoryMigration::new(MigrationId::new("users").unwrap())))
///     .unwrap();
///
/// let tools = MigrateTools::new(registry, EngineConfig::default());
/// let report = tools.import(&SelectionFilter::all(), &ExecutionOptions::new());
/// assert_eq!(report.succeeded(), 1);
/// ```
pub struct MigrateTools<R: MigrationRegistry> {
    registry: R,
    config: EngineConfig,
}

impl<R: MigrationRegistry> MigrateTools<R> {
    pub fn new(registry: R, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve `filter` into a plan using the configured filter semantics.
    pub fn select(&self, filter: &SelectionFilter) -> Result<GroupedPlan, SelectionError> {
        Selector::new(&self.registry)
            .with_semantics(self.config.filter_semantics)
            .select(filter)
    }

    pub fn import(&self, filter: &SelectionFilter, options: &ExecutionOptions) -> ExecutionReport {
        self.execute(Operation::Import, filter, options)
    }

    pub fn rollback(
        &self,
        filter: &SelectionFilter,
        options: &ExecutionOptions,
    ) -> ExecutionReport {
        self.execute(Operation::Rollback, filter, options)
    }

    /// Force selected migrations back to `Idle`.
    ///
    /// Ids that do not exist are reported as notices. An empty selection with
    /// nothing to report is [`SelectionError::Empty`].
    pub fn reset(&self, filter: &SelectionFilter) -> Result<NoticeReport, SelectionError> {
        let _span = info_span!("reset").entered();
        let plan = self.select_with_notices(filter)?;
        Ok(self.orchestrator().reset(&plan))
    }

    /// Request interruption of the named migrations.
    pub fn stop(&self, ids: &[MigrationId]) -> Result<NoticeReport, SelectionError> {
        let _span = info_span!("stop").entered();
        let plan = self.select_with_notices(&SelectionFilter::ids(ids.iter().cloned()))?;
        Ok(self.orchestrator().stop(&plan))
    }

    /// Progress of the selected migrations. A filter without criteria
    /// reports every migration.
    pub fn status(&self, filter: &SelectionFilter) -> Result<StatusReport, SelectionError> {
        let plan = if filter.has_criteria() {
            self.select(filter)?
        } else {
            self.select(&filter.clone().with_all(true))?
        };
        Ok(self.orchestrator().status(&plan))
    }

    pub fn messages(&self, ids: &[MigrationId]) -> Result<MessagesReport, RegistryError> {
        inspect::messages(&self.registry, ids)
    }

    pub fn fields_source(&self, filter: &SelectionFilter) -> Result<FieldsReport, SelectionError> {
        let plan = self.select(filter)?;
        if plan.is_empty() {
            warn!("{}", SelectionError::Empty);
            return Err(SelectionError::Empty);
        }
        Ok(inspect::fields_source(&plan))
    }

    fn orchestrator(&self) -> Orchestrator<'_, R> {
        Orchestrator::new(&self.registry, &self.config)
    }

    fn execute(
        &self,
        operation: Operation,
        filter: &SelectionFilter,
        options: &ExecutionOptions,
    ) -> ExecutionReport {
        let plan = match self.select(filter) {
            Ok(plan) if plan.is_empty() => {
                warn!(operation = ?operation, "{}", SelectionError::Empty);
                return ExecutionReport::from_selection_error(operation, &SelectionError::Empty);
            }
            Ok(plan) => plan,
            Err(err) => {
                warn!(operation = ?operation, error = %err, "selection rejected");
                return ExecutionReport::from_selection_error(operation, &err);
            }
        };

        let orchestrator = self.orchestrator();
        match operation {
            Operation::Rollback => orchestrator.rollback(&plan, options),
            _ => orchestrator.import(&plan, options),
        }
    }

    fn select_with_notices(&self, filter: &SelectionFilter) -> Result<GroupedPlan, SelectionError> {
        let plan = self.select(filter)?;
        if plan.is_empty() && plan.unmatched_ids().is_empty() {
            warn!("{}", SelectionError::Empty);
            return Err(SelectionError::Empty);
        }
        Ok(plan)
    }
}
