//! `drover-engine`: selection and orchestration of migration jobs.
//!
//! A [`SelectionFilter`] is resolved by the [`Selector`] into a
//! [`GroupedPlan`], which the [`Orchestrator`] drives through import,
//! rollback, reset, stop or status. [`MigrateTools`] wires the two together
//! over an injected [`MigrationRegistry`].

pub mod config;
pub mod error;
pub mod filter;
pub mod inspect;
pub mod memory;
pub mod migration;
pub mod options;
pub mod orchestrator;
pub mod plan;
pub mod registry;
pub mod render;
pub mod report;
pub mod selector;
pub mod tools;

pub use config::{DependencyMode, EngineConfig, FilterSemantics};
pub use error::{
    ExecutionFailure, JobExecutionError, RegistryError, SelectionError, SourceUncountable,
    REMEDIATION_HINT,
};
pub use filter::SelectionFilter;
pub use memory::{InMemoryIdMap, InMemoryMigration, InMemorySource, RowError, SourceRow};
pub use migration::{
    IdMap, MessageLevel, MessageRow, Migration, MigrationDefinition, MigrationHandle,
    MigrationSource, SourceField,
};
pub use options::ExecutionOptions;
pub use orchestrator::Orchestrator;
pub use plan::{GroupedPlan, PlanEntry, PlanGroup};
pub use registry::{InMemoryRegistry, MigrationRegistry};
pub use render::RenderError;
pub use report::{
    ExecutionEntry, ExecutionReport, MessagesBody, MessagesReport, Notice, NoticeKind,
    NoticeReport, Operation, OperationReport, Outcome, RowCount, RunId, StatusReport,
};
pub use selector::Selector;
pub use tools::MigrateTools;
