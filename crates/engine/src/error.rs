//! Error taxonomy for selection and execution.
//!
//! Only [`JobExecutionError`] is contained by the orchestrator; selection
//! errors abort the whole operation before any job runs.

use thiserror::Error;

use drover_core::{MigrationId, MigrationStatus};

/// Hint appended to every contained job failure.
pub const REMEDIATION_HINT: &str = "You must clean-up/reset this migration";

/// Registry lookup/storage error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Migration {0} does not exist")]
    NotFound(MigrationId),
    #[error("migration already registered: {0}")]
    AlreadyExists(MigrationId),
    #[error("registry error: {0}")]
    Storage(String),
}

/// Failure to turn a filter into a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// No ids, groups, tags or `all` were supplied.
    #[error(
        "You must specify --all, --group, --tag or one or more \
         migration names separated by commas"
    )]
    NoCriteria,
    /// Criteria were valid but matched nothing.
    #[error("No migrations found")]
    Empty,
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A source that cannot report its row count.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("source cannot be counted: {reason}")]
pub struct SourceUncountable {
    pub reason: String,
}

impl SourceUncountable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Why a single job's import or rollback failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionFailure {
    /// The job raised an error from its own data steps.
    #[error("{0}")]
    Failed(String),
    /// The job is not idle and cannot start another operation.
    #[error("Migration is busy with another operation: {0}")]
    Busy(MigrationStatus),
    /// Required migrations are missing or incomplete.
    #[error("Missing migrations {}", join_ids(.0))]
    RequirementsUnmet(Vec<MigrationId>),
    /// Dependency resolution revisited a job already on the resolution path.
    #[error("dependency cycle detected: {}", join_path(.0))]
    DependencyCycle(Vec<MigrationId>),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Error raised by a job's import/rollback, scoped to that job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{migration_id}: {cause}")]
pub struct JobExecutionError {
    pub migration_id: MigrationId,
    #[source]
    pub cause: ExecutionFailure,
}

impl JobExecutionError {
    pub fn new(migration_id: MigrationId, cause: ExecutionFailure) -> Self {
        Self {
            migration_id,
            cause,
        }
    }

    pub fn failed(migration_id: MigrationId, message: impl Into<String>) -> Self {
        Self::new(migration_id, ExecutionFailure::Failed(message.into()))
    }

    pub fn busy(migration_id: MigrationId, status: MigrationStatus) -> Self {
        Self::new(migration_id, ExecutionFailure::Busy(status))
    }
}

fn join_ids(ids: &[MigrationId]) -> String {
    ids.iter()
        .map(MigrationId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_path(ids: &[MigrationId]) -> String {
    ids.iter()
        .map(MigrationId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
