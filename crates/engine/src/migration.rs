//! The migration job abstraction consumed by the selector and orchestrator.
//!
//! Concrete data steps (fetching, transforming, loading) live behind
//! [`Migration`]. The engine only needs identity, grouping metadata,
//! lifecycle status, progress counters and the two run entry points.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use drover_core::{GroupId, MigrationId, MigrationStatus, ResultCode};

use crate::error::{JobExecutionError, SourceUncountable};
use crate::options::ExecutionOptions;

/// Shared handle to a registry-owned migration.
pub type MigrationHandle = Arc<dyn Migration>;

/// Static description of a migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationDefinition {
    pub id: MigrationId,
    pub label: Option<String>,
    /// Defaults to `"default"` when the migration does not declare one.
    #[serde(default)]
    pub group: GroupId,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Migrations that must be complete before this one may import.
    #[serde(default)]
    pub requirements: Vec<MigrationId>,
}

impl MigrationDefinition {
    pub fn new(id: MigrationId) -> Self {
        Self {
            id,
            label: None,
            group: GroupId::default_group(),
            tags: Vec::new(),
            requirements: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_group(mut self, group: GroupId) -> Self {
        self.group = group;
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

    pub fn with_requirements(mut self, requirements: Vec<MigrationId>) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A field exposed by a migration source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceField {
    pub machine_name: String,
    pub description: String,
}

impl SourceField {
    pub fn new(machine_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            machine_name: machine_name.into(),
            description: description.into(),
        }
    }
}

/// Severity of a message recorded against a source row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    Error,
    Warning,
    Notice,
    Information,
}

impl MessageLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageLevel::Error => "error",
            MessageLevel::Warning => "warning",
            MessageLevel::Notice => "notice",
            MessageLevel::Information => "information",
        }
    }
}

/// One row of a migration's message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRow {
    pub msgid: u64,
    pub source_ids: Vec<String>,
    pub level: MessageLevel,
    pub message: String,
}

impl MessageRow {
    /// Column names for display, excluding the internal message id.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = (1..=self.source_ids.len())
            .map(|i| format!("sourceid{i}"))
            .collect();
        columns.push("level".to_string());
        columns.push("message".to_string());
        columns
    }

    /// Values matching [`MessageRow::columns`].
    pub fn values(&self) -> Vec<String> {
        let mut values = self.source_ids.clone();
        values.push(self.level.as_str().to_string());
        values.push(self.message.clone());
        values
    }
}

/// Persisted progress of a single migration (the "id map").
pub trait IdMap: Send + Sync {
    /// Rows processed so far, whether imported or failed.
    fn processed_count(&self) -> u64;

    /// Rows successfully imported.
    fn imported_count(&self) -> u64;

    /// Flag every previously processed row for re-processing.
    fn prepare_update(&self);

    /// Message log. Each call restarts from the first message.
    fn messages(&self) -> Box<dyn Iterator<Item = MessageRow> + '_>;

    /// When the migration last completed an import.
    fn last_imported(&self) -> Option<DateTime<Utc>>;
}

/// The data source of a migration.
pub trait MigrationSource: Send + Sync {
    fn count(&self) -> Result<u64, SourceUncountable>;

    fn fields(&self) -> Vec<SourceField>;
}

/// A migration job.
///
/// Implementations own their status transitions and must be safe to share:
/// every mutator takes `&self`.
pub trait Migration: Send + Sync {
    /// Current definition, reflecting any requirement changes.
    fn definition(&self) -> MigrationDefinition;

    fn id(&self) -> MigrationId {
        self.definition().id
    }

    /// Replace the stored requirements.
    fn set_requirements(&self, requirements: Vec<MigrationId>);

    fn status(&self) -> MigrationStatus;

    /// Administrative status override.
    fn set_status(&self, status: MigrationStatus);

    /// Ask a running import/rollback to stop at its next checkpoint.
    fn interrupt(&self, result: ResultCode);

    /// Result of the last interrupted run, if any.
    fn result(&self) -> Option<ResultCode>;

    fn id_map(&self) -> &dyn IdMap;

    fn source(&self) -> &dyn MigrationSource;

    fn import(&self, options: &ExecutionOptions) -> Result<(), JobExecutionError>;

    fn rollback(&self, options: &ExecutionOptions) -> Result<(), JobExecutionError>;

    /// True once every source row has been processed.
    ///
    /// Uncountable sources are treated as complete.
    fn all_rows_processed(&self) -> bool {
        match self.source().count() {
            Ok(total) => self.id_map().processed_count() >= total,
            Err(_) => true,
        }
    }
}
