//! Structured results handed back to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use drover_core::{GroupId, MigrationId, MigrationStatus};

use crate::error::{JobExecutionError, SelectionError, REMEDIATION_HINT};
use crate::migration::SourceField;

/// Correlation id of one orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle operation driven by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Import,
    Rollback,
    Reset,
    Stop,
}

impl Operation {
    /// Gerund used in log and report text.
    pub fn verb(self) -> &'static str {
        match self {
            Operation::Import => "importing",
            Operation::Rollback => "rolling back",
            Operation::Reset => "resetting",
            Operation::Stop => "stopping",
        }
    }
}

/// Outcome of one import/rollback entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failed,
    /// No selection criteria were supplied; nothing ran.
    SkippedNoCriteria,
    /// The criteria matched no migrations; nothing ran.
    SkippedEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionEntry {
    /// Absent for selection-level entries.
    pub migration_id: Option<MigrationId>,
    pub outcome: Outcome,
    pub detail: String,
}

impl ExecutionEntry {
    pub fn success(migration_id: MigrationId, operation: Operation) -> Self {
        let detail = match operation {
            Operation::Rollback => format!("Rolled back {migration_id}"),
            _ => format!("Imported {migration_id}"),
        };
        Self {
            migration_id: Some(migration_id),
            outcome: Outcome::Success,
            detail,
        }
    }

    pub fn failed(error: &JobExecutionError, operation: Operation) -> Self {
        Self {
            migration_id: Some(error.migration_id.clone()),
            outcome: Outcome::Failed,
            detail: format!(
                "exception when {} {} : {} : {}",
                operation.verb(),
                error.migration_id,
                error.cause,
                REMEDIATION_HINT
            ),
        }
    }

    /// Entry describing why selection produced nothing to run.
    pub fn skipped(error: &SelectionError) -> Self {
        let outcome = match error {
            SelectionError::NoCriteria => Outcome::SkippedNoCriteria,
            SelectionError::Empty => Outcome::SkippedEmpty,
            SelectionError::Registry(_) => Outcome::Failed,
        };
        Self {
            migration_id: None,
            outcome,
            detail: error.to_string(),
        }
    }
}

/// Report of an import or rollback run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub run_id: RunId,
    pub operation: Operation,
    pub entries: Vec<ExecutionEntry>,
}

impl ExecutionReport {
    pub fn new(run_id: RunId, operation: Operation) -> Self {
        Self {
            run_id,
            operation,
            entries: Vec::new(),
        }
    }

    /// A report with one selection-level entry and nothing executed.
    pub fn from_selection_error(operation: Operation, error: &SelectionError) -> Self {
        let mut report = Self::new(RunId::new(), operation);
        report.push(ExecutionEntry::skipped(error));
        report
    }

    pub fn push(&mut self, entry: ExecutionEntry) {
        self.entries.push(entry);
    }

    /// True when the run was refused for lack of selection criteria.
    pub fn is_rejected(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.outcome == Outcome::SkippedNoCriteria)
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(Outcome::Success)
    }

    pub fn failed(&self) -> usize {
        self.count(Outcome::Failed)
    }

    /// Migration ids in the order they were executed.
    pub fn executed_ids(&self) -> Vec<MigrationId> {
        self.entries
            .iter()
            .filter_map(|e| e.migration_id.clone())
            .collect()
    }

    /// Outcome of the last entry for `id`.
    pub fn outcome_for(&self, id: &MigrationId) -> Option<Outcome> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.migration_id.as_ref() == Some(id))
            .map(|e| e.outcome)
    }
}

/// Kind of a reset/stop notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    AlreadyIdle,
    Reset,
    AlreadyInactive,
    AlreadyStopping,
    StopRequested,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub migration_id: MigrationId,
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn already_idle(id: MigrationId) -> Self {
        let message = format!("Migration {id} is already Idle");
        Self::new(id, NoticeKind::AlreadyIdle, message)
    }

    pub fn reset(id: MigrationId) -> Self {
        let message = format!("Migration {id} reset to Idle");
        Self::new(id, NoticeKind::Reset, message)
    }

    pub fn already_inactive(id: MigrationId, status: MigrationStatus) -> Self {
        let message = format!("Migration {id} is {status}");
        Self::new(id, NoticeKind::AlreadyInactive, message)
    }

    pub fn already_stopping(id: MigrationId) -> Self {
        let message = format!("Migration {id} is already stopping");
        Self::new(id, NoticeKind::AlreadyStopping, message)
    }

    pub fn stop_requested(id: MigrationId) -> Self {
        let message = format!("Migration {id} requested to stop");
        Self::new(id, NoticeKind::StopRequested, message)
    }

    pub fn not_found(id: MigrationId) -> Self {
        let message = format!("Migration {id} does not exist");
        Self::new(id, NoticeKind::NotFound, message)
    }

    fn new(migration_id: MigrationId, kind: NoticeKind, message: String) -> Self {
        Self {
            migration_id,
            kind,
            message,
        }
    }
}

/// Report of a reset or stop operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeReport {
    pub operation: Operation,
    pub notices: Vec<Notice>,
}

impl NoticeReport {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            notices: Vec::new(),
        }
    }

    pub fn push(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn kinds(&self) -> Vec<NoticeKind> {
        self.notices.iter().map(|n| n.kind).collect()
    }
}

/// Either report shape, as returned by `Orchestrator::run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationReport {
    Execution(ExecutionReport),
    Notices(NoticeReport),
}

/// Row count that may be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowCount {
    Counted(u64),
    /// The source could not report a count.
    Uncountable,
}

impl std::fmt::Display for RowCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowCount::Counted(n) => write!(f, "{n}"),
            RowCount::Uncountable => f.write_str("N/A"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRow {
    pub migration_id: MigrationId,
    pub status: MigrationStatus,
    pub total: RowCount,
    pub imported: u64,
    pub unprocessed: RowCount,
    pub last_imported: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusGroup {
    pub group: GroupId,
    pub label: Option<String>,
    pub rows: Vec<StatusRow>,
}

impl StatusGroup {
    /// `Group: <label> (<id>)`, or `Group: <id>` without a label.
    pub fn header(&self) -> String {
        match &self.label {
            Some(label) => format!("Group: {label} ({})", self.group),
            None => format!("Group: {}", self.group),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub groups: Vec<StatusGroup>,
}

impl StatusReport {
    pub fn row(&self, id: &MigrationId) -> Option<&StatusRow> {
        self.groups
            .iter()
            .flat_map(|g| g.rows.iter())
            .find(|r| &r.migration_id == id)
    }
}

/// Messages of one requested migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagesBody {
    NotFound,
    Empty,
    Table {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesSection {
    pub migration_id: MigrationId,
    pub body: MessagesBody,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesReport {
    pub sections: Vec<MessagesSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFields {
    pub migration_id: MigrationId,
    pub fields: Vec<SourceField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldsGroup {
    pub group: GroupId,
    pub migrations: Vec<MigrationFields>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldsReport {
    pub groups: Vec<FieldsGroup>,
}
