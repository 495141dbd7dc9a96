//! In-memory migration, source and id map for tests/dev.
//!
//! [`InMemoryMigration`] walks a vector of source rows through a row
//! processor and records progress in an [`InMemoryIdMap`]. It follows the full
//! lifecycle: it refuses to start unless idle, checks for a stop request
//! before every row, and honours `limit`, `feedback`, `idlist` and `update`.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use drover_core::{GroupId, MigrationId, MigrationStatus, ResultCode};

use crate::error::{JobExecutionError, SourceUncountable};
use crate::migration::{
    IdMap, MessageLevel, MessageRow, Migration, MigrationDefinition, MigrationSource, SourceField,
};
use crate::options::ExecutionOptions;

/// A row produced by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRow {
    pub id: String,
    pub data: serde_json::Value,
}

impl SourceRow {
    pub fn new(id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// Failure while processing one row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    /// The row is recorded as failed and the run continues.
    #[error("{0}")]
    Skipped(String),
    /// The run aborts, leaving the migration in its running status.
    #[error("{0}")]
    Fatal(String),
}

/// Transforms and loads one row, returning the destination id.
pub type RowProcessor = Box<dyn Fn(&SourceRow) -> Result<String, RowError> + Send + Sync>;

/// Outcome recorded for a processed source row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Imported,
    NeedsUpdate,
    Failed,
}

#[derive(Debug, Clone)]
struct MapRow {
    destination_id: Option<String>,
    status: RowStatus,
}

#[derive(Debug, Default)]
struct IdMapState {
    rows: BTreeMap<String, MapRow>,
    messages: Vec<MessageRow>,
    next_msgid: u64,
    last_imported: Option<DateTime<Utc>>,
}

/// In-memory id map.
#[derive(Debug, Default)]
pub struct InMemoryIdMap {
    state: RwLock<IdMapState>,
}

impl InMemoryIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_imported(&self, source_id: &str, destination_id: impl Into<String>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.rows.insert(
            source_id.to_string(),
            MapRow {
                destination_id: Some(destination_id.into()),
                status: RowStatus::Imported,
            },
        );
    }

    pub fn save_failed(&self, source_id: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.rows.insert(
            source_id.to_string(),
            MapRow {
                destination_id: None,
                status: RowStatus::Failed,
            },
        );
    }

    pub fn save_message(&self, source_id: &str, level: MessageLevel, message: impl Into<String>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.next_msgid += 1;
        let msgid = state.next_msgid;
        state.messages.push(MessageRow {
            msgid,
            source_ids: vec![source_id.to_string()],
            level,
            message: message.into(),
        });
    }

    pub fn row_status(&self, source_id: &str) -> Option<RowStatus> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rows
            .get(source_id)
            .map(|r| r.status)
    }

    pub fn destination_id(&self, source_id: &str) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rows
            .get(source_id)
            .and_then(|r| r.destination_id.clone())
    }

    /// Forget a row and any messages recorded against it.
    pub fn delete(&self, source_id: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.rows.remove(source_id);
        state
            .messages
            .retain(|m| m.source_ids.first().map(String::as_str) != Some(source_id));
    }

    pub fn set_last_imported(&self, at: DateTime<Utc>) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .last_imported = Some(at);
    }
}

impl IdMap for InMemoryIdMap {
    fn processed_count(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rows
            .len() as u64
    }

    fn imported_count(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rows
            .values()
            .filter(|r| matches!(r.status, RowStatus::Imported | RowStatus::NeedsUpdate))
            .count() as u64
    }

    fn prepare_update(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        for row in state.rows.values_mut() {
            row.status = RowStatus::NeedsUpdate;
        }
    }

    fn messages(&self) -> Box<dyn Iterator<Item = MessageRow> + '_> {
        let messages = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .messages
            .clone();
        Box::new(messages.into_iter())
    }

    fn last_imported(&self) -> Option<DateTime<Utc>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_imported
    }
}

/// In-memory source over a fixed set of rows.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    rows: Vec<SourceRow>,
    fields: Vec<SourceField>,
    countable: bool,
}

impl InMemorySource {
    pub fn new(rows: Vec<SourceRow>) -> Self {
        Self {
            rows,
            fields: Vec::new(),
            countable: true,
        }
    }

    pub fn rows(&self) -> &[SourceRow] {
        &self.rows
    }
}

impl MigrationSource for InMemorySource {
    fn count(&self) -> Result<u64, SourceUncountable> {
        if self.countable {
            Ok(self.rows.len() as u64)
        } else {
            Err(SourceUncountable::new("source does not support counting"))
        }
    }

    fn fields(&self) -> Vec<SourceField> {
        self.fields.clone()
    }
}

#[derive(Debug, Default)]
struct LifecycleState {
    status: MigrationStatus,
    result: Option<ResultCode>,
}

/// How a run loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunEnd {
    Completed,
    LimitReached,
    Stopped,
}

/// In-memory migration.
pub struct InMemoryMigration {
    definition: RwLock<MigrationDefinition>,
    lifecycle: RwLock<LifecycleState>,
    source: InMemorySource,
    id_map: InMemoryIdMap,
    processor: RowProcessor,
}

impl InMemoryMigration {
    /// A migration with no rows whose processor maps each source id to itself.
    pub fn new(id: MigrationId) -> Self {
        Self {
            definition: RwLock::new(MigrationDefinition::new(id)),
            lifecycle: RwLock::new(LifecycleState::default()),
            source: InMemorySource::new(Vec::new()),
            id_map: InMemoryIdMap::new(),
            processor: Box::new(|row| Ok(row.id.clone())),
        }
    }

    pub fn with_label(self, label: impl Into<String>) -> Self {
        self.map_definition(|d| d.with_label(label))
    }

    pub fn with_group(self, group: GroupId) -> Self {
        self.map_definition(|d| d.with_group(group))
    }

    pub fn with_tags<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.map_definition(|d| d.with_tags(tags))
    }

    pub fn with_requirements(self, requirements: Vec<MigrationId>) -> Self {
        self.map_definition(|d| d.with_requirements(requirements))
    }

    pub fn with_rows(mut self, rows: Vec<SourceRow>) -> Self {
        self.source.rows = rows;
        self
    }

    pub fn with_fields(mut self, fields: Vec<SourceField>) -> Self {
        self.source.fields = fields;
        self
    }

    /// Make the source refuse to report a row count.
    pub fn uncountable(mut self) -> Self {
        self.source.countable = false;
        self
    }

    pub fn with_processor<F>(mut self, processor: F) -> Self
    where
        F: Fn(&SourceRow) -> Result<String, RowError> + Send + Sync + 'static,
    {
        self.processor = Box::new(processor);
        self
    }

    pub fn with_status(self, status: MigrationStatus) -> Self {
        self.write_lifecycle().status = status;
        self
    }

    pub fn memory_id_map(&self) -> &InMemoryIdMap {
        &self.id_map
    }

    fn map_definition(self, f: impl FnOnce(MigrationDefinition) -> MigrationDefinition) -> Self {
        {
            let mut definition = self
                .definition
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *definition = f(definition.clone());
        }
        self
    }

    fn write_lifecycle(&self) -> std::sync::RwLockWriteGuard<'_, LifecycleState> {
        self.lifecycle.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move from `Idle` into a running status, or report the job busy.
    fn begin(&self, running: MigrationStatus) -> Result<(), JobExecutionError> {
        let mut lifecycle = self.write_lifecycle();
        match lifecycle.status.transition(running) {
            Ok(status) => {
                lifecycle.status = status;
                lifecycle.result = None;
                Ok(())
            }
            Err(_) => Err(JobExecutionError::busy(self.id(), lifecycle.status)),
        }
    }

    fn finish(&self) {
        self.write_lifecycle().status = MigrationStatus::Idle;
    }

    fn stop_requested(&self) -> bool {
        self.status() == MigrationStatus::Stopping
    }

    fn needs_processing(&self, row: &SourceRow) -> bool {
        matches!(
            self.id_map.row_status(&row.id),
            None | Some(RowStatus::NeedsUpdate)
        )
    }

    fn report_feedback(&self, options: &ExecutionOptions, processed: u64, verb: &str) {
        let due = options
            .feedback
            .is_some_and(|feedback| feedback > 0 && processed % feedback == 0);
        if due {
            info!(migration_id = %self.id(), processed, "{verb} {processed} items");
        }
    }

    fn run_import(&self, options: &ExecutionOptions) -> Result<RunEnd, JobExecutionError> {
        let mut processed = 0u64;

        for row in &self.source.rows {
            if !options.allows_row(&row.id) || !self.needs_processing(row) {
                continue;
            }
            if self.stop_requested() {
                return Ok(RunEnd::Stopped);
            }
            if options.limit.is_some_and(|limit| processed >= limit) {
                return Ok(RunEnd::LimitReached);
            }

            match (self.processor)(row) {
                Ok(destination_id) => self.id_map.save_imported(&row.id, destination_id),
                Err(RowError::Skipped(message)) => {
                    debug!(migration_id = %self.id(), row = %row.id, %message, "row failed");
                    self.id_map.save_failed(&row.id);
                    self.id_map.save_message(&row.id, MessageLevel::Error, message);
                }
                Err(RowError::Fatal(message)) => {
                    self.id_map.save_message(&row.id, MessageLevel::Error, message.clone());
                    return Err(JobExecutionError::failed(self.id(), message));
                }
            }

            processed += 1;
            self.report_feedback(options, processed, "Processed");
        }

        Ok(RunEnd::Completed)
    }

    fn run_rollback(&self, options: &ExecutionOptions) -> RunEnd {
        let mut rolled_back = 0u64;

        for row in self.source.rows.iter().rev() {
            if self.id_map.row_status(&row.id).is_none() {
                continue;
            }
            if self.stop_requested() {
                return RunEnd::Stopped;
            }

            self.id_map.delete(&row.id);
            rolled_back += 1;
            self.report_feedback(options, rolled_back, "Rolled back");
        }

        RunEnd::Completed
    }
}

impl std::fmt::Debug for InMemoryMigration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryMigration")
            .field("definition", &self.definition())
            .field("status", &self.status())
            .field("rows", &self.source.rows.len())
            .finish()
    }
}

impl Migration for InMemoryMigration {
    fn definition(&self) -> MigrationDefinition {
        self.definition
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_requirements(&self, requirements: Vec<MigrationId>) {
        self.definition
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .requirements = requirements;
    }

    fn status(&self) -> MigrationStatus {
        self.lifecycle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .status
    }

    fn set_status(&self, status: MigrationStatus) {
        self.write_lifecycle().status = status;
    }

    fn interrupt(&self, result: ResultCode) {
        let mut lifecycle = self.write_lifecycle();
        if lifecycle.status.can_transition_to(MigrationStatus::Stopping) {
            lifecycle.status = MigrationStatus::Stopping;
        }
        lifecycle.result = Some(result);
    }

    fn result(&self) -> Option<ResultCode> {
        self.lifecycle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .result
    }

    fn id_map(&self) -> &dyn IdMap {
        &self.id_map
    }

    fn source(&self) -> &dyn MigrationSource {
        &self.source
    }

    fn import(&self, options: &ExecutionOptions) -> Result<(), JobExecutionError> {
        self.begin(MigrationStatus::Importing)?;

        // A fatal row error leaves the status at Importing until reset.
        let end = self.run_import(options)?;
        match end {
            RunEnd::Completed => self.id_map.set_last_imported(Utc::now()),
            RunEnd::LimitReached => debug!(migration_id = %self.id(), "limit reached"),
            RunEnd::Stopped => warn!(migration_id = %self.id(), "import stopped"),
        }

        self.finish();
        Ok(())
    }

    fn rollback(&self, options: &ExecutionOptions) -> Result<(), JobExecutionError> {
        self.begin(MigrationStatus::RollingBack)?;

        if self.run_rollback(options) == RunEnd::Stopped {
            warn!(migration_id = %self.id(), "rollback stopped");
        }

        self.finish();
        Ok(())
    }
}
