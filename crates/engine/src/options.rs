//! Per-run execution options.

use serde::{Deserialize, Serialize};

/// Options passed to every job executed in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// Maximum number of items to process in each migration.
    pub limit: Option<u64>,
    /// Emit a progress message every `feedback` items.
    pub feedback: Option<u64>,
    /// Restrict a job to these source row ids.
    pub idlist: Vec<String>,
    /// Re-process previously imported rows.
    pub update: bool,
    /// Ignore (and clear) unmet requirements.
    pub force: bool,
    /// Import unmet requirements before the job itself.
    pub execute_dependencies: bool,
    /// Set when a job runs as another job's dependency. Informational for the
    /// job itself; dependency re-entry is tracked by the orchestrator run.
    pub is_dependency: bool,
}

impl ExecutionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_feedback(mut self, feedback: u64) -> Self {
        self.feedback = Some(feedback);
        self
    }

    pub fn with_idlist<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.idlist = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_execute_dependencies(mut self, execute: bool) -> Self {
        self.execute_dependencies = execute;
        self
    }

    /// Copy of these options marked for a dependency run.
    pub fn as_dependency(&self) -> Self {
        Self {
            is_dependency: true,
            ..self.clone()
        }
    }

    /// True when `row_id` passes the `idlist` restriction.
    pub fn allows_row(&self, row_id: &str) -> bool {
        self.idlist.is_empty() || self.idlist.iter().any(|id| id == row_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_copy_keeps_flags() {
        let opts = ExecutionOptions::new()
            .with_limit(10)
            .with_force(true)
            .with_execute_dependencies(true);
        let dep = opts.as_dependency();

        assert!(dep.is_dependency);
        assert!(!opts.is_dependency);
        assert_eq!(dep.limit, Some(10));
        assert!(dep.force);
    }

    #[test]
    fn idlist_restricts_rows() {
        let opts = ExecutionOptions::new();
        assert!(opts.allows_row("anything"));

        let opts = opts.with_idlist(["1", "3"]);
        assert!(opts.allows_row("3"));
        assert!(!opts.allows_row("2"));
    }
}
