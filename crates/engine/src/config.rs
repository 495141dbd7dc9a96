//! Engine configuration.
//!
//! Values come from the builder methods or from `DROVER_*` environment
//! variables. Unparseable values are logged and ignored.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::options::ExecutionOptions;

pub const ENV_FILTER_SEMANTICS: &str = "DROVER_FILTER_SEMANTICS";
pub const ENV_DEPENDENCY_MODE: &str = "DROVER_DEPENDENCY_MODE";
pub const ENV_FEEDBACK: &str = "DROVER_FEEDBACK";

/// How group and tag filters combine with explicitly named ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterSemantics {
    /// Group pass, then tag pass over the survivors. A named id survives
    /// every pass.
    #[default]
    Sequential,
    /// A migration must match every non-empty dimension, ids included.
    Intersection,
}

impl FromStr for FilterSemantics {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "intersection" => Ok(Self::Intersection),
            other => Err(format!("unknown filter semantics: {other}")),
        }
    }
}

/// Which requirements `execute_dependencies` runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyMode {
    /// Only requirements that have not processed all their rows.
    #[default]
    Unmet,
    /// Every requirement, complete or not.
    All,
}

impl FromStr for DependencyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unmet" => Ok(Self::Unmet),
            "all" => Ok(Self::All),
            other => Err(format!("unknown dependency mode: {other}")),
        }
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub filter_semantics: FilterSemantics,
    pub dependency_mode: DependencyMode,
    /// Feedback interval used when a run does not set one.
    pub default_feedback: Option<u64>,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_FILTER_SEMANTICS) {
            match value.parse() {
                Ok(semantics) => config.filter_semantics = semantics,
                Err(error) => warn!(key = ENV_FILTER_SEMANTICS, %error, "ignoring invalid setting"),
            }
        }

        if let Some(value) = lookup(ENV_DEPENDENCY_MODE) {
            match value.parse() {
                Ok(mode) => config.dependency_mode = mode,
                Err(error) => warn!(key = ENV_DEPENDENCY_MODE, %error, "ignoring invalid setting"),
            }
        }

        if let Some(value) = lookup(ENV_FEEDBACK) {
            match value.trim().parse::<u64>() {
                Ok(0) => {}
                Ok(feedback) => config.default_feedback = Some(feedback),
                Err(error) => warn!(key = ENV_FEEDBACK, %error, "ignoring invalid setting"),
            }
        }

        config
    }

    pub fn with_filter_semantics(mut self, semantics: FilterSemantics) -> Self {
        self.filter_semantics = semantics;
        self
    }

    pub fn with_dependency_mode(mut self, mode: DependencyMode) -> Self {
        self.dependency_mode = mode;
        self
    }

    pub fn with_default_feedback(mut self, feedback: u64) -> Self {
        self.default_feedback = Some(feedback);
        self
    }

    /// Fill unset run options from configured defaults.
    pub fn apply_defaults(&self, options: &ExecutionOptions) -> ExecutionOptions {
        let mut options = options.clone();
        if options.feedback.is_none() {
            options.feedback = self.default_feedback;
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = EngineConfig::from_lookup(|_| None);
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.filter_semantics, FilterSemantics::Sequential);
        assert_eq!(config.dependency_mode, DependencyMode::Unmet);
    }

    #[test]
    fn reads_all_settings() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_FILTER_SEMANTICS, "Intersection"),
            (ENV_DEPENDENCY_MODE, "all"),
            (ENV_FEEDBACK, "250"),
        ]));

        assert_eq!(config.filter_semantics, FilterSemantics::Intersection);
        assert_eq!(config.dependency_mode, DependencyMode::All);
        assert_eq!(config.default_feedback, Some(250));
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_FILTER_SEMANTICS, "fuzzy"),
            (ENV_FEEDBACK, "often"),
        ]));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn run_options_win_over_defaults() {
        let config = EngineConfig::default().with_default_feedback(100);

        let filled = config.apply_defaults(&ExecutionOptions::new());
        assert_eq!(filled.feedback, Some(100));

        let explicit = config.apply_defaults(&ExecutionOptions::new().with_feedback(5));
        assert_eq!(explicit.feedback, Some(5));
    }
}
