//! Migration lifecycle status and result codes.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Lifecycle status of a migration.
///
/// ```text
/// Idle -> Importing -> Idle
/// Idle -> Importing -> Stopping -> Idle
/// Idle -> RollingBack -> Idle
/// Idle -> RollingBack -> Stopping -> Idle
/// ```
///
/// `Disabled` is terminal until re-enabled externally. Administrative resets
/// bypass this table and force `Idle` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    #[default]
    Idle,
    Disabled,
    Importing,
    RollingBack,
    Stopping,
}

impl MigrationStatus {
    /// Human-facing label.
    pub fn label(self) -> &'static str {
        match self {
            MigrationStatus::Idle => "Idle",
            MigrationStatus::Disabled => "Disabled",
            MigrationStatus::Importing => "Importing",
            MigrationStatus::RollingBack => "Rolling back",
            MigrationStatus::Stopping => "Stopping",
        }
    }

    pub fn can_transition_to(self, next: MigrationStatus) -> bool {
        use MigrationStatus::*;

        matches!(
            (self, next),
            (Idle, Importing)
                | (Idle, RollingBack)
                | (Importing, Idle)
                | (RollingBack, Idle)
                | (Importing, Stopping)
                | (RollingBack, Stopping)
                | (Stopping, Idle)
        )
    }

    /// Validate a normal (non-administrative) transition.
    pub fn transition(self, next: MigrationStatus) -> DomainResult<MigrationStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::invalid_transition(self, next))
        }
    }
}

impl core::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Result code recorded when a run ends abnormally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    /// The run was interrupted by a stop request.
    Stopped,
}
