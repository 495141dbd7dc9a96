//! Strongly-typed identifiers used across the engine.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a migration job.
///
/// The original spelling is preserved for display, but equality, hashing and
/// lookups use the lowercase key so `Users` and `users` name the same job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationId(String);

/// Identifier of a migration group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create an identifier, rejecting blank input.
            pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::invalid_id(concat!($name, ": must not be blank")));
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_string_newtype!(MigrationId, "MigrationId");
impl_string_newtype!(GroupId, "GroupId");

impl MigrationId {
    /// Case-insensitive comparison key.
    pub fn key(&self) -> String {
        self.0.to_lowercase()
    }
}

impl PartialEq for MigrationId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for MigrationId {}

impl core::hash::Hash for MigrationId {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl GroupId {
    /// Name of the implicit group for migrations that do not declare one.
    pub const DEFAULT: &'static str = "default";

    /// The implicit `"default"` group.
    pub fn default_group() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    /// Resolve an optional configured group, falling back to `"default"` when
    /// unset or blank.
    pub fn or_default(value: Option<&str>) -> Self {
        value
            .and_then(|v| Self::new(v).ok())
            .unwrap_or_else(Self::default_group)
    }

    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::default_group()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn migration_ids_compare_case_insensitively() {
        let a: MigrationId = "Users".parse().unwrap();
        let b: MigrationId = "users".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Users");

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn blank_ids_are_rejected() {
        assert!(matches!(
            MigrationId::new("   "),
            Err(DomainError::InvalidId(_))
        ));
        assert!(GroupId::new("").is_err());
    }

    #[test]
    fn unset_group_falls_back_to_default() {
        assert!(GroupId::or_default(None).is_default());
        assert!(GroupId::or_default(Some("  ")).is_default());
        assert_eq!(GroupId::or_default(Some("legacy")).as_str(), "legacy");
    }
}
