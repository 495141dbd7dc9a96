//! Job registry: the catalogue of available migrations.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use drover_core::{GroupId, MigrationId};

use crate::error::RegistryError;
use crate::migration::MigrationHandle;

/// Registry abstraction.
///
/// Owns the migrations. Callers hold handles and mutate jobs only through the
/// handle's own interface.
pub trait MigrationRegistry: Send + Sync {
    /// Instantiate migrations in registry enumeration order.
    ///
    /// An empty `ids` slice means every migration. Unknown ids are skipped.
    fn create_instances(&self, ids: &[MigrationId]) -> Result<Vec<MigrationHandle>, RegistryError>;

    /// Look up a single migration.
    fn get(&self, id: &MigrationId) -> Result<Option<MigrationHandle>, RegistryError> {
        Ok(self
            .create_instances(std::slice::from_ref(id))?
            .into_iter()
            .next())
    }

    /// Human label for a group, if one is configured.
    fn group_label(&self, _group: &GroupId) -> Option<String> {
        None
    }
}

impl<R: MigrationRegistry + ?Sized> MigrationRegistry for Arc<R> {
    fn create_instances(&self, ids: &[MigrationId]) -> Result<Vec<MigrationHandle>, RegistryError> {
        (**self).create_instances(ids)
    }

    fn get(&self, id: &MigrationId) -> Result<Option<MigrationHandle>, RegistryError> {
        (**self).get(id)
    }

    fn group_label(&self, group: &GroupId) -> Option<String> {
        (**self).group_label(group)
    }
}

/// In-memory registry for tests/dev.
///
/// Enumeration order is registration order.
#[derive(Default)]
pub struct InMemoryRegistry {
    migrations: RwLock<Vec<MigrationHandle>>,
    group_labels: RwLock<HashMap<GroupId, String>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Add a migration; ids must be unique (case-insensitively).
    pub fn register(&self, migration: MigrationHandle) -> Result<MigrationId, RegistryError> {
        let id = migration.id();
        let mut migrations = self
            .migrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if migrations.iter().any(|m| m.id() == id) {
            return Err(RegistryError::AlreadyExists(id));
        }
        migrations.push(migration);
        Ok(id)
    }

    pub fn set_group_label(&self, group: GroupId, label: impl Into<String>) {
        self.group_labels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(group, label.into());
    }

    pub fn len(&self) -> usize {
        self.migrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for InMemoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let migrations = self
            .migrations
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("InMemoryRegistry")
            .field(
                "migrations",
                &migrations.iter().map(|m| m.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl MigrationRegistry for InMemoryRegistry {
    fn create_instances(&self, ids: &[MigrationId]) -> Result<Vec<MigrationHandle>, RegistryError> {
        let migrations = self
            .migrations
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        Ok(migrations
            .iter()
            .filter(|m| ids.is_empty() || ids.contains(&m.id()))
            .cloned()
            .collect())
    }

    fn group_label(&self, group: &GroupId) -> Option<String> {
        self.group_labels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(group)
            .cloned()
    }
}
