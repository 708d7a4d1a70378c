//! Backend hooks the contract suite runs against.

use std::sync::Arc;

use crate::adapters::memory_repo::InMemoryStore;
use crate::entity::{Entity, Hydrate};
use crate::manager::EntityManager;
use crate::mapping::EntityMapping;
use crate::repository::DomainEntityRepository;
use crate::DomainResult;

use super::fixtures;

/// A backend under test.
///
/// Every contract test gets a fresh harness: `init`, then `prepare`, the test
/// itself, `clean` and finally `destroy`.
pub trait RepositoryHarness: Sized {
    /// Whether the backend fills empty generated identifiers on insert.
    /// When false, fixtures carry random caller-assigned identifiers.
    const SUPPORTS_GENERATED_IDS: bool = true;

    /// Opens the backend. Schema work is left to `prepare`.
    fn init() -> DomainResult<Self>;

    fn manager(&self) -> &EntityManager;

    /// Whether the harness owns the schema. Backends with an externally
    /// managed schema return false and skip creating and dropping it.
    fn create_schema(&self) -> bool {
        true
    }

    fn entity_mappings(&self) -> Vec<&'static EntityMapping> {
        fixtures::mappings()
    }

    /// Creates the schema when the harness owns it.
    fn prepare(&self) -> DomainResult<()> {
        if self.create_schema() {
            self.manager()
                .store()
                .create_schema(&self.entity_mappings())?;
        }
        Ok(())
    }

    fn clean(&self) -> DomainResult<()> {
        self.manager().store().truncate(&self.entity_mappings())
    }

    fn destroy(self) -> DomainResult<()> {
        if self.create_schema() {
            self.manager().store().drop_schema(&self.entity_mappings())?;
        }
        Ok(())
    }

    fn create_repository<E: Hydrate>(&self) -> DomainEntityRepository<E> {
        DomainEntityRepository::from_manager(self.manager().clone())
    }

    /// Persists `entities` in order as one unit of work, bypassing the
    /// repository.
    fn flush_entities(&self, entities: &mut [&mut dyn Entity]) -> DomainResult<()> {
        self.manager().flush(entities)
    }
}

/// Harness over `InMemoryStore`, with or without generated identifiers.
pub struct InMemoryHarness<const GENERATED_IDS: bool> {
    manager: EntityManager,
}

impl<const GENERATED_IDS: bool> RepositoryHarness for InMemoryHarness<GENERATED_IDS> {
    const SUPPORTS_GENERATED_IDS: bool = GENERATED_IDS;

    fn init() -> DomainResult<Self> {
        let store = if GENERATED_IDS {
            InMemoryStore::new()
        } else {
            InMemoryStore::without_generated_ids()
        };
        Ok(Self {
            manager: EntityManager::new(Arc::new(store)),
        })
    }

    fn manager(&self) -> &EntityManager {
        &self.manager
    }
}
