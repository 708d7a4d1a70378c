//! Typed repository over one entity class.

use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use tracing::debug;

use crate::entity::{Entity, Hydrate};
use crate::filter::{FieldFilter, Page, ResolvedFilter};
use crate::manager::EntityManager;
use crate::mapping::EntityMapping;
use crate::store::Store;
use crate::{DomainError, DomainResult};

/// Ordered result of a listing.
#[derive(Clone, Debug, PartialEq)]
pub struct DomainCollection<T> {
    items: Vec<T>,
}

impl<T> DomainCollection<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn empty() -> Self {
        Self { items: Vec::new() }
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T> Default for DomainCollection<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Deref for DomainCollection<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> IntoIterator for DomainCollection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<T> FromIterator<T> for DomainCollection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Repository managing exactly the entity class `E`.
///
/// Listings follow insertion order. Lookups by identifier (`find`, `exists`)
/// must name exactly the identifier fields of the class; lookups by fields
/// accept any non-empty combination of mapped fields.
pub struct DomainEntityRepository<E: Hydrate> {
    manager: EntityManager,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Hydrate> Clone for DomainEntityRepository<E> {
    fn clone(&self) -> Self {
        Self::from_manager(self.manager.clone())
    }
}

impl<E: Hydrate> DomainEntityRepository<E> {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::from_manager(EntityManager::new(store))
    }

    pub fn from_manager(manager: EntityManager) -> Self {
        Self {
            manager,
            _entity: PhantomData,
        }
    }

    pub fn mapping(&self) -> &'static EntityMapping {
        E::type_mapping()
    }

    pub fn find_all(&self, page: Page) -> DomainResult<DomainCollection<E>> {
        debug!(class = self.mapping().class, ?page, "find all");
        Ok(DomainCollection::new(
            self.manager.load(&ResolvedFilter::all(), page)?,
        ))
    }

    pub fn find_all_by_fields(
        &self,
        fields: &FieldFilter,
        page: Page,
    ) -> DomainResult<DomainCollection<E>> {
        let filter = self.resolve_fields(fields)?;
        debug!(class = self.mapping().class, ?page, ?filter, "find all by fields");
        if filter.is_unsatisfiable() {
            return Ok(DomainCollection::empty());
        }
        Ok(DomainCollection::new(self.manager.load(&filter, page)?))
    }

    /// Entity with identifier `id`; fails with `NotFound` when absent.
    pub fn find(&self, id: &FieldFilter) -> DomainResult<E> {
        let filter = self.resolve_id(id)?;
        self.first(&filter)
    }

    /// First entity, in insertion order, matching `fields`.
    pub fn find_by_fields(&self, fields: &FieldFilter) -> DomainResult<E> {
        let filter = self.resolve_fields(fields)?;
        self.first(&filter)
    }

    pub fn exists(&self, id: &FieldFilter) -> DomainResult<bool> {
        let filter = self.resolve_id(id)?;
        self.any(&filter)
    }

    pub fn exists_by_fields(&self, fields: &FieldFilter) -> DomainResult<bool> {
        let filter = self.resolve_fields(fields)?;
        self.any(&filter)
    }

    /// Inserts a new entity or updates a managed one.
    pub fn save(&self, entity: &mut dyn Entity) -> DomainResult<()> {
        self.assert_class(entity)?;
        self.manager.persist(entity)
    }

    pub fn delete(&self, entity: &mut dyn Entity) -> DomainResult<()> {
        self.assert_class(entity)?;
        self.manager.remove(entity)
    }

    fn first(&self, filter: &ResolvedFilter) -> DomainResult<E> {
        let not_found = || DomainError::NotFound {
            class: self.mapping().class,
        };
        if filter.is_unsatisfiable() {
            return Err(not_found());
        }
        self.manager
            .load(filter, Page::new(0, 1))?
            .into_iter()
            .next()
            .ok_or_else(not_found)
    }

    fn any(&self, filter: &ResolvedFilter) -> DomainResult<bool> {
        if filter.is_unsatisfiable() {
            return Ok(false);
        }
        self.manager.store().exists(self.mapping(), filter)
    }

    fn resolve_fields(&self, fields: &FieldFilter) -> DomainResult<ResolvedFilter> {
        if fields.is_empty() {
            return Err(DomainError::InvalidArgument(format!(
                "no fields provided to match {}",
                self.mapping().class
            )));
        }
        fields.resolve(self.mapping())
    }

    fn resolve_id(&self, id: &FieldFilter) -> DomainResult<ResolvedFilter> {
        let mapping = self.mapping();
        let mut names: Vec<&str> = id.iter().map(|(name, _)| name).collect();
        names.sort_unstable();
        let mut expected = mapping.id_fields.to_vec();
        expected.sort_unstable();
        if names != expected {
            return Err(DomainError::InvalidArgument(format!(
                "{} is identified by {:?}, got {:?}",
                mapping.class, mapping.id_fields, names
            )));
        }
        id.resolve(mapping)
    }

    fn assert_class(&self, entity: &dyn Entity) -> DomainResult<()> {
        let expected = self.mapping().class;
        let actual = entity.mapping().class;
        if expected != actual {
            return Err(DomainError::InvalidClass { expected, actual });
        }
        Ok(())
    }
}
