//! Entity manager: persists entities through a `Store` and rebuilds them.

use std::sync::Arc;

use tracing::debug;

use crate::entity::{Entity, EntityState, Hydrate};
use crate::filter::{Page, ResolvedFilter};
use crate::mapping::{EntityMapping, Record};
use crate::store::Store;
use crate::value::Value;
use crate::{DomainError, DomainId, DomainResult};

/// Upper bound on identifier candidates tried before giving up.
const MAX_ID_ATTEMPTS: usize = 100;

/// Unit of persistence work shared by repositories and test harnesses.
#[derive(Clone)]
pub struct EntityManager {
    store: Arc<dyn Store>,
}

impl EntityManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Inserts `entity` when it is new and updates it when it is managed.
    /// Associated entities are persisted first, in the same unit of work.
    pub fn persist(&self, entity: &mut dyn Entity) -> DomainResult<()> {
        self.flush(&mut [entity])
    }

    /// Persists every entity in order as one unit of work. On failure the
    /// store is rolled back and every touched entity gets its previous state
    /// and generated identifier back.
    pub fn flush(&self, entities: &mut [&mut dyn Entity]) -> DomainResult<()> {
        self.store.begin()?;
        let mut undo = Vec::new();
        let result = entities
            .iter_mut()
            .try_for_each(|entity| self.persist_graph(&mut **entity, &mut undo))
            .and_then(|()| self.store.commit());
        if let Err(err) = result {
            debug!(entries = undo.len(), error = %err, "rolling back unit of work");
            let mut undo = undo.into_iter();
            for entity in entities.iter_mut() {
                restore(&mut **entity, &mut undo);
            }
            self.store.rollback()?;
            return Err(err);
        }
        Ok(())
    }

    /// Deletes the row of `entity`; the entity becomes new again.
    pub fn remove(&self, entity: &mut dyn Entity) -> DomainResult<()> {
        let mapping = entity.mapping();
        let key = match entity.state() {
            EntityState::Managed { key } => key.clone(),
            EntityState::New => entity.to_record().key(mapping),
        };
        if key.iter().any(Value::is_null) || !self.store.delete(mapping, &key)? {
            return Err(DomainError::NotFound {
                class: mapping.class,
            });
        }
        debug!(class = mapping.class, "removed entity");
        entity.set_state(EntityState::New);
        Ok(())
    }

    pub fn load<E: Hydrate>(&self, filter: &ResolvedFilter, page: Page) -> DomainResult<Vec<E>> {
        let records = self.store.select(E::type_mapping(), filter, page)?;
        let hydrator = self.hydrator();
        records.iter().map(|record| hydrator.hydrate(record)).collect()
    }

    pub fn hydrator(&self) -> Hydrator<'_> {
        Hydrator {
            store: self.store.as_ref(),
        }
    }

    /// Post-order walk: associations, then `entity`. Each entity gets an
    /// undo entry before it is touched.
    fn persist_graph(&self, entity: &mut dyn Entity, undo: &mut Vec<Undo>) -> DomainResult<()> {
        for association in entity.associations_mut() {
            self.persist_graph(association, undo)?;
        }
        let mapping = entity.mapping();
        let state = entity.state().clone();
        undo.push(Undo {
            state: state.clone(),
            generated: None,
        });
        match state {
            EntityState::New => {
                let generated = self.generate_id(entity, mapping)?;
                if let Some(entry) = undo.last_mut() {
                    entry.generated = generated;
                }
                self.insert(entity, mapping)
            }
            EntityState::Managed { key } => self.update(entity, mapping, key),
        }
    }

    fn insert(&self, entity: &mut dyn Entity, mapping: &'static EntityMapping) -> DomainResult<()> {
        let record = entity.to_record();
        let key = record.key(mapping);
        if let Some(position) = key.iter().position(Value::is_null) {
            return Err(DomainError::Logic(format!(
                "cannot persist {} with an empty identifier field `{}`",
                mapping.class, mapping.id_fields[position]
            )));
        }
        self.store.insert(mapping, &record)?;
        debug!(class = mapping.class, ?key, "inserted entity");
        entity.set_state(EntityState::Managed { key });
        Ok(())
    }

    fn update(
        &self,
        entity: &mut dyn Entity,
        mapping: &'static EntityMapping,
        key: Vec<Value>,
    ) -> DomainResult<()> {
        let record = entity.to_record();
        if record.key(mapping) != key {
            return Err(DomainError::Logic(format!(
                "identifier of a persisted {} cannot change",
                mapping.class
            )));
        }
        if !self.store.update(mapping, &record)? {
            return Err(DomainError::NotFound {
                class: mapping.class,
            });
        }
        debug!(class = mapping.class, ?key, "updated entity");
        Ok(())
    }

    /// Fills the empty generated identifier of `entity`, returning the field
    /// it assigned.
    fn generate_id(
        &self,
        entity: &mut dyn Entity,
        mapping: &'static EntityMapping,
    ) -> DomainResult<Option<&'static str>> {
        let Some(field) = mapping.generated_id else {
            return Ok(None);
        };
        if !entity.to_record().get(field).is_null() {
            return Ok(None);
        }
        if !self.store.supports_generated_ids() {
            return Err(DomainError::Logic(format!(
                "{}.{field} is empty and the store does not generate identifiers",
                mapping.class
            )));
        }
        // Caller-chosen identifiers may already occupy generator values.
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.store.next_id(mapping)?;
            let taken = self
                .store
                .exists(mapping, &ResolvedFilter::column(field, Value::from(&id)))?;
            if !taken {
                debug!(class = mapping.class, %id, "generated identifier");
                entity.assign_id(field, id)?;
                return Ok(Some(field));
            }
        }
        Err(DomainError::Repository(format!(
            "failed to generate a unique identifier for {}",
            mapping.class
        )))
    }
}

/// What `flush` puts back on an entity when its unit of work fails.
struct Undo {
    state: EntityState,
    generated: Option<&'static str>,
}

/// Replays `undo` over the graph in the order `persist_graph` filled it.
/// Entities the failed flush never reached have no entry and stay as they are.
fn restore(entity: &mut dyn Entity, undo: &mut std::vec::IntoIter<Undo>) {
    for association in entity.associations_mut() {
        restore(association, undo);
    }
    let Some(entry) = undo.next() else {
        return;
    };
    if let Some(field) = entry.generated {
        if let Err(err) = entity.assign_id(field, DomainId::empty()) {
            debug!(error = %err, field, "could not clear generated identifier");
        }
    }
    entity.set_state(entry.state);
}

/// Rebuilds typed entities from records, loading associations on demand.
pub struct Hydrator<'a> {
    store: &'a dyn Store,
}

impl Hydrator<'_> {
    pub fn hydrate<E: Hydrate>(&self, record: &Record) -> DomainResult<E> {
        let mut entity = E::hydrate(record, self)?;
        entity.set_state(EntityState::Managed {
            key: record.key(E::type_mapping()),
        });
        Ok(entity)
    }

    /// Loads the entity the association column `field` points at.
    pub fn association<E: Hydrate>(&self, record: &Record, field: &str) -> DomainResult<E> {
        self.optional_association(record, field)?.ok_or_else(|| {
            DomainError::Repository(format!(
                "column `{field}` does not reference a {}",
                E::type_mapping().class
            ))
        })
    }

    pub fn optional_association<E: Hydrate>(
        &self,
        record: &Record,
        field: &str,
    ) -> DomainResult<Option<E>> {
        let value = record.get(field);
        if value.is_null() {
            return Ok(None);
        }
        let mapping = E::type_mapping();
        let id_field = mapping.single_id_field().ok_or_else(|| {
            DomainError::Logic(format!("{} is not keyed by a single field", mapping.class))
        })?;
        let filter = ResolvedFilter::column(id_field.name, value.clone());
        let records = self.store.select(mapping, &filter, Page::new(0, 1))?;
        records.first().map(|record| self.hydrate(record)).transpose()
    }
}
