//! Entity traits and identity helpers.

use std::fmt::Debug;

use crate::filter::{Criterion, FieldFilter};
use crate::manager::Hydrator;
use crate::mapping::{EntityMapping, FieldKind, Record};
use crate::value::Value;
use crate::{DomainError, DomainId, DomainResult};

/// Whether an entity has a row in the store.
///
/// `Managed` remembers the identifier values the row was written or loaded
/// with, so an update can tell when the identifier was changed in between.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum EntityState {
    #[default]
    New,
    Managed {
        key: Vec<Value>,
    },
}

impl EntityState {
    pub fn is_managed(&self) -> bool {
        matches!(self, EntityState::Managed { .. })
    }
}

/// An object the entity manager can persist.
///
/// The trait is object safe so repositories can accept entities of any class
/// and reject the ones they do not manage at runtime.
pub trait Entity: Debug + Send + Sync {
    fn mapping(&self) -> &'static EntityMapping;

    /// Current persisted form. Associations contribute the target identifier.
    fn to_record(&self) -> Record;

    fn state(&self) -> &EntityState;

    fn set_state(&mut self, state: EntityState);

    /// Stores an identifier generated for `field`.
    fn assign_id(&mut self, field: &str, id: DomainId) -> DomainResult<()> {
        let _ = id;
        Err(DomainError::Logic(format!(
            "{} cannot take a generated identifier for `{field}`",
            self.mapping().class
        )))
    }

    /// Associated entities, persisted before this one.
    fn associations_mut(&mut self) -> Vec<&mut dyn Entity> {
        Vec::new()
    }
}

/// An entity that can be rebuilt from its record.
pub trait Hydrate: Entity + Sized {
    fn type_mapping() -> &'static EntityMapping;

    fn hydrate(record: &Record, hydrator: &Hydrator<'_>) -> DomainResult<Self>;
}

/// Class and identifier of an entity used as a filter value.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityRef {
    pub class: &'static str,
    pub key: Vec<Value>,
}

impl EntityRef {
    pub fn of<E: Entity + ?Sized>(entity: &E) -> Self {
        Self {
            class: entity.mapping().class,
            key: entity.to_record().key(entity.mapping()),
        }
    }

    /// True when any identifier value is missing; such a reference cannot
    /// select a row unambiguously.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty() || self.key.iter().any(Value::is_null)
    }
}

/// Filter selecting `entity` by its identifier fields, usable with
/// `find` and `exists`.
pub fn primary_filter<E: Entity + ?Sized>(entity: &E) -> FieldFilter {
    let mapping = entity.mapping();
    let record = entity.to_record();
    mapping
        .id_mappings()
        .fold(FieldFilter::new(), |filter, field| {
            let value = record.get(field.name).clone();
            let criterion = match (field.kind.column_kind(), value) {
                (FieldKind::Id, Value::Null) => Criterion::Id(DomainId::empty()),
                (FieldKind::Id, Value::Text(s)) => Criterion::Id(DomainId::new(s)),
                (_, value) => Criterion::Scalar(value),
            };
            filter.with(field.name, criterion)
        })
}
