//! Storage port implemented by persistence backends.

use crate::filter::{Page, ResolvedFilter};
use crate::mapping::{EntityMapping, Record};
use crate::value::Value;
use crate::{DomainId, DomainResult};

/// Record-level persistence for mapped entity classes.
///
/// Implementations keep rows of each class in insertion order; updates keep a
/// row's position. Filters arrive already resolved against the mapping.
pub trait Store: Send + Sync {
    /// Creates storage for every mapping that does not have it yet.
    fn create_schema(&self, mappings: &[&'static EntityMapping]) -> DomainResult<()>;

    /// Removes all rows, keeping the schema. Referencing tables are cleared
    /// before the tables they reference.
    fn truncate(&self, mappings: &[&'static EntityMapping]) -> DomainResult<()>;

    fn drop_schema(&self, mappings: &[&'static EntityMapping]) -> DomainResult<()>;

    /// Inserts a row; fails with `DuplicateEntity` when the key is taken.
    fn insert(&self, mapping: &'static EntityMapping, record: &Record) -> DomainResult<()>;

    /// Overwrites the row keyed by the record's identifier. Returns whether
    /// such a row existed.
    fn update(&self, mapping: &'static EntityMapping, record: &Record) -> DomainResult<bool>;

    /// Deletes the row with identifier `key`. Returns whether it existed.
    fn delete(&self, mapping: &'static EntityMapping, key: &[Value]) -> DomainResult<bool>;

    fn select(
        &self,
        mapping: &'static EntityMapping,
        filter: &ResolvedFilter,
        page: Page,
    ) -> DomainResult<Vec<Record>>;

    fn exists(&self, mapping: &'static EntityMapping, filter: &ResolvedFilter)
        -> DomainResult<bool>;

    /// Opens a unit of work. Writes until the matching `commit` or
    /// `rollback` are applied together or not at all.
    fn begin(&self) -> DomainResult<()>;

    fn commit(&self) -> DomainResult<()>;

    /// Discards every write since `begin`, generator counters included.
    fn rollback(&self) -> DomainResult<()>;

    fn supports_generated_ids(&self) -> bool;

    /// Next candidate for the generated identifier of `mapping`.
    fn next_id(&self, mapping: &'static EntityMapping) -> DomainResult<DomainId>;
}
