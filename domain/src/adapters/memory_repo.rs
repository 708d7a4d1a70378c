use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};

use crate::filter::{Page, ResolvedFilter};
use crate::mapping::{EntityMapping, Record};
use crate::store::Store;
use crate::value::Value;
use crate::{DomainError, DomainId, DomainResult};

/// In-memory store for tests. Rows of each table are kept in a `Vec` so
/// listings follow insertion order; the mutex guards all tables at once.
/// A unit of work keeps a copy of the tables taken at `begin`.
pub struct InMemoryStore {
    inner: Mutex<Tables>,
    generated_ids: bool,
}

#[derive(Default)]
struct Tables {
    rows: BTreeMap<&'static str, Vec<Record>>,
    counters: BTreeMap<&'static str, u64>,
    snapshot: Option<Snapshot>,
}

struct Snapshot {
    rows: BTreeMap<&'static str, Vec<Record>>,
    counters: BTreeMap<&'static str, u64>,
}

impl Tables {
    fn table(&self, mapping: &EntityMapping) -> DomainResult<&Vec<Record>> {
        self.rows.get(mapping.table).ok_or_else(|| missing_table(mapping))
    }

    fn table_mut(&mut self, mapping: &EntityMapping) -> DomainResult<&mut Vec<Record>> {
        self.rows
            .get_mut(mapping.table)
            .ok_or_else(|| missing_table(mapping))
    }
}

fn missing_table(mapping: &EntityMapping) -> DomainError {
    DomainError::Repository(format!("no such table: {}", mapping.table))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Tables::default()),
            generated_ids: true,
        }
    }

    /// A store that leaves identifier generation to the caller.
    pub fn without_generated_ids() -> Self {
        Self {
            generated_ids: false,
            ..Self::new()
        }
    }

    fn lock(&self) -> DomainResult<MutexGuard<'_, Tables>> {
        self.inner
            .lock()
            .map_err(|_| DomainError::Repository("mutex poisoned".into()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for InMemoryStore {
    fn create_schema(&self, mappings: &[&'static EntityMapping]) -> DomainResult<()> {
        let mut tables = self.lock()?;
        for mapping in mappings {
            mapping.validate()?;
            tables.rows.entry(mapping.table).or_default();
        }
        info!(tables = mappings.len(), "in-memory schema ready");
        Ok(())
    }

    fn truncate(&self, mappings: &[&'static EntityMapping]) -> DomainResult<()> {
        let mut tables = self.lock()?;
        for mapping in mappings {
            if let Some(rows) = tables.rows.get_mut(mapping.table) {
                rows.clear();
            }
        }
        Ok(())
    }

    fn drop_schema(&self, mappings: &[&'static EntityMapping]) -> DomainResult<()> {
        let mut tables = self.lock()?;
        for mapping in mappings {
            tables.rows.remove(mapping.table);
            tables.counters.remove(mapping.table);
        }
        Ok(())
    }

    fn insert(&self, mapping: &'static EntityMapping, record: &Record) -> DomainResult<()> {
        let mut tables = self.lock()?;
        let rows = tables.table_mut(mapping)?;
        let key = record.key(mapping);
        if rows.iter().any(|row| row.key(mapping) == key) {
            return Err(DomainError::DuplicateEntity {
                class: mapping.class,
            });
        }
        rows.push(record.clone());
        Ok(())
    }

    fn update(&self, mapping: &'static EntityMapping, record: &Record) -> DomainResult<bool> {
        let mut tables = self.lock()?;
        let rows = tables.table_mut(mapping)?;
        let key = record.key(mapping);
        match rows.iter_mut().find(|row| row.key(mapping) == key) {
            Some(row) => {
                *row = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, mapping: &'static EntityMapping, key: &[Value]) -> DomainResult<bool> {
        let mut tables = self.lock()?;
        let rows = tables.table_mut(mapping)?;
        match rows.iter().position(|row| row.key(mapping) == key) {
            Some(position) => {
                rows.remove(position);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn select(
        &self,
        mapping: &'static EntityMapping,
        filter: &ResolvedFilter,
        page: Page,
    ) -> DomainResult<Vec<Record>> {
        let tables = self.lock()?;
        let rows = tables.table(mapping)?;
        Ok(page.apply(rows.iter().filter(|row| filter.matches(row)).cloned()))
    }

    fn exists(
        &self,
        mapping: &'static EntityMapping,
        filter: &ResolvedFilter,
    ) -> DomainResult<bool> {
        let tables = self.lock()?;
        Ok(tables.table(mapping)?.iter().any(|row| filter.matches(row)))
    }

    fn begin(&self) -> DomainResult<()> {
        let mut tables = self.lock()?;
        if tables.snapshot.is_some() {
            return Err(DomainError::Logic("unit of work already open".into()));
        }
        let snapshot = Snapshot {
            rows: tables.rows.clone(),
            counters: tables.counters.clone(),
        };
        tables.snapshot = Some(snapshot);
        Ok(())
    }

    fn commit(&self) -> DomainResult<()> {
        self.lock()?.snapshot = None;
        Ok(())
    }

    fn rollback(&self) -> DomainResult<()> {
        let mut tables = self.lock()?;
        if let Some(snapshot) = tables.snapshot.take() {
            tables.rows = snapshot.rows;
            tables.counters = snapshot.counters;
            debug!("in-memory unit of work rolled back");
        }
        Ok(())
    }

    fn supports_generated_ids(&self) -> bool {
        self.generated_ids
    }

    fn next_id(&self, mapping: &'static EntityMapping) -> DomainResult<DomainId> {
        if !self.generated_ids {
            return Err(DomainError::Logic(format!(
                "store does not generate identifiers for {}",
                mapping.class
            )));
        }
        let mut tables = self.lock()?;
        let counter = tables.counters.entry(mapping.table).or_insert(0);
        *counter += 1;
        Ok(DomainId::new(counter.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{FieldKind, FieldMapping};

    static ITEM: EntityMapping = EntityMapping {
        class: "Item",
        table: "item",
        fields: &[
            FieldMapping::required("id", FieldKind::Id),
            FieldMapping::optional("label", FieldKind::Text),
        ],
        id_fields: &["id"],
        generated_id: Some("id"),
    };

    fn mk_item(id: &str, label: Option<&str>) -> Record {
        Record::new().with("id", id).with("label", label)
    }

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.create_schema(&[&ITEM]).unwrap();
        store
    }

    #[test]
    fn insert_select_roundtrip() {
        let store = store();
        store.insert(&ITEM, &mk_item("a", Some("first"))).unwrap();
        let rows = store.select(&ITEM, &ResolvedFilter::all(), Page::all()).unwrap();
        assert_eq!(rows, vec![mk_item("a", Some("first"))]);
    }

    #[test]
    fn insert_rejects_duplicate() {
        let store = store();
        store.insert(&ITEM, &mk_item("dup", None)).unwrap();
        let err = store.insert(&ITEM, &mk_item("dup", Some("again"))).unwrap_err();
        assert!(matches!(err, DomainError::DuplicateEntity { class: "Item" }));
    }

    #[test]
    fn update_keeps_insertion_order() {
        let store = store();
        for id in ["a", "b", "c"] {
            store.insert(&ITEM, &mk_item(id, None)).unwrap();
        }
        assert!(store.update(&ITEM, &mk_item("a", Some("changed"))).unwrap());
        assert!(!store.update(&ITEM, &mk_item("zz", None)).unwrap());
        let rows = store.select(&ITEM, &ResolvedFilter::all(), Page::all()).unwrap();
        assert_eq!(rows[0], mk_item("a", Some("changed")));
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn delete_reports_missing_rows() {
        let store = store();
        store.insert(&ITEM, &mk_item("a", None)).unwrap();
        assert!(store.delete(&ITEM, &[Value::from("a")]).unwrap());
        assert!(!store.delete(&ITEM, &[Value::from("a")]).unwrap());
    }

    #[test]
    fn counters_are_per_table() {
        let store = store();
        assert_eq!(store.next_id(&ITEM).unwrap(), DomainId::new("1"));
        assert_eq!(store.next_id(&ITEM).unwrap(), DomainId::new("2"));
        assert!(InMemoryStore::without_generated_ids().next_id(&ITEM).is_err());
    }

    #[test]
    fn rollback_restores_rows_and_counters() {
        let store = store();
        store.insert(&ITEM, &mk_item("kept", None)).unwrap();

        store.begin().unwrap();
        assert!(store.begin().is_err());
        assert_eq!(store.next_id(&ITEM).unwrap(), DomainId::new("1"));
        store.insert(&ITEM, &mk_item("dropped", None)).unwrap();
        store.update(&ITEM, &mk_item("kept", Some("changed"))).unwrap();
        store.rollback().unwrap();

        let rows = store.select(&ITEM, &ResolvedFilter::all(), Page::all()).unwrap();
        assert_eq!(rows, vec![mk_item("kept", None)]);
        assert_eq!(store.next_id(&ITEM).unwrap(), DomainId::new("1"));

        store.begin().unwrap();
        store.insert(&ITEM, &mk_item("committed", None)).unwrap();
        store.commit().unwrap();
        store.rollback().unwrap();
        assert_eq!(store.select(&ITEM, &ResolvedFilter::all(), Page::all()).unwrap().len(), 2);
    }

    #[test]
    fn operations_need_a_schema() {
        let store = InMemoryStore::new();
        let err = store.insert(&ITEM, &mk_item("a", None)).unwrap_err();
        assert!(matches!(err, DomainError::Repository(_)));
        store.create_schema(&[&ITEM]).unwrap();
        store.drop_schema(&[&ITEM]).unwrap();
        assert!(store.exists(&ITEM, &ResolvedFilter::all()).is_err());
    }

    mod contract {
        use crate::testkit::harness::InMemoryHarness;

        mod generated_ids {
            use super::InMemoryHarness;

            crate::repository_contract_tests!(InMemoryHarness<true>);
        }

        mod caller_assigned_ids {
            use super::InMemoryHarness;

            crate::repository_contract_tests!(InMemoryHarness<false>);
        }
    }
}
