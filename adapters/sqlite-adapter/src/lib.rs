//! SQLite implementation of the `Store` port.
//!
//! Tables are derived from entity mappings: one column per field, a primary
//! key over the identifier fields and a foreign key for associations.
//! Listings are ordered by `rowid`, which follows insertion order and is kept
//! by updates. Generated identifiers come from the `id_counters` table.
//! Units of work are savepoints, so the internal transactions of counter
//! updates and schema changes nest inside them.
//!
//! Uses `rusqlite` with the `bundled` feature for portability.

pub mod config;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use domain::{
    dependency_order, DomainError, DomainId, DomainResult, EntityMapping, FieldKind, Page,
    Predicate, Record, ResolvedFilter, Store, Value,
};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{ffi, params, params_from_iter, Connection, ErrorCode};
use tracing::{debug, info};

pub use config::{ConfigError, DatabaseLocation, SqliteConfig};

const UNIT_OF_WORK: &str = "unit_of_work";

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> DomainResult<Self> {
        let conn = Connection::open(path).map_err(map_sqerr)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> DomainResult<Self> {
        let conn = Connection::open_in_memory().map_err(map_sqerr)?;
        Self::with_connection(conn)
    }

    /// Open the database described by `config`, creating the parent
    /// directory of a database file when needed.
    pub fn from_config(config: &SqliteConfig) -> DomainResult<Self> {
        let store = match &config.location {
            DatabaseLocation::Memory => Self::open_in_memory()?,
            DatabaseLocation::File(path) => {
                if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                    std::fs::create_dir_all(dir).map_err(|e| {
                        DomainError::Repository(format!(
                            "cannot create database directory {}: {e}",
                            dir.display()
                        ))
                    })?;
                }
                Self::open(path)?
            }
        };
        store.lock()?.busy_timeout(config.busy_timeout).map_err(map_sqerr)?;
        Ok(store)
    }

    /// Construct from the `DB_PATH` family of environment variables.
    pub fn from_env() -> DomainResult<Self> {
        let config = SqliteConfig::from_env()
            .map_err(|e| DomainError::InvalidArgument(e.to_string()))?;
        Self::from_config(&config)
    }

    fn with_connection(conn: Connection) -> DomainResult<Self> {
        conn.pragma_update(None, "foreign_keys", true)
            .map_err(map_sqerr)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> DomainResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DomainError::Repository("mutex poisoned".into()))
    }
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> DomainError {
    DomainError::Repository(format!("sqlite error: {e}"))
}

fn is_duplicate_key(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => {
            err.code == ErrorCode::ConstraintViolation
                && matches!(
                    err.extended_code,
                    ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE
                )
        }
        _ => false,
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list(mapping: &EntityMapping) -> String {
    mapping
        .fields
        .iter()
        .map(|field| quote(field.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_type(kind: FieldKind) -> &'static str {
    // "INT" rather than "INTEGER" so an integer key never aliases rowid.
    match kind.column_kind() {
        FieldKind::Int | FieldKind::Bool => "INT",
        FieldKind::Float => "REAL",
        _ => "TEXT",
    }
}

fn create_table_sql(mapping: &EntityMapping) -> String {
    let mut columns: Vec<String> = mapping
        .fields
        .iter()
        .map(|field| {
            let mut column = format!("{} {}", quote(field.name), column_type(field.kind));
            if !field.nullable {
                column.push_str(" NOT NULL");
            }
            if let Some(target) = field.kind.target() {
                if let Some(target_id) = target.single_id_field() {
                    column.push_str(&format!(
                        " REFERENCES {}({})",
                        quote(target.table),
                        quote(target_id.name)
                    ));
                }
            }
            column
        })
        .collect();
    let key = mapping
        .id_fields
        .iter()
        .map(|name| quote(name))
        .collect::<Vec<_>>()
        .join(", ");
    columns.push(format!("PRIMARY KEY ({key})"));
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(mapping.table),
        columns.join(", ")
    )
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn from_sql(raw: ValueRef<'_>, kind: FieldKind) -> Value {
    match (raw, kind.column_kind()) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(i), FieldKind::Bool) => Value::Bool(i != 0),
        (ValueRef::Integer(i), FieldKind::Float) => Value::Float(i as f64),
        (ValueRef::Integer(i), FieldKind::Int) => Value::Int(i),
        (ValueRef::Integer(i), _) => Value::Text(i.to_string()),
        (ValueRef::Real(f), _) => Value::Float(f),
        (ValueRef::Text(bytes) | ValueRef::Blob(bytes), _) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn read_record(row: &rusqlite::Row<'_>, mapping: &EntityMapping) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (index, field) in mapping.fields.iter().enumerate() {
        record.set(field.name, from_sql(row.get_ref(index)?, field.kind));
    }
    Ok(record)
}

/// WHERE clause for `filter`, appending its bound values to `params`.
fn where_clause(filter: &ResolvedFilter, params: &mut Vec<SqlValue>) -> String {
    if filter.predicates.is_empty() {
        return String::new();
    }
    let conditions: Vec<String> = filter
        .predicates
        .iter()
        .map(|predicate| predicate_sql(predicate, params))
        .collect();
    format!(" WHERE {}", conditions.join(" AND "))
}

fn predicate_sql(predicate: &Predicate, params: &mut Vec<SqlValue>) -> String {
    if predicate.is_unsatisfiable() {
        return "0".to_string();
    }
    let column = quote(predicate.column);
    let mut alternatives = Vec::new();
    if predicate.is_null {
        alternatives.push(format!("{column} IS NULL"));
    }
    if !predicate.values.is_empty() {
        let start = params.len();
        params.extend(predicate.values.iter().map(to_sql));
        let placeholders = (start + 1..=params.len())
            .map(|n| format!("?{n}"))
            .collect::<Vec<_>>()
            .join(", ");
        alternatives.push(format!("{column} IN ({placeholders})"));
    }
    format!("({})", alternatives.join(" OR "))
}

/// `"a" = ?n AND "b" = ?m` over the identifier fields, binding `key`.
fn key_clause(mapping: &EntityMapping, key: &[Value], params: &mut Vec<SqlValue>) -> String {
    mapping
        .id_fields
        .iter()
        .zip(key)
        .map(|(name, value)| {
            params.push(to_sql(value));
            format!("{} = ?{}", quote(name), params.len())
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn exists_with(conn: &Connection, table: &str, clause: &str, params: &[SqlValue]) -> DomainResult<bool> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {}{clause})", quote(table));
    debug!(%sql, "sqlite exists");
    conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get::<_, bool>(0))
        .map_err(map_sqerr)
}

impl Store for SqliteStore {
    fn create_schema(&self, mappings: &[&'static EntityMapping]) -> DomainResult<()> {
        for mapping in mappings {
            mapping.validate()?;
        }
        let conn = self.lock()?;
        let mut batch = String::from(
            "CREATE TABLE IF NOT EXISTS id_counters (name TEXT PRIMARY KEY, value INTEGER NOT NULL);\n",
        );
        for mapping in dependency_order(mappings) {
            batch.push_str(&create_table_sql(mapping));
            batch.push_str(";\n");
        }
        debug!(sql = %batch, "sqlite create schema");
        conn.execute_batch(&batch).map_err(map_sqerr)?;
        info!(tables = mappings.len(), "sqlite schema ready");
        Ok(())
    }

    fn truncate(&self, mappings: &[&'static EntityMapping]) -> DomainResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.savepoint().map_err(map_sqerr)?;
        for mapping in dependency_order(mappings).into_iter().rev() {
            tx.execute(&format!("DELETE FROM {}", quote(mapping.table)), [])
                .map_err(map_sqerr)?;
        }
        tx.commit().map_err(map_sqerr)
    }

    fn drop_schema(&self, mappings: &[&'static EntityMapping]) -> DomainResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.savepoint().map_err(map_sqerr)?;
        for mapping in dependency_order(mappings).into_iter().rev() {
            tx.execute(&format!("DROP TABLE IF EXISTS {}", quote(mapping.table)), [])
                .map_err(map_sqerr)?;
        }
        tx.execute("DROP TABLE IF EXISTS id_counters", [])
            .map_err(map_sqerr)?;
        tx.commit().map_err(map_sqerr)?;
        info!(tables = mappings.len(), "sqlite schema dropped");
        Ok(())
    }

    fn insert(&self, mapping: &'static EntityMapping, record: &Record) -> DomainResult<()> {
        let conn = self.lock()?;
        let placeholders = (1..=mapping.fields.len())
            .map(|n| format!("?{n}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            quote(mapping.table),
            column_list(mapping)
        );
        debug!(%sql, "sqlite insert");
        let values: Vec<SqlValue> = mapping
            .fields
            .iter()
            .map(|field| to_sql(record.get(field.name)))
            .collect();
        match conn.execute(&sql, params_from_iter(values.iter())) {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(DomainError::DuplicateEntity {
                class: mapping.class,
            }),
            Err(e) => Err(map_sqerr(e)),
        }
    }

    fn update(&self, mapping: &'static EntityMapping, record: &Record) -> DomainResult<bool> {
        let conn = self.lock()?;
        let key = record.key(mapping);
        let mut values = Vec::new();
        let assignments: Vec<String> = mapping
            .fields
            .iter()
            .filter(|field| !mapping.is_id_field(field.name))
            .map(|field| {
                values.push(to_sql(record.get(field.name)));
                format!("{} = ?{}", quote(field.name), values.len())
            })
            .collect();
        let clause = key_clause(mapping, &key, &mut values);

        if assignments.is_empty() {
            // Nothing to write: the update succeeds when the row is there.
            return exists_with(&conn, mapping.table, &format!(" WHERE {clause}"), &values);
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {clause}",
            quote(mapping.table),
            assignments.join(", ")
        );
        debug!(%sql, "sqlite update");
        let changed = conn
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(map_sqerr)?;
        Ok(changed > 0)
    }

    fn delete(&self, mapping: &'static EntityMapping, key: &[Value]) -> DomainResult<bool> {
        let conn = self.lock()?;
        let mut values = Vec::new();
        let clause = key_clause(mapping, key, &mut values);
        let sql = format!("DELETE FROM {} WHERE {clause}", quote(mapping.table));
        debug!(%sql, "sqlite delete");
        let changed = conn
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(map_sqerr)?;
        Ok(changed > 0)
    }

    fn select(
        &self,
        mapping: &'static EntityMapping,
        filter: &ResolvedFilter,
        page: Page,
    ) -> DomainResult<Vec<Record>> {
        let conn = self.lock()?;
        let mut values = Vec::new();
        let clause = where_clause(filter, &mut values);
        let limit = if page.is_unbounded() {
            -1
        } else {
            i64::try_from(page.limit).unwrap_or(i64::MAX)
        };
        let offset = i64::try_from(page.offset).unwrap_or(i64::MAX);
        values.push(SqlValue::Integer(limit));
        values.push(SqlValue::Integer(offset));
        let sql = format!(
            "SELECT {} FROM {}{clause} ORDER BY rowid LIMIT ?{} OFFSET ?{}",
            column_list(mapping),
            quote(mapping.table),
            values.len() - 1,
            values.len()
        );
        debug!(%sql, "sqlite select");

        let mut stmt = conn.prepare(&sql).map_err(map_sqerr)?;
        let mut rows = stmt
            .query(params_from_iter(values.iter()))
            .map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            out.push(read_record(row, mapping).map_err(map_sqerr)?);
        }
        Ok(out)
    }

    fn exists(
        &self,
        mapping: &'static EntityMapping,
        filter: &ResolvedFilter,
    ) -> DomainResult<bool> {
        let conn = self.lock()?;
        let mut values = Vec::new();
        let clause = where_clause(filter, &mut values);
        exists_with(&conn, mapping.table, &clause, &values)
    }

    fn begin(&self) -> DomainResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(&format!("SAVEPOINT {UNIT_OF_WORK}"))
            .map_err(map_sqerr)
    }

    fn commit(&self) -> DomainResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(&format!("RELEASE {UNIT_OF_WORK}"))
            .map_err(map_sqerr)
    }

    fn rollback(&self) -> DomainResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(&format!(
            "ROLLBACK TO {UNIT_OF_WORK}; RELEASE {UNIT_OF_WORK}"
        ))
        .map_err(map_sqerr)?;
        debug!("sqlite unit of work rolled back");
        Ok(())
    }

    fn supports_generated_ids(&self) -> bool {
        true
    }

    /// Atomically bumps the counter of `mapping`'s table.
    fn next_id(&self, mapping: &'static EntityMapping) -> DomainResult<DomainId> {
        let mut conn = self.lock()?;
        let tx = conn.savepoint().map_err(map_sqerr)?;
        tx.execute(
            "INSERT OR IGNORE INTO id_counters(name, value) VALUES(?1, 0)",
            params![mapping.table],
        )
        .map_err(map_sqerr)?;
        tx.execute(
            "UPDATE id_counters SET value = value + 1 WHERE name = ?1",
            params![mapping.table],
        )
        .map_err(map_sqerr)?;
        let value: i64 = tx
            .query_row(
                "SELECT value FROM id_counters WHERE name = ?1",
                params![mapping.table],
                |row| row.get(0),
            )
            .map_err(map_sqerr)?;
        tx.commit().map_err(map_sqerr)?;
        Ok(DomainId::new(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::FieldMapping;

    static OWNER: EntityMapping = EntityMapping {
        class: "Owner",
        table: "owner",
        fields: &[
            FieldMapping::required("id", FieldKind::Id),
            FieldMapping::optional("label", FieldKind::Text),
            FieldMapping::required("rank", FieldKind::Int),
            FieldMapping::optional("score", FieldKind::Float),
            FieldMapping::required("active", FieldKind::Bool),
        ],
        id_fields: &["id"],
        generated_id: Some("id"),
    };

    static PAIR: EntityMapping = EntityMapping {
        class: "Pair",
        table: "pair",
        fields: &[
            FieldMapping::required("owner", FieldKind::Association(&OWNER)),
            FieldMapping::required("n", FieldKind::Int),
        ],
        id_fields: &["owner", "n"],
        generated_id: None,
    };

    fn tmp_db() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let store = SqliteStore::open(path).unwrap();
        store.create_schema(&[&OWNER, &PAIR]).unwrap();
        (store, dir)
    }

    fn mk_owner(id: &str, label: Option<&str>, rank: i64) -> Record {
        Record::new()
            .with("id", id)
            .with("label", label)
            .with("rank", rank)
            .with("score", Some(0.5))
            .with("active", rank % 2 == 0)
    }

    fn all_rows(store: &SqliteStore, mapping: &'static EntityMapping) -> Vec<Record> {
        store
            .select(mapping, &ResolvedFilter::all(), Page::all())
            .unwrap()
    }

    #[test]
    fn create_table_sql_declares_keys_and_references() {
        let sql = create_table_sql(&PAIR);
        assert!(sql.contains("\"owner\" TEXT NOT NULL REFERENCES \"owner\"(\"id\")"));
        assert!(sql.contains("\"n\" INT NOT NULL"));
        assert!(sql.ends_with("PRIMARY KEY (\"owner\", \"n\"))"));
    }

    #[test]
    fn insert_select_roundtrip_keeps_kinds() {
        let (store, _dir) = tmp_db();
        let record = mk_owner("a", None, 2);
        store.insert(&OWNER, &record).unwrap();
        assert_eq!(all_rows(&store, &OWNER), vec![record]);
    }

    #[test]
    fn insert_duplicate_conflict() {
        let (store, _dir) = tmp_db();
        store.insert(&OWNER, &mk_owner("a", None, 1)).unwrap();
        let err = store.insert(&OWNER, &mk_owner("a", Some("x"), 2)).unwrap_err();
        assert!(matches!(err, DomainError::DuplicateEntity { class: "Owner" }));
    }

    #[test]
    fn missing_required_column_is_not_a_duplicate() {
        let (store, _dir) = tmp_db();
        let record = Record::new().with("id", "a");
        let err = store.insert(&OWNER, &record).unwrap_err();
        assert!(matches!(err, DomainError::Repository(_)));
    }

    #[test]
    fn select_orders_by_insertion_and_pages() {
        let (store, _dir) = tmp_db();
        for (id, rank) in [("c", 1), ("a", 2), ("b", 3)] {
            store.insert(&OWNER, &mk_owner(id, None, rank)).unwrap();
        }
        store.update(&OWNER, &mk_owner("c", Some("moved?"), 9)).unwrap();
        let ids: Vec<Value> = all_rows(&store, &OWNER)
            .iter()
            .map(|row| row.get("id").clone())
            .collect();
        assert_eq!(ids, vec![Value::from("c"), Value::from("a"), Value::from("b")]);

        let page = store
            .select(&OWNER, &ResolvedFilter::all(), Page::new(1, 1))
            .unwrap();
        assert_eq!(page[0].get("id"), &Value::from("a"));
        let rest = store
            .select(&OWNER, &ResolvedFilter::all(), Page::from_offset(1))
            .unwrap();
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn filters_match_null_and_alternatives() {
        let (store, _dir) = tmp_db();
        store.insert(&OWNER, &mk_owner("a", None, 1)).unwrap();
        store.insert(&OWNER, &mk_owner("b", Some("x"), 2)).unwrap();
        store.insert(&OWNER, &mk_owner("c", Some("y"), 3)).unwrap();

        let filter = domain::FieldFilter::new()
            .with("label", domain::Criterion::null())
            .resolve(&OWNER)
            .unwrap();
        assert_eq!(store.select(&OWNER, &filter, Page::all()).unwrap().len(), 1);

        let filter = domain::FieldFilter::new()
            .with("rank", domain::Criterion::any_of([2, 3]))
            .with("active", false)
            .resolve(&OWNER)
            .unwrap();
        let rows = store.select(&OWNER, &filter, Page::all()).unwrap();
        assert_eq!(rows, vec![mk_owner("c", Some("y"), 3)]);
        assert!(store.exists(&OWNER, &filter).unwrap());

        let nothing = domain::FieldFilter::new()
            .with("id", DomainId::empty())
            .resolve(&OWNER)
            .unwrap();
        assert!(store.select(&OWNER, &nothing, Page::all()).unwrap().is_empty());
        assert!(!store.exists(&OWNER, &nothing).unwrap());
    }

    #[test]
    fn update_and_delete_report_missing_rows() {
        let (store, _dir) = tmp_db();
        store.insert(&OWNER, &mk_owner("a", None, 1)).unwrap();
        assert!(store.update(&OWNER, &mk_owner("a", Some("new"), 1)).unwrap());
        assert!(!store.update(&OWNER, &mk_owner("zz", None, 1)).unwrap());
        assert_eq!(all_rows(&store, &OWNER)[0].get("label"), &Value::from("new"));

        assert!(store.delete(&OWNER, &[Value::from("a")]).unwrap());
        assert!(!store.delete(&OWNER, &[Value::from("a")]).unwrap());
    }

    #[test]
    fn key_only_update_checks_existence() {
        let (store, _dir) = tmp_db();
        store.insert(&OWNER, &mk_owner("a", None, 1)).unwrap();
        let pair = Record::new().with("owner", "a").with("n", 1);
        assert!(!store.update(&PAIR, &pair).unwrap());
        store.insert(&PAIR, &pair).unwrap();
        assert!(store.update(&PAIR, &pair).unwrap());
    }

    #[test]
    fn references_are_enforced() {
        let (store, _dir) = tmp_db();
        let orphan = Record::new().with("owner", "ghost").with("n", 1);
        let err = store.insert(&PAIR, &orphan).unwrap_err();
        assert!(matches!(err, DomainError::Repository(_)));
    }

    #[test]
    fn rollback_discards_rows_and_counters() {
        let (store, _dir) = tmp_db();
        store.insert(&OWNER, &mk_owner("kept", None, 1)).unwrap();

        store.begin().unwrap();
        assert_eq!(store.next_id(&OWNER).unwrap(), DomainId::new("1"));
        store.insert(&OWNER, &mk_owner("dropped", None, 2)).unwrap();
        store.rollback().unwrap();

        let rows = all_rows(&store, &OWNER);
        assert_eq!(rows, vec![mk_owner("kept", None, 1)]);
        assert_eq!(store.next_id(&OWNER).unwrap(), DomainId::new("1"));

        store.begin().unwrap();
        store.insert(&OWNER, &mk_owner("committed", None, 3)).unwrap();
        store.commit().unwrap();
        assert_eq!(all_rows(&store, &OWNER).len(), 2);
    }

    #[test]
    fn counters_increment_per_table() {
        let (store, _dir) = tmp_db();
        assert_eq!(store.next_id(&OWNER).unwrap(), DomainId::new("1"));
        assert_eq!(store.next_id(&OWNER).unwrap(), DomainId::new("2"));
        assert_eq!(store.next_id(&PAIR).unwrap(), DomainId::new("1"));
    }

    #[test]
    fn truncate_keeps_schema_and_drop_removes_it() {
        let (store, _dir) = tmp_db();
        store.insert(&OWNER, &mk_owner("a", None, 1)).unwrap();
        store
            .insert(&PAIR, &Record::new().with("owner", "a").with("n", 1))
            .unwrap();
        store.truncate(&[&OWNER, &PAIR]).unwrap();
        assert!(all_rows(&store, &OWNER).is_empty());
        assert!(all_rows(&store, &PAIR).is_empty());

        store.insert(&OWNER, &mk_owner("b", None, 2)).unwrap();
        store
            .insert(&PAIR, &Record::new().with("owner", "b").with("n", 2))
            .unwrap();
        store.drop_schema(&[&OWNER, &PAIR]).unwrap();
        let err = store
            .select(&OWNER, &ResolvedFilter::all(), Page::all())
            .unwrap_err();
        assert!(matches!(err, DomainError::Repository(_)));
    }

    #[test]
    fn from_env_opens_the_configured_database() {
        // Whatever DB_PATH names, the rollback leaves it untouched.
        let store = SqliteStore::from_env().unwrap();
        store.begin().unwrap();
        store.create_schema(&[&OWNER]).unwrap();
        store.insert(&OWNER, &mk_owner("env", None, 1)).unwrap();
        assert!(all_rows(&store, &OWNER)
            .iter()
            .any(|row| row.get("id") == &Value::from("env")));
        store.rollback().unwrap();
    }

    #[test]
    fn from_config_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = SqliteConfig {
            location: DatabaseLocation::File(dir.path().join("nested/dir/t.db")),
            ..SqliteConfig::default()
        };
        let store = SqliteStore::from_config(&config).unwrap();
        store.create_schema(&[&OWNER]).unwrap();
        assert!(dir.path().join("nested/dir/t.db").exists());
    }
}
