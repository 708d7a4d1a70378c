//! Runs the repository contract suite against `SqliteStore`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use domain::testkit::{fixtures, RepositoryHarness};
use domain::{DomainError, DomainResult, EntityManager, Page, ResolvedFilter, Store};
use sqlite_adapter::{DatabaseLocation, SqliteConfig, SqliteStore};

/// Configuration read through the same variables as `SqliteConfig::from_env`.
fn config_from(vars: &[(&str, String)]) -> DomainResult<SqliteConfig> {
    let vars: HashMap<&str, String> = vars.iter().cloned().collect();
    SqliteConfig::from_vars(|key| vars.get(key).cloned())
        .map_err(|e| DomainError::InvalidArgument(e.to_string()))
}

fn db_path(dir: &Path) -> String {
    dir.join("contract.db").display().to_string()
}

fn tempdir() -> DomainResult<tempfile::TempDir> {
    tempfile::tempdir().map_err(|e| DomainError::Repository(format!("tempdir: {e}")))
}

/// Fresh in-memory database per test.
pub struct SqliteHarness {
    manager: EntityManager,
    config: SqliteConfig,
}

impl RepositoryHarness for SqliteHarness {
    fn init() -> DomainResult<Self> {
        let config = config_from(&[])?;
        let store = SqliteStore::from_config(&config)?;
        Ok(Self {
            manager: EntityManager::new(Arc::new(store)),
            config,
        })
    }

    fn manager(&self) -> &EntityManager {
        &self.manager
    }

    fn create_schema(&self) -> bool {
        self.config.create_schema
    }
}

/// Database file in a temporary directory, removed with the harness.
pub struct FileSqliteHarness {
    manager: EntityManager,
    config: SqliteConfig,
    _dir: tempfile::TempDir,
}

impl RepositoryHarness for FileSqliteHarness {
    fn init() -> DomainResult<Self> {
        let dir = tempdir()?;
        let config = config_from(&[
            ("DB_PATH", db_path(dir.path())),
            ("SQLITE_BUSY_TIMEOUT_MS", "1000".into()),
        ])?;
        assert!(matches!(config.location, DatabaseLocation::File(_)));
        let store = SqliteStore::from_config(&config)?;
        Ok(Self {
            manager: EntityManager::new(Arc::new(store)),
            config,
            _dir: dir,
        })
    }

    fn manager(&self) -> &EntityManager {
        &self.manager
    }

    fn create_schema(&self) -> bool {
        self.config.create_schema
    }
}

/// Database whose schema is laid out before the harness opens it, as a
/// migration tool would. The harness only clears rows between tests.
pub struct ExternalSchemaHarness {
    manager: EntityManager,
    config: SqliteConfig,
    _dir: tempfile::TempDir,
}

impl RepositoryHarness for ExternalSchemaHarness {
    fn init() -> DomainResult<Self> {
        let dir = tempdir()?;
        let path = db_path(dir.path());
        SqliteStore::open(&path)?.create_schema(&fixtures::mappings())?;

        let config = config_from(&[
            ("DB_PATH", path),
            ("SQLITE_CREATE_SCHEMA", "false".into()),
        ])?;
        let store = SqliteStore::from_config(&config)?;
        Ok(Self {
            manager: EntityManager::new(Arc::new(store)),
            config,
            _dir: dir,
        })
    }

    fn manager(&self) -> &EntityManager {
        &self.manager
    }

    fn create_schema(&self) -> bool {
        self.config.create_schema
    }
}

#[test]
fn destroy_leaves_an_external_schema_in_place() {
    let harness = ExternalSchemaHarness::init().unwrap();
    assert!(!harness.create_schema());
    harness.prepare().unwrap();
    let manager = harness.manager().clone();
    harness.destroy().unwrap();

    let rows = manager
        .store()
        .select(&fixtures::TEST_PRIMITIVE_ENTITY, &ResolvedFilter::all(), Page::all())
        .unwrap();
    assert!(rows.is_empty());
}

mod in_memory {
    use super::SqliteHarness;

    domain::repository_contract_tests!(SqliteHarness);
}

mod file_backed {
    use super::FileSqliteHarness;

    domain::repository_contract_tests!(FileSqliteHarness);
}

mod external_schema {
    use super::ExternalSchemaHarness;

    domain::repository_contract_tests!(ExternalSchemaHarness);
}
