//! Domain library for the entity repository.
//!
//! This crate holds the identifier and value types, entity mapping metadata,
//! the `Store` port, the entity manager and the typed repository contract
//! built on top of it. Storage engines live in `adapters` (in-memory) and in
//! separate crates (SQLite). The `testkit` feature adds fixtures, the harness
//! trait and the contract suite every backend is expected to pass.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value-object wrapper around an opaque identifier.
///
/// An identifier is empty until a value is assigned, either by the caller or
/// by a store that generates identifiers. An empty string counts as empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(Option<String>);

impl DomainId {
    pub fn new<S: Into<String>>(s: S) -> Self {
        let val = s.into();
        if val.is_empty() {
            return Self(None);
        }
        Self(Some(val))
    }

    pub fn empty() -> Self {
        Self(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// String form of the identifier; empty identifiers render as `""`.
    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }
}

impl Display for DomainId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for DomainId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DomainId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Errors surfaced by repositories and stores.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("entity of class {class} not found")]
    NotFound { class: &'static str },
    #[error("entity of class {class} already exists")]
    DuplicateEntity { class: &'static str },
    #[error("repository manages {expected}, got an entity of class {actual}")]
    InvalidClass {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("logic error: {0}")]
    Logic(String),
    #[error("repository error: {0}")]
    Repository(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

pub mod adapters;
pub mod entity;
pub mod filter;
pub mod manager;
pub mod mapping;
pub mod repository;
pub mod store;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
pub mod value;

pub use entity::{primary_filter, Entity, EntityRef, EntityState, Hydrate};
pub use filter::{Criterion, FieldFilter, Page, Predicate, ResolvedFilter};
pub use manager::{EntityManager, Hydrator};
pub use mapping::{dependency_order, EntityMapping, FieldKind, FieldMapping, Record};
pub use repository::{DomainCollection, DomainEntityRepository};
pub use store::Store;
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_id_tracks_emptiness() {
        let id = DomainId::new("abc123");
        assert!(!id.is_empty());
        assert_eq!(id.as_str(), "abc123");
        assert_eq!(id.to_string(), "abc123");

        assert!(DomainId::empty().is_empty());
        assert!(DomainId::new("").is_empty());
        assert_eq!(DomainId::default().as_str(), "");
    }

    #[test]
    fn domain_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&DomainId::new("42")).unwrap();
        assert_eq!(json, "\"42\"");
        let json = serde_json::to_string(&DomainId::empty()).unwrap();
        assert_eq!(json, "null");
        let back: DomainId = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(back, DomainId::new("7"));
    }

    #[test]
    fn errors_render_their_class() {
        let err = DomainError::InvalidClass {
            expected: "TestPrimitiveEntity",
            actual: "TestEntity",
        };
        assert_eq!(
            err.to_string(),
            "repository manages TestPrimitiveEntity, got an entity of class TestEntity"
        );
        let err = DomainError::NotFound { class: "TestEntity" };
        assert_eq!(err.to_string(), "entity of class TestEntity not found");
    }
}
