//! Entity mapping metadata and the record form of an entity.
//!
//! A mapping describes how one entity class is laid out in storage: the
//! table, the ordered fields and which of them form the identifier. Stores
//! build their schema from mappings; the entity manager uses them to convert
//! between entities and records.

use std::fmt::{Debug, Formatter};

use crate::value::Value;
use crate::{DomainError, DomainResult};

/// Kind of a mapped field.
#[derive(Clone, Copy)]
pub enum FieldKind {
    /// A `DomainId`, stored as text.
    Id,
    Text,
    Int,
    Float,
    Bool,
    /// Reference to another entity, stored as that entity's identifier.
    Association(&'static EntityMapping),
}

impl FieldKind {
    /// Kind of the stored column. Associations resolve to the kind of the
    /// target's identifier field.
    pub fn column_kind(self) -> FieldKind {
        match self {
            FieldKind::Association(target) => target
                .single_id_field()
                .map_or(FieldKind::Text, |field| field.kind.column_kind()),
            kind => kind,
        }
    }

    pub fn target(self) -> Option<&'static EntityMapping> {
        match self {
            FieldKind::Association(target) => Some(target),
            _ => None,
        }
    }
}

impl Debug for FieldKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Id => f.write_str("Id"),
            FieldKind::Text => f.write_str("Text"),
            FieldKind::Int => f.write_str("Int"),
            FieldKind::Float => f.write_str("Float"),
            FieldKind::Bool => f.write_str("Bool"),
            FieldKind::Association(target) => write!(f, "Association({})", target.class),
        }
    }
}

impl PartialEq for FieldKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldKind::Association(a), FieldKind::Association(b)) => a.class == b.class,
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

#[derive(Debug)]
pub struct FieldMapping {
    pub name: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
}

impl FieldMapping {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
        }
    }
}

/// Storage layout of one entity class.
#[derive(Debug)]
pub struct EntityMapping {
    pub class: &'static str,
    pub table: &'static str,
    pub fields: &'static [FieldMapping],
    pub id_fields: &'static [&'static str],
    /// Identifier field the store fills in when it is left empty.
    pub generated_id: Option<&'static str>,
}

impl EntityMapping {
    pub fn field(&self, name: &str) -> Option<&'static FieldMapping> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn is_id_field(&self, name: &str) -> bool {
        self.id_fields.contains(&name)
    }

    pub fn id_mappings(&self) -> impl Iterator<Item = &'static FieldMapping> + '_ {
        self.id_fields.iter().filter_map(|name| self.field(name))
    }

    /// The identifier field, when the class is keyed by exactly one field.
    pub fn single_id_field(&self) -> Option<&'static FieldMapping> {
        match self.id_fields {
            [name] => self.field(name),
            _ => None,
        }
    }

    /// Checks the mapping is usable: identifier fields exist and are not
    /// nullable, association targets are keyed by a single field, and the
    /// generated identifier is an `Id` identifier field.
    pub fn validate(&self) -> DomainResult<()> {
        if self.id_fields.is_empty() {
            return Err(DomainError::InvalidArgument(format!(
                "{} declares no identifier fields",
                self.class
            )));
        }
        for name in self.id_fields {
            match self.field(name) {
                None => {
                    return Err(DomainError::InvalidArgument(format!(
                        "{} declares unknown identifier field `{name}`",
                        self.class
                    )))
                }
                Some(field) if field.nullable => {
                    return Err(DomainError::InvalidArgument(format!(
                        "{} identifier field `{name}` cannot be nullable",
                        self.class
                    )))
                }
                Some(_) => {}
            }
        }
        for field in self.fields {
            if let Some(target) = field.kind.target() {
                if target.single_id_field().is_none() {
                    return Err(DomainError::InvalidArgument(format!(
                        "{}.{} targets {} which is not keyed by a single field",
                        self.class, field.name, target.class
                    )));
                }
            }
        }
        if let Some(name) = self.generated_id {
            let generated = self
                .field(name)
                .filter(|field| matches!(field.kind, FieldKind::Id) && self.is_id_field(name));
            if generated.is_none() {
                return Err(DomainError::InvalidArgument(format!(
                    "{} generated identifier `{name}` must be an Id identifier field",
                    self.class
                )));
            }
        }
        Ok(())
    }
}

/// Orders `mappings` so association targets come before the classes that
/// reference them. Targets outside `mappings` are ignored, and a cycle is cut
/// at the class first reached again.
pub fn dependency_order(mappings: &[&'static EntityMapping]) -> Vec<&'static EntityMapping> {
    fn visit(
        mapping: &'static EntityMapping,
        mappings: &[&'static EntityMapping],
        visiting: &mut Vec<&'static str>,
        ordered: &mut Vec<&'static EntityMapping>,
    ) {
        if visiting.contains(&mapping.class) || ordered.iter().any(|done| *done == mapping) {
            return;
        }
        visiting.push(mapping.class);
        for target in mapping.fields.iter().filter_map(|field| field.kind.target()) {
            if mappings.iter().any(|candidate| *candidate == target) {
                visit(target, mappings, visiting, ordered);
            }
        }
        visiting.pop();
        ordered.push(mapping);
    }

    let mut ordered = Vec::with_capacity(mappings.len());
    let mut visiting = Vec::new();
    for mapping in mappings {
        visit(*mapping, mappings, &mut visiting, &mut ordered);
    }
    ordered
}

impl PartialEq for EntityMapping {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class
    }
}

/// Persisted state of one entity, one value per mapped field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    columns: Vec<(&'static str, Value)>,
}

static NULL: Value = Value::Null;

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &'static str, value: impl Into<Value>) {
        let value = value.into();
        match self.columns.iter_mut().find(|(column, _)| *column == name) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((name, value)),
        }
    }

    /// Value of `name`; missing columns read as `Null`.
    pub fn get(&self, name: &str) -> &Value {
        self.columns
            .iter()
            .find(|(column, _)| *column == name)
            .map_or(&NULL, |(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.columns.iter().map(|(name, value)| (*name, value))
    }

    /// Identifier values in the order the mapping declares them.
    pub fn key(&self, mapping: &EntityMapping) -> Vec<Value> {
        mapping
            .id_fields
            .iter()
            .map(|name| self.get(name).clone())
            .collect()
    }

    pub fn id(&self, name: &str) -> DomainResult<crate::DomainId> {
        match self.get(name) {
            Value::Null => Ok(crate::DomainId::empty()),
            Value::Text(s) => Ok(crate::DomainId::new(s.as_str())),
            Value::Int(i) => Ok(crate::DomainId::new(i.to_string())),
            other => Err(column_type_error(name, other, "identifier")),
        }
    }

    pub fn text(&self, name: &str) -> DomainResult<String> {
        self.opt_text(name)?.ok_or_else(|| null_column_error(name))
    }

    pub fn opt_text(&self, name: &str) -> DomainResult<Option<String>> {
        match self.get(name) {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            other => Err(column_type_error(name, other, "text")),
        }
    }

    pub fn int(&self, name: &str) -> DomainResult<i64> {
        self.opt_int(name)?.ok_or_else(|| null_column_error(name))
    }

    pub fn opt_int(&self, name: &str) -> DomainResult<Option<i64>> {
        match self.get(name) {
            Value::Null => Ok(None),
            Value::Int(i) => Ok(Some(*i)),
            other => Err(column_type_error(name, other, "int")),
        }
    }

    pub fn float(&self, name: &str) -> DomainResult<f64> {
        self.opt_float(name)?.ok_or_else(|| null_column_error(name))
    }

    pub fn opt_float(&self, name: &str) -> DomainResult<Option<f64>> {
        match self.get(name) {
            Value::Null => Ok(None),
            Value::Float(f) => Ok(Some(*f)),
            Value::Int(i) => Ok(Some(*i as f64)),
            other => Err(column_type_error(name, other, "float")),
        }
    }

    pub fn bool(&self, name: &str) -> DomainResult<bool> {
        match self.get(name) {
            Value::Bool(b) => Ok(*b),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            Value::Null => Err(null_column_error(name)),
            other => Err(column_type_error(name, other, "bool")),
        }
    }
}

fn null_column_error(name: &str) -> DomainError {
    DomainError::Repository(format!("column `{name}` is unexpectedly null"))
}

fn column_type_error(name: &str, value: &Value, expected: &str) -> DomainError {
    DomainError::Repository(format!("column `{name}` holds {value:?}, expected {expected}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    static TARGET: EntityMapping = EntityMapping {
        class: "Target",
        table: "target",
        fields: &[FieldMapping::required("id", FieldKind::Int)],
        id_fields: &["id"],
        generated_id: None,
    };

    static COMPOSITE: EntityMapping = EntityMapping {
        class: "Composite",
        table: "composite",
        fields: &[
            FieldMapping::required("a", FieldKind::Id),
            FieldMapping::required("b", FieldKind::Text),
        ],
        id_fields: &["a", "b"],
        generated_id: None,
    };

    #[test]
    fn association_columns_take_the_target_identifier_kind() {
        assert_eq!(FieldKind::Association(&TARGET).column_kind(), FieldKind::Int);
        assert_eq!(FieldKind::Text.column_kind(), FieldKind::Text);
    }

    #[test]
    fn validate_rejects_composite_association_targets() {
        static OWNER: EntityMapping = EntityMapping {
            class: "Owner",
            table: "owner",
            fields: &[
                FieldMapping::required("id", FieldKind::Id),
                FieldMapping::optional("composite", FieldKind::Association(&COMPOSITE)),
            ],
            id_fields: &["id"],
            generated_id: None,
        };
        assert!(TARGET.validate().is_ok());
        assert!(COMPOSITE.validate().is_ok());
        assert!(matches!(OWNER.validate(), Err(DomainError::InvalidArgument(_))));
    }

    #[test]
    fn validate_rejects_bad_identifier_declarations() {
        static UNKNOWN_ID: EntityMapping = EntityMapping {
            class: "UnknownId",
            table: "unknown_id",
            fields: &[FieldMapping::required("id", FieldKind::Id)],
            id_fields: &["missing"],
            generated_id: None,
        };
        static GENERATED_TEXT: EntityMapping = EntityMapping {
            class: "GeneratedText",
            table: "generated_text",
            fields: &[FieldMapping::required("id", FieldKind::Text)],
            id_fields: &["id"],
            generated_id: Some("id"),
        };
        assert!(UNKNOWN_ID.validate().is_err());
        assert!(GENERATED_TEXT.validate().is_err());
    }

    #[test]
    fn dependency_order_puts_targets_first() {
        static REFERRER: EntityMapping = EntityMapping {
            class: "Referrer",
            table: "referrer",
            fields: &[
                FieldMapping::required("id", FieldKind::Id),
                FieldMapping::optional("target", FieldKind::Association(&TARGET)),
            ],
            id_fields: &["id"],
            generated_id: None,
        };
        let ordered = dependency_order(&[&REFERRER, &COMPOSITE, &TARGET]);
        let classes: Vec<&str> = ordered.iter().map(|mapping| mapping.class).collect();
        assert_eq!(classes, vec!["Target", "Referrer", "Composite"]);

        let without_target = dependency_order(&[&REFERRER]);
        assert_eq!(without_target.len(), 1);
    }

    #[test]
    fn record_iterates_columns_in_insertion_order() {
        let mut record = Record::new().with("b", 2).with("a", "x");
        record.set("b", 3);
        let columns: Vec<(&str, &Value)> = record.iter().collect();
        assert_eq!(columns, vec![("b", &Value::Int(3)), ("a", &Value::Text("x".into()))]);
    }

    #[test]
    fn record_reads_keys_in_mapping_order() {
        let record = Record::new().with("b", "x").with("a", "1");
        assert_eq!(
            record.key(&COMPOSITE),
            vec![Value::Text("1".into()), Value::Text("x".into())]
        );
        assert_eq!(record.get("missing"), &Value::Null);
    }

    #[test]
    fn record_typed_getters_report_mismatches() {
        let record = Record::new()
            .with("n", 1)
            .with("flag", 0)
            .with("s", "foo")
            .with("none", Value::Null);
        assert_eq!(record.int("n").unwrap(), 1);
        assert!(!record.bool("flag").unwrap());
        assert_eq!(record.opt_float("n").unwrap(), Some(1.0));
        assert_eq!(record.opt_text("none").unwrap(), None);
        assert!(record.int("s").is_err());
        assert!(record.text("none").is_err());
        assert!(record.id("none").unwrap().is_empty());
    }
}
