//! Persisted scalar values and coercion into column kinds.

use serde::{Deserialize, Serialize};

use crate::mapping::FieldKind;
use crate::DomainId;

/// A scalar as stored in a column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts the value into the storage representation of `kind`.
    ///
    /// Returns `None` when the value has no representation in that kind, e.g.
    /// a non-numeric string compared against an integer column. `Null` stays
    /// `Null` for every kind.
    pub fn coerce(&self, kind: FieldKind) -> Option<Value> {
        if self.is_null() {
            return Some(Value::Null);
        }
        match kind.column_kind() {
            FieldKind::Id | FieldKind::Text => match self {
                Value::Text(s) => Some(Value::Text(s.clone())),
                Value::Int(i) => Some(Value::Text(i.to_string())),
                Value::Float(f) => Some(Value::Text(f.to_string())),
                _ => None,
            },
            FieldKind::Int => match self {
                Value::Int(i) => Some(Value::Int(*i)),
                Value::Bool(b) => Some(Value::Int(i64::from(*b))),
                Value::Float(f) if f.fract() == 0.0 => Some(Value::Int(*f as i64)),
                Value::Text(s) => s.trim().parse().ok().map(Value::Int),
                _ => None,
            },
            FieldKind::Float => match self {
                Value::Float(f) => Some(Value::Float(*f)),
                Value::Int(i) => Some(Value::Float(*i as f64)),
                Value::Text(s) => s.trim().parse().ok().map(Value::Float),
                _ => None,
            },
            FieldKind::Bool => match self {
                Value::Bool(b) => Some(Value::Bool(*b)),
                Value::Int(0) => Some(Value::Bool(false)),
                Value::Int(1) => Some(Value::Bool(true)),
                Value::Text(s) if s == "0" => Some(Value::Bool(false)),
                Value::Text(s) if s == "1" => Some(Value::Bool(true)),
                _ => None,
            },
            // column_kind never yields an association
            FieldKind::Association(_) => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&DomainId> for Value {
    fn from(value: &DomainId) -> Self {
        if value.is_empty() {
            Value::Null
        } else {
            Value::Text(value.as_str().to_string())
        }
    }
}

impl From<DomainId> for Value {
    fn from(value: DomainId) -> Self {
        Value::from(&value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ints_and_strings_coerce_into_identifier_columns() {
        assert_eq!(Value::Int(1).coerce(FieldKind::Id), Some(Value::Text("1".into())));
        assert_eq!(Value::from("2").coerce(FieldKind::Id), Some(Value::Text("2".into())));
        assert_eq!(Value::Bool(true).coerce(FieldKind::Id), None);
    }

    #[test]
    fn numeric_strings_coerce_into_number_columns() {
        assert_eq!(Value::from("1").coerce(FieldKind::Int), Some(Value::Int(1)));
        assert_eq!(Value::from("abc").coerce(FieldKind::Int), None);
        assert_eq!(Value::Float(2.0).coerce(FieldKind::Int), Some(Value::Int(2)));
        assert_eq!(Value::Float(2.5).coerce(FieldKind::Int), None);
        assert_eq!(Value::Int(3).coerce(FieldKind::Float), Some(Value::Float(3.0)));
        assert_eq!(Value::from("-1.23").coerce(FieldKind::Float), Some(Value::Float(-1.23)));
    }

    #[test]
    fn bools_accept_zero_and_one() {
        assert_eq!(Value::Int(0).coerce(FieldKind::Bool), Some(Value::Bool(false)));
        assert_eq!(Value::from("1").coerce(FieldKind::Bool), Some(Value::Bool(true)));
        assert_eq!(Value::Int(2).coerce(FieldKind::Bool), None);
    }

    #[test]
    fn null_survives_every_kind() {
        for kind in [FieldKind::Id, FieldKind::Text, FieldKind::Int, FieldKind::Float, FieldKind::Bool] {
            assert_eq!(Value::Null.coerce(kind), Some(Value::Null));
        }
    }

    #[test]
    fn empty_domain_id_is_null() {
        assert_eq!(Value::from(DomainId::empty()), Value::Null);
        assert_eq!(Value::from(DomainId::new("9")), Value::Text("9".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }
}
