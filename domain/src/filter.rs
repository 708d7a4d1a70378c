//! Typed field filters, pagination and filter resolution.
//!
//! A `FieldFilter` is what callers write: field names mapped to criteria.
//! Before it reaches a store it is resolved against the entity mapping into a
//! `ResolvedFilter` whose values are already coerced to the column kinds, so
//! every store applies the same matching rules:
//!
//! - fields are ANDed, alternatives inside `AnyOf` are ORed;
//! - `Scalar(Null)` matches NULL columns;
//! - an empty `DomainId` matches nothing;
//! - null and empty alternatives inside `AnyOf` are ignored;
//! - an `Entity` criterion needs an association field and a non-empty
//!   identifier.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityRef};
use crate::mapping::{EntityMapping, FieldMapping, Record};
use crate::value::Value;
use crate::{DomainError, DomainId, DomainResult};

/// Condition on a single field.
#[derive(Clone, Debug, PartialEq)]
pub enum Criterion {
    Scalar(Value),
    Id(DomainId),
    Entity(EntityRef),
    AnyOf(Vec<Criterion>),
}

impl Criterion {
    pub fn null() -> Self {
        Criterion::Scalar(Value::Null)
    }

    pub fn any_of<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Criterion>,
    {
        Criterion::AnyOf(items.into_iter().map(Into::into).collect())
    }

    pub fn entity<E: Entity + ?Sized>(entity: &E) -> Self {
        Criterion::Entity(EntityRef::of(entity))
    }
}

impl From<Value> for Criterion {
    fn from(value: Value) -> Self {
        Criterion::Scalar(value)
    }
}

impl From<DomainId> for Criterion {
    fn from(value: DomainId) -> Self {
        Criterion::Id(value)
    }
}

impl From<&DomainId> for Criterion {
    fn from(value: &DomainId) -> Self {
        Criterion::Id(value.clone())
    }
}

impl From<EntityRef> for Criterion {
    fn from(value: EntityRef) -> Self {
        Criterion::Entity(value)
    }
}

macro_rules! scalar_criterion {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Criterion {
                fn from(value: $ty) -> Self {
                    Criterion::Scalar(Value::from(value))
                }
            }
        )*
    };
}

scalar_criterion!(bool, i32, i64, f64, &str, String);

impl<T: Into<Value>> From<Option<T>> for Criterion {
    fn from(value: Option<T>) -> Self {
        Criterion::Scalar(value.map_or(Value::Null, Into::into))
    }
}

/// Field name to criterion pairs, ANDed together.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldFilter {
    fields: Vec<(String, Criterion)>,
}

impl FieldFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, criterion: impl Into<Criterion>) -> Self {
        self.insert(field, criterion);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, criterion: impl Into<Criterion>) {
        self.fields.push((field.into(), criterion.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Criterion)> {
        self.fields.iter().map(|(name, criterion)| (name.as_str(), criterion))
    }

    /// Binds the filter to `mapping`, coercing every value to its column.
    pub fn resolve(&self, mapping: &EntityMapping) -> DomainResult<ResolvedFilter> {
        let mut predicates = Vec::with_capacity(self.fields.len());
        for (name, criterion) in &self.fields {
            let field = mapping.field(name).ok_or_else(|| {
                DomainError::InvalidArgument(format!("{} has no field `{name}`", mapping.class))
            })?;
            let mut predicate = Predicate {
                column: field.name,
                is_null: false,
                values: Vec::new(),
            };
            collect_alternatives(field, criterion, false, &mut predicate)?;
            predicates.push(predicate);
        }
        Ok(ResolvedFilter { predicates })
    }
}

fn collect_alternatives(
    field: &FieldMapping,
    criterion: &Criterion,
    in_set: bool,
    predicate: &mut Predicate,
) -> DomainResult<()> {
    match criterion {
        Criterion::Scalar(Value::Null) => {
            if !in_set {
                predicate.is_null = true;
            }
        }
        Criterion::Scalar(value) => predicate.push(value.coerce(field.kind)),
        Criterion::Id(id) => {
            if !id.is_empty() {
                predicate.push(Value::from(id).coerce(field.kind));
            }
        }
        Criterion::Entity(entity) => {
            let target = field.kind.target().ok_or_else(|| {
                DomainError::InvalidArgument(format!(
                    "field `{}` is not an association and cannot match an entity",
                    field.name
                ))
            })?;
            if entity.class != target.class {
                return Err(DomainError::InvalidArgument(format!(
                    "field `{}` references {}, got {}",
                    field.name, target.class, entity.class
                )));
            }
            if entity.is_empty() {
                return Err(DomainError::Logic(format!(
                    "cannot match field `{}` against a {} without an identifier",
                    field.name, entity.class
                )));
            }
            for value in &entity.key {
                predicate.push(value.coerce(field.kind));
            }
        }
        Criterion::AnyOf(items) => {
            for item in items {
                collect_alternatives(field, item, true, predicate)?;
            }
        }
    }
    Ok(())
}

/// One column condition: NULL (when `is_null`) or any of `values`.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub column: &'static str,
    pub is_null: bool,
    pub values: Vec<Value>,
}

impl Predicate {
    fn push(&mut self, value: Option<Value>) {
        if let Some(value) = value.filter(|value| !value.is_null()) {
            if !self.values.contains(&value) {
                self.values.push(value);
            }
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.is_null;
        }
        self.values.contains(value)
    }

    /// True when no row can satisfy this predicate.
    pub fn is_unsatisfiable(&self) -> bool {
        !self.is_null && self.values.is_empty()
    }
}

/// A filter bound to a mapping; an empty predicate list matches every row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedFilter {
    pub predicates: Vec<Predicate>,
}

impl ResolvedFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches rows whose `column` equals `value`.
    pub fn column(column: &'static str, value: Value) -> Self {
        Self {
            predicates: vec![Predicate {
                column,
                is_null: false,
                values: vec![value],
            }],
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.predicates
            .iter()
            .all(|predicate| predicate.matches(record.get(predicate.column)))
    }

    pub fn is_unsatisfiable(&self) -> bool {
        self.predicates.iter().any(Predicate::is_unsatisfiable)
    }
}

/// Offset/limit window over an ordered listing. A zero limit means no limit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub const fn all() -> Self {
        Self {
            offset: 0,
            limit: 0,
        }
    }

    pub const fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    /// Everything from `offset` on.
    pub const fn from_offset(offset: usize) -> Self {
        Self { offset, limit: 0 }
    }

    pub fn is_unbounded(&self) -> bool {
        self.limit == 0
    }

    /// Applies the window to an already ordered iterator.
    pub fn apply<T>(&self, items: impl Iterator<Item = T>) -> Vec<T> {
        let limit = if self.is_unbounded() { usize::MAX } else { self.limit };
        items.skip(self.offset).take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::FieldKind;

    static OWNER: EntityMapping = EntityMapping {
        class: "Owner",
        table: "owner",
        fields: &[
            FieldMapping::required("id", FieldKind::Id),
            FieldMapping::required("count", FieldKind::Int),
            FieldMapping::optional("label", FieldKind::Text),
        ],
        id_fields: &["id"],
        generated_id: Some("id"),
    };

    static OWNED: EntityMapping = EntityMapping {
        class: "Owned",
        table: "owned",
        fields: &[FieldMapping::required("owner", FieldKind::Association(&OWNER))],
        id_fields: &["owner"],
        generated_id: None,
    };

    fn owner_ref(id: Option<&str>) -> EntityRef {
        EntityRef {
            class: "Owner",
            key: vec![Value::from(id)],
        }
    }

    #[test]
    fn scalars_are_coerced_to_the_column_kind() {
        let resolved = FieldFilter::new()
            .with("id", 1)
            .with("count", "2")
            .resolve(&OWNER)
            .unwrap();
        assert_eq!(resolved.predicates[0].values, vec![Value::Text("1".into())]);
        assert_eq!(resolved.predicates[1].values, vec![Value::Int(2)]);
    }

    #[test]
    fn null_inside_a_set_never_matches() {
        let resolved = FieldFilter::new()
            .with("label", Criterion::any_of([Criterion::null(), "foo".into()]))
            .resolve(&OWNER)
            .unwrap();
        assert!(!resolved.predicates[0].is_null);
        assert!(!resolved.predicates[0].matches(&Value::Null));
        assert!(resolved.predicates[0].matches(&Value::Text("foo".into())));

        let resolved = FieldFilter::new()
            .with("label", Criterion::null())
            .resolve(&OWNER)
            .unwrap();
        assert!(resolved.predicates[0].matches(&Value::Null));
    }

    #[test]
    fn empty_identifiers_match_nothing() {
        let resolved = FieldFilter::new()
            .with("id", DomainId::empty())
            .resolve(&OWNER)
            .unwrap();
        assert!(resolved.is_unsatisfiable());

        let resolved = FieldFilter::new()
            .with("id", Criterion::any_of([DomainId::new("2"), DomainId::empty()]))
            .resolve(&OWNER)
            .unwrap();
        assert_eq!(resolved.predicates[0].values, vec![Value::Text("2".into())]);
    }

    #[test]
    fn filters_count_their_fields() {
        let mut filter = FieldFilter::new();
        assert!(filter.is_empty());
        filter.insert("id", 1);
        let filter = filter.with("count", 2);
        assert_eq!(filter.len(), 2);
        let names: Vec<&str> = filter.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["id", "count"]);
    }

    #[test]
    fn unknown_fields_are_invalid() {
        let err = FieldFilter::new().with("nope", 1).resolve(&OWNER).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn entity_criteria_need_an_identifier() {
        let err = FieldFilter::new()
            .with("owner", owner_ref(None))
            .resolve(&OWNED)
            .unwrap_err();
        assert!(matches!(err, DomainError::Logic(_)));

        let resolved = FieldFilter::new()
            .with("owner", owner_ref(Some("7")))
            .resolve(&OWNED)
            .unwrap();
        assert_eq!(resolved.predicates[0].values, vec![Value::Text("7".into())]);
    }

    #[test]
    fn entity_criteria_need_an_association_of_the_same_class() {
        let err = FieldFilter::new()
            .with("count", owner_ref(Some("7")))
            .resolve(&OWNER)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));

        let stranger = EntityRef {
            class: "Stranger",
            key: vec![Value::from("7")],
        };
        let err = FieldFilter::new()
            .with("owner", stranger)
            .resolve(&OWNED)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn page_windows_an_ordered_listing() {
        let items = || [1, 2, 3].into_iter();
        assert_eq!(Page::all().apply(items()), vec![1, 2, 3]);
        assert_eq!(Page::new(1, 1).apply(items()), vec![2]);
        assert_eq!(Page::from_offset(1).apply(items()), vec![2, 3]);
        assert_eq!(Page::new(0, 2).apply(items()), vec![1, 2]);
        assert!(Page::new(10, 10).apply(items()).is_empty());
    }
}
