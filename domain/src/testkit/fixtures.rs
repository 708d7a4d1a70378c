//! Entity fixtures covering every identifier shape the contract supports:
//! generated, caller-assigned, composite, derived from an association, and
//! derived-composite, plus a plain association between two entities.
//!
//! Equality is written out per type. It compares mapped fields, recursing
//! into associated entities, and ignores persistence state.

use uuid::Uuid;

use crate::entity::{Entity, EntityState, Hydrate};
use crate::filter::{Criterion, FieldFilter};
use crate::manager::Hydrator;
use crate::mapping::{EntityMapping, FieldKind, FieldMapping, Record};
use crate::{DomainError, DomainId, DomainResult};

/// Fixture entity with sample data for the contract suite.
pub trait Fixture: Hydrate + Clone + PartialEq {
    /// Sample entities. When the backend does not generate identifiers the
    /// samples get random ones instead of empty ones.
    fn create_entities(generated_ids: bool) -> Vec<Self>;

    /// Entities paired with a filter that selects them among all fixtures.
    fn field_sets(generated_ids: bool) -> Vec<(Self, FieldFilter)>;
}

/// Random identifier for backends that leave generation to the caller.
pub fn random_id() -> DomainId {
    DomainId::new(Uuid::new_v4().simple().to_string())
}

/// Mappings of every fixture class.
pub fn mappings() -> Vec<&'static EntityMapping> {
    vec![
        &TEST_ENTITY,
        &TEST_PRIMITIVE_ENTITY,
        &TEST_COMPOSITE_ENTITY,
        &TEST_DERIVED_ENTITY,
        &TEST_DERIVED_COMPOSITE_ENTITY,
        &TEST_CHILD_ENTITY,
        &TEST_PARENT_ENTITY,
    ]
}

/// Sample entities of every fixture class.
pub fn all_entities(generated_ids: bool) -> Vec<Box<dyn Entity>> {
    fn boxed<E: Fixture + 'static>(generated_ids: bool) -> impl Iterator<Item = Box<dyn Entity>> {
        E::create_entities(generated_ids)
            .into_iter()
            .map(|entity| Box::new(entity) as Box<dyn Entity>)
    }

    boxed::<TestEntity>(generated_ids)
        .chain(boxed::<TestPrimitiveEntity>(generated_ids))
        .chain(boxed::<TestCompositeEntity>(generated_ids))
        .chain(boxed::<TestDerivedEntity>(generated_ids))
        .chain(boxed::<TestDerivedCompositeEntity>(generated_ids))
        .chain(boxed::<TestChildEntity>(generated_ids))
        .chain(boxed::<TestParentEntity>(generated_ids))
        .collect()
}

macro_rules! state_accessors {
    () => {
        fn state(&self) -> &EntityState {
            &self.state
        }

        fn set_state(&mut self, state: EntityState) {
            self.state = state;
        }
    };
}

fn unknown_generated_field(class: &str, field: &str) -> DomainError {
    DomainError::Logic(format!("{class} has no generated field `{field}`"))
}

// ============ TestEntity ============

pub static TEST_ENTITY: EntityMapping = EntityMapping {
    class: "TestEntity",
    table: "test_entity",
    fields: &[
        FieldMapping::required("id", FieldKind::Id),
        FieldMapping::optional("str_field", FieldKind::Text),
        FieldMapping::required("int_field", FieldKind::Int),
        FieldMapping::optional("float_field", FieldKind::Float),
        FieldMapping::required("bool_field", FieldKind::Bool),
    ],
    id_fields: &["id"],
    generated_id: Some("id"),
};

/// Entity with a generated identifier and one field of each scalar kind.
#[derive(Clone, Debug, Default)]
pub struct TestEntity {
    pub id: DomainId,
    pub str_field: Option<String>,
    pub int_field: i64,
    pub float_field: Option<f64>,
    pub bool_field: bool,
    state: EntityState,
}

impl TestEntity {
    pub fn new(int_field: i64, bool_field: bool) -> Self {
        Self {
            int_field,
            bool_field,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<DomainId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_str(mut self, value: &str) -> Self {
        self.str_field = Some(value.to_string());
        self
    }

    pub fn with_float(mut self, value: f64) -> Self {
        self.float_field = Some(value);
        self
    }

    /// Caller-assigned random identifier when the backend cannot generate one.
    fn for_backend(self, generated_ids: bool) -> Self {
        if generated_ids {
            self
        } else {
            self.with_id(random_id())
        }
    }
}

impl PartialEq for TestEntity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.str_field == other.str_field
            && self.int_field == other.int_field
            && self.float_field == other.float_field
            && self.bool_field == other.bool_field
    }
}

impl Entity for TestEntity {
    fn mapping(&self) -> &'static EntityMapping {
        &TEST_ENTITY
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", &self.id)
            .with("str_field", self.str_field.clone())
            .with("int_field", self.int_field)
            .with("float_field", self.float_field)
            .with("bool_field", self.bool_field)
    }

    state_accessors!();

    fn assign_id(&mut self, field: &str, id: DomainId) -> DomainResult<()> {
        match field {
            "id" => {
                self.id = id;
                Ok(())
            }
            _ => Err(unknown_generated_field(TEST_ENTITY.class, field)),
        }
    }
}

impl Hydrate for TestEntity {
    fn type_mapping() -> &'static EntityMapping {
        &TEST_ENTITY
    }

    fn hydrate(record: &Record, _hydrator: &Hydrator<'_>) -> DomainResult<Self> {
        Ok(Self {
            id: record.id("id")?,
            str_field: record.opt_text("str_field")?,
            int_field: record.int("int_field")?,
            float_field: record.opt_float("float_field")?,
            bool_field: record.bool("bool_field")?,
            state: EntityState::New,
        })
    }
}

impl Fixture for TestEntity {
    fn create_entities(generated_ids: bool) -> Vec<Self> {
        vec![
            TestEntity::new(0, true).for_backend(generated_ids),
            TestEntity::new(1, false)
                .with_str("foo")
                .with_float(0.5)
                .for_backend(generated_ids),
            TestEntity::new(2, true)
                .with_id("entity-explicit")
                .with_str("bar"),
        ]
    }

    fn field_sets(generated_ids: bool) -> Vec<(Self, FieldFilter)> {
        vec![
            (
                TestEntity::new(7, true)
                    .with_str("fields-str")
                    .with_float(1.5)
                    .for_backend(generated_ids),
                FieldFilter::new()
                    .with("str_field", "fields-str")
                    .with("int_field", 7)
                    .with("bool_field", true),
            ),
            (
                TestEntity::new(8, false).for_backend(generated_ids),
                FieldFilter::new()
                    .with("str_field", Criterion::null())
                    .with("int_field", 8),
            ),
        ]
    }
}

// ============ TestPrimitiveEntity ============

pub static TEST_PRIMITIVE_ENTITY: EntityMapping = EntityMapping {
    class: "TestPrimitiveEntity",
    table: "test_primitive_entity",
    fields: &[FieldMapping::required("id", FieldKind::Id)],
    id_fields: &["id"],
    generated_id: None,
};

/// Entity keyed by a caller-assigned identifier and nothing else.
#[derive(Clone, Debug, Default)]
pub struct TestPrimitiveEntity {
    pub id: DomainId,
    state: EntityState,
}

impl TestPrimitiveEntity {
    pub fn new(id: impl Into<DomainId>) -> Self {
        Self {
            id: id.into(),
            state: EntityState::New,
        }
    }
}

impl PartialEq for TestPrimitiveEntity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Entity for TestPrimitiveEntity {
    fn mapping(&self) -> &'static EntityMapping {
        &TEST_PRIMITIVE_ENTITY
    }

    fn to_record(&self) -> Record {
        Record::new().with("id", &self.id)
    }

    state_accessors!();
}

impl Hydrate for TestPrimitiveEntity {
    fn type_mapping() -> &'static EntityMapping {
        &TEST_PRIMITIVE_ENTITY
    }

    fn hydrate(record: &Record, _hydrator: &Hydrator<'_>) -> DomainResult<Self> {
        Ok(Self::new(record.id("id")?))
    }
}

impl Fixture for TestPrimitiveEntity {
    fn create_entities(_generated_ids: bool) -> Vec<Self> {
        vec![
            TestPrimitiveEntity::new("primitive-1"),
            TestPrimitiveEntity::new("primitive-2"),
        ]
    }

    fn field_sets(_generated_ids: bool) -> Vec<(Self, FieldFilter)> {
        vec![(
            TestPrimitiveEntity::new("fields-primitive"),
            FieldFilter::new().with("id", DomainId::new("fields-primitive")),
        )]
    }
}

// ============ TestCompositeEntity ============

pub static TEST_COMPOSITE_ENTITY: EntityMapping = EntityMapping {
    class: "TestCompositeEntity",
    table: "test_composite_entity",
    fields: &[
        FieldMapping::required("id_a", FieldKind::Id),
        FieldMapping::required("id_b", FieldKind::Text),
    ],
    id_fields: &["id_a", "id_b"],
    generated_id: None,
};

/// Entity keyed by two fields.
#[derive(Clone, Debug, Default)]
pub struct TestCompositeEntity {
    pub id_a: DomainId,
    pub id_b: String,
    state: EntityState,
}

impl TestCompositeEntity {
    pub fn new(id_a: impl Into<DomainId>, id_b: &str) -> Self {
        Self {
            id_a: id_a.into(),
            id_b: id_b.to_string(),
            state: EntityState::New,
        }
    }
}

impl PartialEq for TestCompositeEntity {
    fn eq(&self, other: &Self) -> bool {
        self.id_a == other.id_a && self.id_b == other.id_b
    }
}

impl Entity for TestCompositeEntity {
    fn mapping(&self) -> &'static EntityMapping {
        &TEST_COMPOSITE_ENTITY
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id_a", &self.id_a)
            .with("id_b", self.id_b.as_str())
    }

    state_accessors!();
}

impl Hydrate for TestCompositeEntity {
    fn type_mapping() -> &'static EntityMapping {
        &TEST_COMPOSITE_ENTITY
    }

    fn hydrate(record: &Record, _hydrator: &Hydrator<'_>) -> DomainResult<Self> {
        Ok(Self {
            id_a: record.id("id_a")?,
            id_b: record.text("id_b")?,
            state: EntityState::New,
        })
    }
}

impl Fixture for TestCompositeEntity {
    fn create_entities(_generated_ids: bool) -> Vec<Self> {
        vec![
            TestCompositeEntity::new("composite-a", "x"),
            TestCompositeEntity::new("composite-a", "y"),
            TestCompositeEntity::new("composite-b", "x"),
        ]
    }

    fn field_sets(_generated_ids: bool) -> Vec<(Self, FieldFilter)> {
        vec![
            (
                TestCompositeEntity::new("fields-a", "fields-b"),
                FieldFilter::new()
                    .with("id_a", DomainId::new("fields-a"))
                    .with("id_b", "fields-b"),
            ),
            (
                TestCompositeEntity::new("fields-c", "only-b"),
                FieldFilter::new().with("id_b", "only-b"),
            ),
        ]
    }
}

// ============ TestDerivedEntity ============

pub static TEST_DERIVED_ENTITY: EntityMapping = EntityMapping {
    class: "TestDerivedEntity",
    table: "test_derived_entity",
    fields: &[FieldMapping::required(
        "entity",
        FieldKind::Association(&TEST_ENTITY),
    )],
    id_fields: &["entity"],
    generated_id: None,
};

/// Entity whose identity is the identifier of its `TestEntity`.
#[derive(Clone, Debug, Default)]
pub struct TestDerivedEntity {
    pub entity: TestEntity,
    state: EntityState,
}

impl TestDerivedEntity {
    pub fn new(entity: TestEntity) -> Self {
        Self {
            entity,
            state: EntityState::New,
        }
    }
}

impl PartialEq for TestDerivedEntity {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
    }
}

impl Entity for TestDerivedEntity {
    fn mapping(&self) -> &'static EntityMapping {
        &TEST_DERIVED_ENTITY
    }

    fn to_record(&self) -> Record {
        Record::new().with("entity", &self.entity.id)
    }

    state_accessors!();

    fn associations_mut(&mut self) -> Vec<&mut dyn Entity> {
        vec![&mut self.entity]
    }
}

impl Hydrate for TestDerivedEntity {
    fn type_mapping() -> &'static EntityMapping {
        &TEST_DERIVED_ENTITY
    }

    fn hydrate(record: &Record, hydrator: &Hydrator<'_>) -> DomainResult<Self> {
        Ok(Self::new(hydrator.association(record, "entity")?))
    }
}

impl Fixture for TestDerivedEntity {
    fn create_entities(generated_ids: bool) -> Vec<Self> {
        vec![
            TestDerivedEntity::new(TestEntity::new(10, true).for_backend(generated_ids)),
            TestDerivedEntity::new(
                TestEntity::new(11, false)
                    .with_id("derived-owner")
                    .with_str("owned"),
            ),
        ]
    }

    fn field_sets(_generated_ids: bool) -> Vec<(Self, FieldFilter)> {
        let owner = TestEntity::new(12, true).with_id("fields-owner");
        let filter = FieldFilter::new().with("entity", Criterion::entity(&owner));
        vec![(TestDerivedEntity::new(owner), filter)]
    }
}

// ============ TestDerivedCompositeEntity ============

pub static TEST_DERIVED_COMPOSITE_ENTITY: EntityMapping = EntityMapping {
    class: "TestDerivedCompositeEntity",
    table: "test_derived_composite_entity",
    fields: &[
        FieldMapping::required("entity", FieldKind::Association(&TEST_ENTITY)),
        FieldMapping::required("id", FieldKind::Int),
    ],
    id_fields: &["entity", "id"],
    generated_id: None,
};

/// Entity keyed by its `TestEntity` plus a number of its own.
#[derive(Clone, Debug, Default)]
pub struct TestDerivedCompositeEntity {
    pub entity: TestEntity,
    pub id: i64,
    state: EntityState,
}

impl TestDerivedCompositeEntity {
    pub fn new(entity: TestEntity, id: i64) -> Self {
        Self {
            entity,
            id,
            state: EntityState::New,
        }
    }
}

impl PartialEq for TestDerivedCompositeEntity {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity && self.id == other.id
    }
}

impl Entity for TestDerivedCompositeEntity {
    fn mapping(&self) -> &'static EntityMapping {
        &TEST_DERIVED_COMPOSITE_ENTITY
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("entity", &self.entity.id)
            .with("id", self.id)
    }

    state_accessors!();

    fn associations_mut(&mut self) -> Vec<&mut dyn Entity> {
        vec![&mut self.entity]
    }
}

impl Hydrate for TestDerivedCompositeEntity {
    fn type_mapping() -> &'static EntityMapping {
        &TEST_DERIVED_COMPOSITE_ENTITY
    }

    fn hydrate(record: &Record, hydrator: &Hydrator<'_>) -> DomainResult<Self> {
        Ok(Self::new(
            hydrator.association(record, "entity")?,
            record.int("id")?,
        ))
    }
}

impl Fixture for TestDerivedCompositeEntity {
    fn create_entities(generated_ids: bool) -> Vec<Self> {
        vec![
            TestDerivedCompositeEntity::new(
                TestEntity::new(20, true).for_backend(generated_ids),
                1,
            ),
            TestDerivedCompositeEntity::new(
                TestEntity::new(21, false).with_id("derived-composite-owner"),
                2,
            ),
        ]
    }

    fn field_sets(_generated_ids: bool) -> Vec<(Self, FieldFilter)> {
        let owner = TestEntity::new(22, true).with_id("fields-composite-owner");
        let filter = FieldFilter::new()
            .with("entity", Criterion::entity(&owner))
            .with("id", 5);
        vec![(TestDerivedCompositeEntity::new(owner, 5), filter)]
    }
}

// ============ TestChildEntity ============

pub static TEST_CHILD_ENTITY: EntityMapping = EntityMapping {
    class: "TestChildEntity",
    table: "test_child_entity",
    fields: &[
        FieldMapping::required("id", FieldKind::Id),
        FieldMapping::required("name", FieldKind::Text),
    ],
    id_fields: &["id"],
    generated_id: None,
};

#[derive(Clone, Debug, Default)]
pub struct TestChildEntity {
    pub id: DomainId,
    pub name: String,
    state: EntityState,
}

impl TestChildEntity {
    pub fn new(id: impl Into<DomainId>, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            state: EntityState::New,
        }
    }
}

impl PartialEq for TestChildEntity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

impl Entity for TestChildEntity {
    fn mapping(&self) -> &'static EntityMapping {
        &TEST_CHILD_ENTITY
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", &self.id)
            .with("name", self.name.as_str())
    }

    state_accessors!();
}

impl Hydrate for TestChildEntity {
    fn type_mapping() -> &'static EntityMapping {
        &TEST_CHILD_ENTITY
    }

    fn hydrate(record: &Record, _hydrator: &Hydrator<'_>) -> DomainResult<Self> {
        Ok(Self {
            id: record.id("id")?,
            name: record.text("name")?,
            state: EntityState::New,
        })
    }
}

impl Fixture for TestChildEntity {
    fn create_entities(_generated_ids: bool) -> Vec<Self> {
        vec![
            TestChildEntity::new("child-1", "one"),
            TestChildEntity::new("child-2", "two"),
        ]
    }

    fn field_sets(_generated_ids: bool) -> Vec<(Self, FieldFilter)> {
        vec![(
            TestChildEntity::new("fields-child", "named"),
            FieldFilter::new().with("name", "named"),
        )]
    }
}

// ============ TestParentEntity ============

pub static TEST_PARENT_ENTITY: EntityMapping = EntityMapping {
    class: "TestParentEntity",
    table: "test_parent_entity",
    fields: &[
        FieldMapping::required("id", FieldKind::Text),
        FieldMapping::required("child", FieldKind::Association(&TEST_CHILD_ENTITY)),
    ],
    id_fields: &["id"],
    generated_id: None,
};

/// Entity keyed by a plain string that references a child entity.
#[derive(Clone, Debug, Default)]
pub struct TestParentEntity {
    pub id: String,
    pub child: TestChildEntity,
    state: EntityState,
}

impl TestParentEntity {
    pub fn new(id: &str, child: TestChildEntity) -> Self {
        Self {
            id: id.to_string(),
            child,
            state: EntityState::New,
        }
    }
}

impl PartialEq for TestParentEntity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.child == other.child
    }
}

impl Entity for TestParentEntity {
    fn mapping(&self) -> &'static EntityMapping {
        &TEST_PARENT_ENTITY
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", self.id.as_str())
            .with("child", &self.child.id)
    }

    state_accessors!();

    fn associations_mut(&mut self) -> Vec<&mut dyn Entity> {
        vec![&mut self.child]
    }
}

impl Hydrate for TestParentEntity {
    fn type_mapping() -> &'static EntityMapping {
        &TEST_PARENT_ENTITY
    }

    fn hydrate(record: &Record, hydrator: &Hydrator<'_>) -> DomainResult<Self> {
        Ok(Self {
            id: record.text("id")?,
            child: hydrator.association(record, "child")?,
            state: EntityState::New,
        })
    }
}

impl Fixture for TestParentEntity {
    fn create_entities(_generated_ids: bool) -> Vec<Self> {
        vec![
            TestParentEntity::new("parent-1", TestChildEntity::new("child-of-parent-1", "first")),
            TestParentEntity::new("parent-2", TestChildEntity::new("child-of-parent-2", "second")),
        ]
    }

    fn field_sets(_generated_ids: bool) -> Vec<(Self, FieldFilter)> {
        vec![(
            TestParentEntity::new("fields-parent", TestChildEntity::new("fields-parent-child", "c")),
            FieldFilter::new().with("child", DomainId::new("fields-parent-child")),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_mappings_are_valid() {
        for mapping in mappings() {
            mapping.validate().unwrap();
        }
    }

    #[test]
    fn equality_ignores_persistence_state() {
        let mut a = TestEntity::new(1, true).with_id("x");
        let b = a.clone();
        a.set_state(EntityState::Managed {
            key: vec!["x".into()],
        });
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_str("other"));
    }

    #[test]
    fn derived_equality_recurses_into_the_owner() {
        let a = TestDerivedEntity::new(TestEntity::new(1, true).with_id("o"));
        let b = TestDerivedEntity::new(TestEntity::new(2, true).with_id("o"));
        assert_ne!(a, b);
    }

    #[test]
    fn caller_assigned_fixtures_have_identifiers() {
        for entity in all_entities(false) {
            let key = entity.to_record().key(entity.mapping());
            assert!(key.iter().all(|value| !value.is_null()), "{entity:?}");
        }
    }
}
