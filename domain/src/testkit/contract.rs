//! The repository contract, one generic function per check.
//!
//! Functions take the harness as a type parameter; per-class checks also take
//! the fixture class. `repository_contract_tests!` turns them into `#[test]`s.
//! Per-class checks run every sample entity against a fresh harness.

use std::collections::HashSet;
use std::fmt::Debug;

use crate::entity::{primary_filter, Entity};
use crate::filter::{Criterion, FieldFilter, Page};
use crate::repository::DomainCollection;
use crate::value::Value;
use crate::{DomainError, DomainId, DomainResult};

use super::fixtures::{
    self, Fixture, TestChildEntity, TestCompositeEntity, TestDerivedEntity, TestEntity,
    TestParentEntity, TestPrimitiveEntity,
};
use super::harness::RepositoryHarness;
use super::init_test_logging;

/// Runs `test` between `prepare` and `clean` on a fresh harness.
pub fn run<H: RepositoryHarness>(test: impl FnOnce(&H)) {
    init_test_logging();
    let harness = H::init().expect("harness init");
    harness.prepare().expect("harness prepare");
    test(&harness);
    harness.clean().expect("harness clean");
    harness.destroy().expect("harness destroy");
}

/// Flushes `context` and then every fixture of every class. Fixtures whose
/// identifier is already taken by a context entity are skipped.
pub fn load_entities<H: RepositoryHarness>(harness: &H, context: &mut [&mut dyn Entity]) {
    let mut seen: HashSet<String> = context
        .iter()
        .filter_map(|entity| identity_key(&**entity))
        .collect();
    harness
        .flush_entities(context)
        .expect("flush context entities");

    let mut others: Vec<Box<dyn Entity>> = fixtures::all_entities(H::SUPPORTS_GENERATED_IDS)
        .into_iter()
        .filter(|entity| identity_key(&**entity).map_or(true, |key| seen.insert(key)))
        .collect();
    let mut refs: Vec<&mut dyn Entity> = others
        .iter_mut()
        .map(|entity| &mut **entity as &mut dyn Entity)
        .collect();
    harness.flush_entities(&mut refs).expect("flush fixtures");
}

/// Class plus identifier values, or `None` while any of them is empty.
fn identity_key(entity: &dyn Entity) -> Option<String> {
    let mapping = entity.mapping();
    let key = entity.to_record().key(mapping);
    if key.iter().any(Value::is_null) {
        return None;
    }
    Some(serde_json::to_string(&(mapping.class, key)).expect("serialize identifier"))
}

#[track_caller]
fn assert_collection_eq<E: PartialEq + Debug>(
    expected: &[&E],
    actual: DomainResult<DomainCollection<E>>,
) {
    let actual = actual.expect("listing");
    let actual: Vec<&E> = actual.iter().collect();
    assert_eq!(actual, expected);
}

fn fields(name: &str, criterion: impl Into<Criterion>) -> FieldFilter {
    FieldFilter::new().with(name, criterion)
}

fn id(value: &str) -> DomainId {
    DomainId::new(value)
}

// ============ find_all ============

pub fn find_all<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let repository = harness.create_repository::<TestPrimitiveEntity>();
        let mut entity1 = TestPrimitiveEntity::new("1");
        let mut entity2 = TestPrimitiveEntity::new("2");
        let mut entity3 = TestPrimitiveEntity::new("3");

        let pages = [
            Page::all(),
            Page::from_offset(1),
            Page::new(1, 1),
            Page::new(1, 0),
            Page::new(0, 10),
            Page::new(10, 10),
        ];
        for page in pages {
            assert_collection_eq(&[], repository.find_all(page));
        }

        harness
            .flush_entities(&mut [&mut entity1, &mut entity2, &mut entity3])
            .expect("flush");

        assert_collection_eq(&[&entity1, &entity2, &entity3], repository.find_all(Page::all()));
        assert_collection_eq(&[&entity2, &entity3], repository.find_all(Page::from_offset(1)));
        assert_collection_eq(&[&entity2], repository.find_all(Page::new(1, 1)));
        assert_collection_eq(&[&entity2, &entity3], repository.find_all(Page::new(1, 0)));
        assert_collection_eq(
            &[&entity1, &entity2, &entity3],
            repository.find_all(Page::new(0, 10)),
        );
        assert_collection_eq(&[], repository.find_all(Page::new(10, 10)));
        assert_collection_eq(&[&entity1, &entity2], repository.find_all(Page::new(0, 2)));
    });
}

// ============ find_all_by_fields ============

pub fn find_all_by_fields<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let composites = harness.create_repository::<TestCompositeEntity>();
        let entities = harness.create_repository::<TestEntity>();
        let mut entity1 = TestCompositeEntity::new("1", "foo");
        let mut entity2 = TestCompositeEntity::new("2", "foo");
        let mut entity3 = TestCompositeEntity::new("3", "bar");
        let mut entity4 = TestEntity::new(1, false).with_id("1");

        let one_or_two = || Criterion::any_of([Criterion::from(1), Criterion::from("2")]);
        let composite_queries = [
            (fields("id_a", 1), Page::all()),
            (fields("id_a", "2"), Page::all()),
            (fields("id_a", DomainId::empty()), Page::from_offset(1)),
            (fields("id_a", Criterion::any_of([id("2"), id("3")])), Page::new(1, 1)),
            (
                fields(
                    "id_a",
                    Criterion::any_of([
                        Criterion::null(),
                        Criterion::from("foo"),
                        Criterion::from(id("2")),
                        Criterion::from(id("3")),
                    ]),
                ),
                Page::new(1, 1),
            ),
            (
                fields("id_a", Criterion::any_of([id("2"), id("1"), DomainId::empty()])),
                Page::new(1, 0),
            ),
            (fields("id_a", Criterion::any_of([id("1"), id("3")])), Page::new(0, 10)),
            (fields("id_a", id("3")), Page::new(0, 10)),
            (fields("id_a", id("2")), Page::new(10, 10)),
            (fields("id_a", id("1")), Page::new(0, 2)),
            (fields("id_b", "foo"), Page::all()),
            (fields("id_b", "foo"), Page::new(0, 1)),
            (fields("id_b", "foo"), Page::new(1, 1)),
            (fields("id_a", one_or_two()).with("id_b", "foo"), Page::all()),
            (fields("id_a", one_or_two()).with("id_b", "foo"), Page::from_offset(1)),
            (fields("id_a", one_or_two()).with("id_b", "bar"), Page::all()),
        ];
        let entity_queries = [
            fields("str_field", Criterion::null()),
            fields("str_field", ""),
            fields("str_field", "foo"),
            fields("str_field", Criterion::any_of([Criterion::null(), "foo".into()])),
            fields("int_field", Criterion::null()),
            fields("int_field", "1"),
            fields("int_field", Criterion::any_of([1, 2])),
            fields("bool_field", false).with("float_field", Criterion::null()),
        ];

        for (filter, page) in &composite_queries {
            assert_collection_eq(&[], composites.find_all_by_fields(filter, *page));
        }
        for filter in &entity_queries {
            assert_collection_eq(&[], entities.find_all_by_fields(filter, Page::all()));
        }

        harness
            .flush_entities(&mut [&mut entity1, &mut entity2, &mut entity3, &mut entity4])
            .expect("flush");

        let (e1, e2, e3) = (&entity1, &entity2, &entity3);
        let composite_expected: [&[&TestCompositeEntity]; 16] = [
            &[e1],
            &[e2],
            &[],
            &[e3],
            &[e3],
            &[e2],
            &[e1, e3],
            &[e3],
            &[],
            &[e1],
            &[e1, e2],
            &[e1],
            &[e2],
            &[e1, e2],
            &[e2],
            &[],
        ];
        for ((filter, page), expected) in composite_queries.iter().zip(composite_expected) {
            assert_collection_eq(expected, composites.find_all_by_fields(filter, *page));
        }

        let e4 = &entity4;
        let entity_expected: [&[&TestEntity]; 8] =
            [&[e4], &[], &[], &[], &[], &[e4], &[e4], &[e4]];
        for (filter, expected) in entity_queries.iter().zip(entity_expected) {
            assert_collection_eq(expected, entities.find_all_by_fields(filter, Page::all()));
        }
    });
}

pub fn find_all_by_fields_without_fields<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let repository = harness.create_repository::<TestEntity>();
        let result = repository.find_all_by_fields(&FieldFilter::new(), Page::all());
        assert!(
            matches!(result, Err(DomainError::InvalidArgument(_))),
            "got {result:?}"
        );
    });
}

pub fn find_all_by_fields_with_unknown_field<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let repository = harness.create_repository::<TestEntity>();
        let result = repository.find_all_by_fields(&fields("no_such_field", 1), Page::all());
        assert!(
            matches!(result, Err(DomainError::InvalidArgument(_))),
            "got {result:?}"
        );
    });
}

pub fn find_all_by_fields_with_empty_entity<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let repository = harness.create_repository::<TestDerivedEntity>();
        let owner = TestEntity::new(1, true);
        let result =
            repository.find_all_by_fields(&fields("entity", Criterion::entity(&owner)), Page::all());
        assert!(matches!(result, Err(DomainError::Logic(_))), "got {result:?}");
    });
}

// ============ find ============

pub fn find<H: RepositoryHarness, E: Fixture>() {
    for mut entity in E::create_entities(H::SUPPORTS_GENERATED_IDS) {
        run::<H>(|harness| {
            let repository = harness.create_repository::<E>();
            let result = repository.find(&primary_filter(&entity));
            assert!(
                matches!(result, Err(DomainError::NotFound { .. })),
                "got {result:?}"
            );

            load_entities(harness, &mut [&mut entity]);

            let found = repository
                .find(&primary_filter(&entity))
                .expect("find loaded entity");
            assert_eq!(found, entity);
        });
    }
}

pub fn find_with_partial_identifier<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let repository = harness.create_repository::<TestCompositeEntity>();
        let mut entity = TestCompositeEntity::new("a", "b");
        harness.flush_entities(&mut [&mut entity]).expect("flush");

        let result = repository.find(&fields("id_a", id("a")));
        assert!(
            matches!(result, Err(DomainError::InvalidArgument(_))),
            "got {result:?}"
        );
        let result = repository.exists(&fields("id_b", "b"));
        assert!(
            matches!(result, Err(DomainError::InvalidArgument(_))),
            "got {result:?}"
        );
    });
}

// ============ find_by_fields ============

pub fn find_by_fields<H: RepositoryHarness, E: Fixture>() {
    for (mut entity, filter) in E::field_sets(H::SUPPORTS_GENERATED_IDS) {
        run::<H>(|harness| {
            let repository = harness.create_repository::<E>();
            let result = repository.find_by_fields(&filter);
            assert!(
                matches!(result, Err(DomainError::NotFound { .. })),
                "got {result:?}"
            );

            load_entities(harness, &mut [&mut entity]);

            let found = repository.find_by_fields(&filter).expect("find by fields");
            assert_eq!(found, entity);
        });
    }
}

pub fn find_by_fields_without_fields<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let repository = harness.create_repository::<TestEntity>();
        let result = repository.find_by_fields(&FieldFilter::new());
        assert!(
            matches!(result, Err(DomainError::InvalidArgument(_))),
            "got {result:?}"
        );
    });
}

/// Derived entities are found by the identifier of the entity they derive
/// from, including one generated while cascading the flush.
pub fn find_by_fields_with_primary_id<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let repository = harness.create_repository::<TestDerivedEntity>();
        let mut owner = TestEntity::new(-1, true);
        let mut other = TestEntity::new(-1, true);
        if !H::SUPPORTS_GENERATED_IDS {
            owner = owner.with_id(fixtures::random_id());
            other = other.with_id(fixtures::random_id());
        }
        let mut derived = TestDerivedEntity::new(owner);

        harness
            .flush_entities(&mut [&mut derived, &mut other])
            .expect("flush");

        assert!(!derived.entity.id.is_empty());
        let found = repository
            .find_by_fields(&fields("entity", derived.entity.id.clone()))
            .expect("find by owner id");
        assert_eq!(found, derived);

        let result = repository.find_by_fields(&fields("entity", other.id.clone()));
        assert!(
            matches!(result, Err(DomainError::NotFound { .. })),
            "got {result:?}"
        );
    });
}

// ============ exists ============

pub fn exists<H: RepositoryHarness, E: Fixture>() {
    for mut entity in E::create_entities(H::SUPPORTS_GENERATED_IDS) {
        run::<H>(|harness| {
            let repository = harness.create_repository::<E>();
            assert!(!repository.exists(&primary_filter(&entity)).expect("exists"));

            load_entities(harness, &mut [&mut entity]);

            assert!(repository.exists(&primary_filter(&entity)).expect("exists"));
        });
    }
}

pub fn exists_by_fields<H: RepositoryHarness, E: Fixture>() {
    for (mut entity, filter) in E::field_sets(H::SUPPORTS_GENERATED_IDS) {
        run::<H>(|harness| {
            let repository = harness.create_repository::<E>();
            assert!(!repository.exists_by_fields(&filter).expect("exists by fields"));

            load_entities(harness, &mut [&mut entity]);

            assert!(repository.exists_by_fields(&filter).expect("exists by fields"));
        });
    }
}

pub fn exists_by_fields_without_fields<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let repository = harness.create_repository::<TestEntity>();
        let result = repository.exists_by_fields(&FieldFilter::new());
        assert!(
            matches!(result, Err(DomainError::InvalidArgument(_))),
            "got {result:?}"
        );
    });
}

/// Matching an association against an entity that has no identifier yet is
/// a logic error, not an empty result.
pub fn exists_by_fields_with_empty_domain_id<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let repository = harness.create_repository::<TestDerivedEntity>();
        let entity = TestEntity::new(0, true);

        load_entities(harness, &mut []);

        let result = repository.exists_by_fields(&fields("entity", Criterion::entity(&entity)));
        assert!(matches!(result, Err(DomainError::Logic(_))), "got {result:?}");
    });
}

pub fn exists_with_empty_identifier_value<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let repository = harness.create_repository::<TestPrimitiveEntity>();
        assert!(!repository
            .exists_by_fields(&fields("id", DomainId::empty()))
            .expect("exists by fields"));

        load_entities(harness, &mut []);

        assert!(!repository
            .exists_by_fields(&fields("id", DomainId::empty()))
            .expect("exists by fields"));
        assert!(!repository
            .exists(&fields("id", DomainId::empty()))
            .expect("exists"));
    });
}

// ============ save ============

pub fn save<H: RepositoryHarness, E: Fixture>() {
    for mut entity in E::create_entities(H::SUPPORTS_GENERATED_IDS) {
        run::<H>(|harness| {
            let repository = harness.create_repository::<E>();
            assert!(!repository.exists(&primary_filter(&entity)).expect("exists"));

            repository.save(&mut entity).expect("save");

            assert!(entity.state().is_managed());
            assert!(repository.exists(&primary_filter(&entity)).expect("exists"));
            let found = repository
                .find(&primary_filter(&entity))
                .expect("find saved entity");
            assert_eq!(found, entity);
        });
    }
}

pub fn save_updates<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let repository = harness.create_repository::<TestEntity>();
        let mut entity = TestEntity::new(1, false).with_str("before");
        if !H::SUPPORTS_GENERATED_IDS {
            entity = entity.with_id(fixtures::random_id());
        }
        repository.save(&mut entity).expect("insert");
        let filter = primary_filter(&entity);

        entity.str_field = Some("after".into());
        entity.int_field = 2;
        entity.float_field = Some(2.5);
        repository.save(&mut entity).expect("update");

        assert_collection_eq(&[&entity], repository.find_all(Page::all()));
        assert_eq!(repository.find(&filter).expect("find updated"), entity);

        let mut loaded = repository.find(&filter).expect("find updated");
        loaded.bool_field = true;
        loaded.str_field = None;
        repository.save(&mut loaded).expect("update loaded");
        assert_eq!(repository.find(&filter).expect("find updated"), loaded);
    });
}

pub fn save_throws_on_duplicate<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let repository = harness.create_repository::<TestPrimitiveEntity>();
        let mut entity = TestPrimitiveEntity::new("duplicate");
        let mut duplicate = TestPrimitiveEntity::new("duplicate");

        repository.save(&mut entity).expect("save");
        let result = repository.save(&mut duplicate);
        assert!(
            matches!(result, Err(DomainError::DuplicateEntity { .. })),
            "got {result:?}"
        );
        assert!(!duplicate.state().is_managed());

        let composites = harness.create_repository::<TestCompositeEntity>();
        composites
            .save(&mut TestCompositeEntity::new("a", "b"))
            .expect("save");
        composites
            .save(&mut TestCompositeEntity::new("a", "c"))
            .expect("save sibling key");
        let result = composites.save(&mut TestCompositeEntity::new("a", "b"));
        assert!(
            matches!(result, Err(DomainError::DuplicateEntity { .. })),
            "got {result:?}"
        );
    });
}

pub fn save_with_invalid_class<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let repository = harness.create_repository::<TestPrimitiveEntity>();
        let mut other = TestChildEntity::new("child", "name");
        let result = repository.save(&mut other);
        assert!(
            matches!(result, Err(DomainError::InvalidClass { .. })),
            "got {result:?}"
        );
        assert!(!other.state().is_managed());
    });
}

pub fn save_rejects_changed_identifier<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let repository = harness.create_repository::<TestPrimitiveEntity>();
        let mut entity = TestPrimitiveEntity::new("before");
        repository.save(&mut entity).expect("save");

        entity.id = id("after");
        let result = repository.save(&mut entity);
        assert!(matches!(result, Err(DomainError::Logic(_))), "got {result:?}");
        assert!(repository.exists(&fields("id", id("before"))).expect("exists"));
        assert!(!repository.exists(&fields("id", id("after"))).expect("exists"));
    });
}

pub fn save_cascades_associations<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let parents = harness.create_repository::<TestParentEntity>();
        let children = harness.create_repository::<TestChildEntity>();
        let mut parent = TestParentEntity::new("parent", TestChildEntity::new("child", "kid"));

        parents.save(&mut parent).expect("save");

        assert!(parent.child.state().is_managed());
        assert_eq!(
            children.find(&fields("id", id("child"))).expect("find child"),
            parent.child
        );
        let found = parents
            .find_by_fields(&fields("child", Criterion::entity(&parent.child)))
            .expect("find by child");
        assert_eq!(found, parent);
    });
}

pub fn save_rolls_back_rejected_cascade<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let parents = harness.create_repository::<TestParentEntity>();
        let children = harness.create_repository::<TestChildEntity>();
        parents
            .save(&mut TestParentEntity::new("parent", TestChildEntity::new("c1", "first")))
            .expect("save");

        let mut duplicate = TestParentEntity::new("parent", TestChildEntity::new("c2", "second"));
        let result = parents.save(&mut duplicate);
        assert!(
            matches!(result, Err(DomainError::DuplicateEntity { .. })),
            "got {result:?}"
        );

        assert!(!duplicate.state().is_managed());
        assert!(!duplicate.child.state().is_managed());
        assert!(!children.exists(&fields("id", id("c2"))).expect("exists"));
        assert_eq!(
            parents.find(&fields("id", "parent")).expect("find").child.id,
            id("c1")
        );
    });
}

pub fn flush_rolls_back_every_entity<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let entities = harness.create_repository::<TestEntity>();
        let derived = harness.create_repository::<TestDerivedEntity>();
        let primitives = harness.create_repository::<TestPrimitiveEntity>();
        primitives
            .save(&mut TestPrimitiveEntity::new("taken"))
            .expect("save");

        let mut entity = TestEntity::new(4, true);
        let mut owner = TestEntity::new(5, false);
        if !H::SUPPORTS_GENERATED_IDS {
            entity = entity.with_id(fixtures::random_id());
            owner = owner.with_id(fixtures::random_id());
        }
        let mut deriving = TestDerivedEntity::new(owner);
        let (entity_id, owner_id) = (entity.id.clone(), deriving.entity.id.clone());
        let mut duplicate = TestPrimitiveEntity::new("taken");

        let result =
            harness.flush_entities(&mut [&mut entity, &mut deriving, &mut duplicate]);
        assert!(
            matches!(result, Err(DomainError::DuplicateEntity { .. })),
            "got {result:?}"
        );

        assert_eq!(entity.id, entity_id);
        assert_eq!(deriving.entity.id, owner_id);
        assert!(!entity.state().is_managed());
        assert!(!deriving.state().is_managed());
        assert!(!deriving.entity.state().is_managed());
        assert_collection_eq::<TestEntity>(&[], entities.find_all(Page::all()));
        assert_collection_eq::<TestDerivedEntity>(&[], derived.find_all(Page::all()));

        harness
            .flush_entities(&mut [&mut entity, &mut deriving])
            .expect("flush after rollback");
        assert!(entity.state().is_managed());
        assert!(deriving.state().is_managed());
    });
}

// ============ delete ============

pub fn delete<H: RepositoryHarness, E: Fixture>() {
    for mut entity in E::create_entities(H::SUPPORTS_GENERATED_IDS) {
        run::<H>(|harness| {
            let repository = harness.create_repository::<E>();
            harness.flush_entities(&mut [&mut entity]).expect("flush");
            let filter = primary_filter(&entity);
            assert!(repository.exists(&filter).expect("exists"));

            repository.delete(&mut entity).expect("delete");

            assert!(!entity.state().is_managed());
            assert!(!repository.exists(&filter).expect("exists"));
        });
    }
}

pub fn delete_with_invalid_class<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let repository = harness.create_repository::<TestPrimitiveEntity>();
        let mut other = TestChildEntity::new("child", "name");
        harness.flush_entities(&mut [&mut other]).expect("flush");

        let result = repository.delete(&mut other);
        assert!(
            matches!(result, Err(DomainError::InvalidClass { .. })),
            "got {result:?}"
        );
        assert!(other.state().is_managed());
    });
}

pub fn delete_missing_entity<H: RepositoryHarness>() {
    run::<H>(|harness| {
        let repository = harness.create_repository::<TestPrimitiveEntity>();
        let result = repository.delete(&mut TestPrimitiveEntity::new("missing"));
        assert!(
            matches!(result, Err(DomainError::NotFound { .. })),
            "got {result:?}"
        );

        let mut entity = TestPrimitiveEntity::new("twice");
        repository.save(&mut entity).expect("save");
        repository.delete(&mut entity).expect("delete");
        let result = repository.delete(&mut entity);
        assert!(
            matches!(result, Err(DomainError::NotFound { .. })),
            "got {result:?}"
        );
    });
}
