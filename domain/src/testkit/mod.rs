//! Reusable repository contract suite.
//!
//! A backend opts in by implementing [`harness::RepositoryHarness`] and
//! expanding [`repository_contract_tests!`](crate::repository_contract_tests)
//! in one of its test modules.

pub mod contract;
pub mod fixtures;
pub mod harness;

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use harness::{InMemoryHarness, RepositoryHarness};

static LOGGING: Once = Once::new();

/// Routes `tracing` output through the test writer, filtered by `RUST_LOG`
/// (default `warn`). Safe to call from every test.
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}

/// Expands the contract suite into `#[test]` functions for a harness type.
///
/// ```ignore
/// mod contract {
///     entity_domain::repository_contract_tests!(my_backend::MyHarness);
/// }
/// ```
#[macro_export]
macro_rules! repository_contract_tests {
    (@plain $($name:ident),* $(,)?) => {
        $(
            #[test]
            fn $name() {
                $crate::testkit::contract::$name::<ContractHarness>();
            }
        )*
    };

    (@per_class $op:ident) => {
        mod $op {
            $crate::repository_contract_tests!(@classes $op;
                test_entity => TestEntity,
                test_primitive_entity => TestPrimitiveEntity,
                test_composite_entity => TestCompositeEntity,
                test_derived_entity => TestDerivedEntity,
                test_derived_composite_entity => TestDerivedCompositeEntity,
                test_parent_entity => TestParentEntity,
                test_child_entity => TestChildEntity
            );
        }
    };

    (@classes $op:ident; $($name:ident => $class:ident),* $(,)?) => {
        $(
            #[test]
            fn $name() {
                $crate::testkit::contract::$op::<
                    super::ContractHarness,
                    $crate::testkit::fixtures::$class,
                >();
            }
        )*
    };

    ($harness:ty) => {
        type ContractHarness = $harness;

        $crate::repository_contract_tests!(@plain
            find_all,
            find_all_by_fields,
            find_all_by_fields_without_fields,
            find_all_by_fields_with_unknown_field,
            find_all_by_fields_with_empty_entity,
            find_with_partial_identifier,
            find_by_fields_without_fields,
            find_by_fields_with_primary_id,
            exists_by_fields_without_fields,
            exists_by_fields_with_empty_domain_id,
            exists_with_empty_identifier_value,
            save_updates,
            save_throws_on_duplicate,
            save_with_invalid_class,
            save_rejects_changed_identifier,
            save_cascades_associations,
            save_rolls_back_rejected_cascade,
            flush_rolls_back_every_entity,
            delete_with_invalid_class,
            delete_missing_entity
        );

        $crate::repository_contract_tests!(@per_class find);
        $crate::repository_contract_tests!(@per_class find_by_fields);
        $crate::repository_contract_tests!(@per_class exists);
        $crate::repository_contract_tests!(@per_class exists_by_fields);
        $crate::repository_contract_tests!(@per_class save);
        $crate::repository_contract_tests!(@per_class delete);
    };
}
