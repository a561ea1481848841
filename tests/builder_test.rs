//! Integration tests for the builder facade: manipulators, reuse and sampling.

use std::sync::Arc;

use rand::Rng;
use rstest::rstest;
use serde::Deserialize;
use serde_json::{json, Value};

use fixtree::application::{ApplicationError, ArbitraryBuilder, Manipulator, ManipulatorSet};
use fixtree::config::Settings;
use fixtree::domain::{
    DomainError, LeafSpec, PropertyDescriptor, TypeShape, ValueKind, ValueSource,
};
use fixtree::infrastructure::ShapeRegistry;
use fixtree::util::testing;

fn registry() -> ShapeRegistry {
    let mut registry = ShapeRegistry::new();
    registry.register(
        "Order",
        vec![
            PropertyDescriptor::new("id", TypeShape::Leaf(LeafSpec::Integer { min: 1, max: 1000 })),
            PropertyDescriptor::new(
                "label",
                TypeShape::Leaf(LeafSpec::String {
                    min_len: 1,
                    max_len: 8,
                }),
            ),
            PropertyDescriptor::new("items", TypeShape::list(TypeShape::object("Item"))),
            PropertyDescriptor::new("owner", TypeShape::object("Person")).nullable(),
        ],
    );
    registry.register(
        "Item",
        vec![
            PropertyDescriptor::new(
                "name",
                TypeShape::Leaf(LeafSpec::String {
                    min_len: 1,
                    max_len: 5,
                }),
            ),
            PropertyDescriptor::new("price", TypeShape::Leaf(LeafSpec::Integer { min: 1, max: 100 })),
        ],
    );
    registry.register(
        "Person",
        vec![
            PropertyDescriptor::new("name", TypeShape::Leaf(LeafSpec::Uuid)),
            PropertyDescriptor::new("age", TypeShape::Leaf(LeafSpec::Integer { min: 0, max: 99 })),
        ],
    );
    registry
}

fn settings(seed: Option<u64>) -> Settings {
    let mut settings = Settings::default();
    settings.generation.null_inject = 0.0;
    settings.generation.seed = seed;
    settings
}

fn order_builder() -> ArbitraryBuilder {
    testing::init_test_setup();
    ArbitraryBuilder::for_type("Order", Arc::new(registry()))
        .with_settings(settings(None))
        .unwrap()
}

fn items(value: &Value) -> &Vec<Value> {
    value["items"].as_array().expect("items is an array")
}

#[test]
fn given_unmodified_template_when_sampling_twice_then_same_shape() {
    // Arrange
    let builder = order_builder();

    // Act
    let first = builder.sample().unwrap();
    let second = builder.sample().unwrap();

    // Assert
    let keys = |v: &Value| v.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
    assert_eq!(keys(&first), keys(&second));
    assert_eq!(keys(&first), vec!["id", "items", "label", "owner"]);
    assert!(builder.manipulators().is_empty());
}

#[test]
fn given_size_bounds_when_sampling_then_length_within_bounds() {
    let mut builder = order_builder();
    builder.size("items", 2, 4).unwrap();

    for value in builder.sample_list(30).unwrap() {
        let len = items(&value).len();
        assert!((2..=4).contains(&len), "length {len} outside [2, 4]");
    }
}

#[rstest]
#[case(Some(3), None, 3, 99)]
#[case(None, Some(1), 0, 1)]
fn given_one_sided_size_when_sampling_then_bound_holds(
    #[case] min: Option<usize>,
    #[case] max: Option<usize>,
    #[case] lo: usize,
    #[case] hi: usize,
) {
    let mut builder = order_builder();
    if let Some(min) = min {
        builder.min_size("items", min).unwrap();
    }
    if let Some(max) = max {
        builder.max_size("items", max).unwrap();
    }

    for value in builder.sample_list(10).unwrap() {
        let len = items(&value).len();
        assert!((lo..=hi).contains(&len), "length {len} outside [{lo}, {hi}]");
    }
}

#[test]
fn given_three_items_when_finding_wildcard_then_three_paths() {
    let mut builder = order_builder();
    builder.size("items", 3, 3).unwrap();

    let paths = builder.find_all("items[*].price").unwrap();

    let rendered: Vec<String> = paths.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        vec!["items[0].price", "items[1].price", "items[2].price"]
    );
}

#[test]
fn given_limit_one_when_setting_wildcard_then_only_first_item_touched() {
    // Arrange
    let mut builder = order_builder();
    builder.size("items", 3, 3).unwrap();
    builder.set_limited("items[*].price", 0, Some(1)).unwrap();

    // Act
    let value = builder.sample().unwrap();

    // Assert
    let items = items(&value);
    assert_eq!(items[0]["price"], json!(0));
    assert!(items[1..].iter().all(|item| item["price"] != json!(0)));
}

#[test]
fn given_forced_null_when_setting_descendant_then_null_dominates() {
    let mut builder = order_builder();
    builder.set("owner.age", 30).unwrap();
    builder.set_null("owner").unwrap();

    let value = builder.sample().unwrap();

    assert_eq!(value["owner"], Value::Null);
}

#[test]
fn given_null_value_when_setting_then_forces_null() {
    let mut builder = order_builder();
    builder.set("owner", Value::Null).unwrap();

    assert_eq!(builder.sample().unwrap()["owner"], Value::Null);
}

#[test]
fn given_full_null_injection_when_not_null_then_value_present() {
    let mut builder = ArbitraryBuilder::for_type("Order", Arc::new(registry()));
    let mut settings = settings(None);
    settings.generation.null_inject = 1.0;
    builder = builder.with_settings(settings).unwrap();
    builder.set_not_null("owner").unwrap();

    let value = builder.sample().unwrap();

    assert!(value["owner"].is_object());
}

#[test]
fn given_object_value_when_setting_then_decomposed_into_fields() {
    let mut builder = order_builder();
    builder
        .set("$", json!({"id": 7, "items": [{"name": "pen", "price": 3}]}))
        .unwrap();

    let value = builder.sample().unwrap();

    assert_eq!(value["id"], json!(7));
    assert_eq!(value["items"], json!([{"name": "pen", "price": 3}]));
}

#[test]
fn given_incompatible_value_when_setting_then_skipped() {
    let mut builder = order_builder();
    builder.set("id", "not a number").unwrap();

    let value = builder.sample().unwrap();

    assert!(value["id"].is_i64());
}

#[test]
fn given_size_on_leaf_when_sampling_then_error() {
    let mut builder = order_builder();
    builder.size("id", 1, 2).unwrap();

    let err = builder.sample().unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::ContainerSizeOnNonContainer { .. })
    ));
}

#[test]
fn given_bad_expression_when_setting_then_syntax_error() {
    let mut builder = order_builder();

    let err = builder.set("items[x]", 1).unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::ExpressionSyntax { .. })
    ));
}

#[test]
fn given_fixed_template_when_sampling_then_values_repeat() {
    // Arrange
    let mut builder = order_builder();
    builder.size("items", 1, 3).unwrap();

    // Act
    builder.fixed().unwrap();
    let first = builder.sample().unwrap();
    let second = builder.sample().unwrap();

    // Assert
    assert_eq!(first, second);
    assert!(!builder.is_dirty());
}

#[test]
fn given_fixed_template_when_adding_manipulator_then_only_delta_applies() {
    // Arrange
    let mut builder = order_builder();
    builder.size("items", 2, 2).unwrap();
    builder.fixed().unwrap();
    let pinned = builder.sample().unwrap();

    // Act
    builder.set("id", 4242).unwrap();
    let value = builder.sample().unwrap();

    // Assert
    assert!(builder.is_dirty());
    assert_eq!(value["id"], json!(4242));
    assert_eq!(value["items"], pinned["items"]);
    assert_eq!(value["label"], pinned["label"]);
}

#[test]
fn given_apply_when_sampling_then_callback_sees_sample() {
    let mut builder = order_builder();
    builder.apply(|value, frozen| {
        let label = format!("order-{}", value["id"]);
        frozen.set("label", label)?;
        Ok(())
    });

    for value in builder.sample_list(5).unwrap() {
        assert_eq!(value["label"], json!(format!("order-{}", value["id"])));
    }
}

#[test]
fn given_apply_when_nested_manipulators_exist_then_they_still_shape_sample() {
    let mut builder = order_builder();
    builder.size("items", 2, 2).unwrap();
    builder.apply(|value, frozen| {
        let count = value["items"].as_array().map_or(0, Vec::len);
        frozen.set("id", count as i64)?;
        Ok(())
    });

    let value = builder.sample().unwrap();

    assert_eq!(items(&value).len(), 2);
    assert_eq!(value["id"], json!(2));
}

#[test]
fn given_apply_when_callback_runs_then_nested_builder_frozen_to_its_sample() {
    // Arrange
    let mut builder = order_builder();
    builder.size("items", 2, 2).unwrap();
    builder.set("label", "pen").unwrap();

    // Act
    builder.apply(|value, frozen| {
        let pending = frozen.manipulators();
        assert_eq!(pending.len(), 1);
        match &pending[0] {
            Manipulator::Assign(assign) => {
                assert!(assign.expression.is_root());
                assert!(matches!(&assign.source, ValueSource::Fixed(v) if v == value));
            }
            other => panic!("expected a root assign, got {other}"),
        }
        Ok(())
    });
    let value = builder.sample().unwrap();

    // Assert
    assert_eq!(items(&value).len(), 2);
    assert_eq!(value["label"], json!("pen"));
}

#[test]
fn given_post_condition_from_apply_when_later_set_replaces_items_then_still_enforced() {
    // Arrange
    let mut builder = order_builder();
    builder.size("items", 2, 2).unwrap();
    builder.apply(|_, frozen| {
        frozen.set_post_condition("items[0].price", ValueKind::Integer, |v| *v == json!(1000))?;
        Ok(())
    });
    builder
        .set("items", json!([{"name": "a", "price": 5}, {"name": "b", "price": 6}]))
        .unwrap();

    // Act
    let err = builder.sample().unwrap_err();

    // Assert
    assert!(matches!(
        err,
        ApplicationError::PostConditionExhausted { ref path, .. } if path == "items[0].price"
    ));
}

#[test]
fn given_set_after_apply_when_sampling_then_outer_set_wins_over_spliced_one() {
    let mut builder = order_builder();
    builder.apply(|_, frozen| {
        frozen.set("label", "inner")?;
        Ok(())
    });
    builder.set("label", "outer").unwrap();

    assert_eq!(builder.sample().unwrap()["label"], json!("outer"));
}

#[rstest]
#[case(true, json!("accepted"))]
#[case(false, Value::Null)]
fn given_accept_if_when_predicate_decides_then_consumer_runs_only_on_match(
    #[case] accept: bool,
    #[case] expected: Value,
) {
    let mut builder = order_builder();
    builder.accept_if(
        move |_| accept,
        |frozen| {
            frozen.set("label", "accepted")?;
            Ok(())
        },
    );

    let value = builder.sample().unwrap();

    if expected.is_null() {
        assert_ne!(value["label"], json!("accepted"));
    } else {
        assert_eq!(value["label"], expected);
    }
}

#[test]
fn given_failing_callback_when_sampling_then_error_propagates() {
    let mut builder = order_builder();
    builder.apply(|_, frozen| {
        frozen.set("items[", 1)?;
        Ok(())
    });

    assert!(builder.sample().is_err());
}

#[test]
fn given_never_valid_when_sampling_then_validation_exhausted() {
    let builder = order_builder().validate_with("never", |_| false);

    let err = builder.sample().unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::ValidationExhausted { attempts: 10, ref reason } if reason == "never"
    ));
}

#[test]
fn given_valid_only_off_when_sampling_then_validator_ignored() {
    let mut settings = settings(None);
    settings.validation.valid_only = false;
    let builder = order_builder()
        .with_settings(settings)
        .unwrap()
        .validate_with("never", |_| false);

    assert!(builder.sample().is_ok());
}

#[test]
fn given_validator_when_sampling_then_only_valid_values() {
    let mut settings = settings(None);
    settings.validation.max_attempts = 200;
    let builder = order_builder()
        .with_settings(settings)
        .unwrap()
        .validate_with("even id", |v| v["id"].as_i64().is_some_and(|id| id % 2 == 0));

    for value in builder.sample_list(5).unwrap() {
        assert_eq!(value["id"].as_i64().unwrap() % 2, 0);
    }
}

#[test]
fn given_post_condition_when_sampling_then_predicate_holds() {
    let mut builder = order_builder();
    builder.size("items", 3, 3).unwrap();
    builder
        .set_post_condition("items[*].price", ValueKind::Integer, |v| {
            v.as_i64().is_some_and(|p| p > 90)
        })
        .unwrap();

    let value = builder.sample().unwrap();

    assert!(items(&value)
        .iter()
        .all(|item| item["price"].as_i64().unwrap() > 90));
}

#[test]
fn given_map_value_when_sampling_then_transform_applied() {
    let mut builder = order_builder();
    builder.set("label", "pen").unwrap();
    builder
        .map_value("label", ValueKind::String, |v| {
            json!(v.as_str().unwrap_or_default().to_uppercase())
        })
        .unwrap();

    assert_eq!(builder.sample().unwrap()["label"], json!("PEN"));
}

#[test]
fn given_generator_when_sampling_then_each_pull_calls_it() {
    let mut builder = order_builder();
    builder
        .set_generated("label", |rng| json!(format!("L{}", rng.random_range(0..10))))
        .unwrap();

    for value in builder.sample_list(5).unwrap() {
        assert!(value["label"].as_str().unwrap().starts_with('L'));
    }
}

#[test]
fn given_other_builder_when_set_builder_then_its_sample_is_pinned() {
    let mut owner = ArbitraryBuilder::for_type("Person", Arc::new(registry()));
    owner.set("age", 42).unwrap();
    let mut builder = order_builder();

    builder.set_builder("owner", &owner).unwrap();
    let first = builder.sample().unwrap();
    let second = builder.sample().unwrap();

    assert_eq!(first["owner"]["age"], json!(42));
    assert_eq!(first["owner"], second["owner"]);
}

#[test]
fn given_manipulator_set_when_set_under_then_rebased() {
    // Arrange
    let set = ManipulatorSet::new()
        .set("name", "pen")
        .unwrap()
        .set("price", 5)
        .unwrap();
    let mut builder = order_builder();
    builder.size("items", 2, 3).unwrap();

    // Act
    builder.set_under("items[*]", &set).unwrap();
    let value = builder.sample().unwrap();

    // Assert
    for item in items(&value) {
        assert_eq!(item, &json!({"name": "pen", "price": 5}));
    }
}

#[test]
fn given_manipulator_set_when_applied_to_two_builders_then_both_shaped() {
    let set = ManipulatorSet::new().size("items", 1, 1).unwrap().set_null("owner").unwrap();
    let mut first = order_builder();
    let mut second = order_builder();

    first.apply_set(&set);
    second.apply_set(&set);

    for builder in [&first, &second] {
        let value = builder.sample().unwrap();
        assert_eq!(items(&value).len(), 1);
        assert_eq!(value["owner"], Value::Null);
    }
    assert_ne!(first.manipulators()[0].id(), second.manipulators()[0].id());
}

#[test]
fn given_copy_when_modifying_then_original_untouched() {
    let mut original = order_builder();
    original.set("id", 1).unwrap();

    let mut copy = original.copy();
    copy.set("id", 2).unwrap();

    assert_eq!(original.sample().unwrap()["id"], json!(1));
    assert_eq!(copy.sample().unwrap()["id"], json!(2));
    assert_eq!(original.manipulators().len(), 1);
}

#[test]
fn given_seed_when_building_twice_then_samples_reproduce() {
    let builder = || {
        ArbitraryBuilder::for_type("Order", Arc::new(registry()))
            .with_settings(settings(Some(7)))
            .unwrap()
    };

    let first = builder().sample_list(3).unwrap();
    let second = builder().sample_list(3).unwrap();

    assert_eq!(first, second);
}

#[test]
fn given_stream_when_taking_then_independent_samples() {
    let mut builder = order_builder();
    builder.size("items", 1, 1).unwrap();

    let values: Vec<Value> = builder
        .sample_stream()
        .take(4)
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(values.len(), 4);
    assert!(values.iter().all(|v| items(v).len() == 1));
}

#[derive(Debug, Deserialize)]
struct Item {
    name: String,
    price: i64,
}

#[derive(Debug, Deserialize)]
struct Order {
    id: i64,
    items: Vec<Item>,
}

#[test]
fn given_typed_target_when_sample_as_then_deserialized() {
    let mut builder = order_builder();
    builder.set("items[*].name", "pen").unwrap();
    builder.size("items", 2, 2).unwrap();

    let order: Order = builder.sample_as().unwrap();

    assert!((1..=1000).contains(&order.id));
    assert_eq!(order.items.len(), 2);
    assert!(order.items.iter().all(|i| i.name == "pen" && i.price >= 1));
}

#[test]
fn given_mismatched_target_when_sample_as_then_deserialize_error() {
    let builder = order_builder();

    let err = builder.sample_as::<Vec<i64>>().unwrap_err();

    assert!(matches!(err, ApplicationError::Deserialize(_)));
}

#[test]
fn given_mapped_template_when_sampling_then_root_is_mapped_sample() {
    // Arrange
    let mut order = order_builder();
    order.size("items", 3, 3).unwrap();

    // Act
    let mut summary = order.map(TypeShape::object("Person"), |value| {
        let count = value["items"].as_array().map_or(0, Vec::len);
        json!({"name": "summary", "age": count})
    });
    summary.set("name", "pinned").unwrap();
    let value = summary.sample().unwrap();

    // Assert
    assert_eq!(value, json!({"name": "pinned", "age": 3}));
}

#[test]
fn given_failing_source_when_sampling_mapped_template_then_error_propagates() {
    let source = order_builder().validate_with("never", |_| false);

    let mapped = source.map(TypeShape::Leaf(LeafSpec::Bool), |_| json!(true));

    assert!(matches!(
        mapped.sample().unwrap_err(),
        ApplicationError::ValidationExhausted { .. }
    ));
}

#[test]
fn given_two_templates_when_zipping_then_combinator_sees_both_samples() {
    let mut order = order_builder();
    order.set("id", 11).unwrap();
    let mut owner = ArbitraryBuilder::for_type("Person", Arc::new(registry()));
    owner.set("age", 42).unwrap();

    let mut zipped = order.zip_with(&owner, TypeShape::object("Order"), |mut order, owner| {
        order["owner"] = owner;
        order
    });
    zipped.size("items", 1, 1).unwrap();
    let value = zipped.sample().unwrap();

    assert_eq!(value["id"], json!(11));
    assert_eq!(value["owner"]["age"], json!(42));
    assert_eq!(items(&value).len(), 1);
}

#[test]
fn given_several_templates_when_zipping_all_then_samples_arrive_in_order() {
    let ages: Vec<ArbitraryBuilder> = (1..=3)
        .map(|age| {
            let mut person = ArbitraryBuilder::for_type("Person", Arc::new(registry()));
            person.set("age", age).unwrap();
            person
        })
        .collect();

    let zipped = ages[0].zip_all(
        &ages[1..],
        TypeShape::list(TypeShape::Leaf(LeafSpec::Integer { min: 0, max: 99 })),
        |people| Value::Array(people.iter().map(|p| p["age"].clone()).collect()),
    );

    assert_eq!(zipped.sample().unwrap(), json!([1, 2, 3]));
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(3)]
fn given_seeded_sets_when_applying_any_then_exactly_one_applied(#[case] seed: u64) {
    // Arrange
    let sets = [
        ManipulatorSet::new().set("label", "first").unwrap(),
        ManipulatorSet::new().set("label", "second").unwrap(),
    ];
    let mut builder = ArbitraryBuilder::for_type("Order", Arc::new(registry()))
        .with_settings(settings(Some(seed)))
        .unwrap();

    // Act
    builder.apply_any_set(&sets);
    let value = builder.sample().unwrap();

    // Assert
    assert_eq!(builder.manipulators().len(), 1);
    assert!(value["label"] == json!("first") || value["label"] == json!("second"));
}

#[test]
fn given_no_sets_when_applying_any_then_nothing_added() {
    let mut builder = order_builder();

    builder.apply_any_set(&[]);

    assert!(builder.manipulators().is_empty());
}

#[rstest]
#[case(1.5)]
#[case(-0.1)]
#[case(f64::NAN)]
fn given_out_of_range_null_inject_when_configuring_then_rejected(#[case] null_inject: f64) {
    let mut settings = settings(None);
    settings.generation.null_inject = null_inject;

    let result = ArbitraryBuilder::for_type("Order", Arc::new(registry())).with_settings(settings);

    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}
