use meta_optimizer_storage::promotion::resolve;
use meta_optimizer_storage::{
    multi_value, ColumnType, MetaOptimizer, MetaType, MetaValue, MultiValue, OptimizerConfig,
    Storage, WideStore, WriteRequest,
};
use proptest::prelude::*;

/// Floats with an exact short decimal form.
fn quarter() -> impl Strategy<Value = MetaValue> {
    (-100_000i32..100_000).prop_map(|n| MetaValue::Float(f64::from(n) / 4.0))
}

fn scalar() -> impl Strategy<Value = MetaValue> {
    prop_oneof![
        any::<i64>().prop_map(MetaValue::Int),
        any::<bool>().prop_map(MetaValue::Bool),
        "[a-z ]{0,16}".prop_map(MetaValue::Text),
        Just(MetaValue::Null),
        quarter(),
    ]
}

fn written_value() -> impl Strategy<Value = MetaValue> {
    prop_oneof![
        any::<i64>().prop_map(MetaValue::Int),
        quarter(),
        "[a-z]{1,40}".prop_map(MetaValue::Text),
        (1990i32..2030, 1u32..13, 1u32..29)
            .prop_map(|(y, m, d)| MetaValue::text(format!("{y:04}-{m:02}-{d:02}"))),
    ]
}

/// `next` can hold everything `previous` could.
fn never_narrower(previous: &ColumnType, next: &ColumnType) -> bool {
    if previous.same_category(next) {
        return match (previous.size(), next.size()) {
            (Some(before), Some(after)) => after >= before,
            _ => true,
        };
    }
    resolve(next, previous) == *next
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn column_types_only_widen(values in prop::collection::vec(written_value(), 1..12)) {
        let opt = MetaOptimizer::new(
            Storage::open_in_memory().expect("open storage"),
            OptimizerConfig::default(),
        );
        let table = opt.table(MetaType::Post);
        let mut previous: Option<ColumnType> = None;

        for value in values {
            opt.write(
                WriteRequest::new(MetaType::Post, 1, "field", value)
                    .add_meta(true)
                    .check_current_value(false),
            )
            .expect("write");
            let current = opt
                .store()
                .column_type(&table, "field")
                .expect("column type")
                .expect("column exists");
            if let Some(previous) = &previous {
                prop_assert!(never_narrower(previous, &current), "{previous} -> {current}");
            }
            previous = Some(current);
        }
    }

    #[test]
    fn containers_survive_storage(values in prop::collection::vec(scalar(), 1..8)) {
        let storage = Storage::open_in_memory().expect("open storage");
        let opt = MetaOptimizer::new(storage, OptimizerConfig::default());
        let container = MetaValue::Multi(MultiValue::from_values(values));

        opt.write(
            WriteRequest::new(MetaType::User, 7, "list", container.clone())
                .add_meta(true)
                .check_current_value(false),
        )
        .expect("write");

        let stored = opt.get_meta(MetaType::User, 7, "list").expect("read");
        prop_assert_eq!(stored, Some(container));
    }

    #[test]
    fn replace_swaps_exactly_one_entry(
        values in prop::collection::vec("[a-z]{1,6}", 1..8),
        index in any::<prop::sample::Index>(),
        replacement in "[A-Z]{1,6}"
    ) {
        let at = index.index(values.len());
        let container =
            MetaValue::Multi(values.iter().map(|v| MetaValue::text(v.as_str())).collect());
        let matched = MetaValue::text(values[at].as_str());

        let replaced =
            multi_value::replace(container, &matched, MetaValue::text(replacement.as_str()))
                .expect("present");
        let first = values.iter().position(|v| *v == values[at]).expect("present");
        for (i, value) in replaced.values().iter().enumerate() {
            let expected = if i == first { replacement.as_str() } else { values[i].as_str() };
            prop_assert_eq!(value, &MetaValue::text(expected));
        }
    }
}
