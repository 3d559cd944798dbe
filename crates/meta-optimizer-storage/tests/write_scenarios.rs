use meta_optimizer_storage::{
    ColumnChange, ColumnType, LegacyMetaStore, MetaOptimizer, MetaType, MetaValue, MultiValue,
    OptimizerConfig, Rejection, Storage, WideStore, WriteOutcome, WriteRequest,
};
use pretty_assertions::assert_eq;

fn optimizer() -> MetaOptimizer<Storage> {
    MetaOptimizer::new(
        Storage::open_in_memory().expect("open storage"),
        OptimizerConfig::default(),
    )
}

fn column_type(
    opt: &MetaOptimizer<Storage>,
    meta_type: MetaType,
    column: &str,
) -> Option<ColumnType> {
    opt.store()
        .column_type(&opt.table(meta_type), column)
        .expect("column type")
}

#[test]
fn count_column_widens_from_tinyint_to_smallint() {
    let opt = optimizer();
    let write = |v: i64| {
        opt.write(WriteRequest::new(MetaType::Post, 10, "count", v).add_meta(true))
            .expect("write")
    };

    assert!(matches!(write(5), WriteOutcome::Inserted(_)));
    assert_eq!(column_type(&opt, MetaType::Post, "count"), Some(ColumnType::TinyInt));

    let widen = WriteRequest::new(MetaType::Post, 10, "count", 300)
        .add_meta(true)
        .check_current_value(false);
    assert_eq!(opt.write(widen).expect("write"), WriteOutcome::Updated(1));
    assert_eq!(column_type(&opt, MetaType::Post, "count"), Some(ColumnType::SmallInt));
    assert_eq!(opt.get_meta(MetaType::Post, 10, "count").expect("get"), Some(MetaValue::Int(300)));
}

#[test]
fn non_unique_tag_accumulates_values() {
    let opt = optimizer();
    let add = |v: &str| {
        opt.write(
            WriteRequest::new(MetaType::Post, 3, "tag", v)
                .unique(false)
                .add_meta(true),
        )
        .expect("write")
    };

    assert!(matches!(add("red"), WriteOutcome::Inserted(_)));
    assert_eq!(opt.get_meta(MetaType::Post, 3, "tag").expect("get"), Some(MetaValue::text("red")));

    assert_eq!(add("blue"), WriteOutcome::Updated(1));
    assert_eq!(
        opt.get_meta(MetaType::Post, 3, "tag").expect("get"),
        Some(MetaValue::Multi(MultiValue::from_values([
            MetaValue::text("red"),
            MetaValue::text("blue"),
        ])))
    );
}

#[test]
fn unique_slug_rejects_a_second_value() {
    let opt = optimizer();
    let write = |v: &str| {
        opt.write(WriteRequest::new(MetaType::Post, 8, "slug", v).add_meta(true))
            .expect("write")
    };

    assert!(matches!(write("post-1"), WriteOutcome::Inserted(_)));
    assert_eq!(write("post-2"), WriteOutcome::Rejected(Rejection::UniqueConflict));
    assert_eq!(
        opt.get_meta(MetaType::Post, 8, "slug").expect("get"),
        Some(MetaValue::text("post-1"))
    );
}

#[test]
fn reserved_key_is_stored_under_a_translated_column() {
    let opt = optimizer();
    opt.write(WriteRequest::new(MetaType::Post, 2, "created_at", "last week").add_meta(true))
        .expect("write");

    let table = opt.table(MetaType::Post);
    assert_eq!(
        opt.store().dynamic_columns(&table).expect("columns"),
        vec!["created_at_wpmork"]
    );
    assert_eq!(
        opt.get_row(MetaType::Post, 2).expect("row"),
        Some(vec![("created_at".to_string(), MetaValue::text("last week"))])
    );
}

#[test]
fn longer_strings_resize_the_column() {
    let opt = optimizer();
    let write = |v: &str| {
        opt.write(
            WriteRequest::new(MetaType::Comment, 1, "note", v)
                .add_meta(true)
                .check_current_value(false),
        )
        .expect("write")
    };

    write("hello");
    assert_eq!(column_type(&opt, MetaType::Comment, "note"), Some(ColumnType::Varchar(5)));
    write("a much longer string");
    assert_eq!(column_type(&opt, MetaType::Comment, "note"), Some(ColumnType::Varchar(20)));
    write("tiny");
    assert_eq!(column_type(&opt, MetaType::Comment, "note"), Some(ColumnType::Varchar(20)));
}

#[test]
fn ensure_column_is_idempotent() {
    let opt = optimizer();
    let value = MetaValue::text("2024-02-29");
    assert_eq!(
        opt.ensure_column(MetaType::Term, "published", &value).expect("ensure"),
        ColumnChange::Created(ColumnType::Date)
    );
    assert_eq!(
        opt.ensure_column(MetaType::Term, "published", &value).expect("ensure"),
        ColumnChange::Unchanged
    );
}

#[test]
fn update_path_follows_the_legacy_table() {
    let opt = optimizer();
    let request = WriteRequest::new(MetaType::User, 12, "first_name", "Ada");
    assert_eq!(
        opt.write(request.clone()).expect("write"),
        WriteOutcome::Rejected(Rejection::NotApplicable)
    );

    opt.store()
        .add_legacy_meta(MetaType::User, 12, "first_name", "Ada")
        .expect("seed legacy");
    assert!(matches!(opt.write(request).expect("write"), WriteOutcome::Inserted(_)));
    assert_eq!(
        opt.get_meta(MetaType::User, 12, "first_name").expect("get"),
        Some(MetaValue::text("Ada"))
    );
}

#[test]
fn long_values_become_text_columns() {
    let opt = optimizer();
    let write = |v: String| {
        opt.write(
            WriteRequest::new(MetaType::Post, 4, "body", v)
                .add_meta(true)
                .check_current_value(false),
        )
        .expect("write")
    };

    write("short".to_string());
    let long = "x".repeat(70_000);
    write(long.clone());
    assert_eq!(column_type(&opt, MetaType::Post, "body"), Some(ColumnType::Text));
    assert_eq!(opt.get_meta(MetaType::Post, 4, "body").expect("get"), Some(MetaValue::text(long)));
}

#[test]
fn keys_differing_only_in_case_share_a_column() {
    let opt = optimizer();
    let write = |key: &str, v: &str| {
        opt.write(
            WriteRequest::new(MetaType::Post, 1, key, v)
                .add_meta(true)
                .check_current_value(false),
        )
        .expect("write")
    };

    assert!(matches!(write("color", "red"), WriteOutcome::Inserted(_)));
    assert_eq!(write("Color", "blue"), WriteOutcome::Updated(1));

    let table = opt.table(MetaType::Post);
    assert_eq!(opt.store().dynamic_columns(&table).expect("columns"), vec!["color"]);
    assert_eq!(column_type(&opt, MetaType::Post, "color"), Some(ColumnType::Varchar(4)));
    assert_eq!(
        opt.get_meta(MetaType::Post, 1, "color").expect("get"),
        Some(MetaValue::text("blue"))
    );
    assert_eq!(
        opt.get_meta(MetaType::Post, 1, "COLOR").expect("get"),
        Some(MetaValue::text("blue"))
    );
}

#[test]
fn reserved_names_are_translated_in_any_case() {
    let opt = optimizer();
    for key in ["Created_At", "POST_ID"] {
        opt.write(WriteRequest::new(MetaType::Post, 6, key, "x").add_meta(true))
            .expect("write");
    }

    let table = opt.table(MetaType::Post);
    let mut columns = opt.store().dynamic_columns(&table).expect("columns");
    columns.sort();
    assert_eq!(columns, vec!["Created_At_wpmork", "POST_ID_wpmork"]);

    let mut row = opt.get_row(MetaType::Post, 6).expect("row").expect("present");
    row.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        row,
        vec![
            ("Created_At".to_string(), MetaValue::text("x")),
            ("POST_ID".to_string(), MetaValue::text("x")),
        ]
    );
}

#[test]
fn raw_sequences_size_the_column_for_their_container() {
    let opt = optimizer();
    let list = MetaValue::Sequence(vec![MetaValue::Int(1), MetaValue::Int(2)]);
    let write = |check: bool| {
        opt.write(
            WriteRequest::new(MetaType::Post, 2, "list", list.clone())
                .add_meta(true)
                .check_current_value(check),
        )
        .expect("write")
    };

    assert!(matches!(write(true), WriteOutcome::Inserted(_)));
    let table = opt.table(MetaType::Post);
    let stored = opt.store().max_value_length(&table, "list").expect("length");
    assert_eq!(stored, r#"{"idx_0":[1,2]}"#.len());
    assert_eq!(column_type(&opt, MetaType::Post, "list"), Some(ColumnType::Varchar(15)));

    assert_eq!(write(false), WriteOutcome::Updated(1));
    let declared = column_type(&opt, MetaType::Post, "list").and_then(|t| t.size());
    let stored = opt.store().max_value_length(&table, "list").expect("length");
    assert!(declared.is_some_and(|size| size as usize >= stored));
}
