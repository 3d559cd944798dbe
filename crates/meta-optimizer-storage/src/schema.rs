use crate::meta_type::{MetaTable, MetaType, TableNames};
use crate::naming::HOUSEKEEPING_COLUMNS;
use rusqlite::Connection;

/// A column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LiveColumn {
    pub name: String,
    pub declared: String,
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn init(conn: &Connection, names: &TableNames) -> rusqlite::Result<()> {
    for meta_type in MetaType::ALL {
        create_legacy_table(conn, names, meta_type)?;
        create_wide_table(conn, &names.wide_table(meta_type))?;
    }
    Ok(())
}

/// EAV table in the layout the wide tables are derived from.
fn create_legacy_table(
    conn: &Connection,
    names: &TableNames,
    meta_type: MetaType,
) -> rusqlite::Result<()> {
    let table = names.legacy_table(meta_type);
    let row_id = quote_ident(meta_type.legacy_row_id_column());
    let object_id = quote_ident(&meta_type.id_column());
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {t} (
          {row_id} INTEGER PRIMARY KEY AUTOINCREMENT,
          {object_id} BIGINT NOT NULL DEFAULT 0,
          "meta_key" VARCHAR(255) DEFAULT NULL,
          "meta_value" LONGTEXT
        );

        CREATE INDEX IF NOT EXISTS {object_idx} ON {t}({object_id});
        CREATE INDEX IF NOT EXISTS {key_idx} ON {t}("meta_key");
        "#,
        t = quote_ident(&table),
        object_idx = quote_ident(&format!("{table}_{}", meta_type.id_column())),
        key_idx = quote_ident(&format!("{table}_meta_key")),
    ))
}

pub(crate) fn create_wide_table(conn: &Connection, table: &MetaTable) -> rusqlite::Result<()> {
    let columns = fixed_layout(table);
    conn.execute_batch(&create_table_sql(&table.name, table, &columns, true))
}

/// Housekeeping columns in table order, with no dynamic columns yet.
fn fixed_layout(table: &MetaTable) -> Vec<LiveColumn> {
    let fixed = |name: &str, declared: &str| LiveColumn {
        name: name.to_string(),
        declared: declared.to_string(),
    };
    vec![
        fixed("meta_id", "INTEGER"),
        fixed(&table.id_column, "BIGINT"),
        fixed("created_at", "DATETIME"),
        fixed("updated_at", "DATETIME"),
    ]
}

fn column_definition(table: &MetaTable, column: &LiveColumn) -> String {
    let name = quote_ident(&column.name);
    if column.name == "meta_id" {
        format!("{name} INTEGER PRIMARY KEY")
    } else if column.name == table.id_column {
        format!("{name} BIGINT NOT NULL UNIQUE")
    } else if column.name == "created_at" || column.name == "updated_at" {
        format!("{name} DATETIME NOT NULL")
    } else {
        format!("{name} {} NULL DEFAULT NULL", column.declared)
    }
}

fn create_table_sql(
    name: &str,
    table: &MetaTable,
    columns: &[LiveColumn],
    if_not_exists: bool,
) -> String {
    let defs: Vec<String> = columns
        .iter()
        .map(|c| format!("  {}", column_definition(table, c)))
        .collect();
    format!(
        "CREATE TABLE {}{} (\n{}\n);",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        quote_ident(name),
        defs.join(",\n")
    )
}

pub(crate) fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<LiveColumn>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let rows = stmt.query_map([], |row| {
        Ok(LiveColumn {
            name: row.get(1)?,
            declared: row.get(2)?,
        })
    })?;
    let mut out = Vec::new();
    for column in rows {
        out.push(column?);
    }
    Ok(out)
}

pub(crate) fn is_housekeeping(table: &MetaTable, column: &str) -> bool {
    HOUSEKEEPING_COLUMNS
        .iter()
        .any(|name| name.eq_ignore_ascii_case(column))
        || column.eq_ignore_ascii_case(&table.id_column)
}

/// Replace `table` with a copy laid out as `columns`.
///
/// SQLite can only append columns and cannot retype them, so both adding a
/// column at a given position and widening one go through a rebuild. Values of
/// columns present in both layouts are copied; the target column affinity
/// applies to copied values. Must run inside a transaction.
pub(crate) fn rebuild_wide_table(
    conn: &Connection,
    table: &MetaTable,
    previous: &[LiveColumn],
    columns: &[LiveColumn],
) -> rusqlite::Result<()> {
    let scratch = format!("{}__rebuild", table.name);
    let copied: Vec<String> = columns
        .iter()
        .filter(|c| previous.iter().any(|p| p.name == c.name))
        .map(|c| quote_ident(&c.name))
        .collect();
    let copied = copied.join(", ");

    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {scratch_q};\n{create}\n\
         INSERT INTO {scratch_q} ({copied}) SELECT {copied} FROM {t};\n\
         DROP TABLE {t};\n\
         ALTER TABLE {scratch_q} RENAME TO {t};",
        scratch_q = quote_ident(&scratch),
        create = create_table_sql(&scratch, table, columns, false),
        t = quote_ident(&table.name),
    ))
}

/// Drop a wide table and recreate it with housekeeping columns only.
pub(crate) fn recreate_wide_table(conn: &Connection, table: &MetaTable) -> rusqlite::Result<()> {
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_ident(&table.name)))?;
    create_wide_table(conn, table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_legacy_and_wide_tables() {
        let conn = Connection::open_in_memory().expect("open");
        let names = TableNames::default();
        init(&conn, &names).expect("init");
        // Idempotent.
        init(&conn, &names).expect("init again");

        let legacy = table_columns(&conn, "wp_usermeta").expect("legacy columns");
        let legacy: Vec<&str> = legacy.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(legacy, vec!["umeta_id", "user_id", "meta_key", "meta_value"]);

        let wide = table_columns(&conn, "wp_postmeta_wpmo").expect("wide columns");
        let wide: Vec<&str> = wide.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(wide, vec!["meta_id", "post_id", "created_at", "updated_at"]);
    }

    #[test]
    fn rebuild_preserves_rows_and_constraints() {
        let conn = Connection::open_in_memory().expect("open");
        let table = TableNames::default().wide_table(MetaType::Post);
        create_wide_table(&conn, &table).expect("create");
        conn.execute(
            "INSERT INTO wp_postmeta_wpmo (post_id, created_at, updated_at) \
             VALUES (7, '2024-01-01 00:00:00', '2024-01-01 00:00:00')",
            [],
        )
        .expect("insert");

        let previous = table_columns(&conn, &table.name).expect("columns");
        let mut next = previous.clone();
        next.insert(
            2,
            LiveColumn {
                name: "weird \"name\"".to_string(),
                declared: "VARCHAR(4)".to_string(),
            },
        );
        rebuild_wide_table(&conn, &table, &previous, &next).expect("rebuild");

        let after = table_columns(&conn, &table.name).expect("columns");
        assert_eq!(after[2].name, "weird \"name\"");
        assert_eq!(after[2].declared, "VARCHAR(4)");

        let post_id: i64 = conn
            .query_row("SELECT post_id FROM wp_postmeta_wpmo", [], |r| r.get(0))
            .expect("row kept");
        assert_eq!(post_id, 7);

        let duplicate = conn.execute(
            "INSERT INTO wp_postmeta_wpmo (post_id, created_at, updated_at) VALUES (7, 'x', 'x')",
            [],
        );
        assert!(duplicate.is_err(), "object id stays unique after rebuild");
    }
}
