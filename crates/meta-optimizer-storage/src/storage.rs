use crate::codec;
use crate::column_type::{ColumnDescriptor, ColumnType};
use crate::meta_type::{MetaTable, MetaType, TableNames};
use crate::promotion;
use crate::schema::{self, quote_ident, LiveColumn};
use crate::value::MetaValue;
use chrono::NaiveDateTime;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("table not found: {0}")]
    MissingTable(String),
    #[error("column {column} not found in {table}")]
    MissingColumn { table: String, column: String },
    #[error("object id out of range: {0}")]
    ObjectIdOutOfRange(u64),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Result of a structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlOutcome {
    Applied,
    /// The table already had the requested shape, possibly because another
    /// writer got there first.
    AlreadyPresent,
}

/// Dynamic column with its declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: ColumnType,
}

/// One row of a legacy EAV table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyMetaRow {
    pub row_id: i64,
    pub object_id: u64,
    pub key: String,
    pub value: Option<String>,
}

/// Wide-table operations the optimizer needs.
///
/// Column arguments are storage names, i.e. already translated. Values are
/// encoded with [`codec::serialize`] when they are not plain numbers.
pub trait WideStore {
    /// Names of the tables this store was initialized with.
    fn names(&self) -> &TableNames;
    /// Dynamic column names in table order (housekeeping columns excluded).
    fn dynamic_columns(&self, table: &MetaTable) -> Result<Vec<String>>;
    fn column_info(&self, table: &MetaTable) -> Result<Vec<ColumnInfo>>;
    fn column_type(&self, table: &MetaTable, column: &str) -> Result<Option<ColumnType>>;
    /// Longest stored value of `column`, in characters.
    fn max_value_length(&self, table: &MetaTable, column: &str) -> Result<usize>;
    /// Add a nullable column right after the object id column.
    fn add_column(&self, table: &MetaTable, column: &ColumnDescriptor) -> Result<DdlOutcome>;
    /// Change the declared type of an existing column. A column whose type
    /// already covers the request is left alone.
    fn alter_column(&self, table: &MetaTable, column: &ColumnDescriptor) -> Result<DdlOutcome>;

    fn find_row(&self, table: &MetaTable, object_id: u64) -> Result<Option<i64>>;
    /// `None` when the object has no row; `Some(Null)` when the cell is empty.
    fn read_value(
        &self,
        table: &MetaTable,
        object_id: u64,
        column: &str,
    ) -> Result<Option<MetaValue>>;
    /// Non-null dynamic cells of the object's row.
    fn read_row(
        &self,
        table: &MetaTable,
        object_id: u64,
    ) -> Result<Option<Vec<(String, MetaValue)>>>;
    /// Insert a new row holding one value. `None` when a row for the object
    /// already exists.
    fn insert_row(
        &self,
        table: &MetaTable,
        object_id: u64,
        column: &str,
        value: &MetaValue,
        now: NaiveDateTime,
    ) -> Result<Option<i64>>;
    /// Set one cell of an existing row; returns the number of rows touched.
    fn update_value(
        &self,
        table: &MetaTable,
        object_id: u64,
        column: &str,
        value: &MetaValue,
        now: NaiveDateTime,
    ) -> Result<usize>;
    fn delete_row(&self, table: &MetaTable, object_id: u64) -> Result<usize>;
    /// Drop every dynamic column and row.
    fn reset_table(&self, table: &MetaTable) -> Result<()>;
    fn row_count(&self, table: &MetaTable) -> Result<u64>;
    /// Bytes used by the table, when the backend can tell.
    fn table_size(&self, table: &MetaTable) -> Result<Option<u64>>;
}

/// Read/write access to the legacy key-value tables.
pub trait LegacyMetaStore {
    fn legacy_meta_exists(&self, meta_type: MetaType, object_id: u64, key: &str) -> Result<bool>;
    /// Distinct object ids, highest first, optionally below `before`.
    fn legacy_object_ids(
        &self,
        meta_type: MetaType,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<u64>>;
    fn legacy_object_count(&self, meta_type: MetaType, before: Option<u64>) -> Result<u64>;
    /// Rows of one object in insertion order.
    fn legacy_meta(&self, meta_type: MetaType, object_id: u64) -> Result<Vec<LegacyMetaRow>>;
    fn add_legacy_meta(
        &self,
        meta_type: MetaType,
        object_id: u64,
        key: &str,
        value: &str,
    ) -> Result<i64>;
    fn delete_legacy_meta(&self, meta_type: MetaType, object_id: u64) -> Result<usize>;
}

#[derive(Debug, Clone)]
pub struct Storage {
    conn: Arc<Mutex<Connection>>,
    names: TableNames,
}

impl Storage {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_path_with(path, TableNames::default())
    }

    pub fn open_path_with(path: impl AsRef<Path>, names: TableNames) -> Result<Self> {
        Self::from_connection(Connection::open(path)?, names)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with(TableNames::default())
    }

    pub fn open_in_memory_with(names: TableNames) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, names)
    }

    pub fn open_uri(uri: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI;
        Self::from_connection(Connection::open_with_flags(uri, flags)?, TableNames::default())
    }

    fn from_connection(conn: Connection, names: TableNames) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        schema::init(&conn, &names)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            names,
        })
    }

    fn live_columns(conn: &Connection, table: &MetaTable) -> Result<Vec<LiveColumn>> {
        let columns = schema::table_columns(conn, &table.name)?;
        if columns.is_empty() {
            return Err(StorageError::MissingTable(table.name.clone()));
        }
        Ok(columns)
    }

    fn ensure_column(conn: &Connection, table: &MetaTable, column: &str) -> Result<()> {
        let columns = Self::live_columns(conn, table)?;
        if columns.iter().any(|c| c.name.eq_ignore_ascii_case(column)) {
            Ok(())
        } else {
            Err(StorageError::MissingColumn {
                table: table.name.clone(),
                column: column.to_string(),
            })
        }
    }

    fn legacy_columns(&self, meta_type: MetaType) -> (String, String, String) {
        (
            quote_ident(&self.names.legacy_table(meta_type)),
            quote_ident(meta_type.legacy_row_id_column()),
            quote_ident(&meta_type.id_column()),
        )
    }
}

fn sql_id(object_id: u64) -> Result<i64> {
    i64::try_from(object_id).map_err(|_| StorageError::ObjectIdOutOfRange(object_id))
}

fn timestamp(now: NaiveDateTime) -> String {
    now.format(codec::DATETIME_FORMAT).to_string()
}

pub(crate) fn to_sql_value(value: &MetaValue) -> SqlValue {
    match value {
        MetaValue::Null => SqlValue::Null,
        MetaValue::Bool(b) => SqlValue::Integer(i64::from(*b)),
        MetaValue::Int(i) => SqlValue::Integer(*i),
        MetaValue::Float(f) if f.is_finite() => SqlValue::Real(*f),
        other => SqlValue::Text(codec::serialize(other)),
    }
}

pub(crate) fn from_sql_value(value: ValueRef<'_>) -> MetaValue {
    match value {
        ValueRef::Null => MetaValue::Null,
        ValueRef::Integer(i) => MetaValue::Int(i),
        ValueRef::Real(f) => MetaValue::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            codec::decode_text(&String::from_utf8_lossy(bytes))
        }
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// Whether a column declared `current` already satisfies a request for `desired`.
fn covers(current: &ColumnType, desired: &ColumnType) -> bool {
    if current.same_category(desired) {
        match (current.size(), desired.size()) {
            (Some(have), Some(want)) => have >= want,
            _ => true,
        }
    } else {
        promotion::resolve(current, desired) == *current
    }
}

impl WideStore for Storage {
    fn names(&self) -> &TableNames {
        &self.names
    }

    fn dynamic_columns(&self, table: &MetaTable) -> Result<Vec<String>> {
        Ok(self.column_info(table)?.into_iter().map(|c| c.name).collect())
    }

    fn column_info(&self, table: &MetaTable) -> Result<Vec<ColumnInfo>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let columns = Self::live_columns(&conn, table)?;
        Ok(columns
            .into_iter()
            .filter(|c| !schema::is_housekeeping(table, &c.name))
            .map(|c| ColumnInfo {
                column_type: ColumnType::parse_declared(&c.declared),
                name: c.name,
            })
            .collect())
    }

    fn column_type(&self, table: &MetaTable, column: &str) -> Result<Option<ColumnType>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let columns = Self::live_columns(&conn, table)?;
        Ok(columns
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(column))
            .map(|c| ColumnType::parse_declared(&c.declared)))
    }

    fn max_value_length(&self, table: &MetaTable, column: &str) -> Result<usize> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        Self::ensure_column(&conn, table, column)?;
        let len: i64 = conn.query_row(
            &format!(
                "SELECT COALESCE(MAX(LENGTH({c})), 0) FROM {t}",
                c = quote_ident(column),
                t = quote_ident(&table.name)
            ),
            [],
            |r| r.get(0),
        )?;
        Ok(usize::try_from(len).unwrap_or(0))
    }

    fn add_column(&self, table: &MetaTable, column: &ColumnDescriptor) -> Result<DdlOutcome> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let previous = Self::live_columns(&tx, table)?;
        if previous.iter().any(|c| c.name.eq_ignore_ascii_case(&column.name)) {
            return Ok(DdlOutcome::AlreadyPresent);
        }

        let at = previous
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(&table.id_column))
            .map(|i| i + 1)
            .unwrap_or(previous.len());
        let mut next = previous.clone();
        next.insert(
            at,
            LiveColumn {
                name: column.name.clone(),
                declared: column.column_type.to_string(),
            },
        );

        schema::rebuild_wide_table(&tx, table, &previous, &next)?;
        tx.commit()?;
        log::info!("added column {} {} to {}", column.name, column.column_type, table.name);
        Ok(DdlOutcome::Applied)
    }

    fn alter_column(&self, table: &MetaTable, column: &ColumnDescriptor) -> Result<DdlOutcome> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let previous = Self::live_columns(&tx, table)?;
        let Some(index) = previous
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(&column.name))
        else {
            return Err(StorageError::MissingColumn {
                table: table.name.clone(),
                column: column.name.clone(),
            });
        };

        let current = ColumnType::parse_declared(&previous[index].declared);
        if covers(&current, &column.column_type) {
            return Ok(DdlOutcome::AlreadyPresent);
        }

        let mut next = previous.clone();
        next[index].declared = column.column_type.to_string();
        schema::rebuild_wide_table(&tx, table, &previous, &next)?;
        tx.commit()?;
        log::info!(
            "changed column {} of {} from {} to {}",
            column.name,
            table.name,
            current,
            column.column_type
        );
        Ok(DdlOutcome::Applied)
    }

    fn find_row(&self, table: &MetaTable, object_id: u64) -> Result<Option<i64>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let row = conn
            .query_row(
                &format!(
                    "SELECT meta_id FROM {t} WHERE {id} = ?1",
                    t = quote_ident(&table.name),
                    id = quote_ident(&table.id_column)
                ),
                params![sql_id(object_id)?],
                |r| r.get(0),
            )
            .optional()?;
        Ok(row)
    }

    fn read_value(
        &self,
        table: &MetaTable,
        object_id: u64,
        column: &str,
    ) -> Result<Option<MetaValue>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        Self::ensure_column(&conn, table, column)?;
        let value = conn
            .query_row(
                &format!(
                    "SELECT {c} FROM {t} WHERE {id} = ?1",
                    c = quote_ident(column),
                    t = quote_ident(&table.name),
                    id = quote_ident(&table.id_column)
                ),
                params![sql_id(object_id)?],
                |r| Ok(from_sql_value(r.get_ref(0)?)),
            )
            .optional()?;
        Ok(value)
    }

    fn read_row(
        &self,
        table: &MetaTable,
        object_id: u64,
    ) -> Result<Option<Vec<(String, MetaValue)>>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {t} WHERE {id} = ?1",
            t = quote_ident(&table.name),
            id = quote_ident(&table.id_column)
        ))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
        let row = stmt
            .query_row(params![sql_id(object_id)?], |r| {
                let mut cells = Vec::new();
                for (i, name) in names.iter().enumerate() {
                    if schema::is_housekeeping(table, name) {
                        continue;
                    }
                    let value = from_sql_value(r.get_ref(i)?);
                    if !value.is_null() {
                        cells.push((name.clone(), value));
                    }
                }
                Ok(cells)
            })
            .optional()?;
        Ok(row)
    }

    fn insert_row(
        &self,
        table: &MetaTable,
        object_id: u64,
        column: &str,
        value: &MetaValue,
        now: NaiveDateTime,
    ) -> Result<Option<i64>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let now = timestamp(now);
        let inserted = conn.execute(
            &format!(
                "INSERT INTO {t} ({id}, created_at, updated_at, {c}) VALUES (?1, ?2, ?2, ?3)",
                t = quote_ident(&table.name),
                id = quote_ident(&table.id_column),
                c = quote_ident(column)
            ),
            params![sql_id(object_id)?, now, to_sql_value(value)],
        );
        match inserted {
            Ok(_) => Ok(Some(conn.last_insert_rowid())),
            Err(err) if is_unique_violation(&err) => {
                log::debug!("row for {} {object_id} already exists", table.meta_type);
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn update_value(
        &self,
        table: &MetaTable,
        object_id: u64,
        column: &str,
        value: &MetaValue,
        now: NaiveDateTime,
    ) -> Result<usize> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let changed = conn.execute(
            &format!(
                "UPDATE {t} SET {c} = ?1, updated_at = ?2 WHERE {id} = ?3",
                t = quote_ident(&table.name),
                c = quote_ident(column),
                id = quote_ident(&table.id_column)
            ),
            params![to_sql_value(value), timestamp(now), sql_id(object_id)?],
        )?;
        Ok(changed)
    }

    fn delete_row(&self, table: &MetaTable, object_id: u64) -> Result<usize> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let deleted = conn.execute(
            &format!(
                "DELETE FROM {t} WHERE {id} = ?1",
                t = quote_ident(&table.name),
                id = quote_ident(&table.id_column)
            ),
            params![sql_id(object_id)?],
        )?;
        Ok(deleted)
    }

    fn reset_table(&self, table: &MetaTable) -> Result<()> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        schema::recreate_wide_table(&tx, table)?;
        tx.commit()?;
        log::info!("reset {}", table.name);
        Ok(())
    }

    fn row_count(&self, table: &MetaTable) -> Result<u64> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(&table.name)),
            [],
            |r| r.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn table_size(&self, table: &MetaTable) -> Result<Option<u64>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        // `dbstat` is only present when SQLite was built with it.
        let size = conn.query_row(
            "SELECT SUM(pgsize) FROM dbstat WHERE name = ?1",
            params![table.name],
            |r| r.get::<_, Option<i64>>(0),
        );
        match size {
            Ok(size) => Ok(Some(size.unwrap_or(0).max(0) as u64)),
            Err(err) => {
                log::debug!("table size of {} unavailable: {err}", table.name);
                Ok(None)
            }
        }
    }
}

impl LegacyMetaStore for Storage {
    fn legacy_meta_exists(&self, meta_type: MetaType, object_id: u64, key: &str) -> Result<bool> {
        let (t, _, id) = self.legacy_columns(meta_type);
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let found: Option<i64> = conn
            .query_row(
                &format!("SELECT 1 FROM {t} WHERE {id} = ?1 AND meta_key = ?2 LIMIT 1"),
                params![sql_id(object_id)?, key],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn legacy_object_ids(
        &self,
        meta_type: MetaType,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<u64>> {
        let (t, _, id) = self.legacy_columns(meta_type);
        let before = before.map(sql_id).transpose()?;
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT {id} FROM {t} WHERE (?1 IS NULL OR {id} < ?1) \
             ORDER BY {id} DESC LIMIT ?2"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![before, limit], |r| r.get::<_, i64>(0))?;
        let mut out = Vec::new();
        for id in rows {
            out.push(id?.max(0) as u64);
        }
        Ok(out)
    }

    fn legacy_object_count(&self, meta_type: MetaType, before: Option<u64>) -> Result<u64> {
        let (t, _, id) = self.legacy_columns(meta_type);
        let before = before.map(sql_id).transpose()?;
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(DISTINCT {id}) FROM {t} WHERE (?1 IS NULL OR {id} < ?1)"),
            params![before],
            |r| r.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn legacy_meta(&self, meta_type: MetaType, object_id: u64) -> Result<Vec<LegacyMetaRow>> {
        let (t, row_id, id) = self.legacy_columns(meta_type);
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {row_id}, {id}, meta_key, meta_value FROM {t} WHERE {id} = ?1 ORDER BY {row_id}"
        ))?;
        let rows = stmt.query_map(params![sql_id(object_id)?], |r| {
            Ok(LegacyMetaRow {
                row_id: r.get(0)?,
                object_id: r.get::<_, i64>(1)?.max(0) as u64,
                key: r.get::<_, Option<String>>(2)?.unwrap_or_default(),
                value: r.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn add_legacy_meta(
        &self,
        meta_type: MetaType,
        object_id: u64,
        key: &str,
        value: &str,
    ) -> Result<i64> {
        let (t, _, id) = self.legacy_columns(meta_type);
        let conn = self.conn.lock().expect("storage mutex poisoned");
        conn.execute(
            &format!("INSERT INTO {t} ({id}, meta_key, meta_value) VALUES (?1, ?2, ?3)"),
            params![sql_id(object_id)?, key, value],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn delete_legacy_meta(&self, meta_type: MetaType, object_id: u64) -> Result<usize> {
        let (t, _, id) = self.legacy_columns(meta_type);
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let deleted = conn.execute(
            &format!("DELETE FROM {t} WHERE {id} = ?1"),
            params![sql_id(object_id)?],
        )?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multi_value::MultiValue;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(10, 0, 0))
            .expect("valid timestamp")
    }

    fn posts(storage: &Storage) -> MetaTable {
        storage.names().wide_table(MetaType::Post)
    }

    #[test]
    fn added_columns_follow_the_id_column() {
        let storage = Storage::open_in_memory().expect("open storage");
        let table = posts(&storage);
        let first = ColumnDescriptor::new("first", ColumnType::TinyInt);
        let second = ColumnDescriptor::new("second", ColumnType::Varchar(5));

        assert_eq!(storage.add_column(&table, &first).expect("add"), DdlOutcome::Applied);
        assert_eq!(storage.add_column(&table, &second).expect("add"), DdlOutcome::Applied);
        assert_eq!(storage.add_column(&table, &first).expect("re-add"), DdlOutcome::AlreadyPresent);

        assert_eq!(storage.dynamic_columns(&table).expect("columns"), vec!["second", "first"]);
        assert_eq!(
            storage.column_type(&table, "second").expect("type"),
            Some(ColumnType::Varchar(5))
        );
    }

    #[test]
    fn alter_keeps_data_and_never_narrows() {
        let storage = Storage::open_in_memory().expect("open storage");
        let table = posts(&storage);
        storage
            .add_column(&table, &ColumnDescriptor::new("count", ColumnType::TinyInt))
            .expect("add");
        storage
            .insert_row(&table, 1, "count", &MetaValue::Int(5), now())
            .expect("insert")
            .expect("new row");

        let widened = ColumnDescriptor::new("count", ColumnType::SmallInt);
        assert_eq!(storage.alter_column(&table, &widened).expect("alter"), DdlOutcome::Applied);
        let narrowed = ColumnDescriptor::new("count", ColumnType::TinyInt);
        assert_eq!(
            storage.alter_column(&table, &narrowed).expect("alter"),
            DdlOutcome::AlreadyPresent
        );

        assert_eq!(storage.column_type(&table, "count").expect("type"), Some(ColumnType::SmallInt));
        assert_eq!(
            storage.read_value(&table, 1, "count").expect("read"),
            Some(MetaValue::Int(5))
        );
    }

    #[test]
    fn duplicate_insert_reports_existing_row() {
        let storage = Storage::open_in_memory().expect("open storage");
        let table = posts(&storage);
        storage
            .add_column(&table, &ColumnDescriptor::new("slug", ColumnType::Varchar(10)))
            .expect("add");

        let row = storage
            .insert_row(&table, 9, "slug", &MetaValue::text("a"), now())
            .expect("insert");
        assert!(row.is_some());
        let again = storage
            .insert_row(&table, 9, "slug", &MetaValue::text("b"), now())
            .expect("insert");
        assert_eq!(again, None);
        assert_eq!(storage.find_row(&table, 9).expect("find"), row);
    }

    #[test]
    fn containers_survive_a_round_trip() {
        let storage = Storage::open_in_memory().expect("open storage");
        let table = posts(&storage);
        storage
            .add_column(&table, &ColumnDescriptor::new("tag", ColumnType::Varchar(64)))
            .expect("add");
        let tags = MetaValue::Multi(MultiValue::from_values([
            MetaValue::text("red"),
            MetaValue::text("blue"),
        ]));
        storage.insert_row(&table, 3, "tag", &tags, now()).expect("insert");

        assert_eq!(storage.read_value(&table, 3, "tag").expect("read"), Some(tags.clone()));
        assert_eq!(
            storage.read_row(&table, 3).expect("row"),
            Some(vec![("tag".to_string(), tags)])
        );
        assert_eq!(storage.read_row(&table, 4).expect("row"), None);
    }

    #[test]
    fn missing_columns_are_errors() {
        let storage = Storage::open_in_memory().expect("open storage");
        let table = posts(&storage);
        let err = storage.read_value(&table, 1, "nope").expect_err("missing column");
        assert!(matches!(err, StorageError::MissingColumn { .. }));
    }

    #[test]
    fn reset_drops_dynamic_columns() {
        let storage = Storage::open_in_memory().expect("open storage");
        let table = posts(&storage);
        storage
            .add_column(&table, &ColumnDescriptor::new("x", ColumnType::TinyInt))
            .expect("add");
        storage.insert_row(&table, 1, "x", &MetaValue::Int(1), now()).expect("insert");

        storage.reset_table(&table).expect("reset");
        assert!(storage.dynamic_columns(&table).expect("columns").is_empty());
        assert_eq!(storage.row_count(&table).expect("count"), 0);
    }

    #[test]
    fn legacy_rows_are_paged_from_the_top() {
        let storage = Storage::open_in_memory().expect("open storage");
        for id in [1u64, 2, 3] {
            storage
                .add_legacy_meta(MetaType::User, id, "nickname", &format!("u{id}"))
                .expect("add");
        }
        storage.add_legacy_meta(MetaType::User, 3, "color", "red").expect("add");

        assert_eq!(
            storage.legacy_object_ids(MetaType::User, None, 2).expect("ids"),
            vec![3, 2]
        );
        assert_eq!(
            storage.legacy_object_ids(MetaType::User, Some(2), 10).expect("ids"),
            vec![1]
        );
        assert_eq!(storage.legacy_object_count(MetaType::User, None).expect("count"), 3);

        let rows = storage.legacy_meta(MetaType::User, 3).expect("rows");
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["nickname", "color"]);
        assert!(storage.legacy_meta_exists(MetaType::User, 3, "color").expect("exists"));

        assert_eq!(storage.delete_legacy_meta(MetaType::User, 3).expect("delete"), 2);
        assert!(!storage.legacy_meta_exists(MetaType::User, 3, "color").expect("exists"));
    }
}
