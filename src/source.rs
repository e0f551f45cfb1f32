//! Data sources and row producers using DuckDB
//!
//! A source reference is `<path>` or `<path>#<table>`:
//! - flat files (`csv`, `tsv`, `parquet`, `json`, `jsonl`) are read through an
//!   in-memory connection,
//! - database files (`duckdb`, `ddb`, `db`) need `#table` to name a relation,
//! - `sql` files hold an optional `ATTACH` comment and a query.

use crate::cancel::CancelToken;
use crate::error::{Result, RowdiffError};
use crate::record::{Column, Record, Value};
use crate::sql::{is_sql_file, parse_sql_file};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use duckdb::{AccessMode, Config, Connection};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

/// What a source path points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Database,
    Sql,
}

/// Reference to a relation in a data source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub path: PathBuf,
    pub table: Option<String>,
}

impl SourceRef {
    pub fn parse(s: &str) -> Result<Self> {
        let (path, table) = match s.rsplit_once('#') {
            Some((path, table)) => {
                if table.is_empty() {
                    return Err(RowdiffError::invalid_input(format!(
                        "Empty table name in source '{}'",
                        s
                    )));
                }
                (path, Some(table.to_string()))
            }
            None => (s, None),
        };
        if path.is_empty() {
            return Err(RowdiffError::invalid_input(format!("Empty path in source '{}'", s)));
        }

        let source = Self {
            path: PathBuf::from(path),
            table,
        };
        let kind = source.kind()?;
        if source.table.is_some() && kind != SourceKind::Database {
            return Err(RowdiffError::invalid_input(format!(
                "Only database sources take a #table suffix: '{}'",
                s
            )));
        }
        Ok(source)
    }

    pub fn kind(&self) -> Result<SourceKind> {
        if is_sql_file(&self.path) {
            return Ok(SourceKind::Sql);
        }
        let extension = self
            .path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" | "tsv" | "parquet" | "json" | "jsonl" => Ok(SourceKind::File),
            "duckdb" | "ddb" | "db" => Ok(SourceKind::Database),
            _ => Err(RowdiffError::invalid_input(format!(
                "Unsupported source format: {}",
                self.path.display()
            ))),
        }
    }

    /// A database source without a table, denoting all of its tables.
    pub fn is_whole_database(&self) -> bool {
        self.table.is_none() && matches!(self.kind(), Ok(SourceKind::Database))
    }

    pub fn with_table(&self, table: &str) -> Self {
        Self {
            path: self.path.clone(),
            table: Some(table.to_string()),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}#{}", self.path.display(), table),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// Structural description of one relation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceMeta {
    pub location: String,
    pub columns: Vec<Column>,
    pub row_count: u64,
}

impl SourceMeta {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Map DuckDB failures to not-found or input errors where recognizable.
fn convert_duckdb_error(error: duckdb::Error, source: &SourceRef) -> RowdiffError {
    let error_msg = error.to_string();

    if error_msg.contains("does not exist")
        || error_msg.contains("No files found")
        || error_msg.contains("Table with name")
    {
        RowdiffError::not_found(source.to_string())
    } else if error_msg.contains("CSV Error")
        || error_msg.contains("Could not convert")
        || error_msg.contains("Malformed JSON")
    {
        RowdiffError::invalid_input(format!("Malformed source '{}': {}", source, error_msg))
    } else {
        RowdiffError::DuckDb(error)
    }
}

/// Open a connection able to run [`select_sql`] for `source`.
fn connect(source: &SourceRef) -> Result<Connection> {
    if !source.path.exists() {
        return Err(RowdiffError::not_found(source.path.display().to_string()));
    }
    match source.kind()? {
        SourceKind::File => Ok(Connection::open_in_memory()?),
        SourceKind::Database => {
            let config = Config::default().access_mode(AccessMode::ReadOnly)?;
            Connection::open_with_flags(&source.path, config)
                .map_err(|e| convert_duckdb_error(e, source))
        }
        SourceKind::Sql => {
            let sql_file = parse_sql_file(&source.path)?;
            let connection = Connection::open_in_memory()?;
            if !sql_file.connection_string.is_empty() {
                connection
                    .execute_batch(&sql_file.connection_string)
                    .map_err(|e| convert_duckdb_error(e, source))?;
            }
            for statement in &sql_file.setup {
                connection
                    .execute_batch(statement)
                    .map_err(|e| convert_duckdb_error(e, source))?;
            }
            Ok(connection)
        }
    }
}

/// Query selecting every row of `source` in natural order.
fn select_sql(source: &SourceRef) -> Result<String> {
    match source.kind()? {
        SourceKind::File => Ok(format!(
            "SELECT * FROM {}",
            quote_literal(&source.path.to_string_lossy())
        )),
        SourceKind::Database => match &source.table {
            Some(table) => Ok(format!("SELECT * FROM {}", quote_ident(table))),
            None => Err(RowdiffError::invalid_input(format!(
                "Database source needs a table: {}#<table>",
                source.path.display()
            ))),
        },
        SourceKind::Sql => Ok(parse_sql_file(&source.path)?.query),
    }
}

fn describe(source: &SourceRef) -> Result<SourceMeta> {
    let connection = connect(source)?;
    let sql = select_sql(source)?;

    let mut stmt = connection
        .prepare(&format!("DESCRIBE {}", sql))
        .map_err(|e| convert_duckdb_error(e, source))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Column {
                name: row.get::<_, String>(0)?,
                data_type: row.get::<_, String>(1)?,
            })
        })
        .map_err(|e| convert_duckdb_error(e, source))?;

    let mut columns = Vec::new();
    for row in rows {
        columns.push(row.map_err(|e| {
            RowdiffError::data_processing(format!("Failed to read column info: {}", e))
        })?);
    }

    let row_count: i64 = connection
        .query_row(&format!("SELECT COUNT(*) FROM ({})", sql), [], |row| {
            row.get(0)
        })
        .map_err(|e| convert_duckdb_error(e, source))?;

    Ok(SourceMeta {
        location: source.to_string(),
        columns,
        row_count: row_count.max(0) as u64,
    })
}

/// Fetch columns and row count. `Ok(None)` means the relation does not exist.
pub fn fetch_meta(source: &SourceRef) -> Result<Option<SourceMeta>> {
    match describe(source) {
        Ok(meta) => Ok(Some(meta)),
        Err(err) if err.is_not_found() => {
            log::debug!("Source not found: {}", source);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Base tables of a database source, sorted by name.
pub fn list_tables(source: &SourceRef) -> Result<Vec<String>> {
    if source.kind()? != SourceKind::Database {
        return Err(RowdiffError::invalid_input(format!(
            "Not a database source: {}",
            source
        )));
    }
    let connection = connect(source)?;
    let mut stmt = connection.prepare(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = 'main' AND table_type = 'BASE TABLE' \
         ORDER BY table_name",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut tables = Vec::new();
    for row in rows {
        tables.push(row?);
    }
    Ok(tables)
}

fn value_to_string(value: duckdb::types::ValueRef<'_>) -> Value {
    use duckdb::types::ValueRef;
    match value {
        ValueRef::Null => None,
        ValueRef::Text(s) => Some(String::from_utf8_lossy(s).to_string()),
        ValueRef::Boolean(b) => Some(b.to_string()),
        ValueRef::BigInt(i) => Some(i.to_string()),
        ValueRef::Double(f) => Some(f.to_string()),
        ValueRef::Blob(b) => Some(format!("<blob:{} bytes>", b.len())),
        other => Some(format!("{:?}", other)),
    }
}

fn stream_rows(
    source: &SourceRef,
    columns: &[String],
    rows_tx: &Sender<Record>,
    cancel: &CancelToken,
) -> Result<u64> {
    let connection = connect(source)?;
    let sql = select_sql(source)?;
    let column_count = columns.len();

    // Let DuckDB render every value so dates, decimals and the like print as
    // they do in SQL.
    let casts = columns
        .iter()
        .map(|name| format!("CAST({} AS VARCHAR)", quote_ident(name)))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("SELECT {} FROM ({})", casts, sql);

    let mut stmt = connection
        .prepare(&sql)
        .map_err(|e| convert_duckdb_error(e, source))?;
    let mut rows = stmt.query([]).map_err(|e| convert_duckdb_error(e, source))?;

    let mut count = 0u64;
    while let Some(row) = rows.next().map_err(|e| convert_duckdb_error(e, source))? {
        let mut record = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let value = row.get_ref(i).map_err(|e| {
                RowdiffError::data_processing(format!("Failed to get value at index {}: {}", i, e))
            })?;
            record.push(value_to_string(value));
        }

        select! {
            send(rows_tx, record) -> sent => {
                if sent.is_err() {
                    return Ok(count);
                }
            }
            recv(cancel.done()) -> _ => {
                return Err(cancel.err().unwrap_or(RowdiffError::Cancelled));
            }
        }
        count += 1;
    }
    Ok(count)
}

/// Stream the rows of `source` on a dedicated thread.
///
/// The channel closes at end of data. A relation that disappears mid-stream
/// ends the stream like end of data; any other failure cancels `cancel` with
/// the error as cause.
pub fn spawn_rows(
    source: SourceRef,
    columns: &[Column],
    cancel: CancelToken,
    capacity: usize,
) -> Result<(Receiver<Record>, JoinHandle<()>)> {
    let (tx, rx) = bounded(capacity);
    let columns: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
    if columns.is_empty() {
        // Nothing to select; an empty channel is the whole stream.
        let handle = thread::Builder::new()
            .name("rowdiff-rows".to_string())
            .spawn(move || drop(tx))?;
        return Ok((rx, handle));
    }

    let handle = thread::Builder::new()
        .name("rowdiff-rows".to_string())
        .spawn(move || match stream_rows(&source, &columns, &tx, &cancel) {
            Ok(count) => log::debug!("Read {} rows from {}", count, source),
            Err(err) if err.is_not_found() => {
                log::debug!("Source {} went away mid-diff, treating as end of data", source)
            }
            Err(err) => {
                cancel.cancel(err);
            }
        })?;
    Ok((rx, handle))
}

/// Whether `path` names something this module can read.
pub fn is_supported_path(path: &Path) -> bool {
    SourceRef {
        path: path.to_path_buf(),
        table: None,
    }
    .kind()
    .is_ok()
}
