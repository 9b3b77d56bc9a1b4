//! Relational store access.
//!
//! The pipeline talks to the store only through [`Store`]: parameterized
//! execute, one-statement batch execute, fetch-all, commit and rollback, plus
//! the two catalog lookups the schema registry needs. [`SqliteStore`] is the
//! shipped implementation.
//!
//! Work is grouped into an implicit transaction that the first statement after
//! a commit or rollback opens. A batch runs inside a savepoint so that one bad
//! row rejects the whole batch and leaves the surrounding transaction usable.

use std::path::Path;

use log::debug;
use rusqlite::{
    Connection, params_from_iter,
    types::{ToSql, ToSqlOutput, ValueRef},
};

use crate::{
    data::{DATETIME_STORAGE_FORMAT, Row, Value},
    error::StoreError,
};

pub trait Store {
    /// Runs one statement with bound parameters, returning affected rows.
    fn execute(&mut self, sql: &str, params: &[Option<Value>]) -> Result<usize, StoreError>;

    /// Runs one statement once per parameter row. Either every row is applied
    /// or none is.
    fn execute_many(&mut self, sql: &str, rows: &[Row]) -> Result<usize, StoreError>;

    fn fetch_all(&mut self, sql: &str, params: &[Option<Value>]) -> Result<Vec<Row>, StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    fn rollback(&mut self) -> Result<(), StoreError>;

    fn table_exists(&mut self, table: &str) -> Result<bool, StoreError>;

    /// Live column names in declaration order; empty when the table is absent.
    fn column_names(&mut self, table: &str) -> Result<Vec<String>, StoreError>;
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::String(s) => ToSqlOutput::from(s.as_str()),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Float(f) => ToSqlOutput::from(*f),
            Value::Boolean(b) => ToSqlOutput::from(*b),
            Value::DateTime(dt) => {
                ToSqlOutput::from(dt.format(DATETIME_STORAGE_FORMAT).to_string())
            }
        })
    }
}

fn value_from_sql(value: ValueRef<'_>) -> Option<Value> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(Value::Integer(i)),
        ValueRef::Real(f) => Some(Value::Float(f)),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(Value::String(String::from_utf8_lossy(bytes).into_owned()))
        }
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::Connection {
            target: path.display().to_string(),
            source,
        })?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Connection {
            target: ":memory:".to_string(),
            source,
        })?;
        Ok(Self { conn })
    }

    /// Commits outstanding work and releases the connection.
    pub fn close(mut self) -> Result<(), StoreError> {
        self.commit()?;
        self.conn
            .close()
            .map_err(|(_, source)| StoreError::Transaction(source))
    }

    fn begin_if_needed(&self) -> Result<(), StoreError> {
        if self.conn.is_autocommit() {
            self.conn
                .execute_batch("BEGIN")
                .map_err(StoreError::Transaction)?;
        }
        Ok(())
    }

    fn apply_rows(&self, sql: &str, rows: &[Row]) -> Result<usize, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(|err| StoreError::statement(sql, err))?;
        let mut affected = 0usize;
        for row in rows {
            affected += stmt
                .execute(params_from_iter(row.iter()))
                .map_err(|err| StoreError::statement(sql, err))?;
        }
        Ok(affected)
    }
}

impl Store for SqliteStore {
    fn execute(&mut self, sql: &str, params: &[Option<Value>]) -> Result<usize, StoreError> {
        debug!("execute: {sql}");
        self.begin_if_needed()?;
        self.conn
            .execute(sql, params_from_iter(params.iter()))
            .map_err(|err| StoreError::statement(sql, err))
    }

    fn execute_many(&mut self, sql: &str, rows: &[Row]) -> Result<usize, StoreError> {
        debug!("execute_many ({} row(s)): {sql}", rows.len());
        self.begin_if_needed()?;
        self.conn
            .execute_batch("SAVEPOINT batch_rows")
            .map_err(StoreError::Transaction)?;
        match self.apply_rows(sql, rows) {
            Ok(affected) => {
                self.conn
                    .execute_batch("RELEASE batch_rows")
                    .map_err(StoreError::Transaction)?;
                Ok(affected)
            }
            Err(err) => {
                self.conn
                    .execute_batch("ROLLBACK TO batch_rows; RELEASE batch_rows")
                    .map_err(StoreError::Transaction)?;
                Err(err)
            }
        }
    }

    fn fetch_all(&mut self, sql: &str, params: &[Option<Value>]) -> Result<Vec<Row>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|err| StoreError::statement(sql, err))?;
        let column_count = stmt.column_count();
        let mut rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(|err| StoreError::statement(sql, err))?;
        let mut fetched = Vec::new();
        while let Some(row) = rows.next().map_err(|err| StoreError::statement(sql, err))? {
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                let value = row
                    .get_ref(idx)
                    .map_err(|err| StoreError::statement(sql, err))?;
                values.push(value_from_sql(value));
            }
            fetched.push(values);
        }
        Ok(fetched)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        if !self.conn.is_autocommit() {
            self.conn
                .execute_batch("COMMIT")
                .map_err(StoreError::Transaction)?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        if !self.conn.is_autocommit() {
            self.conn
                .execute_batch("ROLLBACK")
                .map_err(StoreError::Transaction)?;
        }
        Ok(())
    }

    fn table_exists(&mut self, table: &str) -> Result<bool, StoreError> {
        let sql = "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE";
        let rows = self.fetch_all(sql, &[Some(Value::String(table.to_string()))])?;
        Ok(matches!(
            rows.first().and_then(|row| row.first()),
            Some(Some(Value::Integer(count))) if *count > 0
        ))
    }

    fn column_names(&mut self, table: &str) -> Result<Vec<String>, StoreError> {
        let sql = "SELECT name FROM pragma_table_info(?1) ORDER BY cid";
        let rows = self.fetch_all(sql, &[Some(Value::String(table.to_string()))])?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_iter().next() {
                Some(Some(Value::String(name))) => Some(name),
                _ => None,
            })
            .collect())
    }
}
