//! Prepared-statement execution and value binding.
//!
//! The builder borrows the shared connection for the duration of one call;
//! it performs no pooling, retries or transactions. Batch mode substitutes
//! one attribute/value slice at a time, re-renders and executes, then
//! restores the un-sliced state. A failing row aborts the rest of the batch;
//! rows already executed stay executed.

use std::collections::BTreeMap;

use rusqlite::{types::Value, Statement};
use tracing::debug;

use crate::{
    builder::{Method, QueryBuilder},
    error::{Error, Result},
    shape::Mode,
    traits::FromRow,
};

/// One fetched record as a column-to-value map.
pub type RowMap = BTreeMap<String, Value>;

/// All rows produced by one statement execution; empty for non-SELECT.
pub type ResultSet = Vec<RowMap>;

impl QueryBuilder {
    /// Renders, binds and runs the statement. Returns one [`ResultSet`] per
    /// execution: a single entry in single mode, one entry per row group in
    /// batch mode.
    pub fn execute(&mut self) -> Result<Vec<ResultSet>> {
        match self.mode {
            Mode::Single => Ok(vec![self.execute_once(None)?]),
            Mode::Batch => self.execute_batch(),
        }
    }

    /// Convenience for single SELECTs: the rows of the first result set.
    pub fn fetch(&mut self) -> Result<ResultSet> {
        Ok(self.execute()?.into_iter().next().unwrap_or_default())
    }

    /// Runs the statement and maps every row through `T::from_row`.
    pub fn fetch_as<T: FromRow>(&self) -> Result<Vec<T>> {
        let sql = self.to_statement_text()?;
        debug!(sql = %sql, "fetching typed rows");
        let conn = self.db.lock().unwrap();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::execution(&sql, None, e))?;
        let rows = stmt
            .query_map([], T::from_row)
            .map_err(|e| Error::execution(&sql, None, e))?;
        rows.collect::<rusqlite::Result<Vec<T>>>()
            .map_err(|e| Error::execution(&sql, None, e))
    }

    /// Table introspection: column name, type, nullability and defaults.
    pub fn describe(&self) -> Result<ResultSet> {
        let sql = format!("PRAGMA table_info({})", self.table);
        let conn = self.db.lock().unwrap();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::execution(&sql, None, e))?;
        fetch_all(&mut stmt, &sql)
    }

    fn execute_batch(&mut self) -> Result<Vec<ResultSet>> {
        let attributes = std::mem::take(&mut self.attribute_rows);
        let values = std::mem::take(&mut self.value_rows);

        // Whichever outer dimension is longer drives the iteration count;
        // the other side carries its single slice through every round.
        let iterations = attributes.len().max(values.len());
        let mut results = Vec::with_capacity(iterations);
        let mut failure = None;
        for i in 0..iterations {
            if let Some(slice) = attributes.get(i) {
                self.attribute_rows = vec![slice.clone()];
            }
            if let Some(row) = values.get(i) {
                self.value_rows = vec![row.clone()];
            }
            match self.execute_once(Some(i)) {
                Ok(set) => results.push(set),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        self.attribute_rows = attributes;
        self.value_rows = values;
        match failure {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }

    fn execute_once(&self, batch_row: Option<usize>) -> Result<ResultSet> {
        let sql = self.to_statement_text()?;
        debug!(sql = %sql, row = ?batch_row, "executing statement");

        let conn = self.db.lock().unwrap();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::execution(&sql, batch_row, e))?;

        match self.method {
            Some(Method::Select) => fetch_all(&mut stmt, &sql),
            Some(Method::Insert) => {
                self.run_insert(&mut stmt, &sql, batch_row)?;
                Ok(vec![])
            }
            Some(Method::Update) => {
                self.run_update(&mut stmt, &sql, batch_row)?;
                Ok(vec![])
            }
            Some(Method::Delete) => {
                stmt.execute([])
                    .map_err(|e| Error::execution(&sql, batch_row, e))?;
                Ok(vec![])
            }
            None => Err(Error::UnsupportedMethod(
                "statement keyword not recognized for execution dispatch".into(),
            )),
        }
    }

    /// Executes the prepared INSERT once per value row, rebinding each time.
    fn run_insert(&self, stmt: &mut Statement<'_>, sql: &str, batch_row: Option<usize>) -> Result<()> {
        let columns = self.current_attributes();
        for (r, row_values) in self.value_rows.iter().enumerate() {
            let row = batch_row.or(Some(r));
            if columns.is_empty() {
                for (i, value) in row_values.iter().enumerate() {
                    stmt.raw_bind_parameter(i + 1, value)
                        .map_err(|e| Error::execution(sql, row, e))?;
                }
            } else {
                bind_named(stmt, sql, row, columns, row_values)?;
            }
            stmt.raw_execute()
                .map_err(|e| Error::execution(sql, row, e))?;
        }
        Ok(())
    }

    fn run_update(&self, stmt: &mut Statement<'_>, sql: &str, batch_row: Option<usize>) -> Result<()> {
        let columns = self.current_attributes();
        let values = self.value_rows.first().map(Vec::as_slice).unwrap_or(&[]);
        bind_named(stmt, sql, batch_row, columns, values)?;
        stmt.raw_execute()
            .map_err(|e| Error::execution(sql, batch_row, e))?;
        Ok(())
    }
}

fn bind_named(
    stmt: &mut Statement<'_>,
    sql: &str,
    row: Option<usize>,
    columns: &[String],
    values: &[Value],
) -> Result<()> {
    for (column, value) in columns.iter().zip(values) {
        let index = stmt
            .parameter_index(&format!(":{column}"))
            .map_err(|e| Error::execution(sql, row, e))?
            .ok_or_else(|| {
                Error::MalformedInput(format!("statement has no placeholder for column {column}"))
            })?;
        stmt.raw_bind_parameter(index, value)
            .map_err(|e| Error::execution(sql, row, e))?;
    }
    Ok(())
}

fn fetch_all(stmt: &mut Statement<'_>, sql: &str) -> Result<ResultSet> {
    let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let mut rows = stmt.raw_query();
    let mut fetched = Vec::new();
    while let Some(row) = rows.next().map_err(|e| Error::execution(sql, None, e))? {
        let mut map = RowMap::new();
        for (i, name) in column_names.iter().enumerate() {
            let value: Value = row.get(i).map_err(|e| Error::execution(sql, None, e))?;
            map.insert(name.clone(), value);
        }
        fetched.push(map);
    }
    Ok(fetched)
}
