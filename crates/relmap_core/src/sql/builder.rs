//! DDL and DML statement construction.

use super::dialect::{default_expr, placeholder, quote_identifier, sql_type};
use super::{CreateTableOptions, Statement};
use crate::error::CoreResult;
use crate::schema::{BoundRecord, ColumnDef, TableDef};
use relmap_store::{Engine, Value};

/// Builds the `CREATE TABLE` script for `table`.
///
/// With `drop_if_exists` the script starts with a `DROP TABLE IF EXISTS`
/// statement, so it must be run as a batch.
///
/// # Errors
///
/// Returns [`CoreError::UnsupportedEngine`](crate::CoreError::UnsupportedEngine)
/// if the engine lacks a needed rule.
pub fn create_table(engine: Engine, table: &TableDef, options: &CreateTableOptions) -> CoreResult<String> {
    let name = quote_identifier(engine, table.name())?;
    let mut sql = String::new();

    if options.drop_if_exists {
        sql.push_str("DROP TABLE IF EXISTS ");
        sql.push_str(&name);
        sql.push_str("; ");
    }

    sql.push_str("CREATE TABLE ");
    if options.if_not_exists {
        sql.push_str("IF NOT EXISTS ");
    }
    sql.push_str(&name);
    sql.push_str(" (");

    let mut parts = Vec::with_capacity(table.columns().len() + 2);
    for column in table.columns() {
        parts.push(column_definition(engine, column)?);
    }

    let pk = quoted_list(engine, table, &table.primary_key())?;
    if !pk.is_empty() {
        parts.push(format!("PRIMARY KEY ({pk})"));
    }
    let uk = quoted_list(engine, table, &table.unique_key())?;
    if !uk.is_empty() {
        parts.push(format!("UNIQUE ({uk})"));
    }

    sql.push_str(&parts.join(", "));
    sql.push_str(");");
    Ok(sql)
}

fn column_definition(engine: Engine, column: &ColumnDef) -> CoreResult<String> {
    let mut def = format!(
        "{} {}",
        quote_identifier(engine, column.name())?,
        sql_type(engine, column.kind())?
    );
    def.push_str(if column.is_nullable() { " NULL" } else { " NOT NULL" });
    if let Some(expr) = default_expr(engine, column.default_expr())? {
        def.push_str(" DEFAULT ");
        def.push_str(expr);
    }
    Ok(def)
}

/// Builds an `INSERT` for `record`.
///
/// Every column that is not auto-generated is supplied as an argument;
/// auto-generated columns are read back through `RETURNING`. A table
/// whose columns are all auto-generated gets `DEFAULT VALUES`.
///
/// # Errors
///
/// Returns [`CoreError::UnsupportedEngine`](crate::CoreError::UnsupportedEngine)
/// if the engine lacks a needed rule.
pub fn insert(engine: Engine, record: &BoundRecord<'_>) -> CoreResult<Statement> {
    let table = record.table();
    let (returning, supplied): (Vec<usize>, Vec<usize>) =
        (0..table.columns().len()).partition(|&i| table.columns()[i].is_auto_generated());

    let mut sql = format!("INSERT INTO {}", quote_identifier(engine, table.name())?);
    let mut args = Vec::with_capacity(supplied.len());

    if supplied.is_empty() {
        sql.push_str(" DEFAULT VALUES");
    } else {
        let mut placeholders = Vec::with_capacity(supplied.len());
        for &i in &supplied {
            args.push(record.cell(i).value());
            placeholders.push(placeholder(engine, args.len())?);
        }
        sql.push_str(" (");
        sql.push_str(&quoted_list(engine, table, &supplied)?);
        sql.push_str(") VALUES (");
        sql.push_str(&placeholders.join(", "));
        sql.push(')');
    }

    push_returning(engine, table, &returning, &mut sql)?;
    sql.push(';');

    Ok(Statement { sql, args, returning })
}

/// Builds an `UPDATE` writing the changed fields of `record`.
///
/// Rows are identified by the primary key, or by the unique key when the
/// table has no primary key. Key predicates bind the fields' current
/// values. Returns `Ok(None)` when no writable field has changed.
///
/// # Errors
///
/// Returns [`CoreError::NoKey`](crate::CoreError::NoKey) if the table has
/// neither key, checked before anything else.
pub fn update(engine: Engine, record: &BoundRecord<'_>) -> CoreResult<Option<Statement>> {
    let table = record.table();
    let key = table.row_key()?;

    let columns = table.columns();
    let set: Vec<usize> = (0..columns.len())
        .filter(|&i| !columns[i].is_auto_generated() && record.cell(i).changed())
        .collect();
    if set.is_empty() {
        return Ok(None);
    }
    let returning: Vec<usize> = (0..columns.len())
        .filter(|&i| columns[i].is_auto_generated())
        .collect();

    let mut args = Vec::with_capacity(set.len() + key.len());
    let mut assignments = Vec::with_capacity(set.len());
    for &i in &set {
        args.push(record.cell(i).value());
        assignments.push(format!(
            "{} = {}",
            quote_identifier(engine, columns[i].name())?,
            placeholder(engine, args.len())?
        ));
    }

    let mut sql = format!(
        "UPDATE {} SET {}",
        quote_identifier(engine, table.name())?,
        assignments.join(", ")
    );
    push_where(engine, record, &key, &mut sql, &mut args)?;
    push_returning(engine, table, &returning, &mut sql)?;
    sql.push(';');

    Ok(Some(Statement { sql, args, returning }))
}

/// Builds a `DELETE` for the row identified by `record`'s key fields.
///
/// # Errors
///
/// Returns [`CoreError::NoKey`](crate::CoreError::NoKey) if the table has
/// neither key.
pub fn delete(engine: Engine, record: &BoundRecord<'_>) -> CoreResult<Statement> {
    let table = record.table();
    let key = table.row_key()?;

    let mut sql = format!("DELETE FROM {}", quote_identifier(engine, table.name())?);
    let mut args = Vec::with_capacity(key.len());
    push_where(engine, record, &key, &mut sql, &mut args)?;
    sql.push(';');

    Ok(Statement {
        sql,
        args,
        returning: Vec::new(),
    })
}

fn push_where(
    engine: Engine,
    record: &BoundRecord<'_>,
    key: &[usize],
    sql: &mut String,
    args: &mut Vec<Value>,
) -> CoreResult<()> {
    let columns = record.table().columns();
    let mut predicates = Vec::with_capacity(key.len());
    for &i in key {
        args.push(record.cell(i).value());
        predicates.push(format!(
            "{} = {}",
            quote_identifier(engine, columns[i].name())?,
            placeholder(engine, args.len())?
        ));
    }
    sql.push_str(" WHERE ");
    sql.push_str(&predicates.join(" AND "));
    Ok(())
}

fn push_returning(engine: Engine, table: &TableDef, returning: &[usize], sql: &mut String) -> CoreResult<()> {
    if !returning.is_empty() {
        sql.push_str(" RETURNING ");
        sql.push_str(&quoted_list(engine, table, returning)?);
    }
    Ok(())
}

fn quoted_list(engine: Engine, table: &TableDef, indices: &[usize]) -> CoreResult<String> {
    let names = indices
        .iter()
        .map(|&i| quote_identifier(engine, table.columns()[i].name()))
        .collect::<CoreResult<Vec<_>>>()?;
    Ok(names.join(", "))
}
