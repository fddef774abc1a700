//! Row statements for SQL backends.
//!
//! Statements are rendered with every parameter passed as text, so one
//! binding type covers every column. Postgres casts each placeholder to
//! the column type; MySQL converts on assignment. Rows are read back as a
//! single JSON object per row and coerced to the relation's field types.

use crate::error::StoreError;
use crate::schema::TableDef;
use crate::store::sql::{column_type, Dialect};
use crate::store::{Filter, Query};
use crate::value::{FieldValue, RecordId, Row};

/// SQL text plus its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Option<String>>,
}

struct Params {
    dialect: Dialect,
    values: Vec<Option<String>>,
}

impl Params {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            values: Vec::new(),
        }
    }

    fn push(&mut self, value: Option<String>, sql_type: &str) -> String {
        self.values.push(value);
        match self.dialect {
            Dialect::Postgres => format!("CAST(${} AS {})", self.values.len(), sql_type),
            Dialect::Mysql => "?".to_string(),
        }
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            params: self.values,
        }
    }
}

/// Text form of a value as the backend parses it.
pub fn param_text(value: &FieldValue, dialect: Dialect) -> Option<String> {
    match value {
        FieldValue::Null => None,
        FieldValue::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        FieldValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        FieldValue::DateTime(dt) => Some(match dialect {
            Dialect::Postgres => dt.to_rfc3339(),
            Dialect::Mysql => dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        }),
        other => Some(other.to_string()),
    }
}

fn sql_type(table: &TableDef, column: &str, dialect: Dialect) -> Result<&'static str, StoreError> {
    if column == "id" {
        return Ok("INTEGER");
    }
    table
        .field(column)
        .map(|f| column_type(&f.field_type, dialect))
        .ok_or_else(|| StoreError::Backend(format!("Unknown column {}.{}", table.name, column)))
}

fn text_cast(column: &str, dialect: Dialect) -> String {
    match dialect {
        Dialect::Postgres => format!("LOWER(CAST({} AS TEXT))", column),
        Dialect::Mysql => format!("LOWER(CAST({} AS CHAR))", column),
    }
}

fn like_pattern(text: &str) -> String {
    let escaped = text
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn condition(
    table: &TableDef,
    filter: &Filter,
    params: &mut Params,
) -> Result<String, StoreError> {
    let dialect = params.dialect;
    Ok(match filter {
        Filter::Eq(column, FieldValue::Null) => {
            sql_type(table, column, dialect)?;
            format!("{} IS NULL", column)
        }
        Filter::Eq(column, value) => {
            let ty = sql_type(table, column, dialect)?;
            format!("{} = {}", column, params.push(param_text(value, dialect), ty))
        }
        Filter::Ne(column, FieldValue::Null) => {
            sql_type(table, column, dialect)?;
            format!("{} IS NOT NULL", column)
        }
        Filter::Ne(column, value) => {
            let ty = sql_type(table, column, dialect)?;
            let placeholder = params.push(param_text(value, dialect), ty);
            format!("({} IS NULL OR {} <> {})", column, column, placeholder)
        }
        Filter::In(column, values) => {
            let ty = sql_type(table, column, dialect)?;
            let mut terms = Vec::new();
            if values.iter().any(|v| matches!(v, FieldValue::Null)) {
                terms.push(format!("{} IS NULL", column));
            }
            let placeholders: Vec<String> = values
                .iter()
                .filter(|v| !matches!(v, FieldValue::Null))
                .map(|v| params.push(param_text(v, dialect), ty))
                .collect();
            if !placeholders.is_empty() {
                terms.push(format!("{} IN ({})", column, placeholders.join(", ")));
            }
            match terms.len() {
                0 => "1 = 0".to_string(),
                1 => terms.remove(0),
                _ => format!("({})", terms.join(" OR ")),
            }
        }
        Filter::Contains(columns, text) => {
            let mut terms = Vec::new();
            for column in columns {
                sql_type(table, column, dialect)?;
                let placeholder = params.push(Some(like_pattern(text)), "TEXT");
                terms.push(format!("{} LIKE {}", text_cast(column, dialect), placeholder));
            }
            if terms.is_empty() {
                "1 = 0".to_string()
            } else {
                format!("({})", terms.join(" OR "))
            }
        }
    })
}

fn where_clause(table: &TableDef, query: &Query, params: &mut Params) -> Result<String, StoreError> {
    let conditions = query
        .filters
        .iter()
        .map(|f| condition(table, f, params))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    })
}

fn row_json(table: &TableDef, dialect: Dialect) -> String {
    match dialect {
        Dialect::Postgres => "row_to_json(t)::text".to_string(),
        Dialect::Mysql => {
            let pairs: Vec<String> = std::iter::once("id")
                .chain(table.fields.iter().map(|f| f.name.as_str()))
                .map(|name| format!("'{}', t.{}", name, name))
                .collect();
            format!("CAST(JSON_OBJECT({}) AS CHAR)", pairs.join(", "))
        }
    }
}

/// `SELECT` one JSON document (column `data`) per matching row.
///
/// Nulls sort first, ties are broken by id.
pub fn select_sql(table: &TableDef, query: &Query, dialect: Dialect) -> Result<Statement, StoreError> {
    let mut params = Params::new(dialect);
    let filter = where_clause(table, query, &mut params)?;

    let order = match &query.order_by {
        Some(order) => {
            sql_type(table, &order.field, dialect)?;
            let direction = match (order.descending, dialect) {
                (false, Dialect::Postgres) => "ASC NULLS FIRST",
                (true, Dialect::Postgres) => "DESC NULLS LAST",
                (false, Dialect::Mysql) => "ASC",
                (true, Dialect::Mysql) => "DESC",
            };
            format!("{} {}, id ASC", order.field, direction)
        }
        None => "id ASC".to_string(),
    };

    let sql = format!(
        "SELECT {} AS data FROM {} t{} ORDER BY {}",
        row_json(table, dialect),
        table.name,
        filter,
        order
    );
    Ok(params.finish(sql))
}

/// `SELECT COUNT(*)` (column `count`) of matching rows.
pub fn count_sql(table: &TableDef, query: &Query, dialect: Dialect) -> Result<Statement, StoreError> {
    let mut params = Params::new(dialect);
    let filter = where_clause(table, query, &mut params)?;
    let sql = format!("SELECT COUNT(*) AS count FROM {}{}", table.name, filter);
    Ok(params.finish(sql))
}

/// `INSERT` a row; Postgres returns the new id as column `id`.
pub fn insert_sql(table: &TableDef, row: &Row, dialect: Dialect) -> Result<Statement, StoreError> {
    let mut params = Params::new(dialect);
    let mut columns = Vec::new();
    let mut values = Vec::new();
    for (column, value) in row.fields().filter(|(c, _)| c.as_str() != "id") {
        let ty = sql_type(table, column, dialect)?;
        columns.push(column.as_str());
        values.push(params.push(param_text(value, dialect), ty));
    }

    let body = match (columns.is_empty(), dialect) {
        (true, Dialect::Postgres) => "DEFAULT VALUES".to_string(),
        (true, Dialect::Mysql) => "() VALUES ()".to_string(),
        (false, _) => format!("({}) VALUES ({})", columns.join(", "), values.join(", ")),
    };
    let returning = match dialect {
        Dialect::Postgres => " RETURNING CAST(id AS BIGINT) AS id",
        Dialect::Mysql => "",
    };
    Ok(params.finish(format!("INSERT INTO {} {}{}", table.name, body, returning)))
}

/// `UPDATE` the given columns of one row; `None` when there is nothing to set.
pub fn update_sql(
    table: &TableDef,
    id: RecordId,
    changes: &Row,
    dialect: Dialect,
) -> Result<Option<Statement>, StoreError> {
    let mut params = Params::new(dialect);
    let mut assignments = Vec::new();
    for (column, value) in changes.fields().filter(|(c, _)| c.as_str() != "id") {
        let ty = sql_type(table, column, dialect)?;
        assignments.push(format!("{} = {}", column, params.push(param_text(value, dialect), ty)));
    }
    if assignments.is_empty() {
        return Ok(None);
    }

    let key = params.push(Some(id.to_string()), "INTEGER");
    let sql = format!(
        "UPDATE {} SET {} WHERE id = {}",
        table.name,
        assignments.join(", "),
        key
    );
    Ok(Some(params.finish(sql)))
}

pub fn delete_sql(table: &TableDef, id: RecordId, dialect: Dialect) -> Statement {
    let mut params = Params::new(dialect);
    let key = params.push(Some(id.to_string()), "INTEGER");
    params.finish(format!("DELETE FROM {} WHERE id = {}", table.name, key))
}

/// Decode a row read as JSON and coerce it to the relation's field types.
pub fn row_from_json(table: &TableDef, data: &str) -> Result<Row, StoreError> {
    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| StoreError::Backend(format!("Invalid row from {}: {}", table.name, e)))?;
    let raw = Row::from_json(value)
        .ok_or_else(|| StoreError::Backend(format!("Row from {} is not an object", table.name)))?;

    let mut row = Row::new();
    for (column, value) in raw.fields() {
        let value = match table.field(column) {
            Some(field) => field.field_type.coerce(value.clone()).map_err(|e| {
                StoreError::Backend(format!("{}.{}: {}", table.name, column, e))
            })?,
            None => value.clone(),
        };
        row.set(column.clone(), value);
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, FieldType};
    use crate::store::OrderBy;
    use chrono::{TimeZone, Utc};

    fn alert() -> TableDef {
        TableDef::new("deploy_alert")
            .with_field(FieldDef::new("deployment_id", FieldType::Integer))
            .with_field(FieldDef::string("subject"))
            .with_field(FieldDef::new("created_on", FieldType::DateTime))
            .with_field(FieldDef::new("deleted", FieldType::Boolean))
    }

    #[test]
    fn test_select_active_rows_postgres() {
        let query = Query::active().eq("deployment_id", 3i64).order_by(OrderBy {
            field: "created_on".to_string(),
            descending: true,
        });
        let statement = select_sql(&alert(), &query, Dialect::Postgres).unwrap();

        assert_eq!(
            statement.sql,
            "SELECT row_to_json(t)::text AS data FROM deploy_alert t \
             WHERE (deleted IS NULL OR deleted <> CAST($1 AS BOOLEAN)) \
             AND deployment_id = CAST($2 AS INTEGER) \
             ORDER BY created_on DESC NULLS LAST, id ASC"
        );
        assert_eq!(statement.params, vec![Some("1".to_string()), Some("3".to_string())]);
    }

    #[test]
    fn test_select_mysql_lists_columns() {
        let query = Query::new().filter(Filter::In(
            "deployment_id".to_string(),
            vec![FieldValue::Int(1), FieldValue::Null],
        ));
        let statement = select_sql(&alert(), &query, Dialect::Mysql).unwrap();

        assert!(statement.sql.starts_with(
            "SELECT CAST(JSON_OBJECT('id', t.id, 'deployment_id', t.deployment_id, "
        ));
        assert!(statement
            .sql
            .contains("WHERE (deployment_id IS NULL OR deployment_id IN (?))"));
        assert!(statement.sql.ends_with("ORDER BY id ASC"));
        assert_eq!(statement.params, vec![Some("1".to_string())]);
    }

    #[test]
    fn test_contains_escapes_wildcards() {
        let query = Query::new().filter(Filter::Contains(vec!["subject".to_string()], "50%_Off".to_string()));
        let statement = count_sql(&alert(), &query, Dialect::Postgres).unwrap();

        assert_eq!(
            statement.sql,
            "SELECT COUNT(*) AS count FROM deploy_alert WHERE (LOWER(CAST(subject AS TEXT)) LIKE CAST($1 AS TEXT))"
        );
        assert_eq!(statement.params, vec![Some("%50\\%\\_off%".to_string())]);
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let query = Query::new().eq("location_id", 1i64);
        assert!(matches!(
            select_sql(&alert(), &query, Dialect::Postgres),
            Err(StoreError::Backend(_))
        ));
    }

    #[test]
    fn test_insert_and_update() {
        let created_on = Utc.with_ymd_and_hms(2015, 4, 25, 6, 11, 0).unwrap();
        let row = Row::new()
            .with("id", 9i64)
            .with("deployment_id", 3i64)
            .with("created_on", created_on)
            .with("subject", FieldValue::Null);

        let statement = insert_sql(&alert(), &row, Dialect::Mysql).unwrap();
        assert_eq!(
            statement.sql,
            "INSERT INTO deploy_alert (deployment_id, created_on, subject) VALUES (?, ?, ?)"
        );
        assert!(statement.params.contains(&Some("2015-04-25 06:11:00.000000".to_string())));
        assert!(statement.params.contains(&None));

        let statement = insert_sql(&alert(), &Row::new(), Dialect::Postgres).unwrap();
        assert_eq!(
            statement.sql,
            "INSERT INTO deploy_alert DEFAULT VALUES RETURNING CAST(id AS BIGINT) AS id"
        );

        let changes = Row::new().with("deleted", true);
        let statement = update_sql(&alert(), 4, &changes, Dialect::Postgres).unwrap().unwrap();
        assert_eq!(
            statement.sql,
            "UPDATE deploy_alert SET deleted = CAST($1 AS BOOLEAN) WHERE id = CAST($2 AS INTEGER)"
        );
        assert_eq!(statement.params, vec![Some("1".to_string()), Some("4".to_string())]);
        assert!(update_sql(&alert(), 4, &Row::new().with("id", 5i64), Dialect::Postgres)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_row_from_json() {
        let mysql = r#"{"id": 2, "deployment_id": 3, "subject": null, "created_on": "2015-04-25 06:11:00.000000", "deleted": 0}"#;
        let row = row_from_json(&alert(), mysql).unwrap();

        assert_eq!(row.id(), Some(2));
        assert_eq!(row.get("deleted"), Some(&FieldValue::Bool(false)));
        assert_eq!(row.get("subject"), Some(&FieldValue::Null));
        assert_eq!(
            row.get("created_on"),
            Some(&FieldValue::DateTime(Utc.with_ymd_and_hms(2015, 4, 25, 6, 11, 0).unwrap()))
        );

        let postgres = r#"{"id": 2, "created_on": "2015-04-25T06:11:00+00:00", "deleted": true}"#;
        let row = row_from_json(&alert(), postgres).unwrap();
        assert_eq!(row.get("deleted"), Some(&FieldValue::Bool(true)));

        assert!(row_from_json(&alert(), "[1]").is_err());
    }
}
