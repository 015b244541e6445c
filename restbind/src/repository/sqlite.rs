//! SQLite repository on top of `sqlx`
//!
//! Statements are assembled with [`sqlx::QueryBuilder`] from the entity's
//! serialized fields; every value is a bound parameter and every identifier
//! is checked against the entity's known columns before it is quoted into SQL.

use std::marker::PhantomData;

use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Column, QueryBuilder, Row, Sqlite, TypeInfo, ValueRef};
use tracing::trace;

use super::record::{self, Record};
use super::{
    Entity, FilterCondition, FilterOperator, OrderDirection, Pagination, Repository,
    RepositoryError, RepositoryOperation, RepositoryResult,
};

/// Repository storing one entity type in one SQLite table
///
/// Call [`Repository::sync`] once at startup to create the table; the layout
/// comes from `T::default()`: integers and booleans become `INTEGER`, floats
/// `REAL`, strings and nested values `TEXT` (nested values as JSON text).
/// A numeric id becomes `INTEGER PRIMARY KEY AUTOINCREMENT`; a textual id is
/// filled with a fresh UUID when inserted unset.
pub struct SqliteRepository<T> {
    pool: SqlitePool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> SqliteRepository<T> {
    /// Wrap a connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    /// The underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn base(statement: &str) -> QueryBuilder<'static, Sqlite> {
        QueryBuilder::new(format!("{} {}", statement, quote(T::TABLE)))
    }

    fn push_id(
        qb: &mut QueryBuilder<'static, Sqlite>,
        id: &T::Id,
        operation: RepositoryOperation,
    ) -> RepositoryResult<()> {
        let id = serde_json::to_value(id)
            .map_err(|e| RepositoryError::serialization_error(operation, e.to_string()))?;
        qb.push(format!(" WHERE {} = ", quote(T::ID_FIELD)));
        push_value(qb, &id);
        Ok(())
    }

    fn decode_row(
        row: &SqliteRow,
        columns: &Record,
        operation: RepositoryOperation,
    ) -> RepositoryResult<T> {
        let record = row_to_record(row, columns).map_err(db_error(operation))?;
        record::from_record(record, operation)
    }

    /// Generate an id for entities keyed by text
    fn generated_id(columns: &Record) -> Option<T::Id> {
        match columns.get(T::ID_FIELD) {
            Some(Value::String(_)) => {
                serde_json::from_value(Value::String(uuid::Uuid::new_v4().to_string())).ok()
            }
            _ => None,
        }
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn db_error(operation: RepositoryOperation) -> impl Fn(sqlx::Error) -> RepositoryError {
    move |e| RepositoryError::from(e).with_operation(operation)
}

fn column_type(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "INTEGER",
        Value::Number(n) if n.is_f64() => "REAL",
        Value::Number(_) => "INTEGER",
        Value::String(_) | Value::Array(_) | Value::Object(_) => "TEXT",
        // Unknown until a value arrives; no declared type keeps any storage class
        Value::Null => "",
    }
}

fn push_value(qb: &mut QueryBuilder<'static, Sqlite>, value: &Value) {
    match value {
        Value::Null => {
            qb.push_bind(None::<String>);
        }
        Value::Bool(b) => {
            qb.push_bind(*b);
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) => {
                qb.push_bind(i);
            }
            None => {
                qb.push_bind(n.as_f64());
            }
        },
        Value::String(s) => {
            qb.push_bind(s.clone());
        }
        nested => {
            qb.push_bind(nested.to_string());
        }
    }
}

fn push_filters(
    qb: &mut QueryBuilder<'static, Sqlite>,
    filters: &[FilterCondition],
    columns: &Record,
    operation: RepositoryOperation,
) -> RepositoryResult<()> {
    for (i, filter) in filters.iter().enumerate() {
        record::ensure_column(columns, &filter.field, operation)?;
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        qb.push(quote(&filter.field));

        let values = filter.value.to_json_values();
        match filter.operator {
            FilterOperator::IsNull | FilterOperator::IsNotNull => {
                qb.push(format!(" {}", filter.operator));
            }
            FilterOperator::In => {
                qb.push(" IN (");
                for (j, value) in values.iter().enumerate() {
                    if j > 0 {
                        qb.push(", ");
                    }
                    push_value(qb, value);
                }
                qb.push(")");
            }
            operator => {
                qb.push(format!(" {} ", operator));
                push_value(qb, values.first().unwrap_or(&Value::Null));
            }
        }
    }
    Ok(())
}

fn row_to_record(row: &SqliteRow, columns: &Record) -> Result<Record, sqlx::Error> {
    let mut record = Record::new();
    for column in row.columns() {
        let index = column.ordinal();
        let name = column.name();
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let storage = raw.type_info().name().to_owned();
            match storage.as_str() {
                "INTEGER" => Value::from(row.try_get::<i64, _>(index)?),
                "REAL" => Value::from(row.try_get::<f64, _>(index)?),
                "TEXT" => {
                    let text: String = row.try_get(index)?;
                    match columns.get(name) {
                        Some(Value::Array(_)) | Some(Value::Object(_)) => {
                            serde_json::from_str(&text).unwrap_or(Value::String(text))
                        }
                        _ => Value::String(text),
                    }
                }
                _ => Value::from(row.try_get::<Vec<u8>, _>(index)?),
            }
        };
        record.insert(name.to_string(), value);
    }
    Ok(record)
}

impl<T: Entity> Repository<T> for SqliteRepository<T> {
    async fn sync(&self) -> RepositoryResult<()> {
        let operation = RepositoryOperation::Sync;
        let columns = record::columns::<T>(operation)?;

        let primary = match columns.get(T::ID_FIELD) {
            Some(Value::Number(_)) => "INTEGER PRIMARY KEY AUTOINCREMENT",
            Some(_) => "TEXT PRIMARY KEY NOT NULL",
            None => {
                return Err(RepositoryError::validation_failed(
                    operation,
                    format!("{} does not serialize an `{}` field", T::NAME, T::ID_FIELD),
                ))
            }
        };

        let mut definitions = vec![format!("{} {}", quote(T::ID_FIELD), primary)];
        for (name, value) in &columns {
            if name.as_str() == T::ID_FIELD {
                continue;
            }
            let definition = format!("{} {}", quote(name), column_type(value));
            definitions.push(definition.trim_end().to_string());
        }

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote(T::TABLE),
            definitions.join(", ")
        );
        trace!(entity = T::NAME, %ddl, "sqlite sync");
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(db_error(operation))?;
        Ok(())
    }

    async fn insert(&self, mut item: T) -> RepositoryResult<T> {
        let operation = RepositoryOperation::Insert;
        let columns = record::columns::<T>(operation)?;

        if item.id() == T::Id::default() {
            if let Some(id) = Self::generated_id(&columns) {
                item.set_id(id);
            }
        }
        let mut fields = record::to_record(&item, operation)?;
        if item.id() == T::Id::default() {
            fields.remove(T::ID_FIELD);
        }

        let mut qb = Self::base("INSERT INTO");
        if fields.is_empty() {
            qb.push(" DEFAULT VALUES");
        } else {
            qb.push(" (");
            for (i, name) in fields.keys().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                qb.push(quote(name));
            }
            qb.push(") VALUES (");
            for (i, value) in fields.values().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_value(&mut qb, value);
            }
            qb.push(")");
        }
        qb.push(" RETURNING *");

        trace!(entity = T::NAME, sql = qb.sql(), "sqlite insert");
        let row = qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error(operation)(e).with_entity_type::<T>())?;
        Self::decode_row(&row, &columns, operation)
    }

    async fn find_by_id(&self, id: &T::Id) -> RepositoryResult<Option<T>> {
        let operation = RepositoryOperation::FindById;
        let columns = record::columns::<T>(operation)?;

        let mut qb = Self::base("SELECT * FROM");
        Self::push_id(&mut qb, id, operation)?;
        let row = qb
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error(operation))?;
        row.map(|row| Self::decode_row(&row, &columns, operation))
            .transpose()
    }

    async fn update(&self, id: &T::Id, item: T) -> RepositoryResult<T> {
        let operation = RepositoryOperation::Update;
        let columns = record::columns::<T>(operation)?;
        let fields = record::non_zero_fields(record::to_record(&item, operation)?, T::ID_FIELD);

        let not_found =
            || RepositoryError::not_found(T::NAME, id.to_string()).with_operation(operation);

        if fields.is_empty() {
            return self.find_by_id(id).await?.ok_or_else(not_found);
        }

        let mut qb = Self::base("UPDATE");
        qb.push(" SET ");
        for (i, (name, value)) in fields.iter().enumerate() {
            record::ensure_column(&columns, name, operation)?;
            if i > 0 {
                qb.push(", ");
            }
            qb.push(format!("{} = ", quote(name)));
            push_value(&mut qb, value);
        }
        Self::push_id(&mut qb, id, operation)?;
        qb.push(" RETURNING *");

        trace!(entity = T::NAME, sql = qb.sql(), "sqlite update");
        let row = qb
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error(operation))?;
        match row {
            Some(row) => Self::decode_row(&row, &columns, operation),
            None => Err(not_found()),
        }
    }

    async fn delete(&self, id: &T::Id) -> RepositoryResult<bool> {
        let operation = RepositoryOperation::Delete;
        let mut qb = Self::base("DELETE FROM");
        Self::push_id(&mut qb, id, operation)?;
        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(db_error(operation))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, filters: &[FilterCondition]) -> RepositoryResult<u64> {
        let operation = RepositoryOperation::Count;
        let columns = record::columns::<T>(operation)?;

        let mut qb = Self::base("SELECT COUNT(*) FROM");
        push_filters(&mut qb, filters, &columns, operation)?;
        let row = qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error(operation))?;
        let total: i64 = row.try_get(0).map_err(db_error(operation))?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn find_all(
        &self,
        filters: &[FilterCondition],
        order_by: Option<(&str, OrderDirection)>,
        pagination: Option<Pagination>,
    ) -> RepositoryResult<Vec<T>> {
        let operation = RepositoryOperation::FindAll;
        let columns = record::columns::<T>(operation)?;

        let mut qb = Self::base("SELECT * FROM");
        push_filters(&mut qb, filters, &columns, operation)?;

        if let Some((field, direction)) = order_by {
            record::ensure_column(&columns, field, operation)?;
            let direction = match direction {
                OrderDirection::Ascending => "ASC",
                OrderDirection::Descending => "DESC",
            };
            qb.push(format!(" ORDER BY {} {}", quote(field), direction));
        }

        if let Some(page) = pagination {
            qb.push(" LIMIT ");
            qb.push_bind(i64::try_from(page.limit).unwrap_or(i64::MAX));
            qb.push(" OFFSET ");
            qb.push_bind(i64::try_from(page.offset).unwrap_or(i64::MAX));
        }

        trace!(entity = T::NAME, sql = qb.sql(), "sqlite find_all");
        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error(operation))?;
        rows.iter()
            .map(|row| Self::decode_row(row, &columns, operation))
            .collect()
    }
}
