//! JSON record helpers shared by the repository backends
//!
//! Entities travel through the backends as `serde_json` objects keyed by
//! serialized field name. That keeps both backends generic over any serde
//! entity without per-type query code.

use serde::Serialize;
use serde_json::{Map, Value};

use super::{Entity, RepositoryError, RepositoryOperation, RepositoryResult};
use crate::bind::weak;

pub(crate) type Record = Map<String, Value>;

/// Serialize an entity into a flat record
pub(crate) fn to_record<T: Serialize>(
    item: &T,
    operation: RepositoryOperation,
) -> RepositoryResult<Record> {
    match serde_json::to_value(item) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(RepositoryError::serialization_error(
            operation,
            format!("entity must serialize to an object, got `{}`", other),
        )),
        Err(e) => Err(RepositoryError::serialization_error(operation, e.to_string())),
    }
}

/// Rebuild an entity from a record, coercing storage types where needed
pub(crate) fn from_record<T: Entity>(
    record: Record,
    operation: RepositoryOperation,
) -> RepositoryResult<T> {
    weak::decode(&Value::Object(record)).map_err(|e| {
        RepositoryError::serialization_error(operation, e.to_string()).with_entity_type::<T>()
    })
}

/// The record of `T::default()`; its keys are the known columns
pub(crate) fn columns<T: Entity>(operation: RepositoryOperation) -> RepositoryResult<Record> {
    to_record(&T::default(), operation)
}

/// Reject field names the entity does not serialize
pub(crate) fn ensure_column(
    columns: &Record,
    field: &str,
    operation: RepositoryOperation,
) -> RepositoryResult<()> {
    if columns.contains_key(field) {
        Ok(())
    } else {
        Err(RepositoryError::validation_failed(
            operation,
            format!("unknown field `{}`", field),
        ))
    }
}

/// Zero values are skipped by partial updates
pub(crate) fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// The non-zero fields of `patch`, excluding the primary key
pub(crate) fn non_zero_fields(patch: Record, id_field: &str) -> Record {
    patch
        .into_iter()
        .filter(|(key, value)| key != id_field && !is_zero(value))
        .collect()
}

impl RepositoryError {
    pub(crate) fn with_entity_type<T: Entity>(mut self) -> Self {
        self.entity_type = Some(T::NAME.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_zero() {
        assert!(is_zero(&json!(null)));
        assert!(is_zero(&json!(0)));
        assert!(is_zero(&json!(0.0)));
        assert!(is_zero(&json!("")));
        assert!(is_zero(&json!(false)));
        assert!(is_zero(&json!([])));
        assert!(!is_zero(&json!(-1)));
        assert!(!is_zero(&json!("x")));
        assert!(!is_zero(&json!(true)));
    }

    #[test]
    fn test_non_zero_fields_drops_id_and_zeroes() {
        let patch = json!({"id": 5, "title": "x", "done": false, "note": ""});
        let Value::Object(patch) = patch else {
            unreachable!()
        };
        let fields = non_zero_fields(patch, "id");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("title"), Some(&json!("x")));
    }

    #[test]
    fn test_to_record_rejects_scalars() {
        let err = to_record(&5_i32, RepositoryOperation::Insert).unwrap_err();
        assert_eq!(err.kind, super::super::RepositoryErrorKind::SerializationError);
    }
}
