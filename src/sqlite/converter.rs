// ABOUTME: SQLite value conversion into the engine's row model
// ABOUTME: Lossless mapping of all five SQLite storage classes

use crate::store::Value;

/// Convert a single SQLite value
///
/// Maps SQLite storage classes one to one:
/// - INTEGER → `Value::Integer`
/// - REAL → `Value::Real`
/// - TEXT → `Value::Text`
/// - BLOB → `Value::Blob`
/// - NULL → `Value::Null`
pub fn sqlite_value_to_value(value: rusqlite::types::Value) -> Value {
    match value {
        rusqlite::types::Value::Null => Value::Null,
        rusqlite::types::Value::Integer(i) => Value::Integer(i),
        rusqlite::types::Value::Real(f) => Value::Real(f),
        rusqlite::types::Value::Text(s) => Value::Text(s),
        rusqlite::types::Value::Blob(b) => Value::Blob(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::Value as SqliteValue;

    #[test]
    fn test_convert_storage_classes() {
        assert_eq!(sqlite_value_to_value(SqliteValue::Integer(42)), Value::Integer(42));
        assert_eq!(sqlite_value_to_value(SqliteValue::Real(42.75)), Value::Real(42.75));
        assert_eq!(
            sqlite_value_to_value(SqliteValue::Text("Hello".to_string())),
            Value::Text("Hello".to_string())
        );
        assert_eq!(sqlite_value_to_value(SqliteValue::Null), Value::Null);
    }

    #[test]
    fn test_convert_blob_keeps_bytes() {
        let blob_data = vec![0x00, 0xff, 0x10];
        assert_eq!(
            sqlite_value_to_value(SqliteValue::Blob(blob_data.clone())),
            Value::Blob(blob_data)
        );
    }
}
