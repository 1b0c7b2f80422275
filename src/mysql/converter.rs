// ABOUTME: Row model to MySQL parameter conversion for batch upserts
// ABOUTME: Maps SQLite storage classes onto mysql_async wire values

use crate::store::Value;
use mysql_async::Value as MysqlValue;

/// Convert one value into a MySQL statement parameter
///
/// - `Integer` → `Int`
/// - `Real` → `Double` (NaN and infinities become NULL, MySQL has no representation for them)
/// - `Text` → `Bytes` (UTF-8)
/// - `Blob` → `Bytes`
/// - `Null` → `NULL`
///
/// # Examples
///
/// ```
/// # use db_transfer::mysql::converter::value_to_mysql;
/// # use db_transfer::store::Value;
/// assert_eq!(value_to_mysql(Value::Integer(7)), mysql_async::Value::Int(7));
/// assert_eq!(value_to_mysql(Value::Real(f64::NAN)), mysql_async::Value::NULL);
/// ```
pub fn value_to_mysql(value: Value) -> MysqlValue {
    match value {
        Value::Null => MysqlValue::NULL,
        Value::Integer(i) => MysqlValue::Int(i),
        Value::Real(f) if f.is_finite() => MysqlValue::Double(f),
        Value::Real(_) => MysqlValue::NULL,
        Value::Text(s) => MysqlValue::Bytes(s.into_bytes()),
        Value::Blob(b) => MysqlValue::Bytes(b),
    }
}

/// Flatten rows into one positional parameter list, row by row
pub fn rows_to_params(rows: Vec<Vec<Value>>) -> Vec<MysqlValue> {
    rows.into_iter()
        .flat_map(|row| row.into_iter().map(value_to_mysql))
        .collect()
}
