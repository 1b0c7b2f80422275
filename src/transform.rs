// ABOUTME: Normalizes source rows into the destination's value formats
// ABOUTME: Rewrites ISO datetimes and textual booleans based on column affinity

use crate::store::{Column, ColumnKind, Value};
use chrono::{DateTime, NaiveDateTime};

const MYSQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Normalize every row of a batch in place
pub fn normalize_rows(columns: &[Column], rows: &mut [Vec<Value>]) {
    for row in rows.iter_mut() {
        for (column, value) in columns.iter().zip(row.iter_mut()) {
            normalize_value(column.kind, value);
        }
    }
}

fn normalize_value(kind: ColumnKind, value: &mut Value) {
    let replacement = match (kind, &*value) {
        (ColumnKind::DateTime, Value::Text(text)) => normalize_datetime(text).map(Value::Text),
        (ColumnKind::Boolean, Value::Text(text)) => normalize_bool(text).map(Value::Integer),
        _ => None,
    };

    if let Some(replacement) = replacement {
        *value = replacement;
    }
}

/// Rewrite an ISO-8601 timestamp into MySQL's `DATETIME` literal form
///
/// Offsets are converted to UTC. Returns `None` when the text is already in
/// MySQL form or is not a recognizable timestamp, leaving it untouched.
pub fn normalize_datetime(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if !trimmed.contains('T') {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(
            parsed
                .naive_utc()
                .format(MYSQL_DATETIME_FORMAT)
                .to_string(),
        );
    }

    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M"))
        .ok()
        .map(|parsed| parsed.format(MYSQL_DATETIME_FORMAT).to_string())
}

fn normalize_bool(text: &str) -> Option<i64> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" => Some(1),
        "false" | "f" | "no" => Some(0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_naive_iso_datetime() {
        assert_eq!(
            normalize_datetime("2024-03-01T12:30:45.123456").as_deref(),
            Some("2024-03-01 12:30:45.123456")
        );
        assert_eq!(
            normalize_datetime("2024-03-01T12:30:45").as_deref(),
            Some("2024-03-01 12:30:45")
        );
    }

    #[test]
    fn test_normalize_offset_datetime_to_utc() {
        assert_eq!(
            normalize_datetime("2024-03-01T12:30:45Z").as_deref(),
            Some("2024-03-01 12:30:45")
        );
        assert_eq!(
            normalize_datetime("2024-03-01T14:30:45+02:00").as_deref(),
            Some("2024-03-01 12:30:45")
        );
    }

    #[test]
    fn test_mysql_form_and_garbage_pass_through() {
        assert_eq!(normalize_datetime("2024-03-01 12:30:45.000001"), None);
        assert_eq!(normalize_datetime("Tomorrow"), None);
    }

    #[test]
    fn test_normalize_rows_uses_column_kind() {
        let columns = vec![
            Column::new("id", ColumnKind::Integer),
            Column::new("text", ColumnKind::Text),
            Column::new("is_incoming", ColumnKind::Boolean),
            Column::new("timestamp", ColumnKind::DateTime),
        ];
        let mut rows = vec![vec![
            Value::Integer(1),
            // Message text that merely looks like a timestamp stays intact
            Value::Text("2024-03-01T12:30:45".to_string()),
            Value::Text("true".to_string()),
            Value::Text("2024-03-01T12:30:45".to_string()),
        ]];

        normalize_rows(&columns, &mut rows);

        assert_eq!(
            rows[0],
            vec![
                Value::Integer(1),
                Value::Text("2024-03-01T12:30:45".to_string()),
                Value::Integer(1),
                Value::Text("2024-03-01 12:30:45".to_string()),
            ]
        );
    }

    #[test]
    fn test_integer_booleans_and_nulls_unchanged() {
        let columns = vec![
            Column::new("is_active", ColumnKind::Boolean),
            Column::new("last_seen", ColumnKind::DateTime),
        ];
        let mut rows = vec![vec![Value::Integer(0), Value::Null]];
        normalize_rows(&columns, &mut rows);
        assert_eq!(rows[0], vec![Value::Integer(0), Value::Null]);
    }
}
