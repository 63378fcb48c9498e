//! Mapping between `RecordKey` and the `server_id` / `local_id` column pairs

use rusqlite::types::{Type, Value};

use crate::models::{LocalId, RecordKey};

/// Split a key into its `(server_id, local_id)` column values.
pub fn to_columns(key: &RecordKey) -> (Option<i64>, Option<String>) {
    match key {
        RecordKey::Server(id) => (Some(*id), None),
        RecordKey::Local(id) => (None, Some(id.as_str())),
    }
}

/// Rebuild a key from a `(server_id, local_id)` column pair read at `index`.
pub fn from_columns(
    index: usize,
    server_id: Option<i64>,
    local_id: Option<String>,
) -> rusqlite::Result<RecordKey> {
    match (server_id, local_id) {
        (Some(id), _) => Ok(RecordKey::Server(id)),
        (None, Some(text)) => text
            .parse::<LocalId>()
            .map(RecordKey::Local)
            .map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
            }),
        (None, None) => Err(rusqlite::Error::InvalidColumnType(
            index,
            "record key".to_string(),
            Type::Null,
        )),
    }
}

/// `WHERE` fragment and bound value matching a record by key.
///
/// `prefix` selects the column pair, e.g. `""` for the record's own key or
/// `"case_"` for the parent case reference.
pub fn match_clause(prefix: &str, key: &RecordKey) -> (String, Value) {
    match key {
        RecordKey::Server(id) => (format!("{prefix}server_id = ?"), Value::Integer(*id)),
        RecordKey::Local(id) => (format!("{prefix}local_id = ?"), Value::Text(id.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_roundtrip() {
        let local = RecordKey::new_local();
        let (server_id, local_id) = to_columns(&local);
        assert_eq!(from_columns(0, server_id, local_id).unwrap(), local);

        let (server_id, local_id) = to_columns(&RecordKey::Server(5));
        assert_eq!(
            from_columns(0, server_id, local_id).unwrap(),
            RecordKey::Server(5)
        );
    }

    #[test]
    fn test_from_columns_rejects_empty_pair() {
        assert!(from_columns(0, None, None).is_err());
        assert!(from_columns(0, None, Some("nope".to_string())).is_err());
    }
}
