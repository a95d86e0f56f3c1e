//! Statement and result models.
//!
//! A [`Statement`] is what callers hand to an engine or a group; results come
//! back as [`QueryResult`] for reads and [`ExecResult`] for writes.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

/// One decoded row, keyed by column name.
pub type Row = serde_json::Map<String, JsonValue>;

/// A parameter value for parameterized statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for QueryParam {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// SQL text plus bound parameters and an optional caller deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<QueryParam>,
    /// Deadline for the whole call, pool acquire included. `None` waits as
    /// long as the pool's own acquire timeout allows.
    pub timeout: Option<Duration>,
}

impl Statement {
    /// Create a statement with no parameters and no deadline.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            timeout: None,
        }
    }

    /// Bind the next positional parameter.
    pub fn bind(mut self, param: impl Into<QueryParam>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Set the caller deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Database-specific type (e.g., "int8", "varchar", "TEXT")
    pub type_name: String,
}

impl ColumnMetadata {
    /// Create new column metadata.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Row>,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Get the number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Take the first row, if any.
    pub fn into_first(self) -> Option<Row> {
        self.rows.into_iter().next()
    }
}

/// Outcome of a write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Reported by MySQL and SQLite; PostgreSQL needs `RETURNING` instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_insert_id: Option<i64>,
    pub execution_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_conversions() {
        assert_eq!(QueryParam::from(true), QueryParam::Bool(true));
        assert_eq!(QueryParam::from(42), QueryParam::Int(42));
        assert_eq!(QueryParam::from(Some("hello")), QueryParam::String("hello".into()));
        assert_eq!(QueryParam::from(None::<f64>), QueryParam::Null);
    }

    #[test]
    fn test_statement_builder() {
        let stmt = Statement::new("SELECT * FROM user WHERE id = ? AND name = ?")
            .bind(3)
            .bind("xiaoming")
            .bind(None::<i64>)
            .timeout(Duration::from_millis(250));

        assert_eq!(
            stmt.params,
            vec![
                QueryParam::Int(3),
                QueryParam::String("xiaoming".to_string()),
                QueryParam::Null,
            ]
        );
        assert_eq!(stmt.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_query_result_empty() {
        let result = QueryResult::default();
        assert_eq!(result.row_count(), 0);
        assert!(result.into_first().is_none());
    }

    #[test]
    fn test_bytes_param_serializes_as_base64() {
        let json = serde_json::to_string(&QueryParam::Bytes(b"hi".to_vec())).unwrap();
        assert_eq!(json, "\"aGk=\"");
    }
}
