//! Database-agnostic row decoding.
//!
//! Rows from every driver are turned into JSON maps keyed by column name.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! Temporal columns follow the descriptor's `parse_time` flag: when set they
//! are rendered as RFC 3339 timestamps in UTC, otherwise in the server's
//! native text form (`YYYY-MM-DD HH:MM:SS`).

use crate::models::{ColumnMetadata, DatabaseType, Row as JsonRow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo, ValueRef};
use uuid::Uuid;

/// Per-engine decoding switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub parse_time: bool,
}

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    DateTime,
    TimestampTz,
    Date,
    Time,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Temporal types - checked before integers so "interval"-style names never
    // shadow them
    if lower == "timestamptz" {
        return TypeCategory::TimestampTz;
    }
    if lower.contains("timestamp") || lower == "datetime" {
        return TypeCategory::DateTime;
    }
    if lower == "date" {
        return TypeCategory::Date;
    }
    if lower == "time" {
        return TypeCategory::Time;
    }

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    // Integer types
    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    // Boolean
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    // Float types
    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    // JSON types
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    // Binary types
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower == "text" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Value Formatting
// =============================================================================

/// Encode binary data as base64.
pub fn encode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

/// Render a zone-less timestamp. Zone-less values are taken to be UTC.
pub fn format_datetime(value: NaiveDateTime, opts: DecodeOptions) -> JsonValue {
    if opts.parse_time {
        format_timestamp_tz(Utc.from_utc_datetime(&value), opts)
    } else {
        JsonValue::String(value.format("%Y-%m-%d %H:%M:%S%.f").to_string())
    }
}

/// Render a UTC timestamp.
pub fn format_timestamp_tz(value: DateTime<Utc>, opts: DecodeOptions) -> JsonValue {
    if opts.parse_time {
        JsonValue::String(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    } else {
        JsonValue::String(value.format("%Y-%m-%d %H:%M:%S%.f").to_string())
    }
}

/// Render a date; with `parse_time` it becomes midnight UTC.
pub fn format_date(value: NaiveDate, opts: DecodeOptions) -> JsonValue {
    if opts.parse_time {
        format_datetime(value.and_time(NaiveTime::MIN), opts)
    } else {
        JsonValue::String(value.format("%Y-%m-%d").to_string())
    }
}

/// Render a time of day. Never parsed: there is no date to anchor it to.
pub fn format_time(value: NaiveTime) -> JsonValue {
    JsonValue::String(value.format("%H:%M:%S%.f").to_string())
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

// =============================================================================
// Row to JSON Trait
// =============================================================================

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self, opts: DecodeOptions) -> JsonRow;
    fn get_column_metadata(&self) -> Vec<ColumnMetadata>;
}

macro_rules! impl_row_to_json {
    ($row:ty, $db:expr, $decoder:ident) => {
        impl RowToJson for $row {
            fn to_json_map(&self, opts: DecodeOptions) -> JsonRow {
                self.columns()
                    .iter()
                    .enumerate()
                    .map(|(idx, col)| {
                        let type_name = col.type_info().name();
                        let category = categorize_type(type_name, $db);
                        let value = $decoder::decode_column(self, idx, type_name, category, opts);
                        (col.name().to_string(), value)
                    })
                    .collect()
            }

            fn get_column_metadata(&self) -> Vec<ColumnMetadata> {
                self.columns()
                    .iter()
                    .map(|col| ColumnMetadata::new(col.name(), col.type_info().name()))
                    .collect()
            }
        }
    };
}

impl_row_to_json!(MySqlRow, DatabaseType::MySQL, mysql);
impl_row_to_json!(PgRow, DatabaseType::PostgreSQL, postgres);
impl_row_to_json!(SqliteRow, DatabaseType::SQLite, sqlite);

// =============================================================================
// Database-Specific Decoders
// =============================================================================

/// Non-null value of column `idx` as `T`. SQL NULL and values the driver
/// refuses to decode as `T` both come back as `None`, so callers can try
/// several Rust types in turn.
fn take<'r, R, T>(row: &'r R, idx: usize) -> Option<T>
where
    R: Row,
    T: Decode<'r, R::Database> + Type<R::Database>,
    usize: ColumnIndex<R>,
{
    row.try_get::<Option<T>, _>(idx).ok().flatten()
}

/// Final value of a column: a decoded value, or JSON null. A non-null value
/// no decoder accepted is logged before it is dropped.
fn or_null<R>(value: Option<JsonValue>, row: &R, idx: usize, type_name: &str) -> JsonValue
where
    R: Row,
    usize: ColumnIndex<R>,
{
    value.unwrap_or_else(|| {
        let present = row.try_get_raw(idx).is_ok_and(|raw| !raw.is_null());
        if present {
            tracing::warn!(column = idx, type_name, "Undecodable column value, returning null");
        }
        JsonValue::Null
    })
}

fn number<T: Into<serde_json::Number>>(v: T) -> JsonValue {
    JsonValue::Number(v.into())
}

fn text_value(v: String, type_name: &str) -> JsonValue {
    if type_name.to_lowercase().contains("json") {
        if let Ok(json) = serde_json::from_str::<JsonValue>(&v) {
            return json;
        }
    }
    JsonValue::String(v)
}

fn raw_decimal<'r, R>(row: &'r R, idx: usize) -> JsonValue
where
    R: Row,
    RawDecimal: Decode<'r, R::Database> + Type<R::Database>,
    usize: ColumnIndex<R>,
{
    match row.try_get::<Option<RawDecimal>, _>(idx) {
        Ok(Some(v)) => JsonValue::String(v.0),
        Ok(None) => JsonValue::Null,
        Err(e) => {
            tracing::warn!(column = idx, error = %e, "Undecodable decimal value, returning null");
            JsonValue::Null
        }
    }
}

mod mysql {
    use super::*;

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
        opts: DecodeOptions,
    ) -> JsonValue {
        let value = match category {
            TypeCategory::Decimal => return raw_decimal(row, idx),
            TypeCategory::Integer => integer(row, idx),
            TypeCategory::Boolean => take::<_, bool>(row, idx).map(JsonValue::Bool),
            TypeCategory::Float => take::<_, f64>(row, idx)
                .or_else(|| take::<_, f32>(row, idx).map(f64::from))
                .map(float_value),
            TypeCategory::Binary => {
                take::<_, Vec<u8>>(row, idx).map(|v| encode_binary_value(&v))
            }
            TypeCategory::Json => take::<_, JsonValue>(row, idx),
            TypeCategory::DateTime | TypeCategory::TimestampTz => {
                take::<_, NaiveDateTime>(row, idx).map(|v| format_datetime(v, opts))
            }
            TypeCategory::Date => take::<_, NaiveDate>(row, idx).map(|v| format_date(v, opts)),
            TypeCategory::Time => take::<_, NaiveTime>(row, idx).map(format_time),
            _ => take::<_, String>(row, idx).map(|v| text_value(v, type_name)),
        };
        or_null(value, row, idx, type_name)
    }

    // Signedness is a column flag, so a width only decodes when it matches
    fn integer(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        take::<_, i8>(row, idx)
            .map(number)
            .or_else(|| take::<_, i16>(row, idx).map(number))
            .or_else(|| take::<_, i32>(row, idx).map(number))
            .or_else(|| take::<_, i64>(row, idx).map(number))
            .or_else(|| take::<_, u8>(row, idx).map(number))
            .or_else(|| take::<_, u16>(row, idx).map(number))
            .or_else(|| take::<_, u32>(row, idx).map(number))
            .or_else(|| take::<_, u64>(row, idx).map(number))
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
        opts: DecodeOptions,
    ) -> JsonValue {
        let value = match category {
            TypeCategory::Decimal => return raw_decimal(row, idx),
            TypeCategory::Integer => take::<_, i16>(row, idx)
                .map(number)
                .or_else(|| take::<_, i32>(row, idx).map(number))
                .or_else(|| take::<_, i64>(row, idx).map(number)),
            TypeCategory::Boolean => take::<_, bool>(row, idx).map(JsonValue::Bool),
            TypeCategory::Float => take::<_, f64>(row, idx)
                .or_else(|| take::<_, f32>(row, idx).map(f64::from))
                .map(float_value),
            TypeCategory::Binary => {
                take::<_, Vec<u8>>(row, idx).map(|v| encode_binary_value(&v))
            }
            TypeCategory::Json => take::<_, JsonValue>(row, idx),
            TypeCategory::Uuid => {
                take::<_, Uuid>(row, idx).map(|v| JsonValue::String(v.to_string()))
            }
            TypeCategory::DateTime => {
                take::<_, NaiveDateTime>(row, idx).map(|v| format_datetime(v, opts))
            }
            TypeCategory::TimestampTz => {
                take::<_, DateTime<Utc>>(row, idx).map(|v| format_timestamp_tz(v, opts))
            }
            TypeCategory::Date => take::<_, NaiveDate>(row, idx).map(|v| format_date(v, opts)),
            TypeCategory::Time => take::<_, NaiveTime>(row, idx).map(format_time),
            _ => take::<_, String>(row, idx).map(|v| text_value(v, type_name)),
        };
        or_null(value, row, idx, type_name)
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
        opts: DecodeOptions,
    ) -> JsonValue {
        let value = match category {
            TypeCategory::Integer => take::<_, i64>(row, idx).map(number),
            TypeCategory::Boolean => take::<_, bool>(row, idx).map(JsonValue::Bool),
            TypeCategory::Float | TypeCategory::Decimal => {
                take::<_, f64>(row, idx).map(float_value)
            }
            TypeCategory::Binary => {
                take::<_, Vec<u8>>(row, idx).map(|v| encode_binary_value(&v))
            }
            // Stored as TEXT; parsed only when asked to
            TypeCategory::DateTime | TypeCategory::TimestampTz if opts.parse_time => {
                take::<_, NaiveDateTime>(row, idx)
                    .map(|v| format_datetime(v, opts))
                    .or_else(|| text(row, idx, type_name))
            }
            TypeCategory::Date if opts.parse_time => take::<_, NaiveDate>(row, idx)
                .map(|v| format_date(v, opts))
                .or_else(|| text(row, idx, type_name)),
            _ => text(row, idx, type_name),
        };
        or_null(value, row, idx, type_name)
    }

    // Expression columns carry no declared type; fall back to the storage
    // class of the value itself
    fn text(row: &SqliteRow, idx: usize, type_name: &str) -> Option<JsonValue> {
        take::<_, String>(row, idx)
            .map(|v| text_value(v, type_name))
            .or_else(|| take::<_, i64>(row, idx).map(number))
            .or_else(|| take::<_, f64>(row, idx).map(float_value))
    }
}
