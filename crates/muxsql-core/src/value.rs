use crate::error::{MuxError, Result};
use crate::types::{BindType, BindValue, SqlType};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

pub const DATETIME_FORMAT: &str = "%d-%m-%Y %H:%M:%S%.3f";
pub const DATETIME_TZ_FORMAT: &str = "%d-%m-%Y %H:%M:%S%.3f %:z";

/// Caller-level value accepted by `bind`. Every kind has one entry in the
/// encoder table below; `Array` and `Url` are representable but rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null(SqlType),
    Bool(bool),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Decimal(String),
    String(String),
    Bytes(Bytes),
    Blob(Bytes),
    Clob(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    Array(Vec<SqlValue>),
    Url(String),
}

impl SqlValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            SqlValue::Null(_) => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::Short(_) => "short",
            SqlValue::Int(_) => "int",
            SqlValue::Long(_) => "long",
            SqlValue::Float(_) => "float",
            SqlValue::Double(_) => "double",
            SqlValue::Decimal(_) => "decimal",
            SqlValue::String(_) => "string",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::Blob(_) => "blob",
            SqlValue::Clob(_) => "clob",
            SqlValue::Date(_) => "date",
            SqlValue::Time(_) => "time",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::TimestampTz(_) => "timestamp with time zone",
            SqlValue::Array(_) => "array",
            SqlValue::Url(_) => "url",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Converts the value into its tagged wire form. `date_null_fix`
    /// selects the TIMESTAMP tag for null temporal values.
    pub fn encode(&self, date_null_fix: bool) -> Result<BindValue> {
        let value = match self {
            SqlValue::Null(sql_type) => BindValue::null(null_tag(*sql_type, date_null_fix)),
            SqlValue::Bool(v) => BindValue::new(BindType::Boolean, if *v { "1" } else { "0" }),
            SqlValue::Int(v) => BindValue::new(BindType::Int, v.to_string()),
            SqlValue::Short(v) => text(v.to_string()),
            SqlValue::Long(v) => text(v.to_string()),
            SqlValue::Float(v) => text(v.to_string()),
            SqlValue::Double(v) => text(v.to_string()),
            SqlValue::Decimal(v) => {
                if v.parse::<f64>().is_err() {
                    return Err(MuxError::InvalidArgument(format!("not a decimal: {v}")));
                }
                text(v.clone())
            }
            SqlValue::String(v) => text(v.clone()),
            SqlValue::Bytes(v) => BindValue::new(BindType::Raw, v.clone()),
            SqlValue::Blob(v) => BindValue::new(BindType::BlobSingleRound, v.clone()),
            SqlValue::Clob(v) => BindValue::new(BindType::ClobSingleRound, v.clone()),
            SqlValue::Date(v) => datetime(v.and_time(NaiveTime::MIN)),
            SqlValue::Time(v) => datetime(NaiveDateTime::new(epoch_date(), *v)),
            SqlValue::Timestamp(v) => datetime(*v),
            SqlValue::TimestampTz(v) => BindValue::new(
                BindType::TimestampTz,
                v.format(DATETIME_TZ_FORMAT).to_string(),
            ),
            SqlValue::Array(_) | SqlValue::Url(_) => {
                return Err(MuxError::UnsupportedBindKind(self.kind_name().to_string()))
            }
        };
        Ok(value)
    }
}

/// Tag carried by an explicit null of the given SQL type.
pub fn null_tag(sql_type: SqlType, date_null_fix: bool) -> BindType {
    match sql_type {
        SqlType::Blob => BindType::BlobSingleRound,
        SqlType::Clob => BindType::ClobSingleRound,
        SqlType::Varbinary | SqlType::LongVarbinary => BindType::Raw,
        SqlType::Date | SqlType::Time | SqlType::Timestamp if date_null_fix => BindType::Timestamp,
        _ => BindType::String,
    }
}

fn text(value: String) -> BindValue {
    BindValue::new(BindType::String, value)
}

fn datetime(value: NaiveDateTime) -> BindValue {
    BindValue::new(BindType::Timestamp, value.format(DATETIME_FORMAT).to_string())
}

fn epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i16> for SqlValue {
    fn from(v: i16) -> Self {
        SqlValue::Short(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Long(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Double(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::String(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(Bytes::from(v))
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<DateTime<FixedOffset>> for SqlValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        SqlValue::TimestampTz(v)
    }
}
