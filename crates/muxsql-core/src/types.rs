use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Type tag that travels with every bound value. The discriminants are the
/// codes the proxy expects on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BindType {
    String = 0,
    Raw = 3,
    BlobSingleRound = 4,
    ClobSingleRound = 5,
    Timestamp = 6,
    TimestampTz = 7,
    Boolean = 8,
    Int = 9,
}

impl BindType {
    pub fn wire_code(self) -> u8 {
        self as u8
    }

    pub fn from_wire_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(BindType::String),
            3 => Some(BindType::Raw),
            4 => Some(BindType::BlobSingleRound),
            5 => Some(BindType::ClobSingleRound),
            6 => Some(BindType::Timestamp),
            7 => Some(BindType::TimestampTz),
            8 => Some(BindType::Boolean),
            9 => Some(BindType::Int),
            _ => None,
        }
    }
}

/// One parameter for one execution. A zero-length payload is the null
/// sentinel; the tag still carries the intended SQL type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindValue {
    pub bind_type: BindType,
    pub payload: Bytes,
}

impl BindValue {
    pub fn new(bind_type: BindType, payload: impl Into<Bytes>) -> Self {
        Self {
            bind_type,
            payload: payload.into(),
        }
    }

    pub fn null(bind_type: BindType) -> Self {
        Self {
            bind_type,
            payload: Bytes::new(),
        }
    }

    pub fn int(value: i64) -> Self {
        Self::new(BindType::Int, value.to_string().into_bytes())
    }

    pub fn is_null(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn width(&self) -> usize {
        self.payload.len()
    }
}

/// Caller-side SQL type used to pick the tag of an explicit null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Varchar,
    Char,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Double,
    Decimal,
    Boolean,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Varbinary,
    LongVarbinary,
    Blob,
    Clob,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatementClass {
    #[default]
    Unknown,
    Query,
    Mutation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datasource {
    #[default]
    Hera,
    Oracle,
    Mysql,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub type_code: i32,
    pub width: u32,
    pub precision: u32,
    pub scale: i32,
}

impl ColumnMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_code: 0,
            width: 0,
            precision: 0,
            scale: 0,
        }
    }
}

/// One fetched row: raw column payloads, zero-length meaning NULL.
pub type Row = Vec<Bytes>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    SucceededNoInfo,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Execution {
    pub is_query: bool,
    pub row_count: Option<u64>,
}
