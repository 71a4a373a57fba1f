pub mod convert;
pub mod error;
pub mod murmur;
pub mod sqlstate;
pub mod types;
pub mod value;

pub use convert::{decode, FromWire};
pub use error::{MuxError, Result};
pub use murmur::{murmur3_32, scuttle_id, MAX_SCUTTLE_BUCKETS, SCUTTLE_SEED};
pub use types::{
    BatchStatus, BindType, BindValue, ColumnMeta, Datasource, Execution, Row, SqlType,
    StatementClass,
};
pub use value::SqlValue;

#[cfg(test)]
mod tests;
