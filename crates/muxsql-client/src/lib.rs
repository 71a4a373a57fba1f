pub mod batch;
pub mod config;
pub mod cursor;
mod params;
pub mod registry;
pub mod session;
mod shard;
pub mod statement;

pub use batch::{all_succeeded, decode_batch_failure};
pub use config::{BatchConfig, ClientConfig, SessionConfig, ShardingConfig, StatementsConfig};
pub use cursor::Cursor;
pub use registry::StatementId;
pub use session::Session;
pub use shard::SHARD_ID_KEY;
pub use statement::{Statement, StatementKind};
