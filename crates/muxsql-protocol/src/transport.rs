//! Outbound contracts of the engine: the ordered request/response stream to
//! the proxy and the factory that opens one.

use bytes::Bytes;
use muxsql_core::{BindType, ColumnMeta, Result, Row};

/// One ordered, synchronous stream to the proxy. Callers hold it through
/// `&mut`, so at most one operation is ever in flight. Any `Io`, `Timeout`
/// or `Protocol` error leaves the stream unusable.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Announces the client process and returns the proxy's info string.
    async fn client_info(&mut self, process: &str) -> Result<String>;

    async fn prepare(&mut self, sql: &str) -> Result<()>;

    async fn bind(&mut self, name: &str, bind_type: BindType, payload: Bytes) -> Result<()>;

    async fn bind_out(&mut self, name: &str) -> Result<()>;

    /// Column-oriented bind for array DML; every value is padded by the proxy
    /// to `max_width` bytes.
    async fn bind_array(
        &mut self,
        name: &str,
        max_width: usize,
        bind_type: BindType,
        values: Vec<Bytes>,
    ) -> Result<()>;

    async fn shard_key(&mut self, payload: Bytes) -> Result<()>;

    /// Generic execution. Returns true when the statement produced rows.
    async fn execute(&mut self, fetch_size: u32, autocommit: bool) -> Result<bool>;

    async fn exec_dml(&mut self, autocommit: bool) -> Result<()>;

    async fn exec_query(&mut self, fetch_size: u32, want_meta: bool)
        -> Result<Option<Vec<ColumnMeta>>>;

    async fn column_meta(&mut self) -> Result<Vec<ColumnMeta>>;

    /// Rows affected by the last DML.
    fn row_count(&self) -> u64;

    /// Next window of rows; `fetch_size == 0` returns everything left.
    async fn fetch(&mut self, fetch_size: u32) -> Result<Vec<Row>>;

    async fn fetch_out_bind_vars(&mut self, count: usize) -> Result<Vec<Row>>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Drops any half-built request state without touching the wire.
    fn reset(&mut self);

    async fn set_shard(&mut self, shard: i32) -> Result<()>;

    async fn num_shards(&mut self) -> Result<u32>;

    async fn ping(&mut self, timeout_ms: u64) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

#[allow(async_fn_in_trait)]
pub trait Connector {
    type Transport: Transport;

    async fn connect(&self, target: &str) -> Result<Self::Transport>;
}
