//! Scripted in-memory proxy. Every outbound call is recorded, results are
//! served from a script, and failures can be injected per operation.

use crate::messages::Request;
use crate::transport::{Connector, Transport};
use bytes::Bytes;
use muxsql_core::{BindType, ColumnMeta, MuxError, Result, Row};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Scripted {
    Query { columns: Vec<ColumnMeta>, rows: Vec<Row> },
    Update(u64),
    Error(MuxError),
}

#[derive(Debug)]
struct MockState {
    calls: Vec<Request>,
    results: VecDeque<Scripted>,
    failures: HashMap<&'static str, VecDeque<MuxError>>,
    out_values: Vec<Bytes>,
    num_shards: u32,
    server_info: String,
    ping_delay: Option<Duration>,
    connect_error: Option<MuxError>,
    connections: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            results: VecDeque::new(),
            failures: HashMap::new(),
            out_values: Vec::new(),
            num_shards: 1,
            server_info: "mockdb:pool=1 Host=localhost".to_string(),
            ping_delay: None,
            connect_error: None,
            connections: 0,
        }
    }
}

/// Handle on the scripted proxy. Clones share one script and one call log.
#[derive(Debug, Clone, Default)]
pub struct MockServer {
    state: Arc<Mutex<MockState>>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a row-returning result. Empty strings are sent as NULL.
    pub fn push_query(&self, columns: &[&str], rows: Vec<Vec<&str>>) {
        let columns = columns.iter().map(|name| ColumnMeta::named(*name)).collect();
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|value| Bytes::copy_from_slice(value.as_bytes()))
                    .collect()
            })
            .collect();
        self.state().results.push_back(Scripted::Query { columns, rows });
    }

    pub fn push_update(&self, rows: u64) {
        self.state().results.push_back(Scripted::Update(rows));
    }

    /// Queues an error as the outcome of the next execution.
    pub fn push_error(&self, err: MuxError) {
        self.state().results.push_back(Scripted::Error(err));
    }

    /// Fails the next call of the named operation (see `Request::name`).
    pub fn fail_next(&self, op: &'static str, err: MuxError) {
        self.state().failures.entry(op).or_default().push_back(err);
    }

    pub fn fail_connect(&self, err: MuxError) {
        self.state().connect_error = Some(err);
    }

    /// Scripts the output row, sent as given. Unscripted rows are all NULL.
    pub fn set_out_values(&self, values: &[&str]) {
        self.state().out_values = values
            .iter()
            .map(|value| Bytes::copy_from_slice(value.as_bytes()))
            .collect();
    }

    pub fn set_num_shards(&self, shards: u32) {
        self.state().num_shards = shards;
    }

    pub fn set_server_info(&self, info: &str) {
        self.state().server_info = info.to_string();
    }

    pub fn set_ping_delay(&self, delay: Duration) {
        self.state().ping_delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<Request> {
        self.state().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.state().calls.iter().filter(|call| call.name() == op).count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn connections(&self) -> usize {
        self.state().connections
    }

    fn record(&self, request: Request) -> Result<()> {
        let mut state = self.state();
        let op = request.name();
        state.calls.push(request);
        match state.failures.get_mut(op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_result(&self) -> Scripted {
        self.state().results.pop_front().unwrap_or(Scripted::Update(0))
    }
}

impl Connector for MockServer {
    type Transport = MockTransport;

    async fn connect(&self, target: &str) -> Result<MockTransport> {
        let mut state = self.state();
        if let Some(err) = state.connect_error.take() {
            return Err(err);
        }
        state.connections += 1;
        Ok(MockTransport {
            server: self.clone(),
            target: target.to_string(),
            columns: Vec::new(),
            pending: VecDeque::new(),
            row_count: 0,
        })
    }
}

/// One connection to a `MockServer`, holding the rows of the statement in
/// progress.
#[derive(Debug)]
pub struct MockTransport {
    server: MockServer,
    target: String,
    columns: Vec<ColumnMeta>,
    pending: VecDeque<Row>,
    row_count: u64,
}

impl MockTransport {
    pub fn target(&self) -> &str {
        &self.target
    }

    fn load(&mut self, result: Scripted) -> Result<bool> {
        self.pending.clear();
        match result {
            Scripted::Query { columns, rows } => {
                self.columns = columns;
                self.pending.extend(rows);
                self.row_count = 0;
                Ok(true)
            }
            Scripted::Update(rows) => {
                self.columns.clear();
                self.row_count = rows;
                Ok(false)
            }
            Scripted::Error(err) => Err(err),
        }
    }
}

impl Transport for MockTransport {
    async fn client_info(&mut self, process: &str) -> Result<String> {
        self.server.record(Request::ClientInfo {
            process: process.to_string(),
        })?;
        Ok(self.server.state().server_info.clone())
    }

    async fn prepare(&mut self, sql: &str) -> Result<()> {
        self.server.record(Request::Prepare {
            sql: sql.to_string(),
        })
    }

    async fn bind(&mut self, name: &str, bind_type: BindType, payload: Bytes) -> Result<()> {
        self.server.record(Request::Bind {
            name: name.to_string(),
            bind_type,
            payload,
        })
    }

    async fn bind_out(&mut self, name: &str) -> Result<()> {
        self.server.record(Request::BindOut {
            name: name.to_string(),
        })
    }

    async fn bind_array(
        &mut self,
        name: &str,
        max_width: usize,
        bind_type: BindType,
        values: Vec<Bytes>,
    ) -> Result<()> {
        self.server.record(Request::BindArray {
            name: name.to_string(),
            max_width,
            bind_type,
            values,
        })
    }

    async fn shard_key(&mut self, payload: Bytes) -> Result<()> {
        self.server.record(Request::ShardKey { payload })
    }

    async fn execute(&mut self, fetch_size: u32, autocommit: bool) -> Result<bool> {
        self.server.record(Request::Execute {
            fetch_size,
            autocommit,
        })?;
        let result = self.server.next_result();
        self.load(result)
    }

    async fn exec_dml(&mut self, autocommit: bool) -> Result<()> {
        self.server.record(Request::ExecDml { autocommit })?;
        let result = self.server.next_result();
        self.load(result).map(|_| ())
    }

    async fn exec_query(
        &mut self,
        fetch_size: u32,
        want_meta: bool,
    ) -> Result<Option<Vec<ColumnMeta>>> {
        self.server.record(Request::ExecQuery {
            fetch_size,
            want_meta,
        })?;
        let result = self.server.next_result();
        self.load(result)?;
        Ok(want_meta.then(|| self.columns.clone()))
    }

    async fn column_meta(&mut self) -> Result<Vec<ColumnMeta>> {
        self.server.record(Request::ColumnMeta)?;
        Ok(self.columns.clone())
    }

    fn row_count(&self) -> u64 {
        self.row_count
    }

    async fn fetch(&mut self, fetch_size: u32) -> Result<Vec<Row>> {
        self.server.record(Request::Fetch { fetch_size })?;
        let take = match fetch_size {
            0 => self.pending.len(),
            n => (n as usize).min(self.pending.len()),
        };
        Ok(self.pending.drain(..take).collect())
    }

    async fn fetch_out_bind_vars(&mut self, count: usize) -> Result<Vec<Row>> {
        self.server.record(Request::FetchOutBindVars { count })?;
        let scripted = self.server.state().out_values.clone();
        let row = if scripted.is_empty() {
            vec![Bytes::new(); count]
        } else {
            scripted
        };
        Ok(vec![row])
    }

    async fn commit(&mut self) -> Result<()> {
        self.server.record(Request::Commit)
    }

    async fn rollback(&mut self) -> Result<()> {
        self.server.record(Request::Rollback)
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.server.state().calls.push(Request::Reset);
    }

    async fn set_shard(&mut self, shard: i32) -> Result<()> {
        self.server.record(Request::SetShard { shard })
    }

    async fn num_shards(&mut self) -> Result<u32> {
        self.server.record(Request::NumShards)?;
        Ok(self.server.state().num_shards)
    }

    async fn ping(&mut self, timeout_ms: u64) -> Result<()> {
        self.server.record(Request::Ping { timeout_ms })?;
        let delay = self.server.state().ping_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.pending.clear();
        self.server.record(Request::Close)
    }
}
