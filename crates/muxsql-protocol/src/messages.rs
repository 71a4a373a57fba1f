use bytes::Bytes;
use muxsql_core::BindType;

/// One outbound operation on the proxy stream, as recorded by transports
/// that keep a call log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ClientInfo {
        process: String,
    },
    Prepare {
        sql: String,
    },
    Bind {
        name: String,
        bind_type: BindType,
        payload: Bytes,
    },
    BindOut {
        name: String,
    },
    BindArray {
        name: String,
        max_width: usize,
        bind_type: BindType,
        values: Vec<Bytes>,
    },
    ShardKey {
        payload: Bytes,
    },
    Execute {
        fetch_size: u32,
        autocommit: bool,
    },
    ExecDml {
        autocommit: bool,
    },
    ExecQuery {
        fetch_size: u32,
        want_meta: bool,
    },
    ColumnMeta,
    Fetch {
        fetch_size: u32,
    },
    FetchOutBindVars {
        count: usize,
    },
    Commit,
    Rollback,
    Reset,
    SetShard {
        shard: i32,
    },
    NumShards,
    Ping {
        timeout_ms: u64,
    },
    Close,
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::ClientInfo { .. } => "client_info",
            Request::Prepare { .. } => "prepare",
            Request::Bind { .. } => "bind",
            Request::BindOut { .. } => "bind_out",
            Request::BindArray { .. } => "bind_array",
            Request::ShardKey { .. } => "shard_key",
            Request::Execute { .. } => "execute",
            Request::ExecDml { .. } => "exec_dml",
            Request::ExecQuery { .. } => "exec_query",
            Request::ColumnMeta => "column_meta",
            Request::Fetch { .. } => "fetch",
            Request::FetchOutBindVars { .. } => "fetch_out_bind_vars",
            Request::Commit => "commit",
            Request::Rollback => "rollback",
            Request::Reset => "reset",
            Request::SetShard { .. } => "set_shard",
            Request::NumShards => "num_shards",
            Request::Ping { .. } => "ping",
            Request::Close => "close",
        }
    }

    /// Operations that carry statement traffic, as opposed to session
    /// bookkeeping.
    pub fn is_statement_traffic(&self) -> bool {
        !matches!(
            self,
            Request::ClientInfo { .. }
                | Request::Commit
                | Request::Rollback
                | Request::SetShard { .. }
                | Request::NumShards
                | Request::Ping { .. }
                | Request::Close
        )
    }
}
