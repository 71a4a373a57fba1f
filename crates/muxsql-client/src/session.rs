use crate::config::ClientConfig;
use crate::cursor::{Cursor, CursorState};
use crate::registry::{StatementId, StatementRegistry};
use crate::shard::{ShardState, SHARD_ID_KEY};
use crate::statement::{Statement, StatementKind, StatementState};
use bytes::Bytes;
use metrics::counter;
use muxsql_core::{MuxError, Result};
use muxsql_protocol::{Connector, PlanCache, PlanCacheRegistry, Transport};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Open,
    Closed,
    /// Torn down after the stream could no longer be trusted.
    Broken,
}

/// One logical connection to the proxy. Owns the ordered stream and every
/// statement prepared on it; statement and cursor handles borrow the
/// session mutably, so only one operation is ever in flight.
pub struct Session<T: Transport> {
    pub(crate) id: Uuid,
    target: String,
    pub(crate) transport: T,
    pub(crate) config: ClientConfig,
    pub(crate) plan_cache: Arc<dyn PlanCache>,
    pub(crate) autocommit: bool,
    pub(crate) shard: ShardState,
    pub(crate) statements: StatementRegistry,
    pub(crate) active_cursor: Option<StatementId>,
    state: SessionState,
    server_name: String,
}

impl<T: Transport> Session<T> {
    /// Opens a session sharing the process-wide plan cache for `target`.
    pub async fn connect<C>(connector: &C, target: &str, config: ClientConfig) -> Result<Self>
    where
        C: Connector<Transport = T>,
    {
        let cache = PlanCacheRegistry::global().cache_for(target, config.statements.cache_capacity);
        Self::connect_with_cache(connector, target, config, cache).await
    }

    pub async fn connect_with_cache<C>(
        connector: &C,
        target: &str,
        config: ClientConfig,
        plan_cache: Arc<dyn PlanCache>,
    ) -> Result<Self>
    where
        C: Connector<Transport = T>,
    {
        config
            .validate()
            .map_err(|err| MuxError::Configuration(err.to_string()))?;
        let mut transport = connector.connect(target).await?;
        let info = match transport.client_info("init").await {
            Ok(info) => info,
            Err(err) => {
                let _ = transport.close().await;
                return Err(err);
            }
        };
        let server_name = parse_server_name(&info);
        let id = Uuid::new_v4();
        info!(session = %id, proxy = %target, server = %server_name, "session opened");
        Ok(Self {
            id,
            target: target.to_string(),
            transport,
            autocommit: config.session.autocommit,
            config,
            plan_cache,
            shard: ShardState::Unset,
            statements: StatementRegistry::default(),
            active_cursor: None,
            state: SessionState::Open,
            server_name,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// `<server>_<host>` as reported by the proxy at connect time.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.state != SessionState::Open
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn open_statements(&self) -> usize {
        self.statements.len()
    }

    pub fn prepare(&mut self, sql: impl Into<String>, kind: StatementKind) -> Result<StatementId> {
        self.ensure_open()?;
        let state = StatementState::new(kind, Some(sql.into()), 0);
        Ok(self.statements.insert(state))
    }

    pub fn statement(&mut self, id: StatementId) -> Result<Statement<'_, T>> {
        self.ensure_open()?;
        self.statement_state(id)?;
        Ok(Statement::new(self, id))
    }

    /// Cursor over the last result of a statement that executed a query.
    pub fn cursor(&mut self, id: StatementId) -> Result<Cursor<'_, T>> {
        self.ensure_open()?;
        if self.statement_state(id)?.cursor.is_none() {
            return Err(MuxError::InvalidArgument(
                "statement has no open result".into(),
            ));
        }
        Ok(Cursor::new(self, id))
    }

    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    pub fn set_autocommit(&mut self, enabled: bool) -> Result<()> {
        self.ensure_open()?;
        self.autocommit = enabled;
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        let result = bounded(self.response_timeout(), self.transport.commit()).await;
        self.escalate(result).await
    }

    pub async fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        let result = bounded(self.response_timeout(), self.transport.rollback()).await;
        self.escalate(result).await
    }

    /// Routes later statements. `shardid` pins the session to a shard (a
    /// negative id unpins it); any other key is sent as the shard key of the
    /// next execution.
    pub async fn set_shard_hint(&mut self, key: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        if !self.config.sharding.enabled {
            debug!(session = %self.id, key, "sharding disabled; ignoring shard hint");
            return Ok(());
        }
        if key.eq_ignore_ascii_case(SHARD_ID_KEY) {
            self.shard.check_pin()?;
            let shard: i32 = value.trim().parse().map_err(|_| {
                MuxError::InvalidArgument(format!("shard id must be an integer, got {value}"))
            })?;
            let result = bounded(self.response_timeout(), self.transport.set_shard(shard)).await;
            self.escalate(result).await?;
            self.shard = if shard < 0 {
                ShardState::Unset
            } else {
                ShardState::Pinned(shard)
            };
            debug!(session = %self.id, shard, "shard pinned");
        } else {
            self.shard.check_key()?;
            self.shard = ShardState::KeyPayload(Bytes::from(format!("{key}={value}")));
        }
        Ok(())
    }

    pub async fn reset_shard_hints(&mut self) -> Result<()> {
        self.ensure_open()?;
        if !self.config.sharding.enabled {
            return Ok(());
        }
        if self.shard.is_pinned() {
            let result = bounded(self.response_timeout(), self.transport.set_shard(-1)).await;
            self.escalate(result).await?;
        }
        self.shard = ShardState::Unset;
        Ok(())
    }

    /// Number of shards behind the proxy; 1 when sharding is off.
    pub async fn shard_count(&mut self) -> Result<u32> {
        self.ensure_open()?;
        if !self.config.sharding.enabled {
            return Ok(1);
        }
        let result = bounded(self.response_timeout(), self.transport.num_shards()).await;
        self.escalate(result).await
    }

    /// Pings the proxy. A failed or late answer hard-closes the session.
    pub async fn is_valid(&mut self, timeout: Duration) -> bool {
        if !self.is_open() {
            return false;
        }
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let err = match bounded(timeout, self.transport.ping(timeout_ms)).await {
            Ok(()) => return true,
            Err(err) => err,
        };
        warn!(session = %self.id, error = %err, "validation ping failed");
        self.hard_close().await;
        false
    }

    /// Closes every statement, then the stream. Returns the first error
    /// met while draining; the session ends up closed regardless.
    pub async fn close(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        let mut first_err = None;
        for id in self.statements.ids() {
            if !self.is_open() {
                break;
            }
            if let Err(err) = self.close_statement(id).await {
                first_err.get_or_insert(err);
            }
        }
        if self.is_open() {
            self.statements.clear();
            self.active_cursor = None;
            let result = bounded(self.response_timeout(), self.transport.close()).await;
            self.state = SessionState::Closed;
            if let Err(err) = result {
                first_err.get_or_insert(err);
            }
            info!(session = %self.id, "session closed");
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Tears the session down without talking to the proxy beyond a
    /// best-effort close of the stream.
    pub async fn hard_close(&mut self) {
        if self.state != SessionState::Open {
            return;
        }
        self.state = SessionState::Broken;
        self.statements.clear();
        self.active_cursor = None;
        self.shard = ShardState::Unset;
        let _ = bounded(self.response_timeout(), self.transport.close()).await;
        counter!("muxsql_hard_close_total").increment(1);
        warn!(session = %self.id, proxy = %self.target, "session hard-closed");
    }

    pub(crate) fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.config.session.response_timeout_ms)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        match self.state {
            SessionState::Open => Ok(()),
            SessionState::Closed => Err(MuxError::Closed("session".into())),
            SessionState::Broken => Err(MuxError::Closed("session (hard-closed)".into())),
        }
    }

    /// Passes a transport result through, hard-closing the session first
    /// when the error leaves the stream in an unknown state.
    pub(crate) async fn escalate<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(err) = &result {
            if err.invalidates_session() {
                warn!(session = %self.id, error = %err, "stream failure");
                self.hard_close().await;
            }
        }
        result
    }

    pub(crate) fn statement_state(&self, id: StatementId) -> Result<&StatementState> {
        self.statements
            .get(id)
            .ok_or_else(|| MuxError::Closed("statement".into()))
    }

    pub(crate) fn statement_state_mut(&mut self, id: StatementId) -> Result<&mut StatementState> {
        self.statements
            .get_mut(id)
            .ok_or_else(|| MuxError::Closed("statement".into()))
    }

    pub(crate) fn cursor_state_mut(&mut self, id: StatementId) -> Result<&mut CursorState> {
        self.statement_state_mut(id)?
            .cursor
            .as_mut()
            .ok_or_else(|| MuxError::Closed("cursor".into()))
    }

    pub(crate) fn release_active_cursor(&mut self, id: StatementId) {
        if self.active_cursor == Some(id) {
            self.active_cursor = None;
        }
    }

    /// Reads the rest of a statement's result off the stream so the next
    /// request can be sent.
    pub(crate) async fn drain_cursor(&mut self, id: StatementId, keep_rows: bool) -> Result<()> {
        loop {
            let fetch_size = match self.statement_state(id)?.cursor.as_ref() {
                Some(cursor) if !cursor.exhausted => cursor.fetch_size,
                _ => break,
            };
            let result = bounded(self.response_timeout(), self.transport.fetch(fetch_size)).await;
            let rows = self.escalate(result).await?;
            counter!("muxsql_fetch_total").increment(1);
            self.cursor_state_mut(id)?.append(rows, keep_rows);
        }
        self.release_active_cursor(id);
        Ok(())
    }

    pub(crate) async fn close_statement(&mut self, id: StatementId) -> Result<()> {
        self.ensure_open()?;
        self.statement_state(id)?;
        if self.active_cursor == Some(id) {
            self.drain_cursor(id, false).await?;
        }
        self.statements.remove(id);
        Ok(())
    }
}

/// Bounds one proxy round trip. An expired wait is a stream failure.
pub(crate) async fn bounded<R>(limit: Duration, call: impl Future<Output = Result<R>>) -> Result<R> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(MuxError::Timeout(format!(
            "no response within {}ms",
            limit.as_millis()
        ))),
    }
}

fn parse_server_name(info: &str) -> String {
    let server = info
        .split(':')
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("unknown");
    let host = info
        .split_once("Host=")
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .filter(|host| !host.is_empty())
        .unwrap_or("unknown");
    format!("{server}_{host}")
}

#[cfg(test)]
mod tests {
    use super::parse_server_name;

    #[test]
    fn server_name_joins_server_and_host() {
        assert_eq!(
            parse_server_name("mockdb:pool=1 Host=db7.example"),
            "mockdb_db7.example"
        );
        assert_eq!(parse_server_name("mockdb"), "mockdb_unknown");
        assert_eq!(parse_server_name(""), "unknown_unknown");
    }
}
