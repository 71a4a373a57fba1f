use crate::batch::{all_succeeded, decode_batch_failure, BatchAccumulator};
use crate::cursor::{Cursor, CursorState};
use crate::params::{OutputParameters, ParameterSet};
use crate::registry::StatementId;
use crate::session::{bounded, Session};
use crate::shard::derive_shard_key;
use bytes::Bytes;
use metrics::counter;
use muxsql_core::{
    BatchStatus, BindType, BindValue, Execution, FromWire, MuxError, Result, SqlType, SqlValue,
    StatementClass,
};
use muxsql_protocol::{PlanEntry, Transport};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SQL without placeholders; binding is rejected.
    Plain,
    Prepared,
    /// Stored procedure call with optional output parameters.
    Callable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecMode {
    Any,
    Query,
    Mutation,
}

#[derive(Debug)]
pub(crate) struct StatementState {
    pub(crate) kind: StatementKind,
    pub(crate) sql: Option<String>,
    pub(crate) fetch_size: u32,
    pub(crate) max_rows: u64,
    pub(crate) params: ParameterSet,
    pub(crate) outputs: OutputParameters,
    pub(crate) batch: BatchAccumulator,
    pub(crate) plan: Option<Arc<PlanEntry>>,
    pub(crate) update_count: Option<u64>,
    pub(crate) cursor: Option<CursorState>,
}

impl StatementState {
    pub(crate) fn new(kind: StatementKind, sql: Option<String>, fetch_size: u32) -> Self {
        Self {
            kind,
            sql,
            fetch_size,
            max_rows: 0,
            params: ParameterSet::default(),
            outputs: OutputParameters::default(),
            batch: BatchAccumulator::default(),
            plan: None,
            update_count: None,
            cursor: None,
        }
    }
}

/// Borrowed handle on one registered statement. All operations run on the
/// owning session's stream.
pub struct Statement<'s, T: Transport> {
    session: &'s mut Session<T>,
    id: StatementId,
}

impl<'s, T: Transport> Statement<'s, T> {
    pub(crate) fn new(session: &'s mut Session<T>, id: StatementId) -> Self {
        Self { session, id }
    }

    pub fn id(&self) -> StatementId {
        self.id
    }

    pub fn kind(&self) -> Result<StatementKind> {
        Ok(self.session.statement_state(self.id)?.kind)
    }

    pub fn bind(&mut self, position: usize, value: impl Into<SqlValue>) -> Result<()> {
        let date_null_fix = self.session.config.statements.date_null_fix_enabled;
        let encoded = value.into().encode(date_null_fix)?;
        self.bind_value(position, encoded)
    }

    /// Binds a null that keeps the tag of the intended SQL type.
    pub fn bind_null(&mut self, position: usize, sql_type: SqlType) -> Result<()> {
        self.bind(position, SqlValue::Null(sql_type))
    }

    /// Binds an already encoded payload under an explicit tag.
    pub fn bind_tagged(
        &mut self,
        position: usize,
        bind_type: BindType,
        payload: impl Into<Bytes>,
    ) -> Result<()> {
        self.bind_value(position, BindValue::new(bind_type, payload))
    }

    fn bind_value(&mut self, position: usize, value: BindValue) -> Result<()> {
        self.session.ensure_open()?;
        let state = self.session.statement_state_mut(self.id)?;
        if state.kind == StatementKind::Plain {
            return Err(MuxError::NotSupported(
                "plain statements do not take parameters".into(),
            ));
        }
        state.params.set(position, value)
    }

    /// Clears bound inputs and, on callables, the registered outputs.
    pub fn clear_parameters(&mut self) -> Result<()> {
        self.session.ensure_open()?;
        let state = self.session.statement_state_mut(self.id)?;
        state.params.clear();
        state.outputs.clear();
        Ok(())
    }

    /// Declares an output parameter of a callable statement.
    pub fn register_out(&mut self, position: usize) -> Result<()> {
        self.session.ensure_open()?;
        let state = self.session.statement_state_mut(self.id)?;
        if state.kind != StatementKind::Callable {
            return Err(MuxError::NotSupported(
                "output parameters need a callable statement".into(),
            ));
        }
        state.outputs.register(position)
    }

    /// Non-zero sizes below the session minimum are raised to it; 0 fetches
    /// everything in one round trip.
    pub fn set_fetch_size(&mut self, rows: u32) -> Result<()> {
        self.session.ensure_open()?;
        let min = self.session.config.session.min_fetch_size;
        let rows = if rows != 0 && rows < min { min } else { rows };
        self.session.statement_state_mut(self.id)?.fetch_size = rows;
        Ok(())
    }

    pub fn fetch_size(&self) -> Result<u32> {
        Ok(self.session.statement_state(self.id)?.fetch_size)
    }

    /// Caps the rows a cursor yields; 0 means no limit.
    pub fn set_max_rows(&mut self, rows: u64) -> Result<()> {
        self.session.ensure_open()?;
        self.session.statement_state_mut(self.id)?.max_rows = rows;
        Ok(())
    }

    pub fn max_rows(&self) -> Result<u64> {
        Ok(self.session.statement_state(self.id)?.max_rows)
    }

    pub async fn execute(&mut self) -> Result<Execution> {
        self.session.execute_statement(self.id, ExecMode::Any).await
    }

    /// Executes on the query path regardless of the memoized class.
    pub async fn execute_query(&mut self) -> Result<Cursor<'_, T>> {
        self.session.execute_statement(self.id, ExecMode::Query).await?;
        Ok(Cursor::new(self.session, self.id))
    }

    /// Executes on the mutation path and returns the affected row count.
    pub async fn execute_update(&mut self) -> Result<u64> {
        let execution = self
            .session
            .execute_statement(self.id, ExecMode::Mutation)
            .await?;
        self.session.statement_state_mut(self.id)?.update_count = None;
        Ok(execution.row_count.unwrap_or(0))
    }

    /// Row count of the last mutation, reported once.
    pub fn update_count(&mut self) -> Result<Option<u64>> {
        self.session.ensure_open()?;
        Ok(self.session.statement_state_mut(self.id)?.update_count.take())
    }

    /// Cursor over the last query result.
    pub fn cursor(&mut self) -> Result<Cursor<'_, T>> {
        self.session.cursor(self.id)
    }

    pub fn get_out<V: FromWire>(&mut self, position: usize) -> Result<V> {
        self.session.ensure_open()?;
        self.session
            .statement_state_mut(self.id)?
            .outputs
            .read(position)
    }

    pub fn out_was_null(&self) -> Result<bool> {
        Ok(self.session.statement_state(self.id)?.outputs.was_null())
    }

    pub fn add_batch(&mut self) -> Result<()> {
        self.session.ensure_open()?;
        let state = self.session.statement_state_mut(self.id)?;
        if state.kind == StatementKind::Plain {
            return Err(MuxError::NotSupported(
                "plain statements cannot be batched".into(),
            ));
        }
        let StatementState { params, batch, .. } = state;
        batch.add_row(params)
    }

    pub fn clear_batch(&mut self) -> Result<()> {
        self.session.ensure_open()?;
        self.session.statement_state_mut(self.id)?.batch.clear();
        Ok(())
    }

    pub fn batch_len(&self) -> Result<usize> {
        Ok(self.session.statement_state(self.id)?.batch.rows())
    }

    pub async fn execute_batch(&mut self) -> Result<Vec<BatchStatus>> {
        self.session.execute_batch(self.id).await
    }

    pub async fn close(self) -> Result<()> {
        self.session.close_statement(self.id).await
    }
}

impl<T: Transport> Session<T> {
    /// prepare → bind → execute → (callable) fetch out params.
    pub(crate) async fn execute_statement(
        &mut self,
        id: StatementId,
        mode: ExecMode,
    ) -> Result<Execution> {
        self.ensure_open()?;
        self.statement_state(id)?;
        self.init_execute(id).await?;
        let plan = self.prepare_plan(id).await?;

        if let Err(err) = self.bind_and_shard(id, &plan).await {
            return Err(self.abandon_request(err));
        }
        let out_positions = self.statement_state_mut(id)?.outputs.reset_values();
        for position in &out_positions {
            let result = bounded(
                self.response_timeout(),
                self.transport.bind_out(&plan.param_name(*position)),
            )
            .await;
            self.escalate(result).await?;
        }

        let (fetch_size, max_rows) = {
            let state = self.statement_state(id)?;
            (state.fetch_size, state.max_rows)
        };
        let autocommit = self.autocommit && out_positions.is_empty();
        let class = match mode {
            ExecMode::Any => plan.class(),
            ExecMode::Query => StatementClass::Query,
            ExecMode::Mutation => StatementClass::Mutation,
        };
        debug!(session = %self.id, sql = %plan.parsed_sql(), ?class, "executing statement");
        counter!("muxsql_statement_total").increment(1);

        let is_query = match class {
            StatementClass::Unknown => {
                let result = bounded(
                    self.response_timeout(),
                    self.transport.execute(fetch_size, autocommit),
                )
                .await;
                let is_query = self.escalate(result).await?;
                plan.memoize_class(if is_query {
                    StatementClass::Query
                } else {
                    StatementClass::Mutation
                });
                let want_meta =
                    self.config.statements.column_metadata && plan.column_meta().is_none();
                if is_query && want_meta {
                    let result =
                        bounded(self.response_timeout(), self.transport.column_meta()).await;
                    let meta = self.escalate(result).await?;
                    plan.memoize_column_meta(meta);
                }
                is_query
            }
            StatementClass::Query => {
                let want_meta =
                    self.config.statements.column_metadata && plan.column_meta().is_none();
                let result = bounded(
                    self.response_timeout(),
                    self.transport.exec_query(fetch_size, want_meta),
                )
                .await;
                if let Some(meta) = self.escalate(result).await? {
                    plan.memoize_column_meta(meta);
                }
                true
            }
            StatementClass::Mutation => {
                let result = bounded(
                    self.response_timeout(),
                    self.transport.exec_dml(autocommit),
                )
                .await;
                self.escalate(result).await?;
                false
            }
        };

        let row_count = (!is_query).then(|| self.transport.row_count());
        {
            let state = self.statement_state_mut(id)?;
            if is_query {
                state.cursor = Some(CursorState::new(plan.clone(), fetch_size, max_rows));
            }
            state.update_count = row_count;
        }
        if is_query {
            self.active_cursor = Some(id);
        }

        if !out_positions.is_empty() {
            self.fetch_out_params(id, out_positions.len()).await?;
        }
        Ok(Execution {
            is_query,
            row_count,
        })
    }

    /// Drops this statement's previous result and drains any other cursor
    /// still holding the stream, keeping that cursor's rows readable.
    pub(crate) async fn init_execute(&mut self, id: StatementId) -> Result<()> {
        let has_cursor = self.statement_state(id)?.cursor.is_some();
        if has_cursor {
            self.drain_cursor(id, false).await?;
            self.statement_state_mut(id)?.cursor = None;
        }
        if let Some(active) = self.active_cursor {
            if active != id {
                debug!(session = %self.id, "draining active cursor before execution");
                self.drain_cursor(active, true).await?;
            }
            self.active_cursor = None;
        }
        self.statement_state_mut(id)?.update_count = None;
        Ok(())
    }

    async fn prepare_plan(&mut self, id: StatementId) -> Result<Arc<PlanEntry>> {
        let sql = self
            .statement_state(id)?
            .sql
            .clone()
            .ok_or_else(|| MuxError::InvalidArgument("statement has no SQL text".into()))?;
        let options = self.config.plan_options();
        let plan = self.plan_cache.entry(&sql, &options)?;
        let result = bounded(
            self.response_timeout(),
            self.transport.prepare(plan.parsed_sql()),
        )
        .await;
        self.escalate(result).await?;
        self.statement_state_mut(id)?.plan = Some(plan.clone());
        Ok(plan)
    }

    async fn bind_and_shard(&mut self, id: StatementId, plan: &PlanEntry) -> Result<()> {
        let mut shard_payload = None;
        if self.config.sharding.enabled && !self.shard.is_pinned() {
            shard_payload = self.shard.take_payload();
            if shard_payload.is_none() {
                if let Some(info) = plan.sharding() {
                    let state = self.statement_state_mut(id)?;
                    if let Some(derived) = derive_shard_key(info, &state.params)? {
                        for (position, value) in derived.scuttle_binds {
                            state.params.set(position, value)?;
                        }
                        shard_payload = Some(derived.payload);
                    }
                }
            }
        }

        let state = self.statement_state(id)?;
        let highest = state.params.highest_position();
        if highest > plan.param_count() {
            return Err(MuxError::Configuration(format!(
                "position {highest} is bound but the statement has {} placeholders",
                plan.param_count()
            )));
        }
        let binds: Vec<(String, BindType, Bytes)> = state
            .params
            .iter()
            .map(|(position, value)| {
                (
                    plan.param_name(position),
                    value.bind_type,
                    value.payload.clone(),
                )
            })
            .collect();
        for (name, bind_type, payload) in binds {
            let result = bounded(
                self.response_timeout(),
                self.transport.bind(&name, bind_type, payload),
            )
            .await;
            self.escalate(result).await?;
        }
        if let Some(payload) = shard_payload {
            let result =
                bounded(self.response_timeout(), self.transport.shard_key(payload)).await;
            self.escalate(result).await?;
        }
        Ok(())
    }

    async fn fetch_out_params(&mut self, id: StatementId, count: usize) -> Result<()> {
        let result = bounded(
            self.response_timeout(),
            self.transport.fetch_out_bind_vars(count),
        )
        .await;
        let mut rows = self.escalate(result).await?;
        if rows.is_empty() {
            let result = Err(MuxError::Protocol(
                "proxy returned no row of output values".into(),
            ));
            return self.escalate(result).await;
        }
        let values = rows.swap_remove(0);
        let result = self.statement_state_mut(id)?.outputs.fill(values);
        self.escalate(result).await
    }

    /// Discards a half-built request after a local failure. Stream failures
    /// have already torn the session down.
    pub(crate) fn abandon_request(&mut self, err: MuxError) -> MuxError {
        if !err.invalidates_session() && self.is_open() {
            self.transport.reset();
        }
        err
    }

    pub(crate) async fn execute_batch(&mut self, id: StatementId) -> Result<Vec<BatchStatus>> {
        self.ensure_open()?;
        let (columns, rows) = {
            let state = self.statement_state_mut(id)?;
            if state.kind == StatementKind::Plain {
                return Err(MuxError::NotSupported(
                    "plain statements cannot be batched".into(),
                ));
            }
            state.batch.take()
        };
        if !self.config.batch.enabled {
            return Err(MuxError::Configuration(
                "batch execution is disabled by configuration".into(),
            ));
        }
        if rows == 0 {
            return Ok(Vec::new());
        }

        self.init_execute(id).await?;
        let plan = self.prepare_plan(id).await?;
        if columns.len() > plan.param_count() {
            let err = MuxError::Configuration(format!(
                "batch binds {} parameters but the statement has {} placeholders",
                columns.len(),
                plan.param_count()
            ));
            return Err(self.abandon_request(err));
        }
        for (idx, column) in columns.into_iter().enumerate() {
            let name = plan.param_name(idx + 1);
            let result = bounded(
                self.response_timeout(),
                self.transport
                    .bind_array(&name, column.max_width, column.bind_type, column.values),
            )
            .await;
            self.escalate(result).await?;
        }
        counter!("muxsql_batch_rows_total").increment(rows as u64);

        let autocommit = self.autocommit;
        match bounded(self.response_timeout(), self.transport.exec_dml(autocommit)).await {
            Ok(()) => Ok(all_succeeded(rows)),
            Err(MuxError::Sql { message, .. }) | Err(MuxError::Server(message)) => {
                counter!("muxsql_batch_failure_total").increment(1);
                warn!(session = %self.id, rows, error = %message, "batch execution failed");
                let statuses = decode_batch_failure(&message, rows);
                Err(MuxError::BatchPartialFailure { statuses, message })
            }
            Err(err) => self.escalate(Err(err)).await,
        }
    }
}
