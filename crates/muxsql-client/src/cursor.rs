use crate::registry::StatementId;
use crate::session::{bounded, Session};
use metrics::counter;
use muxsql_core::{decode, ColumnMeta, FromWire, MuxError, Result, Row};
use muxsql_protocol::{PlanEntry, Transport};
use std::sync::Arc;

/// Buffered window of a forward-only result. Lives in its statement's slot.
#[derive(Debug)]
pub(crate) struct CursorState {
    plan: Arc<PlanEntry>,
    rows: Vec<Row>,
    position: Option<usize>,
    pub(crate) fetch_size: u32,
    max_rows: u64,
    yielded: u64,
    pub(crate) exhausted: bool,
    was_null: bool,
}

impl CursorState {
    pub(crate) fn new(plan: Arc<PlanEntry>, fetch_size: u32, max_rows: u64) -> Self {
        Self {
            plan,
            rows: Vec::new(),
            position: None,
            fetch_size,
            max_rows,
            yielded: 0,
            exhausted: false,
            was_null: false,
        }
    }

    fn limit_reached(&self) -> bool {
        self.max_rows > 0 && self.yielded >= self.max_rows
    }

    fn advance(&mut self) -> bool {
        let next = self.position.map_or(0, |pos| pos + 1);
        if next < self.rows.len() {
            self.position = Some(next);
            self.yielded += 1;
            true
        } else {
            false
        }
    }

    fn mark_exhausted_if_short(&mut self, received: usize) {
        if self.fetch_size == 0 || received < self.fetch_size as usize {
            self.exhausted = true;
        }
    }

    /// Replaces the window with a freshly fetched one.
    fn load_window(&mut self, rows: Vec<Row>) {
        self.mark_exhausted_if_short(rows.len());
        self.rows = rows;
        self.position = None;
    }

    /// Adds rows fetched while draining; they stay readable only if `keep`.
    pub(crate) fn append(&mut self, rows: Vec<Row>, keep: bool) {
        self.mark_exhausted_if_short(rows.len());
        if keep {
            self.rows.extend(rows);
        }
    }

    fn current_row(&self) -> Result<&Row> {
        self.position
            .and_then(|pos| self.rows.get(pos))
            .ok_or_else(|| MuxError::InvalidArgument("cursor is not positioned on a row".into()))
    }

    fn read<V: FromWire>(&mut self, column: usize) -> Result<V> {
        let row = self.current_row()?;
        let bytes = column
            .checked_sub(1)
            .and_then(|idx| row.get(idx))
            .ok_or_else(|| {
                MuxError::InvalidArgument(format!(
                    "column {column} is out of range 1..={}",
                    row.len()
                ))
            })?;
        let (value, was_null) = decode::<V>(bytes)?;
        self.was_null = was_null;
        Ok(value)
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        if self.plan.column_meta().is_none() {
            return Err(MuxError::Configuration(
                "column names are unavailable; enable statements.column_metadata".into(),
            ));
        }
        self.plan
            .column_index(name)
            .ok_or_else(|| MuxError::InvalidArgument(format!("no column named {name}")))
    }
}

/// Forward-only view over the rows of one executed query.
pub struct Cursor<'s, T: Transport> {
    session: &'s mut Session<T>,
    id: StatementId,
}

impl<'s, T: Transport> Cursor<'s, T> {
    pub(crate) fn new(session: &'s mut Session<T>, id: StatementId) -> Self {
        Self { session, id }
    }

    pub fn statement_id(&self) -> StatementId {
        self.id
    }

    /// Advances to the next row, fetching another window when the buffered
    /// one is used up. Returns false once the result is exhausted or the
    /// statement's row limit is reached.
    pub async fn next(&mut self) -> Result<bool> {
        self.session.ensure_open()?;
        loop {
            let state = self.session.cursor_state_mut(self.id)?;
            if state.limit_reached() {
                return Ok(false);
            }
            if state.advance() {
                return Ok(true);
            }
            if state.exhausted {
                self.session.release_active_cursor(self.id);
                return Ok(false);
            }
            let fetch_size = state.fetch_size;
            let result = bounded(
                self.session.response_timeout(),
                self.session.transport.fetch(fetch_size),
            )
            .await;
            let rows = self.session.escalate(result).await?;
            counter!("muxsql_fetch_total").increment(1);
            self.session.cursor_state_mut(self.id)?.load_window(rows);
        }
    }

    /// Decodes a 1-based column of the current row.
    pub fn get<V: FromWire>(&mut self, column: usize) -> Result<V> {
        self.session.ensure_open()?;
        self.session.cursor_state_mut(self.id)?.read(column)
    }

    pub fn get_by_name<V: FromWire>(&mut self, name: &str) -> Result<V> {
        self.session.ensure_open()?;
        let state = self.session.cursor_state_mut(self.id)?;
        let column = state.column_index(name)?;
        state.read(column)
    }

    /// Whether the last value read was the null sentinel.
    pub fn was_null(&self) -> bool {
        self.session
            .statements
            .get(self.id)
            .and_then(|state| state.cursor.as_ref())
            .map(|cursor| cursor.was_null)
            .unwrap_or(false)
    }

    pub fn columns(&self) -> Option<Arc<Vec<ColumnMeta>>> {
        self.session
            .statements
            .get(self.id)
            .and_then(|state| state.cursor.as_ref())
            .and_then(|cursor| cursor.plan.column_meta())
    }

    /// Drains whatever the proxy still holds for this result and discards
    /// the cursor.
    pub async fn close(self) -> Result<()> {
        self.session.ensure_open()?;
        self.session.drain_cursor(self.id, false).await?;
        if let Some(state) = self.session.statements.get_mut(self.id) {
            state.cursor = None;
        }
        Ok(())
    }
}
