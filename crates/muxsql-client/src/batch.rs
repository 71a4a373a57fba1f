use crate::params::ParameterSet;
use bytes::Bytes;
use muxsql_core::{BatchStatus, BindType, MuxError, Result};

/// One parameter position across every accumulated row.
#[derive(Debug, Clone)]
pub(crate) struct BatchColumn {
    pub(crate) bind_type: BindType,
    pub(crate) values: Vec<Bytes>,
    pub(crate) max_width: usize,
}

/// Column-oriented rows collected by `add_batch`. The first row fixes the
/// width; every later row must bind exactly the same positions.
#[derive(Debug, Default)]
pub(crate) struct BatchAccumulator {
    columns: Vec<BatchColumn>,
    rows: usize,
}

impl BatchAccumulator {
    /// Moves the current parameter set into the accumulator and clears it.
    pub(crate) fn add_row(&mut self, params: &mut ParameterSet) -> Result<()> {
        let width = params.len();
        if width == 0 {
            return Err(MuxError::InvalidArgument(
                "add_batch called with no bound parameters".into(),
            ));
        }
        if params.highest_position() != width {
            return Err(MuxError::InvalidArgument(format!(
                "batch rows must bind positions 1..={width} without gaps"
            )));
        }
        if self.rows == 0 {
            self.columns = params
                .iter()
                .map(|(_, value)| BatchColumn {
                    bind_type: value.bind_type,
                    values: Vec::new(),
                    max_width: 0,
                })
                .collect();
        } else if width != self.columns.len() {
            return Err(MuxError::Configuration(format!(
                "batch row binds {width} parameters but earlier rows bind {}",
                self.columns.len()
            )));
        }

        for (column, (_, value)) in self.columns.iter_mut().zip(params.iter()) {
            column.max_width = column.max_width.max(value.width());
            column.values.push(value.payload.clone());
        }
        self.rows += 1;
        params.clear();
        Ok(())
    }

    pub(crate) fn rows(&self) -> usize {
        self.rows
    }

    pub(crate) fn clear(&mut self) {
        self.columns.clear();
        self.rows = 0;
    }

    /// Empties the accumulator, returning its columns and row count.
    pub(crate) fn take(&mut self) -> (Vec<BatchColumn>, usize) {
        let rows = std::mem::take(&mut self.rows);
        (std::mem::take(&mut self.columns), rows)
    }
}

pub fn all_succeeded(rows: usize) -> Vec<BatchStatus> {
    vec![BatchStatus::SucceededNoInfo; rows]
}

/// Per-row statuses from a failed array DML. The server text reads
/// `<code> <n> <offset> <code> ... <message>` with `n` counting the offset
/// and code tokens and offsets zero-based. Anything undecodable fails every
/// row.
pub fn decode_batch_failure(message: &str, rows: usize) -> Vec<BatchStatus> {
    let all_failed = vec![BatchStatus::Failed; rows];
    if rows == 1 {
        return all_failed;
    }
    let mut tokens = message.split_whitespace();
    let _code = tokens.next();
    let Some(count) = tokens.next().and_then(|token| token.parse::<usize>().ok()) else {
        return all_failed;
    };

    let mut statuses = all_succeeded(rows);
    for _ in 0..count / 2 {
        let offset = tokens.next().and_then(|token| token.parse::<usize>().ok());
        let _row_code = tokens.next();
        match offset {
            Some(offset) if offset < rows => statuses[offset] = BatchStatus::Failed,
            _ => return all_failed,
        }
    }
    statuses
}

#[cfg(test)]
mod tests {
    use super::*;
    use muxsql_core::BindValue;

    fn row(values: &[&'static str]) -> ParameterSet {
        let mut params = ParameterSet::default();
        for (idx, value) in values.iter().enumerate() {
            params
                .set(idx + 1, BindValue::new(BindType::String, *value))
                .expect("bind");
        }
        params
    }

    #[test]
    fn rows_accumulate_column_wise() {
        let mut acc = BatchAccumulator::default();
        let mut first = row(&["1", "alpha"]);
        acc.add_row(&mut first).expect("first");
        assert_eq!(first.len(), 0);
        acc.add_row(&mut row(&["22", "b"])).expect("second");
        let (columns, rows) = acc.take();
        assert_eq!(rows, 2);
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].max_width, 2);
        assert_eq!(columns[1].max_width, 5);
        assert_eq!(columns[1].values, vec![Bytes::from("alpha"), Bytes::from("b")]);
        assert_eq!(acc.rows(), 0);
    }

    #[test]
    fn row_width_is_fixed_by_first_row() {
        let mut acc = BatchAccumulator::default();
        acc.add_row(&mut row(&["1", "2"])).expect("first");
        let mut short = row(&["1"]);
        let err = acc.add_row(&mut short).expect_err("mismatch");
        assert!(matches!(err, MuxError::Configuration(_)));
        assert_eq!(acc.rows(), 1);
        assert_eq!(short.len(), 1);
    }

    #[test]
    fn gaps_are_rejected() {
        let mut acc = BatchAccumulator::default();
        let mut params = ParameterSet::default();
        params.set(2, BindValue::int(1)).expect("bind");
        assert!(matches!(
            acc.add_row(&mut params),
            Err(MuxError::InvalidArgument(_))
        ));
    }

    #[test]
    fn decodes_failed_offsets() {
        let statuses = decode_batch_failure("1 4 2 1 4 1 ORA-00001: unique constraint violated", 6);
        let failed: Vec<usize> = statuses
            .iter()
            .enumerate()
            .filter(|(_, status)| **status == BatchStatus::Failed)
            .map(|(idx, _)| idx)
            .collect();
        assert_eq!(statuses.len(), 6);
        assert_eq!(failed, vec![2, 4]);
    }

    #[test]
    fn undecodable_text_fails_every_row() {
        let statuses = decode_batch_failure("ORA-00001: unique constraint violated", 3);
        assert_eq!(statuses, vec![BatchStatus::Failed; 3]);
        let statuses = decode_batch_failure("1 2 9 1 offset out of range", 3);
        assert_eq!(statuses, vec![BatchStatus::Failed; 3]);
    }

    #[test]
    fn single_row_failure_needs_no_decoding() {
        assert_eq!(decode_batch_failure("garbage", 1), vec![BatchStatus::Failed]);
    }
}
