use bytes::Bytes;
use muxsql_core::{decode, BindValue, FromWire, MuxError, Result};
use std::collections::BTreeMap;

/// Bound input values for one execution, keyed by 1-based position.
#[derive(Debug, Default, Clone)]
pub(crate) struct ParameterSet {
    values: BTreeMap<usize, BindValue>,
}

impl ParameterSet {
    pub(crate) fn set(&mut self, position: usize, value: BindValue) -> Result<()> {
        if position == 0 {
            return Err(MuxError::InvalidArgument(
                "parameter positions start at 1".into(),
            ));
        }
        self.values.insert(position, value);
        Ok(())
    }

    pub(crate) fn get(&self, position: usize) -> Option<&BindValue> {
        self.values.get(&position)
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn highest_position(&self) -> usize {
        self.values.keys().next_back().copied().unwrap_or(0)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &BindValue)> {
        self.values.iter().map(|(position, value)| (*position, value))
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }
}

/// Declared output positions of a callable statement and the values the
/// last execution returned for them.
#[derive(Debug, Default, Clone)]
pub(crate) struct OutputParameters {
    declared: BTreeMap<usize, Option<Bytes>>,
    was_null: bool,
}

impl OutputParameters {
    pub(crate) fn register(&mut self, position: usize) -> Result<()> {
        if position == 0 {
            return Err(MuxError::InvalidArgument(
                "parameter positions start at 1".into(),
            ));
        }
        self.declared.insert(position, None);
        Ok(())
    }

    /// Positions in ascending order, seeding each with a null placeholder.
    pub(crate) fn reset_values(&mut self) -> Vec<usize> {
        self.was_null = false;
        self.declared
            .iter_mut()
            .map(|(position, value)| {
                *value = None;
                *position
            })
            .collect()
    }

    pub(crate) fn fill(&mut self, values: Vec<Bytes>) -> Result<()> {
        if values.len() < self.declared.len() {
            return Err(MuxError::Protocol(format!(
                "expected {} output values, got {}",
                self.declared.len(),
                values.len()
            )));
        }
        for (slot, value) in self.declared.values_mut().zip(values) {
            *slot = Some(value);
        }
        Ok(())
    }

    pub(crate) fn read<V: FromWire>(&mut self, position: usize) -> Result<V> {
        let slot = self
            .declared
            .get(&position)
            .ok_or(MuxError::UnregisteredOutParameter(position))?;
        let bytes = slot.as_deref().unwrap_or_default();
        let (value, was_null) = decode::<V>(bytes)?;
        self.was_null = was_null;
        Ok(value)
    }

    pub(crate) fn was_null(&self) -> bool {
        self.was_null
    }

    pub(crate) fn clear(&mut self) {
        self.declared.clear();
        self.was_null = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outputs_fill_in_ascending_position_order() {
        let mut outputs = OutputParameters::default();
        outputs.register(3).expect("register");
        outputs.register(1).expect("register");
        assert_eq!(outputs.reset_values(), vec![1, 3]);
        outputs
            .fill(vec![Bytes::from_static(b"7"), Bytes::new()])
            .expect("fill");
        assert_eq!(outputs.read::<i32>(1).expect("first"), 7);
        assert!(!outputs.was_null());
        assert_eq!(outputs.read::<i32>(3).expect("second"), 0);
        assert!(outputs.was_null());
        assert!(matches!(
            outputs.read::<i32>(2),
            Err(MuxError::UnregisteredOutParameter(2))
        ));
    }

    #[test]
    fn short_output_row_is_a_protocol_error() {
        let mut outputs = OutputParameters::default();
        outputs.register(1).expect("register");
        outputs.register(2).expect("register");
        let err = outputs.fill(vec![Bytes::new()]).expect_err("short row");
        assert!(err.invalidates_session());
    }

    #[test]
    fn position_zero_is_rejected() {
        let mut params = ParameterSet::default();
        assert!(matches!(
            params.set(0, BindValue::int(1)),
            Err(MuxError::InvalidArgument(_))
        ));
        params.set(4, BindValue::int(1)).expect("bind");
        assert_eq!(params.highest_position(), 4);
    }
}
