use crate::params::ParameterSet;
use bytes::{BufMut, Bytes, BytesMut};
use muxsql_core::{scuttle_id, BindValue, MuxError, Result};
use muxsql_protocol::ShardingInfo;

/// Reserved hint key that pins the session to an explicit shard.
pub const SHARD_ID_KEY: &str = "shardid";

/// Session routing mode. Pinning and a pending key payload are mutually
/// exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) enum ShardState {
    #[default]
    Unset,
    Pinned(i32),
    KeyPayload(Bytes),
}

impl ShardState {
    pub(crate) fn check_pin(&self) -> Result<()> {
        match self {
            ShardState::KeyPayload(_) => Err(MuxError::ShardHintConflict(
                "a shard key hint is pending; reset shard hints before pinning a shard".into(),
            )),
            _ => Ok(()),
        }
    }

    pub(crate) fn check_key(&self) -> Result<()> {
        match self {
            ShardState::Pinned(shard) => Err(MuxError::ShardHintConflict(format!(
                "session is pinned to shard {shard}; reset shard hints before setting a key"
            ))),
            _ => Ok(()),
        }
    }

    pub(crate) fn is_pinned(&self) -> bool {
        matches!(self, ShardState::Pinned(_))
    }

    pub(crate) fn take_payload(&mut self) -> Option<Bytes> {
        match std::mem::take(self) {
            ShardState::KeyPayload(payload) => Some(payload),
            other => {
                *self = other;
                None
            }
        }
    }
}

/// Shard key payload for one execution plus the routing ids to bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DerivedShardKey {
    pub(crate) payload: Bytes,
    pub(crate) scuttle_binds: Vec<(usize, BindValue)>,
}

/// Joins the bound key fragments into `<key>=<f1>;<f2>...` and computes one
/// scuttle id per fragment for its paired position.
pub(crate) fn derive_shard_key(
    info: &ShardingInfo,
    params: &ParameterSet,
) -> Result<Option<DerivedShardKey>> {
    if info.key_positions.is_empty() {
        return Ok(None);
    }
    if info.key_positions.len() != info.scuttle_positions.len() {
        return Err(MuxError::Configuration(format!(
            "shard key {} declares {} key positions but {} scuttle id positions",
            info.key_name,
            info.key_positions.len(),
            info.scuttle_positions.len()
        )));
    }

    let mut payload = BytesMut::with_capacity(info.key_name.len() + 16);
    payload.put_slice(info.key_name.as_bytes());
    payload.put_u8(b'=');
    let mut scuttle_binds = Vec::with_capacity(info.scuttle_positions.len());
    for (idx, (key_pos, scuttle_pos)) in info
        .key_positions
        .iter()
        .zip(&info.scuttle_positions)
        .enumerate()
    {
        let fragment = params.get(*key_pos).ok_or_else(|| {
            MuxError::Configuration(format!("shard key position {key_pos} is not bound"))
        })?;
        if idx > 0 {
            payload.put_u8(b';');
        }
        payload.put_slice(&fragment.payload);
        let id = scuttle_id(&fragment.payload);
        scuttle_binds.push((*scuttle_pos, BindValue::int(i64::from(id))));
    }
    Ok(Some(DerivedShardKey {
        payload: payload.freeze(),
        scuttle_binds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use muxsql_core::BindType;

    fn info(keys: Vec<usize>, scuttles: Vec<usize>) -> ShardingInfo {
        ShardingInfo {
            key_name: "account_id".into(),
            key_positions: keys,
            scuttle_positions: scuttles,
        }
    }

    #[test]
    fn joins_fragments_and_binds_one_id_each() {
        let mut params = ParameterSet::default();
        params.set(1, BindValue::new(BindType::String, "111777")).expect("bind");
        params.set(2, BindValue::new(BindType::String, "42")).expect("bind");
        let derived = derive_shard_key(&info(vec![1, 2], vec![3, 4]), &params)
            .expect("derive")
            .expect("sharded");
        assert_eq!(&derived.payload[..], b"account_id=111777;42");
        assert_eq!(
            derived.scuttle_binds,
            vec![(3, BindValue::int(756)), (4, BindValue::int(637))]
        );
    }

    #[test]
    fn mismatched_layout_is_configuration_error() {
        let params = ParameterSet::default();
        let err = derive_shard_key(&info(vec![1, 2], vec![3]), &params).expect_err("mismatch");
        assert!(matches!(err, MuxError::Configuration(_)));
    }

    #[test]
    fn payload_and_pin_exclude_each_other() {
        let pinned = ShardState::Pinned(3);
        assert!(pinned.check_pin().is_ok());
        assert!(matches!(pinned.check_key(), Err(MuxError::ShardHintConflict(_))));

        let mut pending = ShardState::KeyPayload(Bytes::from_static(b"k=1"));
        assert!(matches!(pending.check_pin(), Err(MuxError::ShardHintConflict(_))));
        assert_eq!(pending.take_payload(), Some(Bytes::from_static(b"k=1")));
        assert_eq!(pending, ShardState::Unset);

        let mut pinned = ShardState::Pinned(1);
        assert_eq!(pinned.take_payload(), None);
        assert!(pinned.is_pinned());
    }
}
