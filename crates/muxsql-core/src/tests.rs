#[cfg(test)]
mod tests {
    use crate::convert::decode;
    use crate::error::MuxError;
    use crate::murmur::{murmur3_32, scuttle_id, SCUTTLE_SEED};
    use crate::sqlstate::state_and_vendor_code;
    use crate::types::{BindType, SqlType};
    use crate::value::SqlValue;
    use bytes::Bytes;
    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

    #[test]
    fn murmur_matches_known_digests() {
        assert_eq!(
            murmur3_32(b"The quick brown fox jumps over the lazy dog", SCUTTLE_SEED),
            1696781095
        );
        assert_eq!(murmur3_32(b"The", SCUTTLE_SEED), -1032052823);
    }

    #[test]
    fn scuttle_id_hashes_numeric_keys_as_i64() {
        assert_eq!(scuttle_id(b"1703900906402232986"), 470);
        assert_eq!(scuttle_id(b"111777"), 756);
        assert_eq!(scuttle_id(b"42"), 637);
        assert_eq!(scuttle_id(b"7"), 176);
    }

    #[test]
    fn scuttle_id_accepts_non_numeric_keys() {
        let id = scuttle_id(b"abc-key");
        assert!(id < 1024);
        assert_eq!(id, scuttle_id(b"abc-key"));
    }

    #[test]
    fn scalar_encoding_uses_expected_tags() {
        let int = SqlValue::Int(-12).encode(false).expect("int");
        assert_eq!(int.bind_type, BindType::Int);
        assert_eq!(&int.payload[..], b"-12");

        let long = SqlValue::Long(9_000_000_000).encode(false).expect("long");
        assert_eq!(long.bind_type, BindType::String);
        assert_eq!(&long.payload[..], b"9000000000");

        let flag = SqlValue::Bool(true).encode(false).expect("bool");
        assert_eq!(flag.bind_type, BindType::Boolean);
        assert_eq!(&flag.payload[..], b"1");

        let raw = SqlValue::from(vec![0u8, 1, 2]).encode(false).expect("raw");
        assert_eq!(raw.bind_type, BindType::Raw);
    }

    #[test]
    fn temporal_values_use_day_first_format() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 7)
            .and_then(|d| d.and_hms_milli_opt(13, 5, 9, 42))
            .expect("timestamp");
        let bound = SqlValue::Timestamp(ts).encode(false).expect("encode");
        assert_eq!(bound.bind_type, BindType::Timestamp);
        assert_eq!(&bound.payload[..], b"07-03-2024 13:05:09.042");

        let zoned: DateTime<FixedOffset> = DateTime::parse_from_rfc3339("2024-03-07T13:05:09.042+05:30")
            .expect("zoned");
        let bound = SqlValue::TimestampTz(zoned).encode(false).expect("encode");
        assert_eq!(bound.bind_type, BindType::TimestampTz);
        assert_eq!(&bound.payload[..], b"07-03-2024 13:05:09.042 +05:30");
        assert_eq!(bound.payload.len(), 30);
    }

    #[test]
    fn typed_nulls_keep_their_tag() {
        let cases = [
            (SqlType::Varchar, false, BindType::String),
            (SqlType::Blob, false, BindType::BlobSingleRound),
            (SqlType::Clob, false, BindType::ClobSingleRound),
            (SqlType::Varbinary, false, BindType::Raw),
            (SqlType::LongVarbinary, false, BindType::Raw),
            (SqlType::Timestamp, false, BindType::String),
            (SqlType::Timestamp, true, BindType::Timestamp),
            (SqlType::Date, true, BindType::Timestamp),
            (SqlType::Integer, true, BindType::String),
        ];
        for (sql_type, fix, expected) in cases {
            let bound = SqlValue::Null(sql_type).encode(fix).expect("null");
            assert!(bound.is_null());
            assert_eq!(bound.bind_type, expected, "{sql_type:?}");
        }
    }

    #[test]
    fn unsupported_kinds_fail_closed() {
        let err = SqlValue::Url("http://example.com".into())
            .encode(false)
            .expect_err("url");
        assert_eq!(err, MuxError::UnsupportedBindKind("url".into()));
        let err = SqlValue::Array(vec![SqlValue::Int(1)])
            .encode(false)
            .expect_err("array");
        assert!(matches!(err, MuxError::UnsupportedBindKind(kind) if kind == "array"));
    }

    #[test]
    fn decode_reports_null_for_every_type() {
        let (v, null): (i32, bool) = decode(b"").expect("i32");
        assert!(null && v == 0);
        let (v, null): (String, bool) = decode(b"").expect("string");
        assert!(null && v.is_empty());
        let (v, null): (Option<f64>, bool) = decode(b"").expect("opt");
        assert!(null && v.is_none());
        let (_, null): (NaiveDateTime, bool) = decode(b"").expect("ts");
        assert!(null);
        let (v, null): (bool, bool) = decode(b"").expect("bool");
        assert!(null && !v);
        let (v, null): (i16, bool) = decode(b"").expect("i16");
        assert!(null && v == 0);
        let (v, null): (i64, bool) = decode(b"").expect("i64");
        assert!(null && v == 0);
        let (v, null): (f32, bool) = decode(b"").expect("f32");
        assert!(null && v == 0.0);
        let (_, null): (NaiveDate, bool) = decode(b"").expect("date");
        assert!(null);
        let (_, null): (NaiveTime, bool) = decode(b"").expect("time");
        assert!(null);
        let (_, null): (DateTime<FixedOffset>, bool) = decode(b"").expect("tz");
        assert!(null);
        let (v, null): (Vec<u8>, bool) = decode(b"").expect("raw");
        assert!(null && v.is_empty());
        let (v, null): (Bytes, bool) = decode(b"").expect("bytes");
        assert!(null && v.is_empty());
        let (v, null): (i64, bool) = decode(b"77").expect("i64");
        assert!(!null && v == 77);
    }

    #[test]
    fn decode_timestamps_with_and_without_zone() {
        let (ts, _): (NaiveDateTime, bool) = decode(b"07-03-2024 13:05:09.042").expect("ts");
        assert_eq!(ts.to_string(), "2024-03-07 13:05:09.042");
        let (zoned, _): (DateTime<FixedOffset>, bool) =
            decode(b"07-03-2024 13:05:09.042 -07:00").expect("tz");
        assert_eq!(zoned.offset().local_minus_utc(), -7 * 3600);
        let (utc, _): (DateTime<FixedOffset>, bool) =
            decode(b"07-03-2024 13:05:09.042 Z").expect("z");
        assert_eq!(utc.offset().local_minus_utc(), 0);
        let (date, _): (NaiveDate, bool) = decode(b"07-03-2024 00:00:00.000").expect("date");
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 7).expect("date"));
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode::<i32>(b"twelve").expect_err("garbage");
        assert!(matches!(err, MuxError::Conversion(_)));
        let err = decode::<bool>(b"maybe").expect_err("bool");
        assert!(matches!(err, MuxError::Conversion(_)));
    }

    #[test]
    fn sql_errors_resolve_state_and_vendor_code() {
        assert_eq!(
            state_and_vendor_code("ORA-00001: unique constraint violated"),
            ("23000", 1)
        );
        assert_eq!(state_and_vendor_code("SQL-02121: not connected"), ("08003", 2121));
        assert_eq!(state_and_vendor_code("ORA-20001: app error"), ("99999", 20001));
        assert_eq!(state_and_vendor_code("something broke"), ("99999", 0));

        match MuxError::sql("ORA-01400: cannot insert NULL") {
            MuxError::Sql {
                sql_state,
                vendor_code,
                ..
            } => {
                assert_eq!(sql_state, "72000");
                assert_eq!(vendor_code, 1400);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn only_stream_errors_invalidate_the_session() {
        assert!(MuxError::Io("reset".into()).invalidates_session());
        assert!(MuxError::Timeout("fetch".into()).invalidates_session());
        assert!(MuxError::Protocol("bad reply".into()).invalidates_session());
        assert!(!MuxError::Configuration("x".into()).invalidates_session());
        assert!(!MuxError::sql("ORA-00001").invalidates_session());
        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert!(matches!(MuxError::from(timed_out), MuxError::Timeout(_)));
    }
}
