use crate::error::{MuxError, Result};
use crate::value::{DATETIME_FORMAT, DATETIME_TZ_FORMAT};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

/// Decodes one column payload into a caller type. Zero-length payloads never
/// reach `from_wire`; readers substitute `null_value()` and flag the read.
pub trait FromWire: Sized {
    fn from_wire(bytes: &[u8]) -> Result<Self>;

    fn null_value() -> Self;
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|err| MuxError::Conversion(err.to_string()))
}

fn parse_number<T>(bytes: &[u8], target: &str) -> Result<T>
where
    T: std::str::FromStr,
{
    let text = utf8(bytes)?;
    text.trim()
        .parse::<T>()
        .map_err(|_| MuxError::Conversion(format!("cannot read {text:?} as {target}")))
}

macro_rules! numeric_from_wire {
    ($($ty:ty),*) => {
        $(
            impl FromWire for $ty {
                fn from_wire(bytes: &[u8]) -> Result<Self> {
                    parse_number(bytes, stringify!($ty))
                }

                fn null_value() -> Self {
                    <$ty>::default()
                }
            }
        )*
    };
}

numeric_from_wire!(i16, i32, i64, u32, u64, f32, f64);

impl FromWire for bool {
    fn from_wire(bytes: &[u8]) -> Result<Self> {
        match bytes {
            b"1" | b"true" | b"TRUE" => Ok(true),
            b"0" | b"false" | b"FALSE" => Ok(false),
            other => Err(MuxError::Conversion(format!(
                "cannot read {:?} as bool",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    fn null_value() -> Self {
        false
    }
}

impl FromWire for String {
    fn from_wire(bytes: &[u8]) -> Result<Self> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn null_value() -> Self {
        String::new()
    }
}

impl FromWire for Vec<u8> {
    fn from_wire(bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }

    fn null_value() -> Self {
        Vec::new()
    }
}

impl FromWire for Bytes {
    fn from_wire(bytes: &[u8]) -> Result<Self> {
        Ok(Bytes::copy_from_slice(bytes))
    }

    fn null_value() -> Self {
        Bytes::new()
    }
}

impl FromWire for NaiveDateTime {
    fn from_wire(bytes: &[u8]) -> Result<Self> {
        let text = utf8(bytes)?;
        if let Ok(value) = NaiveDateTime::parse_from_str(text, DATETIME_FORMAT) {
            return Ok(value);
        }
        DateTime::<FixedOffset>::from_wire(bytes).map(|value| value.naive_local())
    }

    fn null_value() -> Self {
        NaiveDateTime::default()
    }
}

impl FromWire for NaiveDate {
    fn from_wire(bytes: &[u8]) -> Result<Self> {
        NaiveDateTime::from_wire(bytes).map(|value| value.date())
    }

    fn null_value() -> Self {
        NaiveDate::default()
    }
}

impl FromWire for NaiveTime {
    fn from_wire(bytes: &[u8]) -> Result<Self> {
        NaiveDateTime::from_wire(bytes).map(|value| value.time())
    }

    fn null_value() -> Self {
        NaiveTime::MIN
    }
}

impl FromWire for DateTime<FixedOffset> {
    fn from_wire(bytes: &[u8]) -> Result<Self> {
        let text = utf8(bytes)?;
        let normalized = match text.strip_suffix('Z') {
            Some(head) => format!("{head}+00:00"),
            None => text.to_string(),
        };
        if let Ok(value) = DateTime::parse_from_str(&normalized, DATETIME_TZ_FORMAT) {
            return Ok(value);
        }
        // no zone on the wire: the value is taken as UTC
        NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
            .map(|value| value.and_utc().fixed_offset())
            .map_err(|err| MuxError::Conversion(format!("cannot read {text:?} as timestamp: {err}")))
    }

    fn null_value() -> Self {
        DateTime::<FixedOffset>::default()
    }
}

impl<T: FromWire> FromWire for Option<T> {
    fn from_wire(bytes: &[u8]) -> Result<Self> {
        T::from_wire(bytes).map(Some)
    }

    fn null_value() -> Self {
        None
    }
}

/// Decodes a payload, treating zero length as null. Returns the decoded
/// value and whether it was null.
pub fn decode<T: FromWire>(bytes: &[u8]) -> Result<(T, bool)> {
    if bytes.is_empty() {
        return Ok((T::null_value(), true));
    }
    T::from_wire(bytes).map(|value| (value, false))
}
