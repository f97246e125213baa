//! Value normalization.
//!
//! Maps a [`RawValue`] onto the [`Value`] for a column's [`CanonicalType`].
//! This is the only place where null and zero-value policy lives:
//!
//! | Canonical type                          | Null / zero sentinel |
//! |-----------------------------------------|----------------------|
//! | `int`                                   | `0`                  |
//! | `float`                                 | `0.0`                |
//! | `bool`                                  | `false`              |
//! | `string`, `date`, `uuid`, `timestamp`, `null` | `""`           |
//!
//! A non-null value that cannot be represented in the declared type is
//! replaced by the sentinel and reported as a [`ConversionWarning`].
//! Temporal values are rendered as RFC 3339 text in UTC.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use tracing::warn;

use super::types::CanonicalType;
use super::value::{RawValue, Value};

/// A non-fatal value conversion problem.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionWarning {
    /// Field the value belonged to.
    pub field: String,

    /// Declared canonical type.
    pub expected: CanonicalType,

    /// Representation that was received.
    pub raw_kind: &'static str,

    /// Why the value could not be used.
    pub detail: String,
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot convert {} value to {} for field '{}': {}; using zero value",
            self.raw_kind, self.expected, self.field, self.detail
        )
    }
}

/// Zero-value sentinel for a canonical type.
pub fn zero_value(ty: CanonicalType) -> Value {
    match ty {
        CanonicalType::Int => Value::Int(0),
        CanonicalType::Float => Value::Float(0.0),
        CanonicalType::Bool => Value::Bool(false),
        CanonicalType::String
        | CanonicalType::Timestamp
        | CanonicalType::Date
        | CanonicalType::Uuid
        | CanonicalType::Null => Value::Text(String::new()),
    }
}

/// Normalize one raw value for `field`.
///
/// Returns the normalized value and, when the sentinel had to be
/// substituted for a non-null input, the warning describing why.
pub fn normalize(
    field: &str,
    ty: CanonicalType,
    raw: RawValue,
) -> (Value, Option<ConversionWarning>) {
    let raw_kind = raw.kind();
    match coerce(raw, ty) {
        Ok(value) => (value, None),
        Err(detail) => (
            zero_value(ty),
            Some(ConversionWarning {
                field: field.to_string(),
                expected: ty,
                raw_kind,
                detail,
            }),
        ),
    }
}

/// Stateful normalizer that logs and counts conversion warnings.
#[derive(Debug, Default)]
pub struct ValueNormalizer {
    warnings: u64,
}

impl ValueNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a value, logging any conversion warning.
    pub fn normalize(&mut self, field: &str, ty: CanonicalType, raw: RawValue) -> Value {
        let (value, warning) = normalize(field, ty, raw);
        if let Some(w) = warning {
            self.warnings += 1;
            warn!("{}", w);
        }
        value
    }

    /// Number of conversion warnings seen so far.
    pub fn warnings(&self) -> u64 {
        self.warnings
    }
}

fn coerce(raw: RawValue, ty: CanonicalType) -> Result<Value, String> {
    if raw.is_null() {
        return Ok(zero_value(ty));
    }

    match ty {
        CanonicalType::Int => to_int(raw).map(Value::Int),
        CanonicalType::Float => to_float(raw).map(Value::Float),
        CanonicalType::Bool => to_bool(raw).map(Value::Bool),
        CanonicalType::String | CanonicalType::Null => Ok(Value::Text(render_text(raw))),
        CanonicalType::Uuid => match raw {
            RawValue::Uuid(u) => Ok(Value::Text(u.hyphenated().to_string())),
            RawValue::Text(s) => Ok(Value::Text(s)),
            other => Err(format!("unexpected {} value", other.kind())),
        },
        CanonicalType::Timestamp | CanonicalType::Date => match raw {
            RawValue::TimestampTz(ts) => Ok(Value::Text(format_timestamp(ts))),
            RawValue::Timestamp(ts) => Ok(Value::Text(format_naive_timestamp(ts))),
            RawValue::Date(d) => Ok(Value::Text(format_date(d))),
            RawValue::Text(s) => Ok(Value::Text(s)),
            other => Err(format!("unexpected {} value", other.kind())),
        },
    }
}

fn to_int(raw: RawValue) -> Result<i64, String> {
    match raw {
        RawValue::Int(i) => Ok(i),
        RawValue::Float(f) => {
            // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
            if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                Ok(f.trunc() as i64)
            } else {
                Err(format!("{} is outside the int range", f))
            }
        }
        RawValue::Bool(b) => Ok(i64::from(b)),
        RawValue::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("'{}' is not an integer: {}", s, e)),
        other => Err(format!("unexpected {} value", other.kind())),
    }
}

fn to_float(raw: RawValue) -> Result<f64, String> {
    match raw {
        RawValue::Float(f) => Ok(f),
        RawValue::Int(i) => Ok(i as f64),
        RawValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("'{}' is not a number: {}", s, e)),
        other => Err(format!("unexpected {} value", other.kind())),
    }
}

fn to_bool(raw: RawValue) -> Result<bool, String> {
    match raw {
        RawValue::Bool(b) => Ok(b),
        RawValue::Int(0) => Ok(false),
        RawValue::Int(1) => Ok(true),
        RawValue::Int(i) => Err(format!("{} is not 0 or 1", i)),
        RawValue::Text(s) => match s.trim().to_lowercase().as_str() {
            "t" | "true" | "1" => Ok(true),
            "f" | "false" | "0" => Ok(false),
            _ => Err(format!("'{}' is not a boolean", s)),
        },
        other => Err(format!("unexpected {} value", other.kind())),
    }
}

fn render_text(raw: RawValue) -> String {
    match raw {
        RawValue::Null => String::new(),
        RawValue::Bool(b) => b.to_string(),
        RawValue::Int(i) => i.to_string(),
        RawValue::Float(f) => f.to_string(),
        RawValue::Text(s) => s,
        RawValue::Uuid(u) => u.hyphenated().to_string(),
        RawValue::Date(d) => format_date(d),
        RawValue::Timestamp(ts) => format_naive_timestamp(ts),
        RawValue::TimestampTz(ts) => format_timestamp(ts),
    }
}

/// RFC 3339 in UTC with a `Z` suffix.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn format_naive_timestamp(ts: NaiveDateTime) -> String {
    format_timestamp(ts.and_utc())
}

fn format_date(d: NaiveDate) -> String {
    format_naive_timestamp(d.and_time(NaiveTime::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    #[test]
    fn test_null_yields_documented_sentinel_for_every_type() {
        for ty in CanonicalType::ALL {
            let (value, warning) = normalize("f", ty, RawValue::Null);
            assert!(warning.is_none(), "{ty}");
            let expected = match ty {
                CanonicalType::Int => Value::Int(0),
                CanonicalType::Float => Value::Float(0.0),
                CanonicalType::Bool => Value::Bool(false),
                _ => Value::Text(String::new()),
            };
            assert_eq!(value, expected, "{ty}");
            assert_eq!(value, zero_value(ty));
            assert_eq!(value.storage(), ty.storage());
        }
    }

    #[test]
    fn test_int_coercions() {
        assert_eq!(normalize("n", CanonicalType::Int, RawValue::Int(42)).0, Value::Int(42));
        assert_eq!(
            normalize("n", CanonicalType::Int, RawValue::Float(-3.9)).0,
            Value::Int(-3)
        );
        assert_eq!(normalize("n", CanonicalType::Int, RawValue::Bool(true)).0, Value::Int(1));
        assert_eq!(
            normalize("n", CanonicalType::Int, RawValue::Text(" 17 ".into())).0,
            Value::Int(17)
        );
    }

    #[test]
    fn test_int_out_of_range_float_warns() {
        let (value, warning) = normalize("n", CanonicalType::Int, RawValue::Float(f64::NAN));
        assert_eq!(value, Value::Int(0));
        let warning = warning.unwrap();
        assert_eq!(warning.field, "n");
        assert_eq!(warning.expected, CanonicalType::Int);
        assert_eq!(warning.raw_kind, "float");

        let (value, warning) = normalize("n", CanonicalType::Int, RawValue::Float(1e30));
        assert_eq!(value, Value::Int(0));
        assert!(warning.is_some());
    }

    #[test]
    fn test_int_from_uuid_warns() {
        let (value, warning) = normalize("n", CanonicalType::Int, RawValue::Uuid(Uuid::nil()));
        assert_eq!(value, Value::Int(0));
        assert!(warning.unwrap().to_string().contains("uuid"));
    }

    #[test]
    fn test_float_coercions() {
        assert_eq!(
            normalize("x", CanonicalType::Float, RawValue::Int(3)).0,
            Value::Float(3.0)
        );
        assert_eq!(
            normalize("x", CanonicalType::Float, RawValue::Text("2.5".into())).0,
            Value::Float(2.5)
        );
        let (value, warning) = normalize("x", CanonicalType::Float, RawValue::Bool(true));
        assert_eq!(value, Value::Float(0.0));
        assert!(warning.is_some());
    }

    #[test]
    fn test_bool_coercions() {
        assert_eq!(
            normalize("b", CanonicalType::Bool, RawValue::Text("T".into())).0,
            Value::Bool(true)
        );
        assert_eq!(
            normalize("b", CanonicalType::Bool, RawValue::Int(0)).0,
            Value::Bool(false)
        );
        let (value, warning) = normalize("b", CanonicalType::Bool, RawValue::Int(7));
        assert_eq!(value, Value::Bool(false));
        assert!(warning.is_some());
    }

    #[test]
    fn test_string_renders_every_kind_without_warning() {
        let cases = [
            (RawValue::Int(5), "5"),
            (RawValue::Bool(true), "true"),
            (RawValue::Float(1.5), "1.5"),
            (RawValue::Text("hi".into()), "hi"),
        ];
        for (raw, expected) in cases {
            let (value, warning) = normalize("s", CanonicalType::String, raw);
            assert!(warning.is_none());
            assert_eq!(value, Value::Text(expected.to_string()));
        }
    }

    #[test]
    fn test_uuid_is_lowercase_hyphenated() {
        let id = Uuid::parse_str("A1A2A3A4-B1B2-C1C2-D1D2-D3D4D5D6D7D8").unwrap();
        assert_eq!(
            normalize("id", CanonicalType::Uuid, RawValue::Uuid(id)).0,
            Value::Text("a1a2a3a4-b1b2-c1c2-d1d2-d3d4d5d6d7d8".into())
        );
    }

    #[test]
    fn test_timestamps_render_rfc3339_utc() {
        let tz = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(
            normalize("t", CanonicalType::Timestamp, RawValue::TimestampTz(tz)).0,
            Value::Text("2024-03-01T12:30:05Z".into())
        );

        let naive = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_milli_opt(8, 0, 0, 250)
            .unwrap();
        assert_eq!(
            normalize("t", CanonicalType::Timestamp, RawValue::Timestamp(naive)).0,
            Value::Text("2024-03-01T08:00:00.250Z".into())
        );

        let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert_eq!(
            normalize("d", CanonicalType::Date, RawValue::Date(date)).0,
            Value::Text("2023-12-31T00:00:00Z".into())
        );
    }

    #[test]
    fn test_time_of_day_text_is_kept() {
        assert_eq!(
            normalize("t", CanonicalType::Timestamp, RawValue::Text("13:45:00".into())).0,
            Value::Text("13:45:00".into())
        );
    }

    #[test]
    fn test_normalizer_counts_warnings() {
        let mut normalizer = ValueNormalizer::new();
        normalizer.normalize("a", CanonicalType::Int, RawValue::Int(1));
        normalizer.normalize("a", CanonicalType::Int, RawValue::Text("abc".into()));
        normalizer.normalize("b", CanonicalType::Date, RawValue::Bool(false));
        assert_eq!(normalizer.warnings(), 2);
    }
}
