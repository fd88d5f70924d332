use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr, time::Duration};

/// A non-negative duration written in Go's `time.Duration` string format
/// (e.g. `1m30s`, `250ms`).
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct K8sDuration(Duration);

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("invalid unit: {}", EXPECTED_UNITS)]
    InvalidUnit,

    #[error("missing a unit: {}", EXPECTED_UNITS)]
    NoUnit,

    #[error("durations must not be negative")]
    Negative,

    #[error("duration is too large")]
    Overflow,

    #[error("invalid floating-point number: {}", .0)]
    NotANumber(#[from] std::num::ParseFloatError),
}

const EXPECTED_UNITS: &str = "expected one of 'ns', 'us', '\u{00b5}s', 'ms', 's', 'm', or 'h'";

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);

impl From<Duration> for K8sDuration {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl From<K8sDuration> for Duration {
    fn from(K8sDuration(duration): K8sDuration) -> Self {
        duration
    }
}

impl K8sDuration {
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    #[inline]
    pub fn as_duration(&self) -> Duration {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Debug for K8sDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Formats like Go: sub-second values use the smallest exact unit, larger
/// values are split into hours, minutes and (fractional) seconds.
impl fmt::Display for K8sDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.0;
        if d.is_zero() {
            return f.write_str("0s");
        }
        if d < Duration::from_secs(1) {
            let nanos = d.subsec_nanos();
            return if nanos % 1_000_000 == 0 {
                write!(f, "{}ms", nanos / 1_000_000)
            } else if nanos % 1_000 == 0 {
                write!(f, "{}\u{00b5}s", nanos / 1_000)
            } else {
                write!(f, "{nanos}ns")
            };
        }

        let secs = d.as_secs();
        let (hours, rem) = (secs / 3600, secs % 3600);
        let (mins, secs) = (rem / 60, rem % 60);
        if hours > 0 {
            write!(f, "{hours}h")?;
        }
        if hours > 0 || mins > 0 {
            write!(f, "{mins}m")?;
        }
        write!(f, "{secs}")?;
        let nanos = d.subsec_nanos();
        if nanos > 0 {
            let frac = format!("{nanos:09}");
            write!(f, ".{}", frac.trim_end_matches('0'))?;
        }
        f.write_str("s")
    }
}

impl FromStr for K8sDuration {
    type Err = ParseError;

    fn from_str(mut s: &str) -> Result<Self, Self::Err> {
        fn duration_from_units(val: f64, unit: &str) -> Result<Duration, ParseError> {
            // U+00B5 is the "micro sign" while U+03BC is "Greek letter mu"
            let base = match unit {
                "ns" => Duration::from_nanos(1),
                "us" | "\u{00b5}s" | "\u{03bc}s" => Duration::from_micros(1),
                "ms" => Duration::from_millis(1),
                "s" => Duration::from_secs(1),
                "m" => MINUTE,
                "h" => HOUR,
                _ => return Err(ParseError::InvalidUnit),
            };
            if val < 0.0 {
                return Err(ParseError::Negative);
            }
            Duration::try_from_secs_f64(base.as_secs_f64() * val.abs())
                .map_err(|_| ParseError::Overflow)
        }

        if let Some(rest) = s.strip_prefix('-') {
            if rest.trim_start_matches('0').is_empty() && !rest.is_empty() {
                return Ok(Self::default());
            }
            return Err(ParseError::Negative);
        }
        s = s.trim_start_matches('+');
        if s == "0" {
            return Ok(Self::default());
        }

        let mut total = Duration::ZERO;
        while !s.is_empty() {
            let Some(unit_start) = s.find(|c: char| c.is_alphabetic()) else {
                return Err(ParseError::NoUnit);
            };
            let (val, rest) = s.split_at(unit_start);
            let val = val.parse::<f64>()?;
            let unit = match rest.find(|c: char| !c.is_alphabetic()) {
                Some(next) => {
                    let (unit, rest) = rest.split_at(next);
                    s = rest;
                    unit
                }
                None => {
                    s = "";
                    rest
                }
            };
            total = total
                .checked_add(duration_from_units(val, unit)?)
                .ok_or(ParseError::Overflow)?;
        }

        Ok(Self(total))
    }
}

impl Serialize for K8sDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for K8sDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Visitor;
        impl de::Visitor<'_> for Visitor {
            type Value = K8sDuration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string in Go `time.Duration.String()` format")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value.parse::<K8sDuration>().map_err(de::Error::custom)
            }
        }
        deserializer.deserialize_str(Visitor)
    }
}

impl schemars::JsonSchema for K8sDuration {
    fn schema_name() -> String {
        "K8sDuration".to_owned()
    }

    fn is_referenceable() -> bool {
        false
    }

    fn json_schema(_: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        // Not "duration": JSON schema reserves that format for ISO 8601.
        schemars::schema::SchemaObject {
            instance_type: Some(schemars::schema::InstanceType::String.into()),
            format: None,
            ..Default::default()
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0", Duration::ZERO)]
    #[case("-0", Duration::ZERO)]
    #[case("+5s", Duration::from_secs(5))]
    #[case("5.6s", Duration::from_millis(5600))]
    #[case(".5s", Duration::from_millis(500))]
    #[case("10ns", Duration::from_nanos(10))]
    #[case("11us", Duration::from_micros(11))]
    #[case("12µs", Duration::from_micros(12))]
    #[case("12μs", Duration::from_micros(12))]
    #[case("13ms", Duration::from_millis(13))]
    #[case("15m", 15 * MINUTE)]
    #[case("3h30m", 3 * HOUR + 30 * MINUTE)]
    #[case("10.5s4m", 4 * MINUTE + Duration::from_millis(10_500))]
    #[case("39h9m14.425s", 39 * HOUR + 9 * MINUTE + Duration::from_millis(14_425))]
    #[case("52763797000ns", Duration::from_nanos(52763797000))]
    fn parses_go_durations(#[case] input: &str, #[case] expected: Duration) {
        assert_eq!(input.parse::<K8sDuration>(), Ok(expected.into()));
    }

    #[rstest]
    #[case("5", ParseError::NoUnit)]
    #[case("5d", ParseError::InvalidUnit)]
    #[case("-5s", ParseError::Negative)]
    #[case("1s-5s", ParseError::Negative)]
    #[case("99999999999999999999999h", ParseError::Overflow)]
    #[case("10000000000000000000s10000000000000000000s", ParseError::Overflow)]
    fn rejects_invalid_durations(#[case] input: &str, #[case] expected: ParseError) {
        assert_eq!(input.parse::<K8sDuration>(), Err(expected));
    }

    #[rstest]
    #[case(Duration::ZERO, "0s")]
    #[case(Duration::from_millis(250), "250ms")]
    #[case(Duration::from_micros(3), "3µs")]
    #[case(Duration::from_secs(5), "5s")]
    #[case(Duration::from_millis(1500), "1.5s")]
    #[case(MINUTE + Duration::from_secs(30), "1m30s")]
    #[case(2 * HOUR, "2h0m0s")]
    fn formats_like_go(#[case] duration: Duration, #[case] expected: &str) {
        let d = K8sDuration::from(duration);
        assert_eq!(d.to_string(), expected);
        assert_eq!(expected.parse::<K8sDuration>(), Ok(d));
    }

    #[test]
    fn serde_uses_strings() {
        let d: K8sDuration = serde_json::from_str("\"1m30s\"").expect("must parse");
        assert_eq!(d, K8sDuration::from_secs(90));
        assert_eq!(
            serde_json::to_string(&d).expect("must serialize"),
            "\"1m30s\""
        );
    }

    #[test]
    fn out_of_range_options_fail_to_deserialize() {
        for timeout in ["1s-5s", "99999999999999999999999h"] {
            let json = format!(r#"{{"timeout": "{timeout}"}}"#);
            assert!(
                serde_json::from_str::<crate::RouteOptions>(&json).is_err(),
                "{timeout} must be rejected"
            );
        }
    }
}
