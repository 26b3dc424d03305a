//! JSON encodings for well-known protobuf types
//!
//! The API speaks proto3 JSON: 64-bit integers travel as decimal strings and
//! durations as `"<seconds>s"`. Timestamps are RFC 3339, which chrono handles
//! on its own.

use serde::de::{self, Deserializer, Visitor};
use serde::Serializer;
use std::fmt;
use std::time::Duration;

pub(crate) fn format_duration(duration: &Duration) -> String {
    if duration.subsec_nanos() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        let fraction = format!("{:09}", duration.subsec_nanos());
        format!("{}.{}s", duration.as_secs(), fraction.trim_end_matches('0'))
    }
}

pub(crate) fn parse_duration(value: &str) -> Result<Duration, String> {
    let seconds = value
        .strip_suffix('s')
        .ok_or_else(|| format!("duration {:?} is missing the 's' suffix", value))?;
    let parsed: f64 = seconds
        .parse()
        .map_err(|_| format!("invalid duration {:?}", value))?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(format!("invalid duration {:?}", value));
    }
    Ok(Duration::from_secs_f64(parsed))
}

/// `google.protobuf.Duration`
pub mod duration {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw: String = serde::Deserialize::deserialize(deserializer)?;
        parse_duration(&raw).map_err(de::Error::custom)
    }
}

/// Optional `google.protobuf.Duration`, omitted when absent
pub mod optional_duration {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_str(&format_duration(duration)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let raw: Option<String> = serde::Deserialize::deserialize(deserializer)?;
        raw.map(|value| parse_duration(&value).map_err(de::Error::custom))
            .transpose()
    }
}

/// `uint64`, written as a string and read from either a string or a number
pub mod u64_string {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        deserializer.deserialize_any(U64Visitor)
    }

    struct U64Visitor;

    impl Visitor<'_> for U64Visitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an unsigned integer or a decimal string")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<u64, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<u64, E> {
            u64::try_from(value).map_err(|_| E::custom(format!("negative value {}", value)))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<u64, E> {
            value
                .parse()
                .map_err(|_| E::custom(format!("invalid uint64 {:?}", value)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        #[serde(with = "u64_string")]
        size: u64,
        #[serde(with = "duration")]
        window: Duration,
        #[serde(
            with = "optional_duration",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        expiration: Option<Duration>,
    }

    #[test]
    fn encodes_proto3_json_forms() {
        let sample = Sample {
            size: 100,
            window: Duration::from_secs(3600),
            expiration: None,
        };
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(json, r#"{"size":"100","window":"3600s"}"#);
    }

    #[test]
    fn accepts_numbers_and_fractional_durations() {
        let sample: Sample =
            serde_json::from_str(r#"{"size":42,"window":"1.5s","expiration":"90s"}"#).unwrap();
        assert_eq!(sample.size, 42);
        assert_eq!(sample.window, Duration::from_millis(1500));
        assert_eq!(sample.expiration, Some(Duration::from_secs(90)));
        assert_eq!(format_duration(&sample.window), "1.5s");
    }

    #[test]
    fn rejects_durations_without_unit() {
        assert!(parse_duration("3600").is_err());
        assert!(parse_duration("-1s").is_err());
    }
}
