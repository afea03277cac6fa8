//! Serde helpers for durations in the service's wire format.
//!
//! Durations are written as decimal seconds with an `s` suffix (`"600s"`,
//! `"1.5s"`). Plain integers are accepted on input as a number of seconds.

use std::fmt;
use std::time::Duration;

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

/// Format a duration as `"<seconds>s"`, dropping a zero fractional part.
pub fn format(duration: &Duration) -> String {
  if duration.subsec_nanos() == 0 {
    format!("{}s", duration.as_secs())
  } else {
    let secs = format!("{}.{:09}", duration.as_secs(), duration.subsec_nanos());
    format!("{}s", secs.trim_end_matches('0'))
  }
}

/// Parse `"<seconds>s"` or a bare number of seconds.
pub fn parse(input: &str) -> Result<Duration, String> {
  let trimmed = input.trim();
  let number = trimmed.strip_suffix('s').unwrap_or(trimmed);
  let secs: f64 = number
    .parse()
    .map_err(|_| format!("invalid duration '{input}', expected e.g. \"600s\""))?;
  if !secs.is_finite() || secs < 0.0 {
    return Err(format!("invalid duration '{input}', must be a non-negative number of seconds"));
  }
  Duration::try_from_secs_f64(secs).map_err(|_| format!("invalid duration '{input}', out of range"))
}

struct DurationVisitor;

impl<'de> Visitor<'de> for DurationVisitor {
  type Value = Duration;

  fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("a duration such as \"600s\" or a number of seconds")
  }

  fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
    parse(v).map_err(E::custom)
  }

  fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
    Ok(Duration::from_secs(v))
  }

  fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
    u64::try_from(v)
      .map(Duration::from_secs)
      .map_err(|_| E::custom("duration must be non-negative"))
  }

  fn visit_f64<E: de::Error>(self, v: f64) -> Result<Duration, E> {
    parse(&v.to_string()).map_err(E::custom)
  }
}

pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.serialize_str(&format(duration))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
  deserializer.deserialize_any(DurationVisitor)
}

/// Same as the parent module, for `Option<Duration>` fields.
pub mod option {
  use super::*;

  pub fn serialize<S: Serializer>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match duration {
      Some(d) => serializer.serialize_some(&format(d)),
      None => serializer.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
    struct OptionVisitor;

    impl<'de> Visitor<'de> for OptionVisitor {
      type Value = Option<Duration>;

      fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an optional duration")
      }

      fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
      }

      fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
      }

      fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        super::deserialize(deserializer).map(Some)
      }
    }

    deserializer.deserialize_option(OptionVisitor)
  }
}
