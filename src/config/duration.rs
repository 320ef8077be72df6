//! Serde helpers for `humantime` durations.
//!
//! Durations serialize as strings like `"30s"` or `"6m"`. Plain integers are
//! accepted on input and read as whole seconds.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

impl RawDuration {
    fn into_duration<E: serde::de::Error>(self) -> Result<Duration, E> {
        match self {
            Self::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Self::Text(text) => humantime::parse_duration(text.trim())
                .map_err(|e| E::custom(format!("invalid duration '{text}': {e}"))),
        }
    }
}

/// Serializes a duration in humantime notation.
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&humantime::format_duration(*duration))
}

/// Deserializes a humantime string or integer seconds.
///
/// # Errors
///
/// Fails on malformed duration text.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    RawDuration::deserialize(deserializer)?.into_duration()
}

/// Same helpers for a list of durations.
pub mod list {
    use super::{Deserialize, Deserializer, Duration, RawDuration, Serializer};
    use serde::ser::SerializeSeq;

    /// Serializes each duration in humantime notation.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(
        durations: &[Duration],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(durations.len()))?;
        for d in durations {
            seq.serialize_element(&humantime::format_duration(*d).to_string())?;
        }
        seq.end()
    }

    /// Deserializes a list of humantime strings or integer seconds.
    ///
    /// # Errors
    ///
    /// Fails on any malformed entry.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Duration>, D::Error> {
        Vec::<RawDuration>::deserialize(deserializer)?
            .into_iter()
            .map(RawDuration::into_duration)
            .collect()
    }
}
