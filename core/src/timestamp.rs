//! `createdAt` / `updatedAt` travel as JavaScript millisecond numbers.

use chrono::{DateTime, SubsecRound, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

/// Current time truncated to the millisecond precision the server keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub fn serialize<S: Serializer>(
    value: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(at) => serializer.serialize_i64(at.timestamp_millis()),
        None => serializer.serialize_none(),
    }
}

pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let millis: Option<f64> = Option::deserialize(deserializer)?;
    millis
        .map(|ms| {
            DateTime::from_timestamp_millis(ms as i64)
                .ok_or_else(|| D::Error::custom(format!("timestamp {ms} is out of range")))
        })
        .transpose()
}
