//! Hit statistics and top-N charts.
//!
//! Stats arrive as `{"results": {hitType: {unixSeconds: {statusCode: count}}}}`
//! and charts as `{"results": {identifier: count}}`. Object keys are strings
//! on the wire; a key that does not parse is reported rather than skipped.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope;
use crate::error::ApiError;

/// Time bucket size for stats and chart queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Second,
    Minute,
    Hour,
    Day,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Second => "second",
            Granularity::Minute => "minute",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the management server classified a proxied response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitType {
    Cached,
    Uncached,
    Error,
}

impl HitType {
    pub fn as_str(self) -> &'static str {
        match self {
            HitType::Cached => "cached",
            HitType::Uncached => "uncached",
            HitType::Error => "error",
        }
    }
}

impl FromStr for HitType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cached" => Ok(HitType::Cached),
            "uncached" => Ok(HitType::Uncached),
            "error" => Ok(HitType::Error),
            other => Err(ApiError::MalformedStats(format!("unknown hit type {other:?}"))),
        }
    }
}

/// Counts per status code.
pub type StatusCounts = BTreeMap<u16, u64>;

/// Hit type → time bucket → status code → count.
pub type Stats = BTreeMap<HitType, BTreeMap<DateTime<Utc>, StatusCounts>>;

/// Identifier → hit count.
pub type Charts = BTreeMap<String, u64>;

/// Parameters of a `/stats` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub granularity: Granularity,
    /// Narrow API or keyring stats to one key.
    pub for_key: Option<String>,
    /// Narrow key or keyring stats to one API.
    pub for_api: Option<String>,
}

impl StatsQuery {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>, granularity: Granularity) -> Self {
        Self {
            from,
            to,
            granularity,
            for_key: None,
            for_api: None,
        }
    }

    pub fn for_key(mut self, key: impl Into<String>) -> Self {
        self.for_key = Some(key.into());
        self
    }

    pub fn for_api(mut self, api: impl Into<String>) -> Self {
        self.for_api = Some(api.into());
        self
    }

    pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("from", self.from.timestamp().to_string()),
            ("to", self.to.timestamp().to_string()),
            ("granularity", self.granularity.to_string()),
        ];
        if let Some(key) = &self.for_key {
            query.push(("forkey", key.clone()));
        }
        if let Some(api) = &self.for_api {
            query.push(("forapi", api.clone()));
        }
        query
    }
}

pub(crate) fn granularity_query(granularity: Granularity) -> Vec<(&'static str, String)> {
    vec![("granularity", granularity.to_string())]
}

pub fn decode_stats(body: &str) -> Result<Stats, ApiError> {
    let results = envelope::results_map(body)?;
    let mut stats = Stats::new();
    for (hit_type, buckets) in &results {
        let hit_type: HitType = hit_type.parse()?;
        let buckets = buckets
            .as_object()
            .ok_or_else(|| malformed(format!("{} is not an object", hit_type.as_str())))?;
        let by_time = stats.entry(hit_type).or_default();
        for (bucket, codes) in buckets {
            let at = parse_bucket(bucket)?;
            let codes = codes
                .as_object()
                .ok_or_else(|| malformed(format!("bucket {bucket} is not an object")))?;
            let counts = by_time.entry(at).or_default();
            for (code, value) in codes {
                let code: u16 = code
                    .parse()
                    .map_err(|_| malformed(format!("status code {code:?} is not a number")))?;
                counts.insert(code, count(value, bucket)?);
            }
        }
    }
    Ok(stats)
}

pub fn decode_charts(body: &str) -> Result<Charts, ApiError> {
    envelope::results_map(body)?
        .iter()
        .map(|(identifier, value)| Ok((identifier.clone(), count(value, identifier)?)))
        .collect()
}

fn parse_bucket(bucket: &str) -> Result<DateTime<Utc>, ApiError> {
    bucket
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| malformed(format!("time bucket {bucket:?} is not a unix timestamp")))
}

/// A non-negative whole number that fits in `u64`; `2.0` is accepted, `1e30` is not.
fn count(value: &Value, at: &str) -> Result<u64, ApiError> {
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f < u64::MAX as f64)
                .map(|f| f as u64)
        })
        .ok_or_else(|| malformed(format!("count at {at} is not a whole number: {value}")))
}

fn malformed(reason: String) -> ApiError {
    ApiError::MalformedStats(reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_nested_stats() {
        let body = r#"{"results":{
            "cached":{},
            "uncached":{"1700000000":{"200":3,"404":1}},
            "error":{"1700003600":{"500":2.0}}
        }}"#;
        let stats = decode_stats(body).unwrap();
        assert!(stats[&HitType::Cached].is_empty());

        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(stats[&HitType::Uncached][&at][&200], 3);
        assert_eq!(stats[&HitType::Uncached][&at][&404], 1);

        let at = DateTime::from_timestamp(1_700_003_600, 0).unwrap();
        assert_eq!(stats[&HitType::Error][&at][&500], 2);
    }

    #[test]
    fn malformed_time_bucket_fails_loudly() {
        let body = r#"{"results":{"uncached":{"yesterday":{"200":1}}}}"#;
        let err = decode_stats(body).unwrap_err();
        assert!(matches!(err, ApiError::MalformedStats(ref msg) if msg.contains("yesterday")));
    }

    #[test]
    fn malformed_status_code_fails_loudly() {
        let body = r#"{"results":{"cached":{"1700000000":{"ok":1}}}}"#;
        assert!(matches!(decode_stats(body).unwrap_err(), ApiError::MalformedStats(_)));
    }

    #[test]
    fn unknown_hit_type_fails() {
        let body = r#"{"results":{"bogus":{}}}"#;
        assert!(matches!(decode_stats(body).unwrap_err(), ApiError::MalformedStats(_)));
    }

    #[test]
    fn fractional_count_fails() {
        let body = r#"{"results":{"cached":{"1700000000":{"200":1.5}}}}"#;
        assert!(matches!(decode_stats(body).unwrap_err(), ApiError::MalformedStats(_)));
    }

    #[test]
    fn count_beyond_u64_fails() {
        let err = decode_charts(r#"{"results":{"alice":1e30}}"#).unwrap_err();
        assert!(matches!(err, ApiError::MalformedStats(ref msg) if msg.contains("alice")));

        let body = r#"{"results":{"cached":{"1700000000":{"200":18446744073709551616.0}}}}"#;
        assert!(matches!(decode_stats(body).unwrap_err(), ApiError::MalformedStats(_)));
    }

    #[test]
    fn decodes_charts() {
        let charts = decode_charts(r#"{"results":{"alice":12,"bob":3}}"#).unwrap();
        assert_eq!(charts["alice"], 12);
        assert_eq!(charts["bob"], 3);
    }

    #[test]
    fn chart_count_must_be_numeric() {
        let err = decode_charts(r#"{"results":{"alice":"many"}}"#).unwrap_err();
        assert!(matches!(err, ApiError::MalformedStats(_)));
    }

    #[test]
    fn query_includes_optional_filters() {
        let from = DateTime::from_timestamp(100, 0).unwrap();
        let to = DateTime::from_timestamp(200, 0).unwrap();
        let query = StatsQuery::new(from, to, Granularity::Hour).for_key("k1").query();
        assert_eq!(
            query,
            vec![
                ("from", "100".to_string()),
                ("to", "200".to_string()),
                ("granularity", "hour".to_string()),
                ("forkey", "k1".to_string()),
            ]
        );
    }
}
