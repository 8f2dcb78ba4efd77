//! Recorded proxy hits and the stats/chart views computed from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitType {
    Cached,
    Uncached,
    Error,
}

/// One proxied call, as the management server would have counted it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    pub api: String,
    pub key: String,
    pub hit_type: HitType,
    pub status: u16,
    /// Unix seconds.
    pub at: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Second,
    Minute,
    Hour,
    Day,
}

impl Granularity {
    pub fn seconds(self) -> i64 {
        match self {
            Granularity::Second => 1,
            Granularity::Minute => 60,
            Granularity::Hour => 3_600,
            Granularity::Day => 86_400,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct StatsParams {
    pub from: i64,
    pub to: i64,
    pub granularity: Granularity,
    pub forkey: Option<String>,
    pub forapi: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChartParams {
    pub granularity: Granularity,
}

/// `{hitType: {bucket: {status: count}}}` over hits in `[from, to]`.
/// Every hit type is present, even without hits.
pub fn stats<'a>(hits: impl Iterator<Item = &'a Hit>, params: &StatsParams) -> Value {
    let size = params.granularity.seconds();
    let mut out: BTreeMap<HitType, BTreeMap<String, BTreeMap<String, u64>>> =
        [HitType::Cached, HitType::Uncached, HitType::Error]
            .into_iter()
            .map(|t| (t, BTreeMap::new()))
            .collect();

    let matching = hits
        .filter(|h| h.at >= params.from && h.at <= params.to)
        .filter(|h| params.forkey.as_deref().map_or(true, |k| h.key == k))
        .filter(|h| params.forapi.as_deref().map_or(true, |a| h.api == a));
    for hit in matching {
        let bucket = hit.at - hit.at.rem_euclid(size);
        *out.entry(hit.hit_type)
            .or_default()
            .entry(bucket.to_string())
            .or_default()
            .entry(hit.status.to_string())
            .or_default() += 1;
    }

    serde_json::to_value(out).unwrap_or(Value::Null)
}

/// Hit counts per `label` over the last `granularity` period ending at `now`.
pub fn chart<'a>(
    hits: impl Iterator<Item = &'a Hit>,
    granularity: Granularity,
    now: i64,
    label: impl Fn(&Hit) -> &str,
) -> BTreeMap<String, u64> {
    let since = now - granularity.seconds();
    let mut out = BTreeMap::new();
    for hit in hits.filter(|h| h.at > since && h.at <= now) {
        *out.entry(label(hit).to_string()).or_default() += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(api: &str, key: &str, hit_type: HitType, status: u16, at: i64) -> Hit {
        Hit {
            api: api.to_string(),
            key: key.to_string(),
            hit_type,
            status,
            at,
        }
    }

    #[test]
    fn stats_bucket_by_granularity() {
        let hits = vec![
            hit("a", "k", HitType::Uncached, 200, 3_601),
            hit("a", "k", HitType::Uncached, 200, 3_700),
            hit("a", "k", HitType::Error, 500, 7_300),
        ];
        let params = StatsParams {
            from: 0,
            to: 10_000,
            granularity: Granularity::Hour,
            forkey: None,
            forapi: None,
        };
        let value = stats(hits.iter(), &params);
        assert_eq!(value["uncached"]["3600"]["200"], 2);
        assert_eq!(value["error"]["7200"]["500"], 1);
        assert_eq!(value["cached"], serde_json::json!({}));
    }

    #[test]
    fn stats_respect_range_and_filters() {
        let hits = vec![
            hit("a", "k1", HitType::Cached, 200, 10),
            hit("a", "k2", HitType::Cached, 200, 11),
            hit("a", "k1", HitType::Cached, 200, 99),
        ];
        let params = StatsParams {
            from: 0,
            to: 50,
            granularity: Granularity::Second,
            forkey: Some("k1".to_string()),
            forapi: None,
        };
        let value = stats(hits.iter(), &params);
        assert_eq!(value["cached"], serde_json::json!({"10": {"200": 1}}));
    }

    #[test]
    fn chart_counts_within_window() {
        let hits = vec![
            hit("a", "k1", HitType::Cached, 200, 1_000),
            hit("a", "k1", HitType::Cached, 200, 990),
            hit("a", "k2", HitType::Cached, 200, 1_000),
            hit("a", "k2", HitType::Cached, 200, 100),
        ];
        let counts = chart(hits.iter(), Granularity::Minute, 1_000, |h| h.key.as_str());
        assert_eq!(counts["k1"], 2);
        assert_eq!(counts["k2"], 1);
    }
}
