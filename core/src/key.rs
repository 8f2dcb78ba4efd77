//! Keys: caller credentials with per-day and per-second quotas.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::Api;
use crate::client::AxleClient;
use crate::error::ApiError;
use crate::resource::{Lifecycle, Resource};
use crate::stats::{Charts, Granularity, Stats, StatsQuery};
use crate::timestamp;
use crate::transport::Transport;

/// Quota value meaning "no limit".
pub const UNLIMITED: i64 = -1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Key {
    #[serde(skip)]
    identifier: String,

    #[serde(skip)]
    lifecycle: Lifecycle,

    #[serde(with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Secret used when signing calls made with this key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_secret: Option<String>,

    /// Queries per day; negative for no limit.
    pub qpd: i64,

    /// Queries per second; negative for no limit.
    pub qps: i64,

    /// APIs this key is linked with.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub for_apis: Vec<String>,

    pub disabled: bool,
}

impl Default for Key {
    fn default() -> Self {
        Self {
            identifier: String::new(),
            lifecycle: Lifecycle::New,
            created_at: None,
            updated_at: None,
            shared_secret: None,
            qpd: 172_800,
            qps: 2,
            for_apis: Vec::new(),
            disabled: false,
        }
    }
}

impl Key {
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            ..Self::default()
        }
    }

    pub fn is_unlimited_per_day(&self) -> bool {
        self.qpd < 0
    }

    pub fn is_unlimited_per_second(&self) -> bool {
        self.qps < 0
    }
}

impl Resource for Key {
    const KIND: &'static str = "key";
    const COLLECTION: &'static str = "keys";

    fn pending(identifier: &str) -> Self {
        Self::new(identifier)
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn set_identifier(&mut self, identifier: &str) {
        self.identifier = identifier.to_string();
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        self.lifecycle = lifecycle;
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }
}

impl<T: Transport> AxleClient<T> {
    /// APIs `key` is linked with, keyed by identifier.
    pub fn key_apis(&self, key: &str) -> Result<BTreeMap<String, Api>, ApiError> {
        self.collection(&[Key::KIND, key, "apis"], &[("resolve", "true".to_string())])
    }

    /// The top APIs called with `key` during the current `granularity` period.
    pub fn key_api_charts(&self, key: &str, granularity: Granularity) -> Result<Charts, ApiError> {
        self.charts(&[Key::KIND, key, "apicharts"], granularity)
    }

    /// The most used keys during the current `granularity` period.
    pub fn keys_charts(&self, granularity: Granularity) -> Result<Charts, ApiError> {
        self.charts(&[Key::COLLECTION, "charts"], granularity)
    }

    /// Hits made with `key`, optionally narrowed with `StatsQuery::for_api`.
    pub fn key_stats(&self, key: &str, query: &StatsQuery) -> Result<Stats, ApiError> {
        self.stats(&[Key::KIND, key, "stats"], query)
    }
}
