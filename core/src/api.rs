//! APIs: upstream endpoints the management server proxies and rate-limits.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::AxleClient;
use crate::error::ApiError;
use crate::key::Key;
use crate::resource::{Lifecycle, Resource};
use crate::routes::Routes;
use crate::stats::{Charts, Granularity, Stats, StatsQuery};
use crate::timestamp;
use crate::transport::Transport;

/// Whether the upstream endpoint is called over TLS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

/// Response format of the upstream endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFormat {
    #[default]
    Json,
    Xml,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Api {
    #[serde(skip)]
    identifier: String,

    #[serde(skip)]
    lifecycle: Lifecycle,

    #[serde(with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Seconds every call under this API is cached for.
    pub global_cache: u32,

    pub protocol: Protocol,

    pub api_format: ApiFormat,

    /// Upstream host, e.g. `graph.facebook.com`.
    #[serde(rename = "endPoint", skip_serializing_if = "String::is_empty")]
    pub endpoint: String,

    /// Seconds to wait before timing out the upstream connection.
    #[serde(rename = "endPointTimeout")]
    pub endpoint_timeout: u32,

    #[serde(rename = "endPointMaxRedirects")]
    pub endpoint_max_redirects: u32,

    /// Pattern whose first group extracts the key from the request URL.
    /// `api_key` / `apiaxle_key` parameters take precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract_key_regex: Option<String>,

    /// Path prefix added to every upstream call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_path: Option<String>,

    pub disabled: bool,

    /// Require valid upstream certificates.
    #[serde(rename = "strictSSL")]
    pub strict_ssl: bool,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            identifier: String::new(),
            lifecycle: Lifecycle::New,
            created_at: None,
            updated_at: None,
            global_cache: 0,
            protocol: Protocol::Http,
            api_format: ApiFormat::Json,
            endpoint: String::new(),
            endpoint_timeout: 2,
            endpoint_max_redirects: 2,
            extract_key_regex: None,
            default_path: None,
            disabled: false,
            strict_ssl: true,
        }
    }
}

impl Api {
    /// A new, unsaved API with the server's defaults.
    pub fn new(identifier: &str, endpoint: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            endpoint: endpoint.to_string(),
            ..Self::default()
        }
    }
}

impl Resource for Api {
    const KIND: &'static str = "api";
    const COLLECTION: &'static str = "apis";
    const REQUIRED_FIELDS: &'static [&'static str] = &["endPoint"];

    fn pending(identifier: &str) -> Self {
        Self::new(identifier, "")
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
    /// Associate `key` with `api`; returns the key as it now stands.
    pub fn link_key(&self, api: &str, key: &str) -> Result<Key, ApiError> {
        self.relink(Api::KIND, api, "linkkey", key)
    }

    /// Dissociate `key` from `api`; returns the key as it now stands.
    pub fn unlink_key(&self, api: &str, key: &str) -> Result<Key, ApiError> {
        self.relink(Api::KIND, api, "unlinkkey", key)
    }

    /// Keys linked with `api`, keyed by identifier.
    pub fn api_keys(
        &self,
        api: &str,
        from: u64,
        to: u64,
    ) -> Result<BTreeMap<String, Key>, ApiError> {
        self.collection(&[Api::KIND, api, "keys"], &Routes::page(from, to))
    }

    /// The top keys calling `api` during the current `granularity` period.
    pub fn api_key_charts(&self, api: &str, granularity: Granularity) -> Result<Charts, ApiError> {
        self.charts(&[Api::KIND, api, "keycharts"], granularity)
    }

    /// The most used APIs during the current `granularity` period.
    pub fn apis_charts(&self, granularity: Granularity) -> Result<Charts, ApiError> {
        self.charts(&[Api::COLLECTION, "charts"], granularity)
    }

    /// Hits against `api`, optionally narrowed with `StatsQuery::for_key`.
    pub fn api_stats(&self, api: &str, query: &StatsQuery) -> Result<Stats, ApiError> {
        self.stats(&[Api::KIND, api, "stats"], query)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    #[test]
    fn new_api_has_server_defaults() {
        let api = Api::new("facebook", "graph.facebook.com");
        assert_eq!(api.identifier(), "facebook");
        assert_eq!(api.protocol, Protocol::Http);
        assert_eq!(api.api_format, ApiFormat::Json);
        assert_eq!(api.endpoint_timeout, 2);
        assert_eq!(api.endpoint_max_redirects, 2);
        assert!(api.strict_ssl);
        assert!(!api.disabled);
        assert_eq!(api.lifecycle(), Lifecycle::New);
    }

    #[test]
    fn serializes_with_wire_names() {
        let mut api = Api::new("facebook", "graph.facebook.com");
        api.extract_key_regex = Some("/key/(.+)$".to_string());
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["endPoint"], "graph.facebook.com");
        assert_eq!(json["endPointTimeout"], 2);
        assert_eq!(json["endPointMaxRedirects"], 2);
        assert_eq!(json["strictSSL"], true);
        assert_eq!(json["apiFormat"], "json");
        assert_eq!(json["protocol"], "http");
        assert_eq!(json["globalCache"], 0);
        assert_eq!(json["extractKeyRegex"], "/key/(.+)$");
    }

    #[test]
    fn unset_optional_fields_are_omitted() {
        let json = serde_json::to_value(Api::new("facebook", "")).unwrap();
        let object = json.as_object().unwrap();
        for omitted in ["endPoint", "createdAt", "updatedAt", "defaultPath", "extractKeyRegex"] {
            assert!(!object.contains_key(omitted), "{omitted} should be omitted");
        }
        assert!(object.values().all(|v| !matches!(v, Value::Null)));
    }

    #[test]
    fn identifier_and_lifecycle_stay_local() {
        let json = serde_json::to_value(Api::new("facebook", "x")).unwrap();
        assert!(json.get("identifier").is_none());
        assert!(json.get("lifecycle").is_none());
    }
}
