//! Stored entities and the per-kind behavior shared by the CRUD handlers.
//!
//! These types mirror the client's schema but are defined independently;
//! the client's integration tests catch any drift between the two.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{AxleError, Store};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFormat {
    #[default]
    Json,
    Xml,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Api {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub global_cache: u32,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub api_format: ApiFormat,
    pub end_point: String,
    #[serde(default = "default_limit")]
    pub end_point_timeout: u32,
    #[serde(default = "default_limit")]
    pub end_point_max_redirects: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_key_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_path: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(rename = "strictSSL", default = "default_strict_ssl")]
    pub strict_ssl: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_secret: Option<String>,
    #[serde(default = "default_qpd")]
    pub qpd: i64,
    #[serde(default = "default_qps")]
    pub qps: i64,
    #[serde(default)]
    pub for_apis: Vec<String>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    /// Member keys. Only exposed through `/keyring/{id}/keys`.
    #[serde(skip)]
    pub keys: BTreeSet<String>,
}

fn default_limit() -> u32 {
    2
}

fn default_strict_ssl() -> bool {
    true
}

fn default_qpd() -> i64 {
    172_800
}

fn default_qps() -> i64 {
    2
}

/// A kind of entity kept in `Store`.
pub trait Stored: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Name used in error types, e.g. `ApiNotFoundError`.
    const LABEL: &'static str;

    fn table(store: &Store) -> &BTreeMap<String, Self>;

    fn table_mut(store: &mut Store) -> &mut BTreeMap<String, Self>;

    fn validate(&self) -> Result<(), AxleError> {
        Ok(())
    }

    fn timestamps(&mut self) -> (&mut Option<i64>, &mut Option<i64>);

    /// Server-owned state that an update body must not overwrite.
    fn carry_over(&mut self, _old: &Self) {}

    /// Drop references to a deleted entity from the rest of the store.
    fn forget(_store: &mut Store, _id: &str) {}
}

impl Stored for Api {
    const LABEL: &'static str = "Api";

    fn table(store: &Store) -> &BTreeMap<String, Self> {
        &store.apis
    }

    fn table_mut(store: &mut Store) -> &mut BTreeMap<String, Self> {
        &mut store.apis
    }

    fn validate(&self) -> Result<(), AxleError> {
        if self.end_point.trim().is_empty() {
            return Err(AxleError::invalid("endPoint must not be empty"));
        }
        Ok(())
    }

    fn timestamps(&mut self) -> (&mut Option<i64>, &mut Option<i64>) {
        (&mut self.created_at, &mut self.updated_at)
    }

    fn forget(store: &mut Store, id: &str) {
        for key in store.keys.values_mut() {
            key.for_apis.retain(|api| api != id);
        }
    }
}

impl Stored for Key {
    const LABEL: &'static str = "Key";

    fn table(store: &Store) -> &BTreeMap<String, Self> {
        &store.keys
    }

    fn table_mut(store: &mut Store) -> &mut BTreeMap<String, Self> {
        &mut store.keys
    }

    fn timestamps(&mut self) -> (&mut Option<i64>, &mut Option<i64>) {
        (&mut self.created_at, &mut self.updated_at)
    }

    fn carry_over(&mut self, old: &Self) {
        self.for_apis = old.for_apis.clone();
    }

    fn forget(store: &mut Store, id: &str) {
        for ring in store.keyrings.values_mut() {
            ring.keys.remove(id);
        }
    }
}

impl Stored for KeyRing {
    const LABEL: &'static str = "KeyRing";

    fn table(store: &Store) -> &BTreeMap<String, Self> {
        &store.keyrings
    }

    fn table_mut(store: &mut Store) -> &mut BTreeMap<String, Self> {
        &mut store.keyrings
    }

    fn timestamps(&mut self) -> (&mut Option<i64>, &mut Option<i64>) {
        (&mut self.created_at, &mut self.updated_at)
    }

    fn carry_over(&mut self, old: &Self) {
        self.keys = old.keys.clone();
    }
}
