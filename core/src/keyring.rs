//! KeyRings: named groupings of keys. A keyring has no updatable fields, so
//! once created it can only be linked, queried or deleted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::AxleClient;
use crate::error::ApiError;
use crate::key::Key;
use crate::resource::{Lifecycle, Resource};
use crate::routes::Routes;
use crate::stats::{Stats, StatsQuery};
use crate::timestamp;
use crate::transport::Transport;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyRing {
    #[serde(skip)]
    identifier: String,

    #[serde(skip)]
    lifecycle: Lifecycle,

    #[serde(with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl KeyRing {
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            ..Self::default()
        }
    }
}

impl Resource for KeyRing {
    const KIND: &'static str = "keyring";
    const COLLECTION: &'static str = "keyrings";
    const UPDATABLE: bool = false;

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
    /// Add `key` to `keyring`; returns the key.
    pub fn keyring_link_key(&self, keyring: &str, key: &str) -> Result<Key, ApiError> {
        self.relink(KeyRing::KIND, keyring, "linkkey", key)
    }

    /// Remove `key` from `keyring`; returns the key.
    pub fn keyring_unlink_key(&self, keyring: &str, key: &str) -> Result<Key, ApiError> {
        self.relink(KeyRing::KIND, keyring, "unlinkkey", key)
    }

    /// Keys in `keyring`, keyed by identifier.
    pub fn keyring_keys(
        &self,
        keyring: &str,
        from: u64,
        to: u64,
    ) -> Result<BTreeMap<String, Key>, ApiError> {
        self.collection(&[KeyRing::KIND, keyring, "keys"], &Routes::page(from, to))
    }

    /// Hits made with any key in `keyring`.
    pub fn keyring_stats(&self, keyring: &str, query: &StatsQuery) -> Result<Stats, ApiError> {
        self.stats(&[KeyRing::KIND, keyring, "stats"], query)
    }
}
