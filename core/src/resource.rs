//! Behavior shared by the three management-server entities.
//!
//! # Design
//! Every entity is a plain serde record plus two pieces of local state that
//! never travel over the wire: its identifier (which lives in the URL) and
//! its `Lifecycle`. The lifecycle decides whether `save` creates (POST),
//! updates (PUT) or refuses to touch the server at all.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Where a local entity handle stands relative to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed locally; the next save creates it.
    #[default]
    New,
    /// Known to exist on the server; the next save updates it.
    Persisted,
    /// Deleted through this handle. Terminal.
    Deleted,
}

/// An entity addressable as `/v1/{KIND}/{identifier}` and listable as
/// `/v1/{COLLECTION}`.
pub trait Resource: Serialize + DeserializeOwned {
    /// Path segment for a single entity, e.g. `api`.
    const KIND: &'static str;

    /// Path segment for the listing, e.g. `apis`.
    const COLLECTION: &'static str;

    /// Payload fields checked before deserialization.
    const REQUIRED_FIELDS: &'static [&'static str] = &[];

    /// Whether a persisted entity may be saved again.
    const UPDATABLE: bool = true;

    /// A locally constructed entity carrying only defaults.
    fn pending(identifier: &str) -> Self;

    fn identifier(&self) -> &str;

    /// Identifiers are not part of the payload; the decoder restores them.
    fn set_identifier(&mut self, identifier: &str);

    fn lifecycle(&self) -> Lifecycle;

    fn set_lifecycle(&mut self, lifecycle: Lifecycle);

    /// Records a client-side modification time.
    fn touch(&mut self, at: DateTime<Utc>);
}
