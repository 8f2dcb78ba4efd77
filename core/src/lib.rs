//! Blocking client for the ApiAxle management API.
//!
//! # Overview
//! Wraps the server's JSON-over-HTTP interface for its three entities:
//! APIs (proxied upstream endpoints), Keys (credentials with quotas) and
//! KeyRings (groupings of keys). Every call is a single synchronous
//! request/response.
//!
//! # Design
//! - `Routes` builds requests as plain data, a `Transport` executes them,
//!   and `envelope` unwraps the `{"results": ...}` wrapper. Only the
//!   transport performs I/O.
//! - `AxleClient` owns the server address and the transport; it holds no
//!   other state.
//! - Entities are plain values carrying a `Lifecycle`
//!   (`New` → `Persisted` → `Deleted`) that decides how `save` behaves.
//!
//! ```no_run
//! use axle_core::{Api, AxleClient};
//!
//! # fn main() -> Result<(), axle_core::ApiError> {
//! let client = AxleClient::new("http://localhost:28902/")?;
//! let mut api = Api::new("facebook", "graph.facebook.com");
//! client.save(&mut api)?;
//!
//! let mut api: Api = client.fetch("facebook")?;
//! api.endpoint_timeout += 10;
//! client.save(&mut api)?;
//! client.discard(&mut api)?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod key;
pub mod keyring;
pub mod resource;
pub mod routes;
pub mod stats;
pub mod timestamp;
pub mod transport;

pub use api::{Api, ApiFormat, Protocol};
pub use client::AxleClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use key::Key;
pub use keyring::KeyRing;
pub use resource::{Lifecycle, Resource};
pub use routes::Routes;
pub use stats::{Charts, Granularity, HitType, Stats, StatsQuery};
pub use transport::{Transport, UreqTransport};
