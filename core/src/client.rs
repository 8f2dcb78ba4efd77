//! Blocking client for the ApiAxle management API.
//!
//! # Design
//! `AxleClient` holds the server address (as a `Routes` builder) and a
//! `Transport`, and carries no mutable state between calls. Each operation
//! builds an `HttpRequest`, executes it, rejects non-2xx statuses, then hands
//! the body to the envelope decoder. The CRUD operations here are generic
//! over `Resource`; relationship, stats and chart queries live next to their
//! entity in `api`, `key` and `keyring`.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::envelope::{self, NEW, RESULTS};
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::key::Key;
use crate::resource::{Lifecycle, Resource};
use crate::routes::Routes;
use crate::stats::{self, Charts, Granularity, Stats, StatsQuery};
use crate::timestamp;
use crate::transport::{Transport, UreqTransport};

/// Client bound to one management server.
#[derive(Debug, Clone)]
pub struct AxleClient<T = UreqTransport> {
    routes: Routes,
    transport: T,
}

impl AxleClient<UreqTransport> {
    pub fn new(address: &str) -> Result<Self, ApiError> {
        Self::with_transport(address, UreqTransport::default())
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::with_transport(&config.address, UreqTransport::new(config.timeout))
    }
}

impl<T: Transport> AxleClient<T> {
    pub fn with_transport(address: &str, transport: T) -> Result<Self, ApiError> {
        Ok(Self {
            routes: Routes::new(address)?,
            transport,
        })
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    /// Execute `request` and return the body of a 2xx response.
    pub(crate) fn send(&self, request: HttpRequest) -> Result<String, ApiError> {
        let method = request.method;
        let url = request.url.clone();
        debug!(%method, %url, "sending request");

        let response = self.transport.execute(request)?;
        if let Err(err) = check_status(&response) {
            warn!(%method, %url, status = response.status, "request failed");
            return Err(err);
        }
        Ok(response.body)
    }

    /// Server information found under `results` of `/v1/info`.
    pub fn info(&self) -> Result<Map<String, Value>, ApiError> {
        let body = self.send(self.routes.get(&["info"], &[])?)?;
        envelope::results_map(&body)
    }

    /// Liveness check; the server must answer with the literal body `pong`.
    pub fn ping(&self) -> Result<(), ApiError> {
        let body = self.send(self.routes.get(&["ping"], &[])?)?;
        if body != "pong" {
            return Err(ApiError::UnexpectedPing { body });
        }
        Ok(())
    }

    /// Retrieve an existing entity. A missing identifier is `NotFound`.
    pub fn fetch<R: Resource>(&self, identifier: &str) -> Result<R, ApiError> {
        let body = self.send(self.routes.get(&[R::KIND, identifier], &[])?)?;
        envelope::decode(&R::pending(identifier), &body, &[RESULTS])
    }

    /// Create (`New`) or update (`Persisted`) `resource` on the server and
    /// refresh it from the response.
    ///
    /// `updatedAt` is stamped before sending. On failure the handle keeps its
    /// lifecycle; the first successful save makes it `Persisted`.
    pub fn save<R: Resource>(&self, resource: &mut R) -> Result<(), ApiError> {
        let path: &[&str] = match resource.lifecycle() {
            Lifecycle::Deleted => {
                return Err(ApiError::Deleted {
                    kind: R::KIND,
                    identifier: resource.identifier().to_string(),
                })
            }
            Lifecycle::Persisted if !R::UPDATABLE => {
                return Err(ApiError::Rejected(format!(
                    "{} {} cannot be updated once created",
                    R::KIND,
                    resource.identifier()
                )))
            }
            Lifecycle::New => &[RESULTS],
            Lifecycle::Persisted => &[RESULTS, NEW],
        };

        resource.touch(timestamp::now());
        let payload = serde_json::to_string(&*resource)
            .map_err(|e| ApiError::SerializationError(e.to_string()))?;
        let segments = [R::KIND, resource.identifier()];
        let request = match resource.lifecycle() {
            Lifecycle::New => self.routes.post(&segments, payload)?,
            _ => self.routes.put(&segments, payload)?,
        };

        let body = self.send(request)?;
        *resource = envelope::decode(&*resource, &body, path)?;
        debug!(kind = R::KIND, identifier = resource.identifier(), "saved");
        Ok(())
    }

    /// Delete by identifier. The server answers with a boolean; `false` is
    /// a failure just like a transport or status error.
    pub fn delete<R: Resource>(&self, identifier: &str) -> Result<(), ApiError> {
        let request = self.routes.delete(&[R::KIND, identifier])?;
        let url = request.url.clone();
        let body = self.send(request)?;
        if !envelope::results_bool(&body)? {
            return Err(ApiError::Rejected(format!("delete of {} at {url} failed", R::KIND)));
        }
        debug!(kind = R::KIND, identifier, "deleted");
        Ok(())
    }

    /// Delete the entity behind `resource` and retire the handle; later saves
    /// through it fail without contacting the server.
    pub fn discard<R: Resource>(&self, resource: &mut R) -> Result<(), ApiError> {
        self.delete::<R>(resource.identifier())?;
        resource.set_lifecycle(Lifecycle::Deleted);
        Ok(())
    }

    /// One page of every entity of kind `R`, keyed by identifier.
    pub fn list<R: Resource>(&self, from: u64, to: u64) -> Result<BTreeMap<String, R>, ApiError> {
        let request = self.routes.get(&[R::COLLECTION], &Routes::page(from, to))?;
        let body = self.send(request)?;
        decode_collection(&body)
    }

    pub(crate) fn collection<R: Resource>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<BTreeMap<String, R>, ApiError> {
        let body = self.send(self.routes.get(segments, query)?)?;
        decode_collection(&body)
    }

    /// PUT `/{kind}/{identifier}/{verb}/{key}` and decode the key it returns.
    pub(crate) fn relink(
        &self,
        kind: &str,
        identifier: &str,
        verb: &str,
        key: &str,
    ) -> Result<Key, ApiError> {
        let request = self.routes.put(&[kind, identifier, verb, key], "{}".to_string())?;
        let body = self.send(request)?;
        envelope::decode(&Key::pending(key), &body, &[RESULTS])
    }

    pub(crate) fn stats(&self, segments: &[&str], query: &StatsQuery) -> Result<Stats, ApiError> {
        let body = self.send(self.routes.get(segments, &query.query())?)?;
        stats::decode_stats(&body)
    }

    pub(crate) fn charts(
        &self,
        segments: &[&str],
        granularity: Granularity,
    ) -> Result<Charts, ApiError> {
        let request = self.routes.get(segments, &stats::granularity_query(granularity))?;
        let body = self.send(request)?;
        stats::decode_charts(&body)
    }
}

/// Decode `{"results": {identifier: entity, ...}}`.
fn decode_collection<R: Resource>(body: &str) -> Result<BTreeMap<String, R>, ApiError> {
    envelope::results_map(body)?
        .iter()
        .map(|(identifier, value)| {
            let payload = value.as_object().ok_or_else(|| ApiError::UnexpectedType {
                key: identifier.clone(),
                expected: "an object",
            })?;
            let entity = envelope::decode_payload(&R::pending(identifier), payload)?;
            Ok((identifier.clone(), entity))
        })
        .collect()
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound {
            body: response.body.clone(),
        });
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Api;
    use crate::http::HttpMethod;
    use crate::keyring::KeyRing;
    use crate::transport::MockTransport;

    const ADDRESS: &str = "http://localhost:28902/";

    fn respond(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn client(transport: MockTransport) -> AxleClient<MockTransport> {
        AxleClient::with_transport(ADDRESS, transport).unwrap()
    }

    fn expect(
        transport: &mut MockTransport,
        method: HttpMethod,
        url: &'static str,
        status: u16,
        body: &'static str,
    ) {
        transport
            .expect_execute()
            .withf(move |req: &HttpRequest| req.method == method && req.url == url)
            .times(1)
            .returning(move |_| Ok(respond(status, body)));
    }

    #[test]
    fn fetch_decodes_results() {
        let mut transport = MockTransport::new();
        expect(
            &mut transport,
            HttpMethod::Get,
            "http://localhost:28902/v1/api/facebook",
            200,
            r#"{"results":{"endPoint":"graph.facebook.com","endPointTimeout":5}}"#,
        );

        let api: Api = client(transport).fetch("facebook").unwrap();
        assert_eq!(api.identifier(), "facebook");
        assert_eq!(api.endpoint, "graph.facebook.com");
        assert_eq!(api.endpoint_timeout, 5);
        assert_eq!(api.lifecycle(), Lifecycle::Persisted);
    }

    #[test]
    fn fetch_missing_is_not_found() {
        let mut transport = MockTransport::new();
        expect(
            &mut transport,
            HttpMethod::Get,
            "http://localhost:28902/v1/key/ghost",
            404,
            r#"{"results":{"error":{"type":"KeyNotFoundError"}}}"#,
        );

        let err = client(transport).fetch::<Key>("ghost").unwrap_err();
        assert!(
            matches!(err, ApiError::NotFound { ref body } if body.contains("KeyNotFoundError"))
        );
    }

    #[test]
    fn save_new_posts_full_entity() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|req: &HttpRequest| {
                let body: Value =
                    serde_json::from_str(req.body.as_deref().unwrap_or("null")).unwrap();
                req.method == HttpMethod::Post
                    && req.url == "http://localhost:28902/v1/key/alice"
                    && body["qpd"] == 172_800
                    && body["qps"] == 2
                    && body["updatedAt"].is_i64()
                    && body.get("createdAt").is_none()
            })
            .times(1)
            .returning(|_| {
                Ok(respond(
                    200,
                    r#"{"results":{"qpd":172800,"qps":2,"createdAt":1700000000000}}"#,
                ))
            });

        let mut key = Key::new("alice");
        client(transport).save(&mut key).unwrap();
        assert_eq!(key.lifecycle(), Lifecycle::Persisted);
        assert_eq!(key.created_at.unwrap().timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn save_persisted_puts_and_reads_new() {
        let mut transport = MockTransport::new();
        expect(
            &mut transport,
            HttpMethod::Put,
            "http://localhost:28902/v1/key/alice",
            200,
            r#"{"results":{"old":{"qps":2},"new":{"qps":20}}}"#,
        );

        let mut key = Key::new("alice");
        key.set_lifecycle(Lifecycle::Persisted);
        key.qps = 20;
        client(transport).save(&mut key).unwrap();
        assert_eq!(key.qps, 20);
        assert!(key.updated_at.is_some());
    }

    #[test]
    fn failed_save_keeps_lifecycle() {
        let mut transport = MockTransport::new();
        expect(
            &mut transport,
            HttpMethod::Post,
            "http://localhost:28902/v1/api/twitter",
            400,
            r#"{"results":{"error":{"message":"endPoint is required"}}}"#,
        );

        let mut api = Api::new("twitter", "");
        let err = client(transport).save(&mut api).unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 400, .. }));
        assert_eq!(api.lifecycle(), Lifecycle::New);
    }

    #[test]
    fn save_on_deleted_handle_fails_without_request() {
        let mut transport = MockTransport::new();
        transport.expect_execute().never();

        let mut api = Api::new("twitter", "api.twitter.com");
        api.set_lifecycle(Lifecycle::Deleted);
        let err = client(transport).save(&mut api).unwrap_err();
        assert!(matches!(err, ApiError::Deleted { kind: "api", .. }));
    }

    #[test]
    fn keyring_update_is_rejected_without_request() {
        let mut transport = MockTransport::new();
        transport.expect_execute().never();

        let mut ring = KeyRing::new("ring");
        ring.set_lifecycle(Lifecycle::Persisted);
        let err = client(transport).save(&mut ring).unwrap_err();
        assert!(matches!(err, ApiError::Rejected(_)));
        assert_eq!(ring.lifecycle(), Lifecycle::Persisted);
    }

    #[test]
    fn delete_false_is_a_failure() {
        let mut transport = MockTransport::new();
        expect(
            &mut transport,
            HttpMethod::Delete,
            "http://localhost:28902/v1/keyring/ring",
            200,
            r#"{"results":false}"#,
        );

        let err = client(transport).delete::<KeyRing>("ring").unwrap_err();
        assert!(matches!(err, ApiError::Rejected(_)));
    }

    #[test]
    fn discard_retires_the_handle() {
        let mut transport = MockTransport::new();
        expect(
            &mut transport,
            HttpMethod::Delete,
            "http://localhost:28902/v1/key/alice",
            200,
            r#"{"results":true}"#,
        );

        let client = client(transport);
        let mut key = Key::new("alice");
        key.set_lifecycle(Lifecycle::Persisted);
        client.discard(&mut key).unwrap();
        assert_eq!(key.lifecycle(), Lifecycle::Deleted);
        assert!(matches!(client.save(&mut key).unwrap_err(), ApiError::Deleted { .. }));
    }

    #[test]
    fn list_is_keyed_by_identifier() {
        let mut transport = MockTransport::new();
        expect(
            &mut transport,
            HttpMethod::Get,
            "http://localhost:28902/v1/apis?resolve=true&from=0&to=10",
            200,
            concat!(
                r#"{"results":{"a":{"endPoint":"a.example.com"},"#,
                r#""b":{"endPoint":"b.example.com","protocol":"https"}}}"#
            ),
        );

        let apis = client(transport).list::<Api>(0, 10).unwrap();
        assert_eq!(apis.len(), 2);
        assert_eq!(apis["a"].identifier(), "a");
        assert_eq!(apis["b"].endpoint, "b.example.com");
        assert_eq!(apis["b"].lifecycle(), Lifecycle::Persisted);
    }

    #[test]
    fn list_rejects_non_object_entries() {
        let mut transport = MockTransport::new();
        expect(
            &mut transport,
            HttpMethod::Get,
            "http://localhost:28902/v1/keys?resolve=true&from=0&to=1",
            200,
            r#"{"results":{"a":"oops"}}"#,
        );

        let err = client(transport).list::<Key>(0, 1).unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedType { ref key, .. } if key == "a"));
    }

    #[test]
    fn ping_requires_pong() {
        let mut transport = MockTransport::new();
        expect(&mut transport, HttpMethod::Get, "http://localhost:28902/v1/ping", 200, "pong");
        assert!(client(transport).ping().is_ok());

        let mut transport = MockTransport::new();
        expect(&mut transport, HttpMethod::Get, "http://localhost:28902/v1/ping", 200, "pang");
        let err = client(transport).ping().unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedPing { ref body } if body == "pang"));
    }

    #[test]
    fn info_returns_results_map() {
        let mut transport = MockTransport::new();
        expect(
            &mut transport,
            HttpMethod::Get,
            "http://localhost:28902/v1/info",
            200,
            r#"{"results":{"version":"1.0"}}"#,
        );
        let info = client(transport).info().unwrap();
        assert_eq!(info["version"], "1.0");
    }

    #[test]
    fn server_error_keeps_body() {
        let mut transport = MockTransport::new();
        expect(&mut transport, HttpMethod::Get, "http://localhost:28902/v1/info", 500, "boom");
        let err = client(transport).info().unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 500, ref body } if body == "boom"));
    }

    #[test]
    fn dot_identifiers_fail_without_request() {
        let mut transport = MockTransport::new();
        transport.expect_execute().never();
        let client = client(transport);

        let err = client.fetch::<Api>("..").unwrap_err();
        assert!(
            matches!(err, ApiError::InvalidIdentifier { ref identifier } if identifier == "..")
        );
        assert!(client.api_keys(".", 0, 10).is_err());
        assert!(client.delete::<Key>(".").is_err());

        let mut key = Key::new(".");
        let err = client.save(&mut key).unwrap_err();
        assert!(matches!(err, ApiError::InvalidIdentifier { .. }));
        assert_eq!(key.lifecycle(), Lifecycle::New);
    }

    #[test]
    fn transport_failure_propagates() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Err(ApiError::Transport("connection refused".to_string())));
        let err = client(transport).ping().unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
