//! Builds `HttpRequest` values for the versioned management API.
//!
//! Every URL is the server address followed by `v1/` and a list of path
//! segments. Segments are escaped individually, so identifiers containing
//! `/`, spaces or `?` stay a single segment.

use url::Url;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest};

pub const VERSION: &str = "v1";

/// Request builder bound to one server address. Performs no I/O.
#[derive(Debug, Clone)]
pub struct Routes {
    base: Url,
}

impl Routes {
    pub fn new(address: &str) -> Result<Self, ApiError> {
        let base = Url::parse(address).map_err(|e| ApiError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidAddress {
                address: address.to_string(),
                reason: "address cannot carry a path".to_string(),
            });
        }
        Ok(Self { base })
    }

    pub fn address(&self) -> &str {
        self.base.as_str()
    }

    /// Absolute URL for `v1/{segments...}?{query}`.
    ///
    /// `.` and `..` are refused: URL normalization would drop them and
    /// silently address a different resource.
    pub fn url(&self, segments: &[&str], query: &[(&str, String)]) -> Result<String, ApiError> {
        if let Some(dots) = segments.iter().find(|s| matches!(**s, "." | "..")) {
            return Err(ApiError::InvalidIdentifier {
                identifier: dots.to_string(),
            });
        }

        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(VERSION).extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url.into())
    }

    pub fn get(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest {
            method: HttpMethod::Get,
            url: self.url(segments, query)?,
            headers: Vec::new(),
            body: None,
        })
    }

    pub fn post(&self, segments: &[&str], body: String) -> Result<HttpRequest, ApiError> {
        Ok(json_request(HttpMethod::Post, self.url(segments, &[])?, body))
    }

    pub fn put(&self, segments: &[&str], body: String) -> Result<HttpRequest, ApiError> {
        Ok(json_request(HttpMethod::Put, self.url(segments, &[])?, body))
    }

    pub fn delete(&self, segments: &[&str]) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest {
            method: HttpMethod::Delete,
            url: self.url(segments, &[])?,
            headers: Vec::new(),
            body: None,
        })
    }

    /// `from`/`to` paging bounds shared by every resolved listing.
    pub fn page(from: u64, to: u64) -> Vec<(&'static str, String)> {
        vec![
            ("resolve", "true".to_string()),
            ("from", from.to_string()),
            ("to", to.to_string()),
        ]
    }
}

fn json_request(method: HttpMethod, url: String, body: String) -> HttpRequest {
    HttpRequest {
        method,
        url,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: Some(body),
    }
}
