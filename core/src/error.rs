//! Error types for the ApiAxle client.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers routinely distinguish
//! "the resource does not exist" from "the server returned an unexpected
//! status." Every other non-2xx response lands in `HttpError` with the raw
//! status code and body. Envelope problems name the key that was missing or
//! had the wrong JSON type.

use thiserror::Error;

/// Errors returned by `AxleClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connect, DNS, read failure).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server returned 404.
    #[error("resource not found: {body}")]
    NotFound { body: String },

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response envelope did not contain an expected key.
    #[error("response did not contain expected key: {key}")]
    MissingKey { key: String },

    /// A value in the response envelope had the wrong JSON type.
    #[error("value at {key} was not {expected}")]
    UnexpectedType { key: String, expected: &'static str },

    /// The entity payload lacked a field the entity cannot exist without.
    #[error("missing required field \"{field}\"")]
    MissingField { field: &'static str },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// A statistics or chart payload had an unparseable bucket, status code
    /// or count.
    #[error("malformed statistics: {0}")]
    MalformedStats(String),

    /// The server or the client refused the operation.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The local handle refers to an entity this client deleted.
    #[error("{kind} {identifier} has been deleted")]
    Deleted { kind: &'static str, identifier: String },

    /// `/v1/ping` answered with something other than `pong`.
    #[error("server did not respond with pong but with {body:?}")]
    UnexpectedPing { body: String },

    /// The server address could not be used as a base URL.
    #[error("invalid server address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// An identifier that cannot be addressed as a single path segment.
    #[error("identifier {identifier:?} cannot be used in a resource path")]
    InvalidIdentifier { identifier: String },

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
