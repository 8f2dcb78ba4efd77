//! Decodes the `{"results": ...}` envelope the management server wraps
//! around every payload.
//!
//! # Design
//! The decoder walks a key path through nested objects (`["results"]` for
//! reads and creates, `["results", "new"]` for updates) and then overlays the
//! payload on a base entity: fields the server omits keep the base value,
//! which for freshly constructed entities means the documented defaults.

use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::resource::{Lifecycle, Resource};

pub const RESULTS: &str = "results";
pub const NEW: &str = "new";

const ROOT: &str = "<root>";

pub fn parse(body: &str) -> Result<Value, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// Follow `path` from `root`. Every value along the way except the last must
/// be an object containing the next key.
pub fn walk<'a>(root: &'a Value, path: &[&str]) -> Result<&'a Value, ApiError> {
    let mut current = root;
    let mut at = ROOT;
    for &key in path {
        let object = current.as_object().ok_or_else(|| ApiError::UnexpectedType {
            key: at.to_string(),
            expected: "an object",
        })?;
        current = object
            .get(key)
            .ok_or_else(|| ApiError::MissingKey { key: key.to_string() })?;
        at = key;
    }
    Ok(current)
}

/// Like `walk`, but the value at the end of the path must be an object too.
pub fn object_at<'a>(root: &'a Value, path: &[&str]) -> Result<&'a Map<String, Value>, ApiError> {
    walk(root, path)?
        .as_object()
        .ok_or_else(|| ApiError::UnexpectedType {
            key: path.last().copied().unwrap_or(ROOT).to_string(),
            expected: "an object",
        })
}

/// The object under `results`.
pub fn results_map(body: &str) -> Result<Map<String, Value>, ApiError> {
    let root = parse(body)?;
    object_at(&root, &[RESULTS]).cloned()
}

/// The boolean under `results`, as returned by deletions.
pub fn results_bool(body: &str) -> Result<bool, ApiError> {
    let root = parse(body)?;
    walk(&root, &[RESULTS])?
        .as_bool()
        .ok_or_else(|| ApiError::UnexpectedType {
            key: RESULTS.to_string(),
            expected: "a boolean",
        })
}

/// Decode the entity found at `path` in `body`, overlaid on `base`.
pub fn decode<R: Resource>(base: &R, body: &str, path: &[&str]) -> Result<R, ApiError> {
    let root = parse(body)?;
    let payload = object_at(&root, path)?;
    decode_payload(base, payload)
}

/// Overlay `payload` on `base`. The result keeps `base`'s identifier and is
/// `Persisted`, since it reflects what the server holds.
pub fn decode_payload<R: Resource>(base: &R, payload: &Map<String, Value>) -> Result<R, ApiError> {
    for &field in R::REQUIRED_FIELDS {
        if !payload.contains_key(field) {
            return Err(ApiError::MissingField { field });
        }
    }

    let mut merged = match serde_json::to_value(base) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            return Err(ApiError::SerializationError(format!(
                "{} did not serialize to an object",
                R::KIND
            )))
        }
        Err(e) => return Err(ApiError::SerializationError(e.to_string())),
    };
    merged.extend(payload.iter().map(|(k, v)| (k.clone(), v.clone())));

    let mut decoded: R = serde_json::from_value(Value::Object(merged))
        .map_err(|e| ApiError::DeserializationError(format!("unable to decode {}: {e}", R::KIND)))?;
    decoded.set_identifier(base.identifier());
    decoded.set_lifecycle(Lifecycle::Persisted);
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::{Api, Protocol};
    use crate::key::Key;

    #[test]
    fn walk_follows_nested_objects() {
        let root = json!({"results": {"new": {"qps": 5}}});
        let value = walk(&root, &[RESULTS, NEW]).unwrap();
        assert_eq!(value["qps"], 5);
    }

    #[test]
    fn walk_names_the_missing_key() {
        let root = json!({"results": {"old": {}}});
        let err = walk(&root, &[RESULTS, NEW]).unwrap_err();
        assert!(matches!(err, ApiError::MissingKey { ref key } if key == "new"));
    }

    #[test]
    fn walk_rejects_non_object_intermediate() {
        let root = json!({"results": [1, 2]});
        let err = walk(&root, &[RESULTS, NEW]).unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedType { ref key, .. } if key == "results"));
    }

    #[test]
    fn object_at_rejects_scalar_payload() {
        let root = json!({"results": true});
        let err = object_at(&root, &[RESULTS]).unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedType { ref key, .. } if key == "results"));
    }

    #[test]
    fn results_bool_reads_delete_flag() {
        assert!(results_bool(r#"{"results":true}"#).unwrap());
        assert!(!results_bool(r#"{"results":false}"#).unwrap());
        assert!(matches!(
            results_bool(r#"{"results":{}}"#).unwrap_err(),
            ApiError::UnexpectedType { .. }
        ));
        assert!(matches!(
            results_bool(r#"{"meta":{}}"#).unwrap_err(),
            ApiError::MissingKey { .. }
        ));
    }

    #[test]
    fn bad_json_is_a_deserialization_error() {
        let err = results_map("not json").unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn decode_overlays_payload_on_defaults() {
        let body = r#"{"results":{
            "endPoint":"example.com","protocol":"https","createdAt":1700000000000
        }}"#;
        let api = decode(&Api::pending("facebook"), body, &[RESULTS]).unwrap();
        assert_eq!(api.identifier(), "facebook");
        assert_eq!(api.endpoint, "example.com");
        assert_eq!(api.protocol, Protocol::Https);
        assert_eq!(api.endpoint_timeout, 2);
        assert!(api.strict_ssl);
        assert_eq!(api.created_at.unwrap().timestamp_millis(), 1_700_000_000_000);
        assert_eq!(api.lifecycle(), Lifecycle::Persisted);
    }

    #[test]
    fn decode_keeps_base_fields_the_payload_omits() {
        let mut base = Key::new("k");
        base.shared_secret = Some("s3cret".to_string());
        let body = r#"{"results":{"new":{"qps":7}}}"#;
        let key = decode(&base, body, &[RESULTS, NEW]).unwrap();
        assert_eq!(key.qps, 7);
        assert_eq!(key.qpd, 172_800);
        assert_eq!(key.shared_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn required_field_is_checked_before_decoding() {
        let body = r#"{"results":{"protocol":"http"}}"#;
        let err = decode(&Api::pending("x"), body, &[RESULTS]).unwrap_err();
        assert!(matches!(err, ApiError::MissingField { field: "endPoint" }));
    }

    #[test]
    fn wrongly_typed_field_fails_to_decode() {
        let body = r#"{"results":{"qps":"fast"}}"#;
        let err = decode(&Key::pending("k"), body, &[RESULTS]).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }
}
