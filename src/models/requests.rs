//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::MAX_KEY_LENGTH;

/// Request body for `PUT /cache/:layer`
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds (uses the layer default if not specified)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} characters",
                MAX_KEY_LENGTH
            ));
        }
        if self.ttl == Some(0) {
            return Some("TTL must be at least one second".to_string());
        }
        None
    }
}

/// Request body for `POST /cache/invalidate`
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    /// Substring matched against keys, case-sensitive
    pub pattern: String,
    /// Restricts invalidation to one layer; all layers when absent
    #[serde(default)]
    pub layer: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_request_deserialize() {
        let json = r#"{"key": "test", "value": {"views": 3}}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.key, "test");
        assert_eq!(req.value["views"], 3);
        assert!(req.ttl.is_none());
    }

    #[test]
    fn test_set_request_with_ttl() {
        let json = r#"{"key": "test", "value": "hello", "ttl": 60}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.ttl, Some(60));
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let empty = SetRequest {
            key: "".to_string(),
            value: Value::Null,
            ttl: None,
        };
        assert!(empty.validate().is_some());

        let too_long = SetRequest {
            key: "k".repeat(MAX_KEY_LENGTH + 1),
            value: Value::Null,
            ttl: None,
        };
        assert!(too_long.validate().is_some());

        let zero_ttl = SetRequest {
            key: "k".to_string(),
            value: Value::Null,
            ttl: Some(0),
        };
        assert!(zero_ttl.validate().is_some());
    }

    #[test]
    fn test_validate_valid_request() {
        let req = SetRequest {
            key: "valid_key".to_string(),
            value: Value::from("test"),
            ttl: Some(60),
        };
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_invalidate_request_layer_optional() {
        let req: InvalidateRequest = serde_json::from_str(r#"{"pattern": "user:42"}"#).unwrap();
        assert_eq!(req.pattern, "user:42");
        assert!(req.layer.is_none());
    }
}
