//! The vendor's uniform `{status, meta, data}` response envelope.
//!
//! `meta` is informational and parsed leniently: a malformed `meta` never
//! fails a call. `status` and `data` are what the client acts on.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{NetroError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Request echo and token accounting attached to every response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub time: Option<String>,
    /// Transaction id.
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub token_limit: Option<i64>,
    #[serde(default)]
    pub token_remaining: Option<i64>,
    #[serde(default)]
    pub last_active: Option<String>,
    #[serde(default)]
    pub token_reset: Option<String>,
}

/// One entry of the `errors` array of an ERROR envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A successful call: the typed payload plus the envelope's `meta`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub meta: Meta,
    pub data: T,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub status: ResponseStatus,
    pub meta: Meta,
    pub data: Option<Value>,
    pub errors: Vec<ApiErrorDetail>,
}

impl Envelope {
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(NetroError::Schema {
                key: "$".to_string(),
                message: "envelope is not a JSON object".to_string(),
            });
        };

        let status = match map.get("status").and_then(Value::as_str) {
            Some("OK") => ResponseStatus::Ok,
            Some("ERROR") => ResponseStatus::Error,
            Some(other) => {
                return Err(NetroError::Schema {
                    key: "status".to_string(),
                    message: format!("unknown status `{other}`"),
                })
            }
            None => return Err(NetroError::missing("status")),
        };

        let meta = map
            .remove("meta")
            .and_then(|m| serde_json::from_value(m).ok())
            .unwrap_or_default();

        let errors = error_details(map.remove("errors"));

        Ok(Self {
            status,
            meta,
            data: map.remove("data"),
            errors,
        })
    }

    /// Turn an ERROR envelope into `NetroError::Api`; pass OK envelopes through.
    pub fn into_result(self) -> Result<Self> {
        if self.status == ResponseStatus::Ok {
            return Ok(self);
        }
        let code = self.errors.iter().find_map(|e| e.code);
        let message = self
            .errors
            .iter()
            .map(|e| {
                let message = e.message.as_deref().unwrap_or("unknown error");
                match e.code {
                    Some(code) => format!("{code}: {message}"),
                    None => message.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join("; ");
        let message = if message.is_empty() {
            "API ERROR".to_string()
        } else {
            message
        };
        Err(NetroError::Api { code, message })
    }

    /// Split an OK envelope into its `meta` and owned `data` object.
    pub fn into_parts(self) -> Result<(Meta, Map<String, Value>)> {
        match self.data {
            Some(Value::Object(map)) => Ok((self.meta, map)),
            Some(_) => Err(NetroError::Schema {
                key: "data".to_string(),
                message: "expected a JSON object".to_string(),
            }),
            None => Err(NetroError::missing("data")),
        }
    }
}

impl ApiErrorDetail {
    /// Read one `errors` entry. Non-object entries yield `None`; a `code`
    /// may arrive as a number or a numeric string.
    fn from_entry(entry: &Value) -> Option<Self> {
        let entry = entry.as_object()?;
        let code = match entry.get("code") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        let message = match entry.get("message") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        Some(Self { code, message })
    }
}

/// Entries are read one by one so a malformed entry cannot hide the others.
fn error_details(errors: Option<Value>) -> Vec<ApiErrorDetail> {
    match errors {
        Some(Value::Array(entries)) => entries.iter().filter_map(ApiErrorDetail::from_entry).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_envelope_keeps_meta_and_data() {
        let env = Envelope::from_value(json!({
            "status": "OK",
            "meta": {"tid": "1600000000_AbCd", "token_limit": 2000, "token_remaining": 1999},
            "data": {"sensor": {}}
        }))
        .unwrap();
        assert_eq!(env.status, ResponseStatus::Ok);
        assert_eq!(env.meta.tid.as_deref(), Some("1600000000_AbCd"));
        assert_eq!(env.meta.token_remaining, Some(1999));
        let (_, data) = env.into_parts().unwrap();
        assert!(data.contains_key("sensor"));
    }

    #[test]
    fn malformed_meta_is_ignored() {
        let env = Envelope::from_value(json!({"status": "OK", "meta": "oops", "data": {}})).unwrap();
        assert_eq!(env.meta, Meta::default());
    }

    #[test]
    fn error_envelope_carries_first_code_and_joined_message() {
        let env = Envelope::from_value(json!({
            "status": "ERROR",
            "errors": [
                {"code": 3, "message": "Invalid device or sensor"},
                {"code": 5, "message": "Parameter error"}
            ],
            "data": {"device": {}}
        }))
        .unwrap();
        match env.into_result().unwrap_err() {
            NetroError::Api { code, message } => {
                assert_eq!(code, Some(3));
                assert_eq!(message, "3: Invalid device or sensor; 5: Parameter error");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn error_envelope_without_details() {
        let env = Envelope::from_value(json!({"status": "ERROR"})).unwrap();
        match env.into_result().unwrap_err() {
            NetroError::Api { code, message } => {
                assert_eq!(code, None);
                assert_eq!(message, "API ERROR");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn status_is_required() {
        let err = Envelope::from_value(json!({"data": {}})).unwrap_err();
        assert!(matches!(err, NetroError::Schema { ref key, .. } if key == "status"));

        let err = Envelope::from_value(json!({"status": "MAYBE"})).unwrap_err();
        assert!(matches!(err, NetroError::Schema { ref key, .. } if key == "status"));

        let err = Envelope::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, NetroError::Schema { .. }));
    }

    #[test]
    fn data_must_be_an_object() {
        let env = Envelope::from_value(json!({"status": "OK"})).unwrap();
        assert!(matches!(env.into_parts(), Err(NetroError::Schema { ref key, .. }) if key == "data"));

        let env = Envelope::from_value(json!({"status": "OK", "data": []})).unwrap();
        assert!(env.into_parts().is_err());
    }

    #[test]
    fn malformed_error_entry_keeps_the_others() {
        let env = Envelope::from_value(json!({
            "status": "ERROR",
            "errors": [
                {"code": 1, "message": "Invalid key : K"},
                {"code": "5", "message": "Parameter error"},
                "garbage",
                {"code": [7], "message": {"text": "odd"}}
            ]
        }))
        .unwrap();
        assert_eq!(env.errors.len(), 3);
        assert_eq!(env.errors[1].code, Some(5));
        assert_eq!(env.errors[2].code, None);

        let err = env.into_result().unwrap_err();
        assert_eq!(err.api_error_code(), Some(1));
        assert!(err.is_auth_error());
        match err {
            NetroError::Api { message, .. } => {
                assert!(message.starts_with("1: Invalid key : K; 5: Parameter error; "), "{message}");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }
}
