//! JSON-RPC 2.0 envelopes exchanged with plugins and clients.

use serde::{Deserialize, Serialize};

use crate::Payload;
use crate::error::{GatewayError, ValidationError};

/// The only protocol version accepted on the wire.
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC error codes, plus the gateway's own range.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub const COLLABORATOR: i32 = -32000;
    pub const UNKNOWN_DOMAIN: i32 = -32001;
    pub const UNKNOWN_DEVICE: i32 = -32002;
    pub const UNKNOWN_ENTITY: i32 = -32003;
    pub const UNKNOWN_COMMAND: i32 = -32004;
    pub const UNKNOWN_PLUGIN: i32 = -32005;
    pub const INVALID_PAYLOAD: i32 = -32010;
    pub const ALREADY_TERMINAL: i32 = -32011;
}

fn version() -> String {
    JSONRPC_VERSION.to_string()
}

/// A call or notification. Notifications carry no `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default = "version")]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Payload>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Payload>,
}

impl Request {
    /// A call expecting a response correlated by `id`.
    #[must_use]
    pub fn new(id: impl Into<Payload>, method: impl Into<String>, params: Payload) -> Self {
        Self {
            jsonrpc: version(),
            id: Some(id.into()),
            method: method.into(),
            params: Some(params),
        }
    }

    /// A fire-and-forget call; no response is produced.
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Payload) -> Self {
        Self {
            jsonrpc: version(),
            id: None,
            method: method.into(),
            params: Some(params),
        }
    }

    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Check the envelope itself, not the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] for a version other than `"2.0"`
    /// or an empty method name.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(ValidationError::UnsupportedRpcVersion(self.jsonrpc.clone()).into());
        }
        if self.method.is_empty() {
            return Err(ValidationError::EmptyMethod.into());
        }
        Ok(())
    }
}

/// Structured error carried by a failed [`Response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,
}

impl RpcError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Payload) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("method not found: {method}"))
    }

    #[must_use]
    pub fn invalid_params(err: &serde_json::Error) -> Self {
        Self::new(codes::INVALID_PARAMS, format!("invalid params: {err}"))
    }
}

impl From<&GatewayError> for RpcError {
    fn from(err: &GatewayError) -> Self {
        match err {
            GatewayError::UnknownDomain(_) => Self::new(codes::UNKNOWN_DOMAIN, err.to_string()),
            GatewayError::UnknownDevice(_) => Self::new(codes::UNKNOWN_DEVICE, err.to_string()),
            GatewayError::UnknownEntity(_) => Self::new(codes::UNKNOWN_ENTITY, err.to_string()),
            GatewayError::UnknownCommand(_) => Self::new(codes::UNKNOWN_COMMAND, err.to_string()),
            GatewayError::UnknownPlugin(_) => Self::new(codes::UNKNOWN_PLUGIN, err.to_string()),
            GatewayError::InvalidPayload { domain, reason } => {
                Self::new(codes::INVALID_PAYLOAD, err.to_string())
                    .with_data(serde_json::json!({ "domain": domain, "reason": reason }))
            }
            GatewayError::AlreadyTerminal { state, .. } => {
                Self::new(codes::ALREADY_TERMINAL, err.to_string())
                    .with_data(serde_json::json!({ "state": state }))
            }
            GatewayError::Validation(inner) => Self::new(codes::INVALID_PARAMS, inner.to_string()),
            GatewayError::Collaborator(_) => Self::new(codes::COLLABORATOR, err.to_string()),
        }
    }
}

/// Reply to a [`Request`]; exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    /// Echo of the request id; `null` when the request id was unreadable.
    pub id: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    #[must_use]
    pub fn success(id: Payload, result: Payload) -> Self {
        Self {
            jsonrpc: version(),
            id,
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(id: Payload, error: RpcError) -> Self {
        Self {
            jsonrpc: version(),
            id,
            result: None,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::EntityId;
    use serde_json::json;

    #[test]
    fn should_default_missing_version_to_2_0() {
        let request: Request = serde_json::from_str(r#"{"id":1,"method":"device.list"}"#).unwrap();
        assert_eq!(request.jsonrpc, JSONRPC_VERSION);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn should_reject_other_versions() {
        let request: Request =
            serde_json::from_str(r#"{"jsonrpc":"1.0","id":1,"method":"device.list"}"#).unwrap();
        assert!(matches!(
            request.validate(),
            Err(GatewayError::Validation(ValidationError::UnsupportedRpcVersion(v))) if v == "1.0"
        ));
    }

    #[test]
    fn should_detect_notifications() {
        assert!(Request::notification("event.ingest", json!({})).is_notification());
        assert!(!Request::new(7, "device.list", json!({})).is_notification());
    }

    #[test]
    fn should_serialize_success_without_error_field() {
        let response = Response::success(json!(1), json!({"ok": true}));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, json!({"jsonrpc": "2.0", "id": 1, "result": {"ok": true}}));
    }

    #[test]
    fn should_map_invalid_payload_with_reason_data() {
        let err = GatewayError::InvalidPayload {
            domain: "light".to_string(),
            reason: "on must be a boolean".to_string(),
        };
        let rpc = RpcError::from(&err);
        assert_eq!(rpc.code, codes::INVALID_PAYLOAD);
        assert_eq!(
            rpc.data,
            Some(json!({"domain": "light", "reason": "on must be a boolean"}))
        );
    }

    #[test]
    fn should_map_unknown_entity_to_its_code() {
        let rpc = RpcError::from(&GatewayError::UnknownEntity(EntityId::from("missing")));
        assert_eq!(rpc.code, codes::UNKNOWN_ENTITY);
        assert_eq!(rpc.message, "unknown entity missing");
    }
}
