//! Error taxonomy and the JSON error envelope returned on every failure path.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};

/// Hint placed in `details` when a failing workflow returned an empty body.
const EMPTY_DETAILS_HINT: &str = "Check workflow execution logs.";

/// Failures the proxy can surface to a caller.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Required configuration is missing. Raised before any network call.
    #[error("{0} is not defined")]
    Config(&'static str),

    /// The inbound body could not be read or parsed.
    #[error("Invalid request payload: {0}")]
    Payload(String),

    /// The downstream service answered with a non-2xx status.
    #[error("Webhook workflow error")]
    Downstream { status: u16, details: Value },

    /// The downstream call exceeded the configured timeout.
    #[error("Downstream request timed out")]
    Timeout,

    /// The downstream call failed before a response was received.
    #[error("Failed to reach downstream service")]
    Network(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),
}

impl ProxyError {
    /// Build a downstream error from a raw response body.
    pub fn downstream(status: u16, body: &str) -> Self {
        ProxyError::Downstream {
            status,
            details: parse_details(body),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Downstream { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UnknownRole(_) => StatusCode::NOT_FOUND,
            ProxyError::Config(_) | ProxyError::Payload(_) | ProxyError::Network(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            ProxyError::Downstream { status, details } => ErrorEnvelope {
                error: self.to_string(),
                status: Some(*status),
                details: Some(details.clone()),
            },
            _ => ErrorEnvelope {
                error: self.to_string(),
                status: None,
                details: None,
            },
        }
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(e: serde_json::Error) -> Self {
        ProxyError::Payload(e.to_string())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            ProxyError::Network(cause) => {
                error!(error = %self, cause = %cause, "proxy_network_error")
            }
            ProxyError::Downstream { status, .. } => {
                error!(downstream_status = status, "proxy_downstream_error")
            }
            ProxyError::Config(var) => error!(env_var = var, "proxy_config_missing"),
            _ => warn!(error = %self, status = status.as_u16(), "proxy_request_failed"),
        }

        (status, Json(self.envelope())).into_response()
    }
}

/// Uniform error body.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Parse a failing response body for diagnostics: JSON when possible, the
/// raw text otherwise, and a hint when the body is empty.
fn parse_details(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::String(EMPTY_DETAILS_HINT.to_string());
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_error_names_variable() {
        let err = ProxyError::Config("N8N_WEBHOOK");
        assert_eq!(err.to_string(), "N8N_WEBHOOK is not defined");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_downstream_maps_to_bad_gateway() {
        let err = ProxyError::downstream(500, r#"{"message":"boom"}"#);
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

        let envelope = serde_json::to_value(err.envelope()).unwrap();
        assert_eq!(envelope["status"], 500);
        assert_eq!(envelope["details"], json!({"message": "boom"}));
        assert_eq!(envelope["error"], "Webhook workflow error");
    }

    #[test]
    fn test_downstream_details_plain_text() {
        let err = ProxyError::downstream(403, "forbidden");
        match err {
            ProxyError::Downstream { details, .. } => assert_eq!(details, json!("forbidden")),
            _ => panic!("Expected Downstream variant"),
        }
    }

    #[test]
    fn test_downstream_details_empty_body() {
        let err = ProxyError::downstream(500, "");
        match err {
            ProxyError::Downstream { details, .. } => {
                assert_eq!(details, json!(EMPTY_DETAILS_HINT))
            }
            _ => panic!("Expected Downstream variant"),
        }
    }

    #[test]
    fn test_envelope_omits_optional_fields() {
        let envelope = serde_json::to_value(ProxyError::Timeout.envelope()).unwrap();
        assert_eq!(envelope, json!({"error": "Downstream request timed out"}));
        assert_eq!(ProxyError::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_network_error_hides_cause() {
        let err = ProxyError::Network("dns error: no such host".to_string());
        let envelope = serde_json::to_value(err.envelope()).unwrap();
        assert_eq!(envelope, json!({"error": "Failed to reach downstream service"}));
    }

    #[test]
    fn test_unknown_role_is_not_found() {
        let err = ProxyError::UnknownRole("admin".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
