//! Proxy endpoint handlers.
//!
//! Handlers stay thin: they pick the logical operation, hand the classified
//! payload to the forwarder and shape the normalized reply. All business
//! logic lives in the workflow backend.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::error::ProxyError;
use crate::forward::{Forwarder, OutboundBody, Transport};
use crate::normalize::{normalize, normalize_for_client};
use crate::payload::{InboundRequest, PayloadKind};
use crate::roles::{Role, RoleProfile};
use crate::routing::{resolve, Operation};
use crate::Config;

/// Reply content used when the chat workflow returns neither `output` nor `message`.
const DEFAULT_REPLY: &str = "Respuesta procesada por el motor de IA.";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub forwarder: Forwarder,
}

impl AppState {
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            forwarder: Forwarder::new(transport),
        }
    }

    /// Resolve, forward and return the raw successful body.
    async fn dispatch(
        &self,
        operation: Operation,
        body: OutboundBody,
        authorization: Option<String>,
    ) -> Result<String, ProxyError> {
        let endpoint = resolve(&self.config, operation)?;
        let response = self
            .forwarder
            .forward(&endpoint, body, authorization)
            .await?;
        Ok(response.body)
    }

    /// Forward a classified request and normalize the reply for the client.
    async fn proxy(
        &self,
        operation: Operation,
        inbound: InboundRequest,
    ) -> Result<Json<Value>, ProxyError> {
        let body = self
            .dispatch(operation, inbound.payload.into(), inbound.authorization)
            .await?;
        Ok(Json(normalize_for_client(&body)))
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Role Menus
// =============================================================================

/// Static profile and menu for a dashboard role.
pub async fn role_menu(Path(role): Path<String>) -> Result<Json<RoleProfile>, ProxyError> {
    let role: Role = role.parse()?;
    Ok(Json(role.profile()))
}

// =============================================================================
// Webhook Proxies
// =============================================================================

/// Unified chat proxy. File uploads go to the documents workflow, everything
/// else to the chat workflow.
pub async fn chat(
    State(state): State<AppState>,
    inbound: InboundRequest,
) -> Result<Json<Value>, ProxyError> {
    let operation = match inbound.payload.kind() {
        PayloadKind::FileUpload => Operation::Documents,
        PayloadKind::JsonCommand => Operation::Chat,
    };

    info!(operation = %operation, "chat_proxy_received");
    state.proxy(operation, inbound).await
}

/// Pass-through to the configured webhook base URL.
pub async fn generic_webhook(
    State(state): State<AppState>,
    inbound: InboundRequest,
) -> Result<Json<Value>, ProxyError> {
    state.proxy(Operation::Generic, inbound).await
}

/// Horizon workflow proxy.
pub async fn horizon(
    State(state): State<AppState>,
    inbound: InboundRequest,
) -> Result<Json<Value>, ProxyError> {
    state.proxy(Operation::Horizon, inbound).await
}

/// Education content ingestion.
///
/// PDF documents need server-side text extraction, so they go to the API
/// server instead of the education workflow.
pub async fn education_content(
    State(state): State<AppState>,
    inbound: InboundRequest,
) -> Result<Json<Value>, ProxyError> {
    let operation = if inbound.payload.is_pdf_document() {
        Operation::EducationPdf
    } else {
        Operation::Education
    };

    let file_name = inbound
        .payload
        .field("document")
        .and_then(|f| f.file_name.clone());

    info!(
        operation = %operation,
        kind = ?inbound.payload.kind(),
        file_name = ?file_name,
        "education_content_received"
    );

    state.proxy(operation, inbound).await
}

/// Strategy onboarding step. Only `message`, `userId` and `step` are forwarded.
pub async fn onboarding(
    State(state): State<AppState>,
    inbound: InboundRequest,
) -> Result<Json<Value>, ProxyError> {
    let body = inbound.payload.into_json()?;
    let forwarded = pick(&body, &["message", "userId", "step"]);

    let raw = state
        .dispatch(
            Operation::Onboarding,
            OutboundBody::Json(forwarded),
            inbound.authorization,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": normalize(&raw),
    })))
}

/// Chat message as rendered by the content library.
#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: &'static str,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Chat about a single piece of education content.
pub async fn education_content_chat(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
    inbound: InboundRequest,
) -> Result<Json<Value>, ProxyError> {
    let body = inbound.payload.into_json()?;

    let mut forwarded = Map::new();
    forwarded.insert("sessionId".to_string(), Value::String(session_id()));
    forwarded.insert("action".to_string(), Value::String("chat".to_string()));
    forwarded.insert("contentId".to_string(), Value::String(content_id.clone()));
    if let Value::Object(picked) = pick(&body, &["message", "history", "preferences"]) {
        forwarded.extend(picked);
    }

    info!(content_id = %content_id, "education_chat_received");

    let raw = state
        .dispatch(
            Operation::EducationChat,
            OutboundBody::Json(Value::Object(forwarded)),
            inbound.authorization,
        )
        .await?;

    let now = Utc::now();
    let message = ChatMessage {
        id: now.timestamp_millis().to_string(),
        role: "system",
        content: reply_text(&normalize(&raw)),
        kind: "text",
        timestamp: now,
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
    })))
}

/// Copy the listed keys of a JSON object. Absent keys are left out.
fn pick(body: &Value, keys: &[&str]) -> Value {
    let picked: Map<String, Value> = keys
        .iter()
        .filter_map(|key| body.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect();
    Value::Object(picked)
}

fn session_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("session-{}", suffix.to_lowercase())
}

/// Extract the assistant's reply from a normalized workflow response.
///
/// `output` wins over `message`; empty, `null`, `false` and `0` are skipped.
/// Non-string values are rendered as JSON text.
fn reply_text(data: &Value) -> String {
    if let Value::String(text) = data {
        if !text.is_empty() {
            return text.clone();
        }
    }

    ["output", "message"]
        .iter()
        .filter_map(|key| data.get(*key))
        .find(|value| is_truthy(value))
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| DEFAULT_REPLY.to_string())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::testing::MockTransport;
    use crate::forward::TransportError;
    use crate::web::router;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use tower::ServiceExt;

    fn configured() -> Config {
        Config {
            n8n_webhook: Some("https://hooks.example.com/webhook".to_string()),
            n8n_webhook_chat: Some(
                "https://hooks.example.com/webhook/nsg-education-chat".to_string(),
            ),
            ..Config::default()
        }
    }

    fn app(config: Config, mock: &Arc<MockTransport>) -> Router {
        router(AppState::new(config, mock.clone()))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_multipart(uri: &str, file_name: &str) -> Request<Body> {
        let body = format!(
            "--XBOUNDARY\r\n\
             Content-Disposition: form-data; name=\"text\"\r\n\r\n\
             please summarize\r\n\
             --XBOUNDARY\r\n\
             Content-Disposition: form-data; name=\"document\"; filename=\"{}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             file-bytes\r\n\
             --XBOUNDARY--\r\n",
            file_name
        );

        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
            .header("authorization", "Bearer user-token")
            .body(Body::from(body))
            .unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let mock = Arc::new(MockTransport::new());
        let res = app(configured(), &mock)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(read_json(res).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_chat_json_is_normalized() {
        let mock = Arc::new(MockTransport::new().reply(200, r#"[{"json":{"a":1}}]"#));

        let res = app(configured(), &mock)
            .oneshot(post_json("/api/chat", r#"{"message":"hola"}"#))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(read_json(res).await, json!({"a": 1}));

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "https://hooks.example.com/webhook/nsg-chat");
        assert_eq!(calls[0].body, OutboundBody::Json(json!({"message": "hola"})));
    }

    #[tokio::test]
    async fn test_chat_multipart_goes_to_documents() {
        let mock = Arc::new(MockTransport::new().reply(200, r#"{"stored":true}"#));

        let res = app(configured(), &mock)
            .oneshot(post_multipart("/api/chat", "notes.txt"))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);

        let calls = mock.calls();
        assert_eq!(calls[0].url, "https://hooks.example.com/webhook/nsg-documents");
        assert_eq!(calls[0].authorization.as_deref(), Some("Bearer user-token"));
        match &calls[0].body {
            OutboundBody::Multipart(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[1].name, "document");
                assert_eq!(fields[1].file_name.as_deref(), Some("notes.txt"));
                assert_eq!(&fields[1].data[..], b"file-bytes");
            }
            other => panic!("Expected multipart body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chat_falls_back_to_test_webhook_on_404() {
        let mock = Arc::new(
            MockTransport::new()
                .reply(404, r#"{"message":"webhook not registered"}"#)
                .reply(200, r#"{"ok":true}"#),
        );

        let res = app(configured(), &mock)
            .oneshot(post_json("/api/chat", r#"{"message":"hola"}"#))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(read_json(res).await, json!({"ok": true}));

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].url, "https://hooks.example.com/webhook-test/nsg-chat");
    }

    #[tokio::test]
    async fn test_downstream_500_becomes_502_without_retry() {
        let mock = Arc::new(MockTransport::new().reply(500, "Workflow execution failed"));

        let res = app(configured(), &mock)
            .oneshot(post_json("/api/nsg-horizon", r#"{"userId":"u1"}"#))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            read_json(res).await,
            json!({
                "error": "Webhook workflow error",
                "status": 500,
                "details": "Workflow execution failed",
            })
        );
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_webhook_config_makes_no_calls() {
        let mock = Arc::new(MockTransport::new().reply(200, "{}"));

        let res = app(Config::default(), &mock)
            .oneshot(post_json("/api/n8n", r#"{"action":"ping"}"#))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            read_json(res).await,
            json!({"error": "N8N_WEBHOOK is not defined"})
        );
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_json_body_is_500_without_calls() {
        let mock = Arc::new(MockTransport::new().reply(200, "{}"));

        let res = app(configured(), &mock)
            .oneshot(post_json("/api/nsg-horizon", ""))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(res).await;
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request payload"));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_500() {
        let mock = Arc::new(MockTransport::new());

        let res = app(configured(), &mock)
            .oneshot(post_json("/api/chat", "{oops"))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(res).await;
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request payload"));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_plain_text_reply_wrapped_as_message() {
        let mock = Arc::new(MockTransport::new().reply(200, "Workflow was started"));

        let res = app(configured(), &mock)
            .oneshot(post_json("/api/n8n", r#"{"action":"ping"}"#))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(read_json(res).await, json!({"message": "Workflow was started"}));
        assert_eq!(mock.calls()[0].url, "https://hooks.example.com/webhook");
    }

    #[tokio::test]
    async fn test_timeout_is_504() {
        let mock = Arc::new(MockTransport::new().fail(TransportError::Timeout));

        let res = app(configured(), &mock)
            .oneshot(post_json("/api/nsg-horizon", r#"{"userId":"u1"}"#))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            read_json(res).await,
            json!({"error": "Downstream request timed out"})
        );
    }

    #[tokio::test]
    async fn test_network_failure_is_500() {
        let mock = Arc::new(
            MockTransport::new().fail(TransportError::Network("connection refused".to_string())),
        );

        let res = app(configured(), &mock)
            .oneshot(post_json("/api/nsg-horizon", r#"{"userId":"u1"}"#))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            read_json(res).await,
            json!({"error": "Failed to reach downstream service"})
        );
    }

    #[tokio::test]
    async fn test_education_pdf_routed_to_api_server() {
        let mock = Arc::new(MockTransport::new().reply(200, r#"{"id":"c-1"}"#));

        let res = app(configured(), &mock)
            .oneshot(post_multipart("/api/nsg-education/content", "Guide.PDF"))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(read_json(res).await, json!({"id": "c-1"}));

        let calls = mock.calls();
        assert_eq!(calls[0].url, "http://localhost:4000/education/ingest-pdf");
        assert_eq!(calls[0].authorization.as_deref(), Some("Bearer user-token"));
    }

    #[tokio::test]
    async fn test_education_pdf_has_no_fallback() {
        let mock = Arc::new(MockTransport::new().reply(404, "Not Found"));

        let res = app(configured(), &mock)
            .oneshot(post_multipart("/api/nsg-education/content", "guide.pdf"))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_education_other_files_go_to_webhook() {
        let mock = Arc::new(MockTransport::new().reply(200, r#"[{"id":"c-2"}]"#));

        let res = app(configured(), &mock)
            .oneshot(post_multipart("/api/nsg-education/content", "guide.docx"))
            .await
            .unwrap();

        assert_eq!(read_json(res).await, json!({"id": "c-2"}));
        assert_eq!(mock.calls()[0].url, "https://hooks.example.com/webhook/education");
    }

    #[tokio::test]
    async fn test_onboarding_forwards_selected_fields() {
        let mock = Arc::new(MockTransport::new().reply(200, r#"[{"json":{"next":"goals"}}]"#));

        let res = app(configured(), &mock)
            .oneshot(post_json(
                "/api/nsg-education/onboarding",
                r#"{"message":"hola","userId":"u1","step":2,"extra":"dropped"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            read_json(res).await,
            json!({"success": true, "data": {"next": "goals"}})
        );

        let calls = mock.calls();
        assert_eq!(
            calls[0].url,
            "https://hooks.example.com/webhook/nsg-strategy-onboarding"
        );
        assert_eq!(
            calls[0].body,
            OutboundBody::Json(json!({"message": "hola", "userId": "u1", "step": 2}))
        );
    }

    #[tokio::test]
    async fn test_content_chat_shapes_message() {
        let mock = Arc::new(MockTransport::new().reply(200, r#"[{"output":"Claro, aquí va"}]"#));

        let res = app(configured(), &mock)
            .oneshot(post_json(
                "/api/nsg-education/content/abc-42/chat",
                r#"{"message":"¿De qué trata?","history":[],"preferences":{"tone":"brief"}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body = read_json(res).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"]["role"], "system");
        assert_eq!(body["message"]["type"], "text");
        assert_eq!(body["message"]["content"], "Claro, aquí va");
        assert!(body["message"]["timestamp"].is_string());

        let calls = mock.calls();
        assert_eq!(
            calls[0].url,
            "https://hooks.example.com/webhook/nsg-education-chat"
        );
        match &calls[0].body {
            OutboundBody::Json(sent) => {
                assert_eq!(sent["action"], "chat");
                assert_eq!(sent["contentId"], "abc-42");
                assert_eq!(sent["preferences"], json!({"tone": "brief"}));
                assert!(sent["sessionId"].as_str().unwrap().starts_with("session-"));
            }
            other => panic!("Expected JSON body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_content_chat_requires_json() {
        let mock = Arc::new(MockTransport::new());

        let res = app(configured(), &mock)
            .oneshot(post_multipart("/api/nsg-education/content/abc/chat", "a.txt"))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_role_menu() {
        let mock = Arc::new(MockTransport::new());

        let res = app(configured(), &mock)
            .oneshot(Request::get("/api/roles/manager/menu").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body = read_json(res).await;
        assert_eq!(body["role"], "manager");
        assert_eq!(body["menu"][5]["id"], "metrics");
    }

    #[tokio::test]
    async fn test_unknown_role_is_404() {
        let mock = Arc::new(MockTransport::new());

        let res = app(configured(), &mock)
            .oneshot(Request::get("/api/roles/admin/menu").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(read_json(res).await, json!({"error": "Unknown role: admin"}));
    }

    #[test]
    fn test_reply_text_precedence() {
        assert_eq!(reply_text(&json!({"output": "a", "message": "b"})), "a");
        assert_eq!(reply_text(&json!({"output": "", "message": "b"})), "b");
        assert_eq!(reply_text(&json!({"other": 1})), DEFAULT_REPLY);
        assert_eq!(reply_text(&json!("plain reply")), "plain reply");
    }

    #[test]
    fn test_reply_text_renders_non_string_values() {
        assert_eq!(reply_text(&json!({"output": 42})), "42");
        assert_eq!(reply_text(&json!({"output": {"text": "hi"}})), r#"{"text":"hi"}"#);
        assert_eq!(reply_text(&json!({"output": null, "message": true})), "true");
        assert_eq!(reply_text(&json!({"output": 0, "message": false})), DEFAULT_REPLY);
    }

    #[test]
    fn test_pick_skips_absent_keys() {
        let picked = pick(&json!({"message": "x", "noise": 1}), &["message", "step"]);
        assert_eq!(picked, json!({"message": "x"}));
    }

    #[test]
    fn test_session_id_format() {
        let id = session_id();
        assert!(id.starts_with("session-"));
        assert_eq!(id.len(), "session-".len() + 8);
    }
}
