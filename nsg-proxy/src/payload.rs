//! Inbound request classification.
//!
//! A request is a file upload when its content type mentions
//! `multipart/form-data`, and a JSON command otherwise. The body is consumed
//! exactly once by the [`InboundRequest`] extractor.

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ProxyError;

/// Kind of payload carried by an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    FileUpload,
    JsonCommand,
}

impl PayloadKind {
    /// Classify a `content-type` header value. Absent headers are passed as `""`.
    pub fn classify(content_type: &str) -> Self {
        if content_type.contains("multipart/form-data") {
            PayloadKind::FileUpload
        } else {
            PayloadKind::JsonCommand
        }
    }
}

/// One field of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FormField {
    pub fn text(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            file_name: None,
            content_type: None,
            data: Bytes::copy_from_slice(value.as_bytes()),
        }
    }

    pub fn file(name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            file_name: Some(file_name.to_string()),
            content_type: Some(content_type.to_string()),
            data: Bytes::copy_from_slice(data),
        }
    }
}

/// Parsed inbound body.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPayload {
    Json(Value),
    Multipart(Vec<FormField>),
}

impl InboundPayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            InboundPayload::Json(_) => PayloadKind::JsonCommand,
            InboundPayload::Multipart(_) => PayloadKind::FileUpload,
        }
    }

    /// Look up a form field by name. Always `None` for JSON payloads.
    pub fn field(&self, name: &str) -> Option<&FormField> {
        match self {
            InboundPayload::Multipart(fields) => fields.iter().find(|f| f.name == name),
            InboundPayload::Json(_) => None,
        }
    }

    /// Require a JSON body.
    pub fn into_json(self) -> Result<Value, ProxyError> {
        match self {
            InboundPayload::Json(value) => Ok(value),
            InboundPayload::Multipart(_) => {
                Err(ProxyError::Payload("expected a JSON body".to_string()))
            }
        }
    }

    /// True when the `document` field is a file whose name ends in `.pdf`.
    pub fn is_pdf_document(&self) -> bool {
        self.field("document")
            .and_then(|f| f.file_name.as_deref())
            .map(|name| name.to_lowercase().ends_with(".pdf"))
            .unwrap_or(false)
    }
}

/// A classified inbound request together with the caller's credentials.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub payload: InboundPayload,
    /// `Authorization` header, forwarded verbatim.
    pub authorization: Option<String>,
}

#[async_trait]
impl<S> FromRequest<S> for InboundRequest
where
    S: Send + Sync,
{
    type Rejection = ProxyError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let authorization = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let payload = match PayloadKind::classify(&content_type) {
            PayloadKind::FileUpload => {
                let multipart = Multipart::from_request(req, state)
                    .await
                    .map_err(|e| ProxyError::Payload(e.body_text()))?;
                InboundPayload::Multipart(collect_fields(multipart).await?)
            }
            PayloadKind::JsonCommand => {
                let body = Bytes::from_request(req, state)
                    .await
                    .map_err(|e| ProxyError::Payload(e.body_text()))?;
                let value = serde_json::from_slice::<Value>(&body).map_err(|e| {
                    warn!(error = %e, body_length = body.len(), "inbound_json_invalid");
                    ProxyError::from(e)
                })?;
                InboundPayload::Json(value)
            }
        };

        debug!(
            kind = ?payload.kind(),
            has_authorization = authorization.is_some(),
            "inbound_request_classified"
        );

        Ok(InboundRequest {
            payload,
            authorization,
        })
    }
}

async fn collect_fields(mut multipart: Multipart) -> Result<Vec<FormField>, ProxyError> {
    let mut fields = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ProxyError::Payload(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ProxyError::Payload(e.body_text()))?;

        fields.push(FormField {
            name,
            file_name,
            content_type,
            data,
        });
    }

    Ok(fields)
}
