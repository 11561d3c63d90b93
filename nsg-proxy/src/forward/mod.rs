//! Forwarding to downstream services.
//!
//! ```text
//! Endpoint → primary target ──404──> fallback target
//!                  │                       │
//!                  └──── 2xx / other ──────┴──> DownstreamResponse | ProxyError
//! ```
//!
//! At most one retry, and only on 404. Other statuses are never retried
//! since webhook side effects may not be idempotent.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::error::ProxyError;
use crate::payload::{FormField, InboundPayload};
use crate::routing::{Endpoint, ForwardTarget};

pub use http::HttpTransport;

/// Body of an outbound call.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundBody {
    /// Serialized with `Content-Type: application/json`.
    Json(Value),
    /// Rebuilt as a multipart form; the transport sets the boundary.
    Multipart(Vec<FormField>),
}

impl From<InboundPayload> for OutboundBody {
    fn from(payload: InboundPayload) -> Self {
        match payload {
            InboundPayload::Json(value) => OutboundBody::Json(value),
            InboundPayload::Multipart(fields) => OutboundBody::Multipart(fields),
        }
    }
}

impl OutboundBody {
    fn kind(&self) -> &'static str {
        match self {
            OutboundBody::Json(_) => "json",
            OutboundBody::Multipart(_) => "multipart",
        }
    }
}

/// A single outbound `POST`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub url: String,
    pub body: OutboundBody,
    pub authorization: Option<String>,
}

/// What came back from a downstream call.
#[derive(Debug, Clone, PartialEq)]
pub struct DownstreamResponse {
    pub status: u16,
    pub body: String,
}

impl DownstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Network(String),
    #[error("failed to encode request body: {0}")]
    Encode(String),
}

impl From<TransportError> for ProxyError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout => ProxyError::Timeout,
            other => ProxyError::Network(other.to_string()),
        }
    }
}

/// Something that can deliver an [`OutboundRequest`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &OutboundRequest) -> Result<DownstreamResponse, TransportError>;
}

/// Sends payloads to an [`Endpoint`], applying the 404 fallback rule.
#[derive(Clone)]
pub struct Forwarder {
    transport: Arc<dyn Transport>,
}

impl Forwarder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Forward `body` to `endpoint` and return the successful response.
    ///
    /// Non-2xx responses (after the optional fallback) become
    /// [`ProxyError::Downstream`].
    pub async fn forward(
        &self,
        endpoint: &Endpoint,
        body: OutboundBody,
        authorization: Option<String>,
    ) -> Result<DownstreamResponse, ProxyError> {
        let mut request = OutboundRequest {
            url: endpoint.primary.url.clone(),
            body,
            authorization,
        };

        let mut response = self.send_to(endpoint, &endpoint.primary, &request).await?;

        if response.status == 404 {
            if let Some(fallback) = &endpoint.fallback {
                warn!(
                    operation = %endpoint.operation,
                    primary_url = %endpoint.primary.url,
                    fallback_url = %fallback.url,
                    "proxy_primary_not_found_retrying"
                );
                request.url = fallback.url.clone();
                response = self.send_to(endpoint, fallback, &request).await?;
            }
        }

        if !response.is_success() {
            return Err(ProxyError::downstream(response.status, &response.body));
        }

        Ok(response)
    }

    async fn send_to(
        &self,
        endpoint: &Endpoint,
        target: &ForwardTarget,
        request: &OutboundRequest,
    ) -> Result<DownstreamResponse, ProxyError> {
        info!(
            operation = %endpoint.operation,
            url = %target.url,
            is_fallback = target.is_fallback,
            body_kind = request.body.kind(),
            has_authorization = request.authorization.is_some(),
            "proxy_forward_start"
        );

        match self.transport.send(request).await {
            Ok(response) => {
                info!(
                    operation = %endpoint.operation,
                    url = %target.url,
                    status_code = response.status,
                    body_length = response.body.len(),
                    "proxy_forward_complete"
                );
                Ok(response)
            }
            Err(e) => {
                error!(
                    operation = %endpoint.operation,
                    url = %target.url,
                    error = %e,
                    "proxy_forward_failed"
                );
                Err(e.into())
            }
        }
    }
}
