//! `reqwest`-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    multipart::{Form, Part},
    Client,
};
use tracing::warn;

use super::{DownstreamResponse, OutboundBody, OutboundRequest, Transport, TransportError};
use crate::payload::FormField;

/// HTTP transport sharing one connection pool across requests.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("nsg-proxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<DownstreamResponse, TransportError> {
        let mut builder = self.client.post(&request.url).timeout(self.timeout);

        if let Some(auth) = &request.authorization {
            builder = builder.header(AUTHORIZATION, auth.as_str());
        }

        builder = match &request.body {
            OutboundBody::Json(value) => {
                let body =
                    serde_json::to_vec(value).map_err(|e| TransportError::Encode(e.to_string()))?;
                builder.header(CONTENT_TYPE, "application/json").body(body)
            }
            // No manual content type here: reqwest writes the boundary.
            OutboundBody::Multipart(fields) => builder.multipart(build_form(fields)),
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(DownstreamResponse { status, body })
    }
}

fn build_form(fields: &[FormField]) -> Form {
    fields.iter().fold(Form::new(), |form, field| {
        form.part(field.name.clone(), build_part(field))
    })
}

fn build_part(field: &FormField) -> Part {
    let mut part = Part::bytes(field.data.to_vec());

    if let Some(file_name) = &field.file_name {
        part = part.file_name(file_name.clone());
    }

    match &field.content_type {
        Some(mime) => match part.mime_str(mime) {
            Ok(p) => p,
            Err(e) => {
                warn!(field = %field.name, mime = %mime, error = %e, "multipart_invalid_mime");
                rebuild_without_mime(field)
            }
        },
        None => part,
    }
}

// `mime_str` consumes the part on failure.
fn rebuild_without_mime(field: &FormField) -> Part {
    let part = Part::bytes(field.data.to_vec());
    match &field.file_name {
        Some(file_name) => part.file_name(file_name.clone()),
        None => part,
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e.to_string())
    }
}
