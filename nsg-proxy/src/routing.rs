//! Logical operation to downstream URL mapping.
//!
//! Webhook operations get a fallback target: the same URL with its `webhook`
//! path segment replaced by `webhook-test`. The workflow backend serves
//! unpublished workflows there.

use std::fmt;

use url::Url;

use crate::config::{Config, N8N_WEBHOOK_CHAT_VAR, N8N_WEBHOOK_VAR};
use crate::error::ProxyError;

const WEBHOOK_SEGMENT: &str = "webhook";
const WEBHOOK_TEST_SEGMENT: &str = "webhook-test";

/// Operations the proxy knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Chat,
    Documents,
    Education,
    EducationPdf,
    EducationChat,
    Horizon,
    Onboarding,
    Generic,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Chat => "chat",
            Operation::Documents => "documents",
            Operation::Education => "education",
            Operation::EducationPdf => "education-pdf",
            Operation::EducationChat => "education-chat",
            Operation::Horizon => "horizon",
            Operation::Onboarding => "onboarding",
            Operation::Generic => "generic",
        }
    }

    /// Path appended to the webhook base URL, if this operation lives there.
    fn webhook_suffix(&self) -> Option<&'static str> {
        match self {
            Operation::Chat => Some("nsg-chat"),
            Operation::Documents => Some("nsg-documents"),
            Operation::Education => Some("education"),
            Operation::Horizon => Some("nsg-horizon"),
            Operation::Onboarding => Some("nsg-strategy-onboarding"),
            Operation::EducationPdf | Operation::EducationChat | Operation::Generic => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single downstream URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardTarget {
    pub url: String,
    pub is_fallback: bool,
}

/// Where an operation is sent: a primary target and an optional fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub operation: Operation,
    pub primary: ForwardTarget,
    pub fallback: Option<ForwardTarget>,
}

impl Endpoint {
    /// Endpoint on the webhook backend, with a test-variant fallback when derivable.
    pub fn webhook(operation: Operation, url: String) -> Self {
        let fallback = test_variant(&url).map(|url| ForwardTarget {
            url,
            is_fallback: true,
        });

        Self {
            operation,
            primary: ForwardTarget {
                url,
                is_fallback: false,
            },
            fallback,
        }
    }

    /// Endpoint with no fallback.
    pub fn direct(operation: Operation, url: String) -> Self {
        Self {
            operation,
            primary: ForwardTarget {
                url,
                is_fallback: false,
            },
            fallback: None,
        }
    }
}

/// Resolve an operation against the configuration.
///
/// Fails with [`ProxyError::Config`] when a required URL is missing, before
/// any network activity.
pub fn resolve(config: &Config, operation: Operation) -> Result<Endpoint, ProxyError> {
    match operation {
        Operation::EducationPdf => Ok(Endpoint::direct(
            operation,
            format!("{}/education/ingest-pdf", config.api_url),
        )),
        Operation::EducationChat => {
            let url = config
                .n8n_webhook_chat
                .clone()
                .ok_or(ProxyError::Config(N8N_WEBHOOK_CHAT_VAR))?;
            Ok(Endpoint::webhook(operation, url))
        }
        Operation::Generic => Ok(Endpoint::webhook(operation, webhook_base(config)?.to_string())),
        _ => {
            let base = webhook_base(config)?;
            let suffix = operation.webhook_suffix().unwrap_or_default();
            Ok(Endpoint::webhook(operation, format!("{}/{}", base, suffix)))
        }
    }
}

fn webhook_base(config: &Config) -> Result<&str, ProxyError> {
    config
        .n8n_webhook
        .as_deref()
        .ok_or(ProxyError::Config(N8N_WEBHOOK_VAR))
}

/// Derive the test variant of a webhook URL by swapping the first `webhook`
/// path segment for `webhook-test`. Returns `None` when there is no such segment.
pub fn test_variant(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;

    let segments: Vec<String> = parsed.path_segments()?.map(str::to_string).collect();
    let position = segments.iter().position(|s| s == WEBHOOK_SEGMENT)?;

    let mut replaced = segments;
    replaced[position] = WEBHOOK_TEST_SEGMENT.to_string();

    parsed.path_segments_mut().ok()?.clear().extend(replaced.iter());
    Some(parsed.to_string())
}
