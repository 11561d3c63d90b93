//! NSG Intelligence webhook proxy.
//!
//! Server-side proxy routes for the NSG Intelligence dashboard. Every route
//! forwards to the workflow-automation backend (or the API server for PDF
//! ingestion), retries the test webhook once on 404 and normalizes the
//! reply into a single canonical shape.
//!
//! ## Architecture
//!
//! ```text
//! Client → payload (classify) → routing (resolve) → forward (primary, fallback)
//!        → normalize → JSON response | error envelope
//! ```

pub mod config;
pub mod error;
pub mod forward;
pub mod normalize;
pub mod payload;
pub mod roles;
pub mod routing;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use error::{ErrorEnvelope, ProxyError};
pub use forward::{Forwarder, HttpTransport, Transport};
pub use normalize::normalize;
pub use payload::{InboundPayload, InboundRequest, PayloadKind};
pub use routing::{Endpoint, ForwardTarget, Operation};
pub use web::AppState;
