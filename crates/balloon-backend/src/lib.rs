//! HTTP collaborators for balloon-core
//!
//! Talks to the extraction/report service:
//!
//! - `POST {base}/resolve-balloon` (multipart `pdf`, `x`, `y`) → `{"nearby": [...]}`
//! - `POST {base}/fill-doc-template` (multipart `balloons`, `template`) → DOCX bytes
//! - `GET {root}/spans` (server root, outside `/api`) → word spans of page 1
//!
//! Failures to connect map to `BalloonError::Transport`, non-2xx answers to
//! `BalloonError::Server` carrying the service's `{"error": ...}` message.

mod client;

pub use client::BackendClient;
