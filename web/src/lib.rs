//! Axum integration for the relief capacity-consistency engine.
//!
//! The engine's services stay transport-agnostic; this crate is the thin
//! imperative shell around them.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← headers, JSON, WebSocket
//! │  - CurrentActor / Payload extractors    │  ← request ids, tracing spans
//! │  - AppError → { code, message, fields } │
//! ├─────────────────────────────────────────┤
//! │         Engine services                 │
//! │  - Ledger, Registry, Coordinator        │  ← atomic commits, retries
//! │  - Stats Aggregator                     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Request Flow
//!
//! 1. **Extract** the caller ([`CurrentActor`]) and body ([`Payload`])
//! 2. **Call** the service
//! 3. **Map** the result: `Ok` to JSON, `Err(ReliefError)` to [`AppError`]

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::AppError;
pub use extractors::{CurrentActor, Payload, USER_ID_HEADER, USER_ROLE_HEADER};
pub use middleware::{REQUEST_ID_HEADER, RequestId, request_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
