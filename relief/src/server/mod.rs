//! HTTP server for the relief engine.
//!
//! - [`AppState`]: services and the metrics handle shared by handlers
//! - [`build_router`]: every route, the request-id layer and HTTP tracing
//! - [`Application`]: startup and graceful shutdown

pub mod lifecycle;
pub mod routes;
pub mod state;

pub use lifecycle::{Application, StartupError, open_store};
pub use routes::build_router;
pub use state::AppState;
