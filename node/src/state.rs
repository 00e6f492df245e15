//! Shared application state for the RPC surface and the operator CLI.

use std::sync::Arc;

use tokio::sync::broadcast;

use chain::ChainState;

/// State held by the HTTP handlers, the CLI, and the background tasks.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via
/// Axum's `State` extractor.
pub struct AppState {
    /// The node's chain state and RPC-facing operations.
    pub chain: Arc<ChainState>,
    /// Shutdown broadcast; every long-running task listens on it.
    pub quit: broadcast::Sender<()>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
